use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::feature_flags::FeatureFlagGate;
use crate::metrics::RenderMetrics;
use crate::template::{
    RenderedNotification, TemplateError, TemplateRenderer, TemplateResolver, TemplateResult,
    VersionTag,
};

use super::Action;

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Total successful renders
    pub total_rendered: AtomicU64,
    /// Renders that used the legacy cohort
    pub legacy_rendered: AtomicU64,
    /// Renders that used the v2 cohort
    pub v2_rendered: AtomicU64,
    /// Actions dropped because no template set exists for their triple
    pub not_found: AtomicU64,
    /// Template sets missing the requested version
    pub version_missing: AtomicU64,
    /// Actions missing a required context field
    pub required_field_missing: AtomicU64,
    /// Any other render failure
    pub failed: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_rendered: self.total_rendered.load(Ordering::Relaxed),
            legacy_rendered: self.legacy_rendered.load(Ordering::Relaxed),
            v2_rendered: self.v2_rendered.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            version_missing: self.version_missing.load(Ordering::Relaxed),
            required_field_missing: self.required_field_missing.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn record_rendered(&self, version: VersionTag) {
        self.total_rendered.fetch_add(1, Ordering::Relaxed);
        match version {
            VersionTag::Legacy => self.legacy_rendered.fetch_add(1, Ordering::Relaxed),
            VersionTag::V2 => self.v2_rendered.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_error(&self, error: &TemplateError) {
        let counter = match error {
            TemplateError::NotFound { .. } => &self.not_found,
            TemplateError::VersionMissing { .. } => &self.version_missing,
            TemplateError::RequiredFieldMissing { .. } => &self.required_field_missing,
            _ => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_rendered: u64,
    pub legacy_rendered: u64,
    pub v2_rendered: u64,
    pub not_found: u64,
    pub version_missing: u64,
    pub required_field_missing: u64,
    pub failed: u64,
}

/// Runs the gate → resolver → renderer pipeline for inbound actions
pub struct NotificationDispatcher {
    resolver: TemplateResolver,
    renderer: TemplateRenderer,
    gate: Arc<FeatureFlagGate>,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(
        resolver: TemplateResolver,
        renderer: TemplateRenderer,
        gate: Arc<FeatureFlagGate>,
    ) -> Self {
        Self {
            resolver,
            renderer,
            gate,
            stats: DispatcherStats::default(),
        }
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn gate(&self) -> &Arc<FeatureFlagGate> {
        &self.gate
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    /// Render an action with the version selected by the feature-flag gate
    /// for the action's tenant.
    pub fn dispatch(&self, action: &Action) -> TemplateResult<RenderedNotification> {
        let version = self.gate.active_version(&action.flag_scope());
        self.render(
            &action.bundle,
            &action.application,
            &action.event_type,
            action,
            version,
        )
    }

    /// Resolve the template for (bundle, application, event type) at `version`
    /// and render it against `action`.
    #[tracing::instrument(
        name = "dispatcher.render",
        skip(self, action, version),
        fields(version = %version)
    )]
    pub fn render(
        &self,
        bundle: &str,
        application: &str,
        event_type: &str,
        action: &Action,
        version: VersionTag,
    ) -> TemplateResult<RenderedNotification> {
        let started = Instant::now();

        let result = self
            .resolver
            .resolve(bundle, application, event_type, version)
            .and_then(|template| self.renderer.render(&template, action));

        match &result {
            Ok(_) => {
                self.stats.record_rendered(version);
                RenderMetrics::record_rendered(version.as_str(), started.elapsed().as_secs_f64());
                tracing::debug!(
                    bundle = %bundle,
                    application = %application,
                    event_type = %event_type,
                    "Rendered notification"
                );
            }
            Err(e) => {
                self.stats.record_error(e);
                RenderMetrics::record_failure(version.as_str(), e.kind());
                log_render_error(bundle, application, event_type, version, e);
            }
        }

        result
    }
}

fn log_render_error(
    bundle: &str,
    application: &str,
    event_type: &str,
    version: VersionTag,
    error: &TemplateError,
) {
    match error {
        TemplateError::NotFound { .. } => tracing::warn!(
            bundle = %bundle,
            application = %application,
            event_type = %event_type,
            version = %version,
            "No template registered, dropping action"
        ),
        TemplateError::VersionMissing { .. } => tracing::error!(
            bundle = %bundle,
            application = %application,
            event_type = %event_type,
            version = %version,
            "Template set is missing the requested version"
        ),
        TemplateError::RequiredFieldMissing { field, .. } => tracing::warn!(
            bundle = %bundle,
            application = %application,
            event_type = %event_type,
            version = %version,
            field = %field,
            "Action is missing a required field"
        ),
        other => tracing::error!(
            bundle = %bundle,
            application = %application,
            event_type = %event_type,
            version = %version,
            error = %other,
            "Failed to render notification"
        ),
    }
}

//! Feature-flag gate for template version cohorts.
//!
//! Selects between legacy and v2 instant-notification templates, globally or
//! per tenant. A tenant override always wins over the global flag.
//!
//! # Configuration
//!
//! - `FEATURE_FLAGS__TEMPLATES_V2_ENABLED=true` - Enable v2 templates globally
//! - `feature_flags.tenant_overrides` in `config/*.toml` - Per-tenant overrides (org_id -> bool)

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::metrics::TemplateMetrics;
use crate::template::VersionTag;

// ============================================================================
// Configuration
// ============================================================================

/// Feature-flag configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureFlagConfig {
    /// Whether v2 templates are enabled for tenants without an override
    #[serde(default)]
    pub templates_v2_enabled: bool,
    /// Per-tenant overrides (org_id -> v2 enabled)
    #[serde(default)]
    pub tenant_overrides: HashMap<String, bool>,
}

// ============================================================================
// Scope
// ============================================================================

/// Where a flag value applies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlagScope {
    Global,
    Tenant(String),
}

impl FlagScope {
    pub fn tenant(org_id: impl Into<String>) -> Self {
        FlagScope::Tenant(org_id.into())
    }
}

impl fmt::Display for FlagScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagScope::Global => f.write_str("global"),
            FlagScope::Tenant(org_id) => write!(f, "tenant:{}", org_id),
        }
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Point-in-time view of the flag state
#[derive(Debug, Clone, Serialize)]
pub struct FeatureFlagSnapshot {
    pub templates_v2_enabled: bool,
    pub tenant_overrides: HashMap<String, bool>,
}

/// Runtime flag state. Reads never block writers.
pub struct FeatureFlagGate {
    global: AtomicBool,
    tenants: DashMap<String, bool>,
}

impl Default for FeatureFlagGate {
    fn default() -> Self {
        Self::new(FeatureFlagConfig::default())
    }
}

impl FeatureFlagGate {
    /// Create a gate seeded from configuration
    pub fn new(config: FeatureFlagConfig) -> Self {
        let tenants = DashMap::new();
        for (org_id, enabled) in config.tenant_overrides {
            tenants.insert(org_id, enabled);
        }

        TemplateMetrics::set_v2_enabled(config.templates_v2_enabled);
        Self {
            global: AtomicBool::new(config.templates_v2_enabled),
            tenants,
        }
    }

    /// Whether v2 templates are enabled for `scope`
    pub fn is_enabled(&self, scope: &FlagScope) -> bool {
        match scope {
            FlagScope::Global => self.global.load(Ordering::SeqCst),
            FlagScope::Tenant(org_id) => self
                .tenants
                .get(org_id)
                .map(|entry| *entry.value())
                .unwrap_or_else(|| self.global.load(Ordering::SeqCst)),
        }
    }

    /// Version cohort the resolver should use for `scope`
    pub fn active_version(&self, scope: &FlagScope) -> VersionTag {
        VersionTag::from_flag(self.is_enabled(scope))
    }

    /// Set the flag for a scope. Takes effect for subsequent lookups.
    pub fn set_feature_flag(&self, scope: FlagScope, enabled: bool) {
        match &scope {
            FlagScope::Global => {
                self.global.store(enabled, Ordering::SeqCst);
                TemplateMetrics::set_v2_enabled(enabled);
            }
            FlagScope::Tenant(org_id) => {
                self.tenants.insert(org_id.clone(), enabled);
            }
        }

        tracing::info!(scope = %scope, enabled = enabled, "Template v2 flag updated");
    }

    /// Drop a tenant override so the tenant follows the global flag again.
    /// Returns the previous override, if any.
    pub fn clear_tenant_override(&self, org_id: &str) -> Option<bool> {
        let previous = self.tenants.remove(org_id).map(|(_, enabled)| enabled);
        if previous.is_some() {
            tracing::info!(org_id = %org_id, "Template v2 tenant override cleared");
        }
        previous
    }

    pub fn snapshot(&self) -> FeatureFlagSnapshot {
        FeatureFlagSnapshot {
            templates_v2_enabled: self.global.load(Ordering::SeqCst),
            tenant_overrides: self
                .tenants
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }
}

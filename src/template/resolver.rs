//! Resolves the template pair for an event type and version cohort

use std::sync::Arc;

use super::registry::{CompiledDefinition, TemplateRegistry};
use super::types::{EventTypeDescriptor, TemplateResult, VersionTag};

/// Pure lookup over the template registry
#[derive(Clone)]
pub struct TemplateResolver {
    registry: Arc<TemplateRegistry>,
}

impl TemplateResolver {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the template registered for (bundle, application, event type) at `version`.
    ///
    /// Fails with `NotFound` when the triple is unknown and `VersionMissing` when the
    /// triple is known but has no entry for `version`.
    pub fn resolve(
        &self,
        bundle: &str,
        application: &str,
        event_type: &str,
        version: VersionTag,
    ) -> TemplateResult<Arc<CompiledDefinition>> {
        let descriptor = EventTypeDescriptor::new(bundle, application, event_type);
        self.resolve_descriptor(&descriptor, version)
    }

    pub fn resolve_descriptor(
        &self,
        descriptor: &EventTypeDescriptor,
        version: VersionTag,
    ) -> TemplateResult<Arc<CompiledDefinition>> {
        descriptor.validate()?;
        self.registry.snapshot().lookup(descriptor, version)
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }
}

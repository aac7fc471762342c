//! Template registry with copy-on-write snapshots
//!
//! Readers take an `Arc` to the current snapshot and never hold the lock while
//! rendering. Writers compile outside the lock, then swap in a new snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::engine::{BraceEngine, CompiledTemplate, OutputMode, TemplateEngine};
use super::types::{EventTypeDescriptor, TemplateDefinition, TemplateError, TemplateResult, VersionTag};
use crate::metrics::TemplateMetrics;

/// A template definition together with its compiled subject and body
#[derive(Debug)]
pub struct CompiledDefinition {
    pub definition: TemplateDefinition,
    pub subject: Arc<dyn CompiledTemplate>,
    pub body: Arc<dyn CompiledTemplate>,
}

impl CompiledDefinition {
    pub fn descriptor(&self) -> &EventTypeDescriptor {
        &self.definition.descriptor
    }

    pub fn version(&self) -> VersionTag {
        self.definition.version
    }
}

/// Immutable view of every registered template set
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    sets: HashMap<EventTypeDescriptor, HashMap<VersionTag, Arc<CompiledDefinition>>>,
    generation: u64,
}

impl RegistrySnapshot {
    /// Find the template for a descriptor and version
    pub fn lookup(
        &self,
        descriptor: &EventTypeDescriptor,
        version: VersionTag,
    ) -> TemplateResult<Arc<CompiledDefinition>> {
        let set = self
            .sets
            .get(descriptor)
            .ok_or_else(|| TemplateError::NotFound {
                descriptor: descriptor.clone(),
            })?;

        set.get(&version)
            .cloned()
            .ok_or_else(|| TemplateError::VersionMissing {
                descriptor: descriptor.clone(),
                version,
            })
    }

    /// Versions registered for a descriptor, legacy first
    pub fn versions(&self, descriptor: &EventTypeDescriptor) -> Vec<VersionTag> {
        let mut versions: Vec<VersionTag> = self
            .sets
            .get(descriptor)
            .map(|set| set.keys().copied().collect())
            .unwrap_or_default();
        versions.sort_by_key(|v| *v == VersionTag::V2);
        versions
    }

    /// All registered descriptors, sorted
    pub fn descriptors(&self) -> Vec<EventTypeDescriptor> {
        let mut descriptors: Vec<_> = self.sets.keys().cloned().collect();
        descriptors.sort();
        descriptors
    }

    /// Number of registered (descriptor, version) definitions
    pub fn len(&self) -> usize {
        self.sets.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Incremented on every registry mutation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn insert(&mut self, compiled: CompiledDefinition) {
        self.sets
            .entry(compiled.descriptor().clone())
            .or_default()
            .insert(compiled.version(), Arc::new(compiled));
    }
}

/// In-memory template registry keyed by (bundle, application, event type, version)
pub struct TemplateRegistry {
    engine: Arc<dyn TemplateEngine>,
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new(Arc::new(BraceEngine))
    }
}

impl TemplateRegistry {
    /// Create an empty registry using the given engine
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            engine,
            current: RwLock::new(Arc::new(RegistrySnapshot::default())),
        }
    }

    /// Compile a definition without registering it
    pub fn compile(&self, definition: TemplateDefinition) -> TemplateResult<CompiledDefinition> {
        definition.descriptor.validate()?;

        let subject = self.engine.compile(&definition.subject, OutputMode::Text)?;
        let body = self.engine.compile(&definition.body, OutputMode::Html)?;

        Ok(CompiledDefinition {
            definition,
            subject,
            body,
        })
    }

    /// Register (or replace) a single subject/body pair
    pub fn register_template(
        &self,
        descriptor: EventTypeDescriptor,
        version: VersionTag,
        subject: &str,
        body: &str,
    ) -> TemplateResult<()> {
        self.register(TemplateDefinition::new(descriptor, version, subject, body))
    }

    /// Register (or replace) a full definition
    pub fn register(&self, definition: TemplateDefinition) -> TemplateResult<()> {
        let compiled = self.compile(definition)?;
        let descriptor = compiled.descriptor().clone();
        let version = compiled.version();

        let mut current = self.current.write();
        let mut next = (**current).clone();
        next.insert(compiled);
        next.generation += 1;
        let len = next.len();
        *current = Arc::new(next);
        drop(current);

        TemplateMetrics::set_registered(len);
        tracing::debug!(
            descriptor = %descriptor,
            version = %version,
            engine = self.engine.name(),
            "Registered template"
        );

        Ok(())
    }

    /// Replace the whole registry with `definitions`.
    ///
    /// Every definition is compiled first; if any fails, the live snapshot is untouched.
    pub fn migrate(&self, definitions: Vec<TemplateDefinition>) -> TemplateResult<usize> {
        let mut next = RegistrySnapshot::default();
        for definition in definitions {
            next.insert(self.compile(definition)?);
        }
        let len = next.len();

        let mut current = self.current.write();
        next.generation = current.generation + 1;
        let generation = next.generation;
        *current = Arc::new(next);
        drop(current);

        TemplateMetrics::set_registered(len);
        tracing::info!(
            templates = len,
            generation = generation,
            "Template registry migrated"
        );

        Ok(len)
    }

    /// Current snapshot. Cheap; hold it for the duration of one render.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    pub fn descriptors(&self) -> Vec<EventTypeDescriptor> {
        self.snapshot().descriptors()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }
}

//! Notification template system.
//!
//! This module provides:
//! - Versioned template definitions keyed by (bundle, application, event type)
//! - A brace template language with HTML escaping, conditionals, loops and filters
//! - A copy-on-write registry of compiled templates
//! - Resolution and rendering of subject/body pairs for an action
//! - Seeding from built-in definitions and JSON directories
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(TemplateRegistry::default());
//! registry.migrate(cost_management_templates())?;
//!
//! let resolver = TemplateResolver::new(registry);
//! let template = resolver.resolve("openshift", "cost-management", "missing-cost-model", VersionTag::V2)?;
//!
//! let rendered = TemplateRenderer::default().render(&template, &action)?;
//! ```

pub mod builtin;
mod engine;
mod loader;
mod registry;
mod renderer;
mod resolver;
mod syntax;
mod types;

pub use builtin::cost_management_templates;
pub use engine::{
    display_value, lookup_path, BraceEngine, CompiledTemplate, OutputMode, TemplateEngine,
};
pub use loader::{seed_registry, BuiltinTemplates, DirectorySource, TemplateSource};
pub use registry::{CompiledDefinition, RegistrySnapshot, TemplateRegistry};
pub use renderer::{RenderEnvironment, TemplateRenderer};
pub use resolver::TemplateResolver;
pub use types::{
    EvaluationError, EventTypeDescriptor, RenderedNotification, TemplateDefinition, TemplateError,
    TemplateResult, VersionTag,
};

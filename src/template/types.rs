//! Template types and error definitions

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Template-specific error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("No template registered for {descriptor}")]
    NotFound { descriptor: EventTypeDescriptor },

    #[error("Template for {descriptor} has no {version} version")]
    VersionMissing {
        descriptor: EventTypeDescriptor,
        version: VersionTag,
    },

    #[error("Required field `{field}` missing for {descriptor} ({version})")]
    RequiredFieldMissing {
        field: String,
        descriptor: EventTypeDescriptor,
        version: VersionTag,
    },

    #[error("Invalid event type descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Template syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Template evaluation failed for {descriptor} ({version}): {message}")]
    Evaluation {
        descriptor: EventTypeDescriptor,
        version: VersionTag,
        message: String,
    },

    #[error("Failed to load templates from {source_name}: {message}")]
    Load {
        source_name: String,
        message: String,
    },
}

impl TemplateError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        TemplateError::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Stable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TemplateError::NotFound { .. } => "template_not_found",
            TemplateError::VersionMissing { .. } => "template_version_missing",
            TemplateError::RequiredFieldMissing { .. } => "required_field_missing",
            TemplateError::InvalidDescriptor(_) => "invalid_descriptor",
            TemplateError::Syntax { .. } => "syntax",
            TemplateError::Evaluation { .. } => "evaluation",
            TemplateError::Load { .. } => "load",
        }
    }
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Failure raised by a compiled template at evaluation time.
///
/// Carries no descriptor; the renderer attaches one when converting to
/// [`TemplateError::Evaluation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Attach the template identity this failure occurred in
    pub fn into_template_error(
        self,
        descriptor: EventTypeDescriptor,
        version: VersionTag,
    ) -> TemplateError {
        TemplateError::Evaluation {
            descriptor,
            version,
            message: self.message,
        }
    }
}

/// Template version cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VersionTag {
    /// Original instant-notification layout
    #[default]
    Legacy,
    /// Console-branded instant-notification layout
    V2,
}

impl VersionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionTag::Legacy => "legacy",
            VersionTag::V2 => "v2",
        }
    }

    /// Map a boolean "v2 enabled" flag onto a version tag
    pub fn from_flag(v2_enabled: bool) -> Self {
        if v2_enabled {
            VersionTag::V2
        } else {
            VersionTag::Legacy
        }
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (bundle, application, event type) triple identifying a template set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventTypeDescriptor {
    pub bundle: String,
    pub application: String,
    pub event_type: String,
}

impl EventTypeDescriptor {
    pub fn new(
        bundle: impl Into<String>,
        application: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            bundle: bundle.into(),
            application: application.into(),
            event_type: event_type.into(),
        }
    }

    /// All three parts must be non-blank
    pub fn validate(&self) -> TemplateResult<()> {
        for (name, value) in [
            ("bundle", &self.bundle),
            ("application", &self.application),
            ("event_type", &self.event_type),
        ] {
            if value.trim().is_empty() {
                return Err(TemplateError::InvalidDescriptor(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for EventTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.bundle, self.application, self.event_type)
    }
}

/// A versioned subject/body template pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    #[serde(flatten)]
    pub descriptor: EventTypeDescriptor,

    #[serde(default)]
    pub version: VersionTag,

    /// Subject template source (plain text)
    pub subject: String,

    /// Body template source (HTML)
    pub body: String,

    /// Dotted context paths the action must supply, e.g. `action.context.sourceName`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<String>,
}

impl TemplateDefinition {
    pub fn new(
        descriptor: EventTypeDescriptor,
        version: VersionTag,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            version,
            subject: subject.into(),
            body: body.into(),
            required_fields: Vec::new(),
        }
    }

    /// Declare a context path that must be present at render time
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }
}

/// Output of a render call, handed to delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedNotification {
    pub descriptor: EventTypeDescriptor,
    pub version: VersionTag,
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_validate() {
        let ok = EventTypeDescriptor::new("openshift", "cost-management", "missing-cost-model");
        assert!(ok.validate().is_ok());

        let blank = EventTypeDescriptor::new("openshift", " ", "missing-cost-model");
        assert!(matches!(
            blank.validate(),
            Err(TemplateError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_version_from_flag() {
        assert_eq!(VersionTag::from_flag(false), VersionTag::Legacy);
        assert_eq!(VersionTag::from_flag(true), VersionTag::V2);
        assert_eq!(VersionTag::default(), VersionTag::Legacy);
    }

    #[test]
    fn test_definition_deserialize_flattened() {
        let json = r#"{
            "bundle": "rhel",
            "application": "advisor",
            "event_type": "new-recommendation",
            "version": "v2",
            "subject": "New recommendation",
            "body": "<p>{{ action.context.title }}</p>",
            "required_fields": ["action.context.title"]
        }"#;

        let def: TemplateDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.descriptor.application, "advisor");
        assert_eq!(def.version, VersionTag::V2);
        assert_eq!(def.required_fields, vec!["action.context.title".to_string()]);
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = TemplateError::VersionMissing {
            descriptor: EventTypeDescriptor::new("openshift", "cost-management", "x"),
            version: VersionTag::V2,
        };
        assert_eq!(
            err.to_string(),
            "Template for openshift/cost-management/x has no v2 version"
        );
        assert_eq!(err.kind(), "template_version_missing");
    }
}

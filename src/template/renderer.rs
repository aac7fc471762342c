//! Binds an action into a resolved template pair

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::engine::lookup_path;
use super::registry::CompiledDefinition;
use super::types::{EvaluationError, RenderedNotification, TemplateError, TemplateResult};
use crate::notification::Action;

/// Deployment-wide values exposed to templates as `environment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderEnvironment {
    /// Base URL of the console, used for links in email bodies
    pub url: String,
}

impl Default for RenderEnvironment {
    fn default() -> Self {
        Self {
            url: "https://console.redhat.com".to_string(),
        }
    }
}

/// Renders subject and body for an action. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    environment: Value,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(RenderEnvironment::default())
    }
}

impl TemplateRenderer {
    pub fn new(environment: RenderEnvironment) -> Self {
        Self {
            environment: json!({ "url": environment.url }),
        }
    }

    /// Render `template` against `action`.
    ///
    /// Fails with `RequiredFieldMissing` before any evaluation when a declared
    /// required field is null or empty. Evaluation failures carry the
    /// template's descriptor and version.
    pub fn render(
        &self,
        template: &CompiledDefinition,
        action: &Action,
    ) -> TemplateResult<RenderedNotification> {
        let evaluation_error = |e: EvaluationError| {
            e.into_template_error(template.descriptor().clone(), template.version())
        };

        let action_value = action
            .to_template_value()
            .map_err(|e| evaluation_error(EvaluationError::new(e.to_string())))?;
        let context = json!({
            "action": action_value,
            "environment": self.environment,
        });

        check_required_fields(template, &context)?;

        let subject = template
            .subject
            .evaluate(&context)
            .map_err(evaluation_error)?;
        let body = template.body.evaluate(&context).map_err(evaluation_error)?;

        Ok(RenderedNotification {
            descriptor: template.descriptor().clone(),
            version: template.version(),
            subject: subject.trim().to_string(),
            body,
        })
    }
}

fn check_required_fields(template: &CompiledDefinition, context: &Value) -> TemplateResult<()> {
    for field in &template.definition.required_fields {
        let present = match lookup_path(context, field) {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        };
        if !present {
            return Err(TemplateError::RequiredFieldMissing {
                field: field.clone(),
                descriptor: template.descriptor().clone(),
                version: template.version(),
            });
        }
    }
    Ok(())
}

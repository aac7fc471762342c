//! Template sources used to seed the registry at startup

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::builtin::cost_management_templates;
use super::registry::TemplateRegistry;
use super::types::{TemplateDefinition, TemplateError, TemplateResult};

/// A provider of template definitions
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Name used in logs and load errors
    fn name(&self) -> String;

    /// Load every definition this source provides
    async fn load(&self) -> TemplateResult<Vec<TemplateDefinition>>;
}

/// Definitions compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

#[async_trait]
impl TemplateSource for BuiltinTemplates {
    fn name(&self) -> String {
        "builtin".to_string()
    }

    async fn load(&self) -> TemplateResult<Vec<TemplateDefinition>> {
        Ok(cost_management_templates())
    }
}

/// Loads `*.json` files from a directory.
///
/// Each file holds a single definition or an array of definitions. Files are
/// read in name order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    Many(Vec<TemplateDefinition>),
    One(Box<TemplateDefinition>),
}

impl DirectorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Load {
            source_name: self.name(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl TemplateSource for DirectorySource {
    fn name(&self) -> String {
        format!("directory:{}", self.path.display())
    }

    async fn load(&self) -> TemplateResult<Vec<TemplateDefinition>> {
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| self.error(e.to_string()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.error(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut definitions = Vec::new();
        for file in files {
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| self.error(format!("{}: {}", file.display(), e)))?;
            let parsed: DefinitionFile = serde_json::from_str(&content)
                .map_err(|e| self.error(format!("{}: {}", file.display(), e)))?;

            match parsed {
                DefinitionFile::Many(many) => definitions.extend(many),
                DefinitionFile::One(one) => definitions.push(*one),
            }
        }

        tracing::debug!(
            source = %self.name(),
            templates = definitions.len(),
            "Loaded template directory"
        );

        Ok(definitions)
    }
}

/// Load every source in order and migrate the registry in one swap.
///
/// When two sources define the same (descriptor, version), the later source wins.
pub async fn seed_registry(
    registry: &TemplateRegistry,
    sources: &[Arc<dyn TemplateSource>],
) -> TemplateResult<usize> {
    let mut definitions = Vec::new();
    for source in sources {
        let loaded = source.load().await?;
        tracing::info!(
            source = %source.name(),
            templates = loaded.len(),
            "Template source loaded"
        );
        definitions.extend(loaded);
    }

    registry.migrate(definitions)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::template::{EventTypeDescriptor, VersionTag};

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_builtin_source() {
        let definitions = tokio_test::block_on(BuiltinTemplates.load()).unwrap();
        assert_eq!(definitions.len(), 14);
        assert_eq!(BuiltinTemplates.name(), "builtin");
    }

    #[tokio::test]
    async fn test_directory_source_reads_single_and_array_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"{"bundle": "rhel", "application": "advisor", "event_type": "new-recommendation",
                "subject": "New recommendation", "body": "<p>{{ action.context.rule }}</p>",
                "required_fields": ["action.context.rule"]}"#,
        );
        write(
            dir.path(),
            "b.json",
            r#"[{"bundle": "rhel", "application": "advisor", "event_type": "new-recommendation",
                 "version": "v2", "subject": "V2", "body": "B"}]"#,
        );
        write(dir.path(), "notes.txt", "ignored");

        let definitions = DirectorySource::new(dir.path()).load().await.unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].version, VersionTag::Legacy);
        assert_eq!(definitions[0].required_fields, vec!["action.context.rule".to_string()]);
        assert_eq!(definitions[1].version, VersionTag::V2);
    }

    #[tokio::test]
    async fn test_directory_source_errors() {
        let missing = DirectorySource::new("/nonexistent/templates");
        assert!(matches!(
            missing.load().await,
            Err(TemplateError::Load { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.json", "{ not json");
        let err = DirectorySource::new(dir.path()).load().await.unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn test_seed_registry_later_source_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "override.json",
            r#"{"bundle": "openshift", "application": "cost-management",
                "event_type": "missing-cost-model", "subject": "Overridden", "body": "B"}"#,
        );

        let registry = TemplateRegistry::default();
        let sources: Vec<Arc<dyn TemplateSource>> = vec![
            Arc::new(BuiltinTemplates),
            Arc::new(DirectorySource::new(dir.path())),
        ];
        let count = seed_registry(&registry, &sources).await.unwrap();

        assert_eq!(count, 14);
        let descriptor =
            EventTypeDescriptor::new("openshift", "cost-management", "missing-cost-model");
        let legacy = registry
            .snapshot()
            .lookup(&descriptor, VersionTag::Legacy)
            .unwrap();
        assert_eq!(legacy.definition.subject, "Overridden");
        assert_eq!(registry.generation(), 1);
    }
}

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::feature_flags::FeatureFlagGate;
use crate::notification::NotificationDispatcher;
use crate::template::{
    seed_registry, BuiltinTemplates, DirectorySource, RenderEnvironment, TemplateRegistry,
    TemplateRenderer, TemplateResolver, TemplateResult, TemplateSource,
};
use crate::triggers::RedisActionSubscriber;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<TemplateRegistry>,
    pub gate: Arc<FeatureFlagGate>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub subscriber: Arc<RedisActionSubscriber>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let registry = Arc::new(TemplateRegistry::default());
        let gate = Arc::new(FeatureFlagGate::new(settings.feature_flags.clone()));
        let renderer = TemplateRenderer::new(RenderEnvironment {
            url: settings.templates.console_url.clone(),
        });
        let dispatcher = Arc::new(NotificationDispatcher::new(
            TemplateResolver::new(registry.clone()),
            renderer,
            gate.clone(),
        ));
        let subscriber = Arc::new(RedisActionSubscriber::new(
            settings.redis.clone(),
            dispatcher.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            registry,
            gate,
            dispatcher,
            subscriber,
            start_time: Instant::now(),
        }
    }

    /// Template sources configured for this deployment, in precedence order
    pub fn template_sources(&self) -> Vec<Arc<dyn TemplateSource>> {
        let mut sources: Vec<Arc<dyn TemplateSource>> = Vec::new();
        if self.settings.templates.seed_builtin {
            sources.push(Arc::new(BuiltinTemplates));
        }
        if let Some(dir) = &self.settings.templates.seed_dir {
            sources.push(Arc::new(DirectorySource::new(dir)));
        }
        sources
    }

    /// Load every configured source into the registry
    pub async fn seed_templates(&self) -> TemplateResult<usize> {
        seed_registry(&self.registry, &self.template_sources()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RedisConfig, ServerConfig, TemplatesConfig};
    use crate::feature_flags::FeatureFlagConfig;

    fn settings(templates: TemplatesConfig) -> Settings {
        Settings {
            server: ServerConfig::default(),
            redis: RedisConfig::default(),
            templates,
            feature_flags: FeatureFlagConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_seed_builtin_templates() {
        let state = AppState::new(settings(TemplatesConfig::default()));
        assert_eq!(state.seed_templates().await.unwrap(), 14);
        assert_eq!(state.registry.descriptors().len(), 7);
    }

    #[tokio::test]
    async fn test_no_sources_leaves_registry_empty() {
        let state = AppState::new(settings(TemplatesConfig {
            seed_builtin: false,
            ..Default::default()
        }));
        assert!(state.template_sources().is_empty());
        assert_eq!(state.seed_templates().await.unwrap(), 0);
        assert!(state.registry.is_empty());
    }
}

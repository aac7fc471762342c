use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::watch;

use super::backoff::ExponentialBackoff;
use crate::config::RedisConfig;
use crate::error::{AppError, Result};
use crate::metrics::{ActionMetrics, REDIS_CONNECTION_STATUS, REDIS_RECONNECTIONS_TOTAL};
use crate::notification::{Action, NotificationDispatcher};
use crate::template::RenderedNotification;

/// A subscription that stays up this long resets the reconnect backoff
const HEALTHY_SESSION: Duration = Duration::from_secs(30);

/// Receives rendered notifications for the external delivery layer
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, notification: &RenderedNotification) -> Result<()>;
}

/// Publishes rendered notifications as JSON on a Redis channel
pub struct RedisPublisher {
    connection: ConnectionManager,
    channel: String,
}

impl RedisPublisher {
    pub fn new(connection: ConnectionManager, channel: impl Into<String>) -> Self {
        Self {
            connection,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for RedisPublisher {
    async fn publish(&self, notification: &RenderedNotification) -> Result<()> {
        let payload = serde_json::to_string(notification)?;
        let mut connection = self.connection.clone();
        connection
            .publish::<_, _, ()>(self.channel.as_str(), payload)
            .await?;
        Ok(())
    }
}

/// Outcome of handling one pub/sub message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Published,
    InvalidPayload,
    RenderFailed,
    PublishFailed,
}

/// Redis Pub/Sub subscriber feeding actions into the render pipeline
pub struct RedisActionSubscriber {
    config: RedisConfig,
    dispatcher: Arc<NotificationDispatcher>,
    shutdown: watch::Sender<bool>,
    connected: AtomicBool,
}

impl RedisActionSubscriber {
    pub fn new(config: RedisConfig, dispatcher: Arc<NotificationDispatcher>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            dispatcher,
            shutdown,
            connected: AtomicBool::new(false),
        }
    }

    /// Stop the subscriber. Also honored when requested before `start`.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown has been requested
    async fn shutdown_requested(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives in `self`, so this only returns on a stop request
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Whether the subscription is currently established
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Run until shutdown is requested, reconnecting with backoff on failure
    pub async fn start(&self) -> anyhow::Result<()> {
        if self.config.channels.is_empty() {
            tracing::info!("No Redis channels configured, skipping action subscriber");
            return Ok(());
        }

        tracing::info!(
            channels = ?self.config.channels,
            output_channel = %self.config.output_channel,
            "Starting Redis action subscriber"
        );

        let mut backoff = ExponentialBackoff::default();

        while !self.is_shutting_down() {
            let started = Instant::now();

            // Covers the connect phase as well as the message loop
            let result = tokio::select! {
                _ = self.shutdown_requested() => None,
                result = self.run_subscription_loop() => Some(result),
            };
            self.set_connected(false);

            let Some(Err(e)) = result else {
                tracing::info!("Redis action subscriber stopped gracefully");
                break;
            };

            if started.elapsed() >= HEALTHY_SESSION {
                backoff.reset();
            }
            let delay = backoff.next_delay();
            REDIS_RECONNECTIONS_TOTAL.inc();
            tracing::error!(
                error = %e,
                attempt = backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Redis subscription error, reconnecting"
            );

            tokio::select! {
                _ = self.shutdown_requested() => {
                    tracing::info!("Shutdown requested while waiting to reconnect");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Ok(())
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
        REDIS_CONNECTION_STATUS.set(if connected { 1 } else { 0 });
    }

    /// One subscription session; only returns on error
    async fn run_subscription_loop(&self) -> Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let publisher = RedisPublisher::new(
            ConnectionManager::new(client.clone()).await?,
            self.config.output_channel.clone(),
        );
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in &self.config.channels {
            if is_pattern(channel) {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        self.set_connected(true);
        tracing::info!("Redis subscription established");

        let mut message_stream = pubsub.on_message();
        while let Some(msg) = message_stream.next().await {
            let channel = msg.get_channel_name().to_string();
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, channel = %channel, "Failed to get message payload");
                    continue;
                }
            };

            self.handle_message(&publisher, &channel, &payload).await;
        }

        Err(AppError::Internal("Redis message stream ended".to_string()))
    }

    /// Parse, render and publish one action payload
    pub async fn handle_message(
        &self,
        sink: &dyn NotificationSink,
        channel: &str,
        payload: &str,
    ) -> MessageOutcome {
        ActionMetrics::record_received();
        tracing::debug!(channel = %channel, "Received action");

        let action: Action = match serde_json::from_str(payload) {
            Ok(action) => action,
            Err(e) => {
                ActionMetrics::record_invalid();
                tracing::warn!(
                    error = %e,
                    channel = %channel,
                    payload = %payload,
                    "Failed to parse action"
                );
                return MessageOutcome::InvalidPayload;
            }
        };

        // Render errors are logged by the dispatcher
        let Ok(rendered) = self.dispatcher.dispatch(&action) else {
            return MessageOutcome::RenderFailed;
        };

        if let Err(e) = sink.publish(&rendered).await {
            tracing::warn!(
                error = %e,
                descriptor = %rendered.descriptor,
                version = %rendered.version,
                "Failed to publish rendered notification"
            );
            return MessageOutcome::PublishFailed;
        }

        ActionMetrics::record_published();
        tracing::debug!(
            channel = %channel,
            descriptor = %rendered.descriptor,
            version = %rendered.version,
            "Published rendered notification"
        );
        MessageOutcome::Published
    }
}

fn is_pattern(channel: &str) -> bool {
    channel.contains('*') || channel.contains('?') || channel.contains('[')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_flags::{FeatureFlagGate, FlagScope};
    use crate::template::{
        cost_management_templates, TemplateRegistry, TemplateRenderer, TemplateResolver,
        VersionTag,
    };
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<RenderedNotification>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn publish(&self, notification: &RenderedNotification) -> Result<()> {
            if self.fail {
                return Err(AppError::Internal("sink unavailable".to_string()));
            }
            self.published.lock().push(notification.clone());
            Ok(())
        }
    }

    fn subscriber() -> RedisActionSubscriber {
        let registry = Arc::new(TemplateRegistry::default());
        registry.migrate(cost_management_templates()).unwrap();
        let dispatcher = NotificationDispatcher::new(
            TemplateResolver::new(registry),
            TemplateRenderer::default(),
            Arc::new(FeatureFlagGate::default()),
        );
        RedisActionSubscriber::new(RedisConfig::default(), Arc::new(dispatcher))
    }

    const ACTION: &str = r#"{
        "bundle": "openshift",
        "application": "cost-management",
        "event_type": "missing-cost-model",
        "timestamp": "2024-03-05T10:15:00Z",
        "org_id": "org-1",
        "context": {"sourceName": "Dummy source name"}
    }"#;

    #[tokio::test]
    async fn test_handle_message_publishes_rendered() {
        let subscriber = subscriber();
        let sink = RecordingSink::default();

        let outcome = subscriber
            .handle_message(&sink, "notifications:actions", ACTION)
            .await;
        assert_eq!(outcome, MessageOutcome::Published);

        let published = sink.published.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].subject, "Source missing Cost Model");
        assert_eq!(published[0].version, VersionTag::Legacy);
    }

    #[tokio::test]
    async fn test_handle_message_uses_tenant_flag() {
        let subscriber = subscriber();
        subscriber
            .dispatcher
            .gate()
            .set_feature_flag(FlagScope::tenant("org-1"), true);
        let sink = RecordingSink::default();

        subscriber.handle_message(&sink, "notifications:actions", ACTION).await;

        let published = sink.published.lock();
        assert_eq!(published[0].version, VersionTag::V2);
        assert_eq!(
            published[0].subject,
            "Instant notification - Missing cost model- Cost management - OpenShift"
        );
    }

    #[tokio::test]
    async fn test_handle_message_failures() {
        let subscriber = subscriber();
        let sink = RecordingSink::default();

        assert_eq!(
            subscriber.handle_message(&sink, "c", "not json").await,
            MessageOutcome::InvalidPayload
        );

        let unknown = ACTION.replace("missing-cost-model", "nonexistent-event");
        assert_eq!(
            subscriber.handle_message(&sink, "c", &unknown).await,
            MessageOutcome::RenderFailed
        );
        assert!(sink.published.lock().is_empty());

        let failing = RecordingSink {
            fail: true,
            ..Default::default()
        };
        assert_eq!(
            subscriber.handle_message(&failing, "c", ACTION).await,
            MessageOutcome::PublishFailed
        );
    }

    #[test]
    fn test_is_pattern() {
        assert!(is_pattern("notifications:*"));
        assert!(is_pattern("notifications:actions:[ab]"));
        assert!(!is_pattern("notifications:actions"));
    }

    #[test]
    fn test_starts_disconnected() {
        assert!(!subscriber().is_connected());
    }

    fn subscriber_for(url: &str) -> Arc<RedisActionSubscriber> {
        let config = RedisConfig {
            url: url.to_string(),
            ..RedisConfig::default()
        };
        let dispatcher = subscriber().dispatcher.clone();
        Arc::new(RedisActionSubscriber::new(config, dispatcher))
    }

    #[tokio::test]
    async fn test_shutdown_requested_before_start() {
        let subscriber = subscriber_for("redis://127.0.0.1:1");
        subscriber.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), subscriber.start()).await;
        assert!(result.expect("start should return after shutdown").is_ok());
        assert!(!subscriber.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_while_connecting() {
        // Non-routable address: the connect either hangs or fails and backs off
        let subscriber = subscriber_for("redis://10.255.255.1:6379");
        let handle = tokio::spawn({
            let subscriber = subscriber.clone();
            async move { subscriber.start().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        subscriber.shutdown();

        let joined = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("subscriber should stop during connect");
        assert!(joined.unwrap().is_ok());
    }
}

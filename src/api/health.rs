//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::feature_flags::FeatureFlagSnapshot;
use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;
use crate::template::{RegistrySnapshot, VersionTag};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub redis: RedisHealthResponse,
    pub templates: TemplateHealthResponse,
    pub feature_flags: FeatureFlagSnapshot,
    pub renders: DispatcherStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub connected: bool,
    pub channels: Vec<String>,
    pub output_channel: String,
}

#[derive(Debug, Serialize)]
pub struct TemplateHealthResponse {
    pub registered: usize,
    pub event_types: usize,
    pub generation: u64,
    /// Event types missing a legacy or v2 entry
    pub incomplete: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.registry.snapshot();
    let redis_connected = state.subscriber.is_connected();

    let incomplete = incomplete_event_types(&snapshot);

    let status = if redis_connected && !snapshot.is_empty() && incomplete.is_empty() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        redis: RedisHealthResponse {
            connected: redis_connected,
            channels: state.settings.redis.channels.clone(),
            output_channel: state.settings.redis.output_channel.clone(),
        },
        templates: TemplateHealthResponse {
            registered: snapshot.len(),
            event_types: snapshot.descriptors().len(),
            generation: snapshot.generation(),
            incomplete,
        },
        feature_flags: state.gate.snapshot(),
        renders: state.dispatcher.stats(),
    })
}

fn incomplete_event_types(snapshot: &RegistrySnapshot) -> Vec<String> {
    snapshot
        .descriptors()
        .into_iter()
        .filter(|descriptor| {
            snapshot.versions(descriptor) != [VersionTag::Legacy, VersionTag::V2]
        })
        .map(|descriptor| descriptor.to_string())
        .collect()
}

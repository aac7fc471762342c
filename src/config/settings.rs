use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::feature_flags::FeatureFlagConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub feature_flags: FeatureFlagConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Channels (or `*` patterns) carrying inbound actions
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Channel rendered notifications are published to
    #[serde(default = "default_output_channel")]
    pub output_channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    /// Seed the built-in Cost Management templates
    #[serde(default = "default_seed_builtin")]
    pub seed_builtin: bool,
    /// Directory of `*.json` template definitions, applied after the built-ins
    #[serde(default)]
    pub seed_dir: Option<String>,
    /// Console base URL exposed to templates as `environment.url`
    #[serde(default = "default_console_url")]
    pub console_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_channels() -> Vec<String> {
    vec!["notifications:actions".to_string()]
}

fn default_output_channel() -> String {
    "notifications:rendered".to_string()
}

fn default_seed_builtin() -> bool {
    true
}

fn default_console_url() -> String {
    "https://console.redhat.com".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("redis.url", default_redis_url())?
            .set_default("redis.channels", default_channels())?
            .set_default("redis.output_channel", default_output_channel())?
            .set_default("templates.seed_builtin", default_seed_builtin())?
            .set_default("templates.console_url", default_console_url())?
            .set_default("feature_flags.templates_v2_enabled", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, REDIS__CHANNELS, FEATURE_FLAGS__TEMPLATES_V2_ENABLED, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.channels"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            channels: default_channels(),
            output_channel: default_output_channel(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            seed_builtin: default_seed_builtin(),
            seed_dir: None,
            console_url: default_console_url(),
        }
    }
}

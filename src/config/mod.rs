mod settings;

pub use settings::{RedisConfig, ServerConfig, Settings, TemplatesConfig};

// Shared components
pub mod config;
pub mod error;
pub mod metrics;

// Template core
pub mod feature_flags;
pub mod notification;
pub mod template;

// Service layer
pub mod api;
pub mod server;
pub mod triggers;

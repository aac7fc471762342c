//! Inbound actions and the render pipeline that turns them into notifications.

mod dispatcher;
mod types;

pub use dispatcher::{DispatcherStats, DispatcherStatsSnapshot, NotificationDispatcher};
pub use types::{Action, ActionBuilder, Event, Recipient};

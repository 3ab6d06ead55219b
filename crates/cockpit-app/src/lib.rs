//! Trading cockpit synchronization client.
//!
//! Wires the push channel, the poller and the aggregator into one session:
//! - [`session`]: lifecycle, poll ticks and symbol selection
//! - [`controls`]: order ticket, kill switch, AI decide-and-execute
//! - [`views`]: table rows and chart geometry from the reconciled view
//! - [`notify`]: transient operator notifications

pub mod app;
pub mod config;
pub mod controls;
pub mod error;
pub mod notify;
pub mod poll_plan;
pub mod session;
pub mod views;

pub use app::Application;
pub use config::{AppConfig, PollConfig};
pub use controls::Controls;
pub use error::{AppError, AppResult};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use poll_plan::{PollKey, PollPlan};
pub use session::Session;

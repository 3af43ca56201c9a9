pub mod models;
pub mod senders;
pub mod service;

pub use models::{Alert, AlertKind, ChannelConfig};
pub use service::{NotificationError, NotificationService};

// Messaging module
// Lock-free channels, text commands, notifications and listener registries

pub mod channels;
pub mod command;
pub mod listeners;
pub mod notification;

pub use channels::{create_command_channel, create_notification_channel, create_tick_channel};
pub use command::{BassCommand, Command};
pub use listeners::{Event, Listeners, SubscriptionId};
pub use notification::{Notification, NotificationCategory, NotificationLevel};

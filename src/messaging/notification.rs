// Notifications utilisateur : échecs de génération, bridge, transport

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Niveau de sévérité
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Origine de la notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Bridge,
    Generator,
    Transport,
    Session,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub message: String,
    pub timestamp: u64, // Unix timestamp en millisecondes
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        category: NotificationCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            category,
            message: message.into(),
            timestamp: now_millis(),
        }
    }

    pub fn info(category: NotificationCategory, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, category, message)
    }

    pub fn warning(category: NotificationCategory, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, category, message)
    }

    pub fn error(category: NotificationCategory, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, category, message)
    }

    /// Plus récente que `max_age_ms` ?
    pub fn is_recent(&self, max_age_ms: u64) -> bool {
        now_millis().saturating_sub(self.timestamp) < max_age_ms
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warn",
            NotificationLevel::Error => "error",
        };
        write!(f, "[{}] {:?}: {}", level, self.category, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_creation() {
        let notif = Notification::error(NotificationCategory::Generator, "Model rejected seed");

        assert_eq!(notif.level, NotificationLevel::Error);
        assert_eq!(notif.category, NotificationCategory::Generator);
        assert_eq!(notif.message, "Model rejected seed");
        assert!(notif.timestamp > 0);
        assert!(notif.is_recent(10_000));
    }

    #[test]
    fn test_display() {
        let notif = Notification::warning(NotificationCategory::Bridge, "not connected");
        assert_eq!(notif.to_string(), "[warn] Bridge: not connected");
    }
}

//! Notification system for user-visible feedback
//!
//! Secondary fetch failures (sample, output, prompts, search config) never
//! abort the dashboard. They surface here and fade after a few seconds.

use std::time::{Duration, Instant};

use super::commands::NotificationLevel;

const AUTO_DISMISS: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: usize,
    pub timestamp: Instant,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub auto_dismiss_after: Option<Duration>,
}

impl Notification {
    fn is_expired(&self, now: Instant) -> bool {
        match self.auto_dismiss_after {
            Some(duration) => now.duration_since(self.timestamp) >= duration,
            None => false,
        }
    }
}

pub struct NotificationManager {
    notifications: Vec<Notification>,
    next_id: usize,
    max_notifications: usize,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            notifications: Vec::new(),
            next_id: 0,
            max_notifications: 50,
        }
    }

    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) -> usize {
        self.push(NotificationLevel::Error, title.into(), message.into())
    }

    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) -> usize {
        self.push(NotificationLevel::Success, title.into(), message.into())
    }

    pub fn warning(&mut self, title: impl Into<String>, message: impl Into<String>) -> usize {
        self.push(NotificationLevel::Warning, title.into(), message.into())
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) -> usize {
        self.push(NotificationLevel::Info, title.into(), message.into())
    }

    pub fn push(&mut self, level: NotificationLevel, title: String, message: String) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        tracing::debug!(?level, %title, %message, "notification");
        self.notifications.push(Notification {
            id,
            timestamp: Instant::now(),
            level,
            title,
            message,
            auto_dismiss_after: Some(AUTO_DISMISS),
        });

        // Keep only recent notifications
        if self.notifications.len() > self.max_notifications {
            self.notifications.remove(0);
        }

        id
    }

    pub fn dismiss(&mut self, id: usize) {
        self.notifications.retain(|n| n.id != id);
    }

    /// Dismiss the most recent notification
    pub fn dismiss_latest(&mut self) {
        self.notifications.pop();
    }

    /// Active notifications, newest first
    pub fn get_active(&self) -> Vec<&Notification> {
        let now = Instant::now();
        self.notifications
            .iter()
            .rev()
            .filter(|n| !n.is_expired(now))
            .collect()
    }

    pub fn cleanup_expired(&mut self) {
        let now = Instant::now();
        self.notifications.retain(|n| !n.is_expired(now));
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

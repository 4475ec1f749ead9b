//! Ephemeral UI notifications with per-viewer, read-once delivery.

use std::{collections::HashSet, fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(rename = "notice")]
    Message,
    Error,
}

/// What a viewer receives when draining its notifications.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveredNotification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

#[derive(Debug)]
struct Notification {
    title: String,
    body: String,
    severity: Severity,
    created: DateTime<Utc>,
    ttl: Duration,
    seen_by: HashSet<String>,
}

impl Notification {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created >= self.ttl
    }

    fn is_new_for(&self, viewer: &str) -> bool {
        !self.seen_by.contains(viewer)
    }

    fn see(&mut self, viewer: &str) -> DeliveredNotification {
        self.seen_by.insert(viewer.to_string());
        DeliveredNotification {
            title: self.title.clone(),
            body: self.body.clone(),
            severity: self.severity,
        }
    }
}

#[derive(Debug, Default)]
struct Mailbox {
    messages: Vec<Notification>,
    errors: Vec<Notification>,
}

/// Process-wide mailbox of notifications, injected where needed.
pub struct Notifications {
    mailbox: Mutex<Mailbox>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl fmt::Debug for Notifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mailbox = self.mailbox.lock();
        f.debug_struct("Notifications")
            .field("messages", &mailbox.messages.len())
            .field("errors", &mailbox.errors.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Notifications {
    pub const DEFAULT_TTL_SECS: i64 = 60;

    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            mailbox: Mutex::new(Mailbox::default()),
            clock,
            default_ttl: Duration::seconds(Self::DEFAULT_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn message(&self, title: impl Into<String>, body: impl Into<String>) {
        let notification = self.build(title.into(), body.into(), Severity::Message);
        self.mailbox.lock().messages.push(notification);
    }

    pub fn error(&self, title: impl Into<String>, body: impl Into<String>) {
        let notification = self.build(title.into(), body.into(), Severity::Error);
        self.mailbox.lock().errors.push(notification);
    }

    /// Notifications `viewer` has not seen yet, errors first. Reading marks
    /// them as seen for this viewer only. Expired entries are dropped for
    /// every viewer.
    pub fn drain(&self, viewer: &str) -> Vec<DeliveredNotification> {
        let now = self.clock.now();
        let mut mailbox = self.mailbox.lock();
        let Mailbox { messages, errors } = &mut *mailbox;

        errors.retain(|n| !n.is_expired(now));
        messages.retain(|n| !n.is_expired(now));

        errors
            .iter_mut()
            .chain(messages.iter_mut())
            .filter(|n| n.is_new_for(viewer))
            .map(|n| n.see(viewer))
            .collect()
    }

    /// Notifications currently held, expired or not.
    pub fn pending(&self) -> usize {
        let mailbox = self.mailbox.lock();
        mailbox.messages.len() + mailbox.errors.len()
    }

    fn build(&self, title: String, body: String, severity: Severity) -> Notification {
        Notification {
            title,
            body,
            severity,
            created: self.clock.now(),
            ttl: self.default_ttl,
            seen_by: HashSet::new(),
        }
    }
}

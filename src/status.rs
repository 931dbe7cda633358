use std::time::{Duration, Instant};

/// How long a status message stays visible.
pub const STATUS_TTL: Duration = Duration::from_secs(3);

/// A transient notice shown next to the row it concerns. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub message: String,
    pub target_id: Option<String>,
    pub created: Instant,
}

impl StatusUpdate {
    pub fn expires_at(&self, ttl: Duration) -> Instant {
        self.created + ttl
    }
}

#[derive(Debug, Clone)]
pub struct StatusBoard {
    ttl: Duration,
    updates: Vec<StatusUpdate>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(STATUS_TTL)
    }
}

impl StatusBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            updates: Vec::new(),
        }
    }

    /// Add a message. A newer message for the same target replaces the old one.
    pub fn push(&mut self, message: impl Into<String>, target_id: Option<&str>, at: Instant) {
        let target_id = target_id.map(str::to_string);
        if target_id.is_some() {
            self.updates.retain(|u| u.target_id != target_id);
        }
        self.updates.push(StatusUpdate {
            message: message.into(),
            target_id,
            created: at,
        });
    }

    /// Messages still inside their TTL, oldest first.
    pub fn active(&self, now: Instant) -> impl Iterator<Item = &StatusUpdate> + '_ {
        self.updates.iter().filter(move |u| u.expires_at(self.ttl) > now)
    }

    pub fn latest(&self, now: Instant) -> Option<&StatusUpdate> {
        self.active(now).last()
    }

    pub fn for_target(&self, id: &str, now: Instant) -> Option<&StatusUpdate> {
        self.active(now).find(|u| u.target_id.as_deref() == Some(id))
    }

    /// Drop expired messages. Returns whether anything was removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.updates.len();
        let ttl = self.ttl;
        self.updates.retain(|u| u.expires_at(ttl) > now);
        self.updates.len() != before
    }

    /// When the next message expires, for scheduling a redraw.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.updates.iter().map(|u| u.expires_at(self.ttl)).min()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

use std::time::{Duration, Instant};

use crate::modules::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// `GET STATE` + `GET SELECTOR_LABELS`.
    Full,
    /// `GET STATE` only.
    StateOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Send,
    Deferred(Instant),
    Dropped,
}

/// Shared cooldown for refresh requests. A full sync inside the cooldown is rescheduled for
/// its expiry (latest request wins); a state-only refresh inside it is dropped.
#[derive(Debug, Clone)]
pub struct SyncThrottle {
    full_cooldown: Duration,
    state_cooldown: Duration,
    cooldown_until: Option<Instant>,
    deferred: Timer,
}

impl SyncThrottle {
    pub fn new(full_cooldown: Duration, state_cooldown: Duration) -> Self {
        Self {
            full_cooldown,
            state_cooldown,
            cooldown_until: None,
            deferred: Timer::default(),
        }
    }

    pub fn request(&mut self, kind: SyncKind, now: Instant) -> SyncDecision {
        if let Some(until) = self.cooldown_until.filter(|until| now < *until) {
            return match kind {
                SyncKind::Full => {
                    self.deferred.arm(until);
                    SyncDecision::Deferred(until)
                }
                SyncKind::StateOnly => SyncDecision::Dropped,
            };
        }

        let cooldown = match kind {
            SyncKind::Full => {
                self.deferred.cancel();
                self.full_cooldown
            }
            SyncKind::StateOnly => self.state_cooldown,
        };
        self.cooldown_until = Some(now + cooldown);
        SyncDecision::Send
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_armed()
    }

    pub fn fire_deferred(&mut self, now: Instant) -> bool {
        self.deferred.fire(now)
    }

    pub fn cancel_deferred(&mut self) {
        self.deferred.cancel();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deferred.deadline()
    }
}

use std::fmt;
use std::time::{Duration, Instant};

use crate::modules::error::TransportError;
use crate::modules::timer::{earliest, Timer};

/// Identifies one connection attempt. Attempts are numbered monotonically; events carrying an
/// id other than the current attempt are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn with_code(code: u16) -> Self {
        Self {
            code: Some(code),
            reason: String::new(),
        }
    }

    /// Connection dropped without a close frame.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }
}

/// The persistent bidirectional channel. Calls must not block; `open` only starts the attempt
/// and its outcome is reported back through the engine's `on_open`/`on_close`.
pub trait LiveTransport {
    fn open(&mut self, id: ConnectionId) -> Result<(), TransportError>;
    fn send(&mut self, id: ConnectionId, line: &str) -> Result<(), TransportError>;
    fn close(&mut self, id: ConnectionId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Fresh,
    Probe,
    Dead,
}

/// Connection bookkeeping: state, current attempt, reconnect backoff and health sampling.
#[derive(Debug, Clone)]
pub struct TransportManager {
    state: ConnectionState,
    current: Option<ConnectionId>,
    last_id: u64,
    last_inbound: Option<Instant>,

    pub(crate) reconnect: Timer,
    pub(crate) health: Timer,
}

impl Default for TransportManager {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            current: None,
            last_id: 0,
            last_inbound: None,
            reconnect: Timer::default(),
            health: Timer::default(),
        }
    }
}

impl TransportManager {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn current(&self) -> Option<ConnectionId> {
        self.current
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn is_current(&self, id: ConnectionId) -> bool {
        self.current == Some(id)
    }

    /// Allocates the next attempt unless one is already connecting or open.
    pub fn begin_attempt(&mut self) -> Option<ConnectionId> {
        if self.state.is_active() {
            return None;
        }
        self.last_id += 1;
        let id = ConnectionId(self.last_id);
        self.current = Some(id);
        self.state = ConnectionState::Connecting;
        Some(id)
    }

    pub fn mark_open(&mut self, now: Instant) {
        self.state = ConnectionState::Open;
        self.last_inbound = Some(now);
    }

    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
        self.current = None;
        self.last_inbound = None;
        self.health.cancel();
    }

    /// Drops the current reference for a forced reconnect. Returns the id to close when it was
    /// still connecting or open.
    pub fn detach(&mut self) -> Option<ConnectionId> {
        let id = self.current.take();
        let to_close = if self.state.is_active() { id } else { None };
        if to_close.is_some() {
            self.state = ConnectionState::Closing;
        }
        self.last_inbound = None;
        self.health.cancel();
        to_close
    }

    /// Starts a deliberate close. The reference is kept so the matching close event settles
    /// the state.
    pub fn begin_close(&mut self) -> Option<ConnectionId> {
        if !self.state.is_active() {
            return None;
        }
        self.state = ConnectionState::Closing;
        self.health.cancel();
        self.current
    }

    pub fn record_inbound(&mut self, now: Instant) {
        self.last_inbound = Some(now);
    }

    pub fn last_inbound(&self) -> Option<Instant> {
        self.last_inbound
    }

    pub fn health_verdict(
        &self,
        now: Instant,
        probe_after: Duration,
        dead_after: Duration,
    ) -> HealthVerdict {
        let Some(last) = self.last_inbound else {
            return HealthVerdict::Fresh;
        };
        let silent = now.saturating_duration_since(last);
        if silent >= dead_after {
            HealthVerdict::Dead
        } else if silent >= probe_after {
            HealthVerdict::Probe
        } else {
            HealthVerdict::Fresh
        }
    }

    pub fn reconnect_scheduled(&self) -> bool {
        self.reconnect.is_armed()
    }

    pub fn cancel_timers(&mut self) {
        self.reconnect.cancel();
        self.health.cancel();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.reconnect.deadline(), self.health.deadline()])
    }
}

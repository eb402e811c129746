#![allow(dead_code)]

use std::time::{Duration, Instant};
use sync_core::{
    ConnectionId, FallbackApi, LiveTransport, PollOutcome, PollRequest, SyncClient, SyncConfig,
    TransportError,
};

#[derive(Debug, Default)]
pub struct FakeLive {
    pub opened: Vec<ConnectionId>,
    pub sent: Vec<(ConnectionId, String)>,
    pub closed: Vec<ConnectionId>,
    pub fail_open: bool,
    pub fail_sends: bool,
}

impl FakeLive {
    pub fn lines(&self) -> Vec<&str> {
        self.sent.iter().map(|(_, l)| l.as_str()).collect()
    }

    pub fn last_opened(&self) -> ConnectionId {
        *self.opened.last().expect("a connection was opened")
    }
}

impl LiveTransport for FakeLive {
    fn open(&mut self, id: ConnectionId) -> Result<(), TransportError> {
        self.opened.push(id);
        if self.fail_open {
            return Err(TransportError::Connect("refused".into()));
        }
        Ok(())
    }

    fn send(&mut self, id: ConnectionId, line: &str) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::ChannelClosed);
        }
        self.sent.push((id, line.to_string()));
        Ok(())
    }

    fn close(&mut self, id: ConnectionId) {
        self.closed.push(id);
    }
}

#[derive(Debug, Default)]
pub struct FakeFallback {
    pub polls: Vec<PollRequest>,
    pub posts: Vec<String>,
}

impl FallbackApi for FakeFallback {
    fn poll(&mut self, request: PollRequest) {
        self.polls.push(request);
    }

    fn post_command(&mut self, line: &str) {
        self.posts.push(line.to_string());
    }
}

pub type Engine = SyncClient<FakeLive, FakeFallback>;

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn client() -> Engine {
    SyncClient::new(SyncConfig::default(), FakeLive::default(), FakeFallback::default())
}

/// Started engine whose first connection has opened at `t0`.
pub fn open_client(t0: Instant) -> (Engine, ConnectionId) {
    let mut c = client();
    c.start(t0);
    let id = c.live().last_opened();
    c.on_open(id, t0);
    (c, id)
}

pub fn state_ok(line: &str) -> PollOutcome {
    PollOutcome {
        state: Ok(line.to_string()),
        labels: None,
    }
}

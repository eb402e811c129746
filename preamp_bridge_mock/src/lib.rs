mod http;
mod main_loop;
mod net;
mod protocol;

pub use crate::http::HttpThread;
pub use crate::main_loop::{handle_line, BridgeState, MainLoop, SharedState, ERR_UNKNOWN_CMD};
pub use crate::net::NetworkThread;
pub use crate::protocol::{InboundMsg, OutboundMsg, INBOUND_CAP, OUTBOUND_CAP};

use crossbeam_channel::{bounded, Sender};
use preamp_protocol::{Attribute, DeviceState, SelectorLabels};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(10);

/// In-process stand-in for the preamp bridge: a WebSocket endpoint plus the HTTP API, both
/// backed by one [`BridgeState`].
pub struct MockBridge {
    net: NetworkThread,
    http: HttpThread,
    shared: SharedState,
    outbound_tx: Sender<OutboundMsg>,
    shutdown: Arc<AtomicBool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl MockBridge {
    pub fn start(ws_addr: &str, http_addr: &str) -> io::Result<Self> {
        let shared: SharedState = Arc::new(Mutex::new(BridgeState::default()));

        let (in_tx, in_rx) = bounded(INBOUND_CAP);
        let (out_tx, out_rx) = bounded(OUTBOUND_CAP);

        let net = NetworkThread::spawn_with_addr(ws_addr, in_tx, out_rx)?;
        let http = HttpThread::spawn_with_addr(http_addr, Arc::clone(&shared), out_tx.clone())?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);
        let mut main_loop = MainLoop::new(in_rx, out_tx.clone(), Arc::clone(&shared));
        let ticker = thread::spawn(move || {
            while !shutdown_for_thread.load(Ordering::Relaxed) {
                main_loop.tick();
                thread::sleep(TICK);
            }
        });

        Ok(Self {
            net,
            http,
            shared,
            outbound_tx: out_tx,
            shutdown,
            ticker: Mutex::new(Some(ticker)),
        })
    }

    pub fn ws_addr(&self) -> SocketAddr {
        self.net.listen_addr()
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http.listen_addr()
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.ws_addr())
    }

    pub fn api_base(&self) -> String {
        format!("http://{}/", self.http_addr())
    }

    pub fn state(&self) -> DeviceState {
        main_loop::lock(&self.shared).device.clone()
    }

    pub fn labels(&self) -> SelectorLabels {
        main_loop::lock(&self.shared).labels.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        main_loop::lock(&self.shared).commands.clone()
    }

    pub fn connection_count(&self) -> usize {
        main_loop::lock(&self.shared).connections
    }

    /// While unavailable every HTTP request answers 503.
    pub fn set_http_available(&self, available: bool) {
        main_loop::lock(&self.shared).http_available = available;
    }

    /// A change made on the device itself (front panel, IR remote), pushed to the live client.
    pub fn push_value(&self, attr: Attribute, value: impl fmt::Display) {
        let line = {
            let mut state = main_loop::lock(&self.shared);
            state.device.set(attr.as_str(), value.to_string());
            state.device.to_line()
        };
        let _ = self.outbound_tx.try_send(OutboundMsg::Send { line });
    }

    pub fn close_client(&self, code: u16) {
        let _ = self.outbound_tx.try_send(OutboundMsg::Close { code });
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut h) = self.ticker.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
        self.net.shutdown();
        self.http.shutdown();
    }
}

impl Drop for MockBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

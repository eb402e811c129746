use crate::protocol::{
    normalize_client_command, Attribute, DeviceState, InboundMsg, OutboundMsg, SelectorLabels,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub const ERR_UNKNOWN_CMD: &str = "ERR UNKNOWN_CMD";

/// Everything the bridge knows, shared by the WebSocket loop and the HTTP endpoints.
#[derive(Debug, Clone)]
pub struct BridgeState {
    pub device: DeviceState,
    pub labels: SelectorLabels,
    /// Normalized command lines in arrival order, from either channel.
    pub commands: Vec<String>,
    pub connections: usize,
    pub http_available: bool,
}

impl Default for BridgeState {
    fn default() -> Self {
        let mut device = DeviceState::new();
        device.set("VOL", "30");
        device.set("BAL", "0");
        device.set("BRI", "80");
        device.set("INP", "1");
        device.set("MUTE", "0");

        let mut labels = SelectorLabels::new();
        for (i, name) in ["Phono", "CD", "AUX", "Stream"].into_iter().enumerate() {
            labels.insert((i + 1).to_string(), name);
        }

        Self {
            device,
            labels,
            commands: Vec::new(),
            connections: 0,
            http_available: true,
        }
    }
}

pub type SharedState = Arc<Mutex<BridgeState>>;

pub fn lock(shared: &SharedState) -> std::sync::MutexGuard<'_, BridgeState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Applies one client line and returns the reply lines.
///
/// `GET` requests answer with the matching snapshot, `SET` updates the device and answers with
/// the new state line (which the bridge broadcasts), anything else gets `ERR UNKNOWN_CMD`.
pub fn handle_line(state: &mut BridgeState, line: &str) -> Vec<String> {
    let Some(cmd) = normalize_client_command(line) else {
        return vec![ERR_UNKNOWN_CMD.to_string()];
    };
    state.commands.push(cmd.clone());

    let parts: Vec<&str> = cmd.split_whitespace().collect();
    match parts.as_slice() {
        [verb, what] if verb.eq_ignore_ascii_case("GET") => {
            match what.to_ascii_uppercase().as_str() {
                "STATE" => vec![state.device.to_line()],
                "SELECTOR_LABELS" => vec![state.labels.to_line()],
                _ => vec![ERR_UNKNOWN_CMD.to_string()],
            }
        }
        [verb, key, value] if verb.eq_ignore_ascii_case("SET") => {
            match key.parse::<Attribute>() {
                Ok(attr) => {
                    apply_set(&mut state.device, attr, value);
                    vec![state.device.to_line()]
                }
                Err(_) => vec![ERR_UNKNOWN_CMD.to_string()],
            }
        }
        _ => vec![ERR_UNKNOWN_CMD.to_string()],
    }
}

fn apply_set(device: &mut DeviceState, attr: Attribute, value: &str) {
    let value = match attr {
        Attribute::Mute if value.eq_ignore_ascii_case("TOGGLE") => {
            if device.muted().unwrap_or(false) {
                "0"
            } else {
                "1"
            }
        }
        _ => value,
    };
    device.set(attr.as_str(), value);
}

pub struct MainLoop {
    inbound_rx: Receiver<InboundMsg>,
    outbound_tx: Sender<OutboundMsg>,
    shared: SharedState,
}

impl MainLoop {
    pub fn new(
        inbound_rx: Receiver<InboundMsg>,
        outbound_tx: Sender<OutboundMsg>,
        shared: SharedState,
    ) -> Self {
        Self {
            inbound_rx,
            outbound_tx,
            shared,
        }
    }

    pub fn tick(&mut self) {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(InboundMsg::ClientConnected { socket_addr }) => {
                    let (labels, device) = {
                        let mut state = lock(&self.shared);
                        state.connections += 1;
                        (state.labels.to_line(), state.device.to_line())
                    };
                    debug!("greeting {socket_addr}");
                    self.try_send(OutboundMsg::Send { line: labels });
                    self.try_send(OutboundMsg::Send { line: device });
                }
                Ok(InboundMsg::ClientDisconnected) => debug!("client disconnected"),
                Ok(InboundMsg::Line { line }) => {
                    let replies = handle_line(&mut lock(&self.shared), &line);
                    for reply in replies {
                        self.try_send(OutboundMsg::Send { line: reply });
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub fn try_send(&mut self, msg: OutboundMsg) {
        let _ = self.outbound_tx.try_send(msg);
    }
}

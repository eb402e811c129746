use std::net::SocketAddr;

pub const INBOUND_CAP: usize = 256;
pub const OUTBOUND_CAP: usize = 256;

pub enum InboundMsg {
    ClientConnected { socket_addr: SocketAddr },
    ClientDisconnected,
    Line { line: String },
}

pub enum OutboundMsg {
    Send { line: String },
    /// Close the active client with the given close code.
    Close { code: u16 },
}

pub use preamp_protocol::{
    normalize_client_command, Attribute, DeviceState, SelectorLabels, LABELS_PREFIX, STATE_PREFIX,
};

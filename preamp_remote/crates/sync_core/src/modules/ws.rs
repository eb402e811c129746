use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use crate::modules::actor::DriverEvent;
use crate::modules::error::TransportError;
use crate::modules::transport::{CloseInfo, ConnectionId, LiveTransport};

const NORMAL_CLOSURE: u16 = 1000;

enum Outgoing {
    Line(String),
    Close,
}

struct ActiveSocket {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Outgoing>,
}

/// WebSocket link to the bridge. Each attempt runs in its own task and reports back through
/// the driver's event channel, tagged with its connection id.
pub struct WsTransport {
    url: Url,
    events: mpsc::UnboundedSender<DriverEvent>,
    active: Option<ActiveSocket>,
}

impl WsTransport {
    pub fn new(url: Url, events: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self {
            url,
            events,
            active: None,
        }
    }
}

impl LiveTransport for WsTransport {
    fn open(&mut self, id: ConnectionId) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if let Some(old) = self.active.take() {
            let _ = old.outbound.send(Outgoing::Close);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_socket(id, self.url.clone(), rx, self.events.clone()));
        self.active = Some(ActiveSocket { id, outbound: tx });
        Ok(())
    }

    fn send(&mut self, id: ConnectionId, line: &str) -> Result<(), TransportError> {
        let Some(active) = self.active.as_ref() else {
            return Err(TransportError::NotOpen);
        };
        if active.id != id {
            return Err(TransportError::Stale(id));
        }
        active
            .outbound
            .send(Outgoing::Line(line.to_string()))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self, id: ConnectionId) {
        if self.active.as_ref().is_some_and(|a| a.id == id) {
            if let Some(active) = self.active.take() {
                let _ = active.outbound.send(Outgoing::Close);
            }
        }
    }
}

async fn run_socket(
    id: ConnectionId,
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<DriverEvent>,
) {
    debug!("connecting {id} to {url}");
    let socket = tokio::select! {
        res = tokio_tungstenite::connect_async(url.as_str()) => match res {
            Ok((socket, _)) => socket,
            Err(e) => {
                warn!("connect {id} failed: {e}");
                let _ = events.send(DriverEvent::Error { id });
                let _ = events.send(DriverEvent::Closed {
                    id,
                    close: CloseInfo::abnormal(e.to_string()),
                });
                return;
            }
        },
        _ = outbound.recv() => {
            // Closed (or dropped) before the handshake finished.
            let _ = events.send(DriverEvent::Closed {
                id,
                close: CloseInfo::with_code(NORMAL_CLOSURE),
            });
            return;
        }
    };

    let _ = events.send(DriverEvent::Opened { id });
    let (mut write, mut read) = socket.split();

    let close = loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(Outgoing::Line(line)) => {
                    if let Err(e) = write.send(Message::Text(line.clone().into())).await {
                        warn!("send on {id} failed: {e}");
                        let _ = events.send(DriverEvent::SendFailed { id, line });
                        break CloseInfo::abnormal(e.to_string());
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break CloseInfo::with_code(NORMAL_CLOSURE);
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(DriverEvent::Message {
                        id,
                        text: text.as_str().to_owned(),
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => CloseInfo {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.as_str().to_owned(),
                        },
                        None => CloseInfo::abnormal("close without status"),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("read on {id} failed: {e}");
                    let _ = events.send(DriverEvent::Error { id });
                    break CloseInfo::abnormal(e.to_string());
                }
                None => break CloseInfo::abnormal("stream ended"),
            },
        }
    };

    debug!("connection {id} finished: {close:?}");
    return_unsent(id, &mut outbound, &events);
    let _ = events.send(DriverEvent::Closed { id, close });
}

/// Lines accepted by `send` but never written go back to the engine ahead of the close event,
/// so they are queued before the next connection flushes.
fn return_unsent(
    id: ConnectionId,
    outbound: &mut mpsc::UnboundedReceiver<Outgoing>,
    events: &mpsc::UnboundedSender<DriverEvent>,
) {
    outbound.close();
    while let Ok(out) = outbound.try_recv() {
        if let Outgoing::Line(line) = out {
            let _ = events.send(DriverEvent::SendFailed { id, line });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsent_lines_are_reported_before_close() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new(3);

        assert!(out_tx.send(Outgoing::Line("SET VOL 40".into())).is_ok());
        assert!(out_tx.send(Outgoing::Close).is_ok());
        assert!(out_tx.send(Outgoing::Line("SET INP 2".into())).is_ok());

        return_unsent(id, &mut out_rx, &events_tx);
        assert!(out_tx.send(Outgoing::Line("SET BAL 1".into())).is_err());

        let mut returned = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            match event {
                DriverEvent::SendFailed { id: from, line } => {
                    assert_eq!(from, id);
                    returned.push(line);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(returned, vec!["SET VOL 40", "SET INP 2"]);
    }
}

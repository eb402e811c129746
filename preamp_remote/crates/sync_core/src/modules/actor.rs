use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::modules::client::SyncClient;
use crate::modules::config::{Endpoints, SyncConfig};
use crate::modules::debounce::Control;
use crate::modules::error::{ActorUnavailable, FetchError};
use crate::modules::http::HttpFallback;
use crate::modules::model::SyncUpdate;
use crate::modules::poller::{CommandOutcome, PollOutcome};
use crate::modules::transport::{CloseInfo, ConnectionId};
use crate::modules::ws::WsTransport;

/// Completions reported by the socket and HTTP tasks.
#[derive(Debug)]
pub enum DriverEvent {
    Opened { id: ConnectionId },
    Message { id: ConnectionId, text: String },
    Closed { id: ConnectionId, close: CloseInfo },
    Error { id: ConnectionId },
    SendFailed { id: ConnectionId, line: String },
    Polled(PollOutcome),
    Posted(CommandOutcome),
}

/// What the host (UI, terminal) can ask of the running engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Edit { control: Control, value: i32 },
    SelectInput(u32),
    SetMute(bool),
    ToggleMute,
    SendLine(String),
    Refresh,
    Visible,
    Hidden,
    Discard,
    Shutdown,
}

pub struct SyncHandle {
    commands: mpsc::Sender<HostCommand>,
    updates: mpsc::UnboundedReceiver<SyncUpdate>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub async fn send(&self, cmd: HostCommand) -> Result<(), ActorUnavailable> {
        self.commands.send(cmd).await.map_err(|_| ActorUnavailable)
    }

    pub async fn edit(&self, control: Control, value: i32) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::Edit { control, value }).await
    }

    pub async fn select_input(&self, index: u32) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::SelectInput(index)).await
    }

    pub async fn set_mute(&self, muted: bool) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::SetMute(muted)).await
    }

    pub async fn toggle_mute(&self) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::ToggleMute).await
    }

    pub async fn send_line(&self, line: impl Into<String>) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::SendLine(line.into())).await
    }

    pub async fn refresh(&self) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::Refresh).await
    }

    pub async fn set_visible(&self) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::Visible).await
    }

    pub async fn set_hidden(&self) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::Hidden).await
    }

    pub async fn discard(&self) -> Result<(), ActorUnavailable> {
        self.send(HostCommand::Discard).await
    }

    /// Next model update; `None` once the actor has stopped.
    pub async fn recv(&mut self) -> Option<SyncUpdate> {
        self.updates.recv().await
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send(HostCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Starts the engine on the current tokio runtime.
pub fn spawn(config: SyncConfig, endpoints: Endpoints) -> Result<SyncHandle, FetchError> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    let fallback = HttpFallback::new(endpoints.clone(), config.http_timeout, event_tx.clone())?;
    let live = WsTransport::new(endpoints.live().clone(), event_tx);
    let client = SyncClient::new(config, live, fallback);

    let task = tokio::spawn(run(client, cmd_rx, event_rx, update_tx));
    Ok(SyncHandle {
        commands: cmd_tx,
        updates: update_rx,
        task,
    })
}

type Engine = SyncClient<WsTransport, HttpFallback>;

async fn run(
    mut client: Engine,
    mut commands: mpsc::Receiver<HostCommand>,
    mut events: mpsc::UnboundedReceiver<DriverEvent>,
    updates: mpsc::UnboundedSender<SyncUpdate>,
) {
    client.start(Instant::now());
    publish(&mut client, &updates);

    loop {
        let deadline = client.next_deadline();
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            cmd = commands.recv() => {
                let now = Instant::now();
                match cmd {
                    Some(HostCommand::Shutdown) | None => {
                        info!("sync actor shutting down");
                        client.stop(now);
                        publish(&mut client, &updates);
                        return;
                    }
                    Some(cmd) => apply_command(&mut client, cmd, now),
                }
            }
            Some(event) = events.recv() => dispatch_event(&mut client, event, Instant::now()),
            _ = timer => client.tick(Instant::now()),
        }

        publish(&mut client, &updates);
    }
}

fn apply_command(client: &mut Engine, cmd: HostCommand, now: Instant) {
    debug!("host command: {cmd:?}");
    match cmd {
        HostCommand::Edit { control, value } => client.edit(control, value, now),
        HostCommand::SelectInput(index) => client.select_input(index, now),
        HostCommand::SetMute(muted) => client.set_mute(muted, now),
        HostCommand::ToggleMute => client.toggle_mute(now),
        HostCommand::SendLine(line) => client.send_line(&line, now),
        HostCommand::Refresh => {
            client.refresh(now);
        }
        HostCommand::Visible => client.set_visible(now),
        HostCommand::Hidden => client.set_hidden(now),
        HostCommand::Discard => client.discard(now),
        HostCommand::Shutdown => {}
    }
}

fn dispatch_event(client: &mut Engine, event: DriverEvent, now: Instant) {
    match event {
        DriverEvent::Opened { id } => client.on_open(id, now),
        DriverEvent::Message { id, text } => client.on_message(id, &text, now),
        DriverEvent::Closed { id, close } => client.on_close(id, close, now),
        DriverEvent::Error { id } => client.on_error(id, now),
        DriverEvent::SendFailed { id, line } => client.on_send_failed(id, &line, now),
        DriverEvent::Polled(outcome) => client.on_poll_complete(outcome, now),
        DriverEvent::Posted(outcome) => client.on_command_posted(outcome, now),
    }
}

fn publish(client: &mut Engine, updates: &mpsc::UnboundedSender<SyncUpdate>) {
    for update in client.drain_updates() {
        let _ = updates.send(update);
    }
}

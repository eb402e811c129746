use preamp_protocol::{classify, Attribute, Command, DeviceState, Inbound, SelectorLabels};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::modules::config::SyncConfig;
use crate::modules::debounce::{Control, Debouncer};
use crate::modules::lifecycle::LifecycleCoordinator;
use crate::modules::model::{LinkStatus, SyncModel, SyncUpdate};
use crate::modules::poller::{
    CommandOutcome, FallbackApi, FallbackPoller, PollOutcome, PollRequest, PollSkip,
};
use crate::modules::queue::CommandQueue;
use crate::modules::throttle::{SyncDecision, SyncKind, SyncThrottle};
use crate::modules::timer::earliest;
use crate::modules::transport::{
    CloseInfo, ConnectionId, ConnectionState, HealthVerdict, LiveTransport, TransportManager,
};

/// The synchronization engine.
///
/// Every method runs to completion and takes the current time explicitly; nothing here blocks
/// or spawns. A driver feeds it transport events, fetch completions and `tick` calls at
/// `next_deadline()`, and drains [`SyncUpdate`]s for the presentation layer.
pub struct SyncClient<L, F> {
    config: SyncConfig,
    live: L,
    fallback: F,

    transport: TransportManager,
    queue: CommandQueue,
    debounce: Debouncer<Control>,
    poller: FallbackPoller,
    throttle: SyncThrottle,
    lifecycle: LifecycleCoordinator,
    model: SyncModel,

    running: bool,
    errored: bool,
}

impl<L: LiveTransport, F: FallbackApi> SyncClient<L, F> {
    pub fn new(config: SyncConfig, live: L, fallback: F) -> Self {
        Self {
            transport: TransportManager::default(),
            queue: CommandQueue::with_capacity(config.queue_capacity),
            debounce: Debouncer::new(),
            poller: FallbackPoller::new(config.poll_interval, config.labels_every),
            throttle: SyncThrottle::new(config.full_sync_cooldown, config.state_sync_cooldown),
            lifecycle: LifecycleCoordinator::new(config.resume_min_interval),
            model: SyncModel::default(),
            running: false,
            errored: false,
            config,
            live,
            fallback,
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.lifecycle.mark_visible();
        self.connect_inner(now);
        self.poller.startup_grace.arm_in(now, self.config.startup_grace);
        self.refresh_status();
    }

    /// Closes deliberately and drops every timer, including pending debounced edits.
    pub fn stop(&mut self, now: Instant) {
        self.discard_inner(now);
        self.running = false;
        self.refresh_status();
    }

    pub fn set_visible(&mut self, now: Instant) {
        self.lifecycle.mark_visible();
        if !self.resume_inner(now) && self.running {
            self.restore_timers(now);
        }
        self.refresh_status();
    }

    /// Returns whether the resume was acted upon (false when rate limited or stopped).
    pub fn resume(&mut self, now: Instant) -> bool {
        let acted = self.resume_inner(now);
        self.refresh_status();
        acted
    }

    /// No background network activity while hidden.
    pub fn set_hidden(&mut self, _now: Instant) {
        self.lifecycle.mark_hidden();
        self.poller.cancel_timers();
        self.transport.cancel_timers();
        self.refresh_status();
    }

    /// The page is going away for good: close on purpose so nothing reconnects.
    pub fn discard(&mut self, now: Instant) {
        self.discard_inner(now);
        self.refresh_status();
    }

    /// A continuous edit (slider drag); only the last value per control is sent.
    pub fn edit(&mut self, control: Control, value: impl fmt::Display, now: Instant) {
        let line = Command::set(control.attribute(), value).to_line();
        let delay = self.config.debounce.for_control(control);
        self.debounce.schedule(control, line, delay, now);
    }

    pub fn select_input(&mut self, index: u32, now: Instant) {
        self.send_line(&Command::set(Attribute::Inp, index).to_line(), now);
    }

    pub fn set_mute(&mut self, muted: bool, now: Instant) {
        self.send_line(&Command::set(Attribute::Mute, u8::from(muted)).to_line(), now);
    }

    pub fn toggle_mute(&mut self, now: Instant) {
        let muted = self.model.state().muted().unwrap_or(false);
        self.set_mute(!muted, now);
    }

    /// The send path: live socket when open, otherwise HTTP while visible, otherwise queue.
    pub fn send_line(&mut self, line: &str, now: Instant) {
        self.send_line_inner(line, now);
        self.refresh_status();
    }

    pub fn refresh(&mut self, now: Instant) -> SyncDecision {
        self.request_full_sync(now)
    }

    pub fn request_full_sync(&mut self, now: Instant) -> SyncDecision {
        let decision = self.request_sync(SyncKind::Full, now);
        self.refresh_status();
        decision
    }

    pub fn request_state_only(&mut self, now: Instant) -> SyncDecision {
        let decision = self.request_sync(SyncKind::StateOnly, now);
        self.refresh_status();
        decision
    }

    /// One-shot state fetch over the fallback channel.
    pub fn poll_state(&mut self, _now: Instant) -> Result<PollRequest, PollSkip> {
        let result = self.poll_inner(false);
        self.refresh_status();
        result
    }

    pub fn connect(&mut self, now: Instant) {
        self.connect_inner(now);
        self.refresh_status();
    }

    pub fn force_reconnect(&mut self, now: Instant) {
        self.force_reconnect_inner(now);
        self.refresh_status();
    }

    pub fn on_open(&mut self, id: ConnectionId, now: Instant) {
        if !self.transport.is_current(id) || self.transport.state() != ConnectionState::Connecting
        {
            debug!("ignoring open from stale connection {id}");
            return;
        }
        info!("live connection {id} open");
        self.transport.mark_open(now);
        self.transport
            .health
            .arm_in(now, self.config.health_check_interval);
        self.poller.fallback_grace.cancel();
        self.poller.startup_grace.cancel();
        self.poller.stop_interval();
        self.errored = false;

        let live = &mut self.live;
        let report = self.queue.flush(|line| live.send(id, line));
        if report.sent + report.requeued > 0 {
            debug!(
                "flushed command queue: sent={} requeued={}",
                report.sent, report.requeued
            );
        }

        self.request_sync(SyncKind::Full, now);
        self.refresh_status();
    }

    pub fn on_message(&mut self, id: ConnectionId, text: &str, now: Instant) {
        if !self.transport.is_current(id) || !self.transport.is_open() {
            debug!("ignoring message from stale connection {id}");
            return;
        }
        self.transport.record_inbound(now);
        self.apply_line(text);
    }

    pub fn on_close(&mut self, id: ConnectionId, close: CloseInfo, now: Instant) {
        if !self.transport.is_current(id) {
            debug!("ignoring close from stale connection {id}");
            return;
        }
        self.handle_close(id, close, now);
        self.refresh_status();
    }

    pub fn on_error(&mut self, id: ConnectionId, _now: Instant) {
        if !self.transport.is_current(id) {
            return;
        }
        self.errored = true;
        self.refresh_status();
    }

    /// A line the socket accepted but could not write goes back to the queue. Refresh requests
    /// are not requeued since every open triggers a full sync anyway.
    pub fn on_send_failed(&mut self, id: ConnectionId, line: &str, _now: Instant) {
        if is_sync_request(line) {
            return;
        }
        warn!("send on connection {id} failed, requeueing {line:?}");
        self.queue.enqueue(line);
    }

    pub fn on_poll_complete(&mut self, outcome: PollOutcome, _now: Instant) {
        self.poller.finish(&outcome);
        if self.transport.is_open() {
            debug!("dropping poll result, live connection is authoritative");
            self.refresh_status();
            return;
        }

        match outcome.state {
            Ok(line) => self.apply_line(&line),
            Err(e) => debug!("state poll failed: {e}"),
        }
        match outcome.labels {
            Some(Ok(line)) => self.apply_line(&line),
            Some(Err(e)) => debug!("labels poll failed: {e}"),
            None => {}
        }
        self.refresh_status();
    }

    pub fn on_command_posted(&mut self, outcome: CommandOutcome, now: Instant) {
        let CommandOutcome { line, result } = outcome;
        match result {
            Ok(()) => {
                if !self.transport.is_open() && self.lifecycle.is_visible() {
                    self.poller
                        .post_command_refresh
                        .arm_in(now, self.config.post_command_refresh);
                }
            }
            Err(e) => {
                debug!("command post failed ({e}), queueing {line:?}");
                self.queue.enqueue(&line);
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.debounce.next_deadline(),
            self.throttle.next_deadline(),
            self.transport.next_deadline(),
            self.poller.next_deadline(),
        ])
    }

    pub fn tick(&mut self, now: Instant) {
        for (_, line) in self.debounce.take_due(now) {
            self.send_line_inner(&line, now);
        }

        if self.throttle.fire_deferred(now) {
            self.request_sync(SyncKind::Full, now);
        }

        if self.transport.reconnect.fire(now) {
            self.connect_inner(now);
        }

        if self.poller.fallback_grace.fire(now)
            && !self.transport.is_open()
            && self.lifecycle.is_visible()
        {
            info!("live connection still down, falling back to polling");
            self.poller.start_interval(now);
            let _ = self.poll_inner(false);
        }

        if self.poller.fire_interval(now) {
            let _ = self.poll_inner(false);
        }

        if self.poller.startup_grace.fire(now) && !self.transport.is_open() {
            let _ = self.poll_inner(false);
        }

        if self.poller.post_command_refresh.fire(now) {
            let _ = self.poll_inner(false);
        }

        if self.transport.health.fire(now) && self.transport.is_open() {
            self.check_health(now);
        }

        self.refresh_status();
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.transport.current()
    }

    pub fn status(&self) -> LinkStatus {
        self.model.status()
    }

    pub fn state(&self) -> &DeviceState {
        self.model.state()
    }

    pub fn labels(&self) -> &SelectorLabels {
        self.model.labels()
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn is_visible(&self) -> bool {
        self.lifecycle.is_visible()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    pub fn poll_in_flight(&self) -> bool {
        self.poller.in_flight()
    }

    pub fn reconnect_scheduled(&self) -> bool {
        self.transport.reconnect_scheduled()
    }

    pub fn fallback_scheduled(&self) -> bool {
        self.poller.fallback_scheduled()
    }

    pub fn pending_edits(&self) -> usize {
        self.debounce.len()
    }

    pub fn live(&self) -> &L {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut L {
        &mut self.live
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    pub fn fallback_mut(&mut self) -> &mut F {
        &mut self.fallback
    }

    pub fn drain_updates(&mut self) -> Vec<SyncUpdate> {
        self.model.drain_updates()
    }

    fn connect_inner(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        let Some(id) = self.transport.begin_attempt() else {
            return;
        };
        self.errored = false;
        info!("opening live connection {id}");
        if let Err(e) = self.live.open(id) {
            warn!("live connection {id} failed to start: {e}");
            self.handle_close(id, CloseInfo::abnormal(e.to_string()), now);
        }
    }

    fn force_reconnect_inner(&mut self, now: Instant) {
        self.transport.reconnect.cancel();
        self.poller.fallback_grace.cancel();
        if let Some(old) = self.transport.detach() {
            debug!("force-closing live connection {old}");
            self.live.close(old);
        }
        self.connect_inner(now);
    }

    fn resume_inner(&mut self, now: Instant) -> bool {
        if !self.running || !self.lifecycle.allow_resume(now) {
            return false;
        }
        if self.transport.state().is_active() {
            self.force_reconnect_inner(now);
        } else {
            self.connect_inner(now);
        }
        let _ = self.poll_inner(false);
        true
    }

    /// Hiding cancels the health monitor and any reconnect; a rate-limited resume still has to
    /// bring them back.
    fn restore_timers(&mut self, now: Instant) {
        if self.transport.is_open() {
            self.transport
                .health
                .arm_if_idle(now, self.config.health_check_interval);
        } else if !self.transport.state().is_active() {
            self.transport
                .reconnect
                .arm_if_idle(now, self.config.reconnect_delay);
        }
    }

    fn discard_inner(&mut self, _now: Instant) {
        self.lifecycle.mark_discarded();
        self.cancel_all_timers();
        if let Some(id) = self.transport.begin_close() {
            info!("closing live connection {id} on purpose");
            self.live.close(id);
        }
    }

    fn handle_close(&mut self, id: ConnectionId, close: CloseInfo, now: Instant) {
        self.transport.mark_closed();

        let intentional = !self.running || self.lifecycle.close_is_intentional();
        let go_away = self.config.is_go_away(close.code);
        info!(
            "live connection {id} closed (code={:?} intentional={intentional} go_away={go_away})",
            close.code
        );
        if intentional || go_away {
            return;
        }

        if !self.poller.is_polling() {
            self.poller
                .fallback_grace
                .arm_if_idle(now, self.config.fallback_grace);
        }
        if self
            .transport
            .reconnect
            .arm_if_idle(now, self.config.reconnect_delay)
        {
            debug!("reconnect scheduled in {:?}", self.config.reconnect_delay);
        }
    }

    fn send_line_inner(&mut self, line: &str, _now: Instant) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if let (true, Some(id)) = (self.transport.is_open(), self.transport.current()) {
            if let Err(e) = self.live.send(id, line) {
                warn!("live send failed ({e}), queueing {line:?}");
                self.queue.enqueue(line);
            }
            return;
        }

        if self.running && self.lifecycle.is_visible() {
            self.fallback.post_command(line);
        } else {
            self.queue.enqueue(line);
        }
    }

    fn request_sync(&mut self, kind: SyncKind, now: Instant) -> SyncDecision {
        let decision = self.throttle.request(kind, now);
        if decision != SyncDecision::Send {
            debug!("{kind:?} sync throttled: {decision:?}");
            return decision;
        }

        let with_labels = kind == SyncKind::Full;
        match (self.transport.is_open(), self.transport.current()) {
            (true, Some(id)) => {
                self.send_sync_line(id, Command::GetState);
                if with_labels {
                    self.send_sync_line(id, Command::GetSelectorLabels);
                }
            }
            _ => {
                let _ = self.poll_inner(with_labels);
            }
        }
        decision
    }

    fn send_sync_line(&mut self, id: ConnectionId, cmd: Command) {
        if let Err(e) = self.live.send(id, &cmd.to_line()) {
            debug!("sync request {cmd} not sent: {e}");
        }
    }

    fn poll_inner(&mut self, force_labels: bool) -> Result<PollRequest, PollSkip> {
        let request = self.poller.begin(
            self.transport.is_open(),
            self.lifecycle.is_visible(),
            force_labels,
        )?;
        self.fallback.poll(request);
        Ok(request)
    }

    fn check_health(&mut self, now: Instant) {
        let verdict = self.transport.health_verdict(
            now,
            self.config.health_probe_after,
            self.config.health_dead_after,
        );
        match verdict {
            HealthVerdict::Fresh => {}
            HealthVerdict::Probe => {
                debug!("live connection quiet, probing state");
                self.request_sync(SyncKind::StateOnly, now);
            }
            HealthVerdict::Dead => {
                warn!("live connection silent past threshold, reconnecting");
                self.force_reconnect_inner(now);
            }
        }
        if self.transport.is_open() {
            self.transport
                .health
                .arm_in(now, self.config.health_check_interval);
        }
    }

    fn apply_line(&mut self, text: &str) {
        match classify(text) {
            Inbound::State(state) => self.model.replace_state(state),
            Inbound::Labels(labels) => self.model.replace_labels(labels),
            Inbound::Other => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    debug!("ignoring line {trimmed:?}");
                }
            }
        }
    }

    fn cancel_all_timers(&mut self) {
        self.debounce.cancel_all();
        self.throttle.cancel_deferred();
        self.transport.cancel_timers();
        self.poller.cancel_timers();
    }

    fn refresh_status(&mut self) {
        let status = match self.transport.state() {
            ConnectionState::Open => LinkStatus::Live,
            _ if self.poller.is_polling() => LinkStatus::Polling,
            _ if self.errored => LinkStatus::Error,
            ConnectionState::Connecting => LinkStatus::Connecting,
            ConnectionState::Idle => LinkStatus::Idle,
            ConnectionState::Closing | ConnectionState::Closed => LinkStatus::Offline,
        };
        self.model.set_status(status);
    }
}

fn is_sync_request(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case(&Command::GetState.to_line())
        || line.eq_ignore_ascii_case(&Command::GetSelectorLabels.to_line())
}

use std::time::{Duration, Instant};

use crate::modules::error::FetchError;
use crate::modules::timer::{earliest, Timer};

/// Request/response side channel used while the live connection is down.
///
/// Both calls start the request and return immediately; completions are reported back to the
/// engine as [`PollOutcome`] / [`CommandOutcome`].
pub trait FallbackApi {
    fn poll(&mut self, request: PollRequest);
    fn post_command(&mut self, line: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRequest {
    pub labels: bool,
}

#[derive(Debug)]
pub struct PollOutcome {
    pub state: Result<String, FetchError>,
    pub labels: Option<Result<String, FetchError>>,
}

#[derive(Debug)]
pub struct CommandOutcome {
    pub line: String,
    pub result: Result<(), FetchError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSkip {
    LiveOpen,
    Hidden,
    InFlight,
}

#[derive(Debug, Clone)]
pub struct FallbackPoller {
    interval: Duration,
    labels_every: u32,
    labels_countdown: u32,
    in_flight: bool,

    pub(crate) poll_timer: Timer,
    pub(crate) startup_grace: Timer,
    pub(crate) fallback_grace: Timer,
    pub(crate) post_command_refresh: Timer,
}

impl FallbackPoller {
    pub fn new(interval: Duration, labels_every: u32) -> Self {
        Self {
            interval,
            labels_every: labels_every.max(1),
            // First poll always carries labels.
            labels_countdown: 1,
            in_flight: false,
            poll_timer: Timer::default(),
            startup_grace: Timer::default(),
            fallback_grace: Timer::default(),
            post_command_refresh: Timer::default(),
        }
    }

    /// Claims the in-flight slot and decides whether labels ride along.
    pub fn begin(
        &mut self,
        live_open: bool,
        visible: bool,
        force_labels: bool,
    ) -> Result<PollRequest, PollSkip> {
        if live_open {
            return Err(PollSkip::LiveOpen);
        }
        if !visible {
            return Err(PollSkip::Hidden);
        }
        if self.in_flight {
            return Err(PollSkip::InFlight);
        }
        self.in_flight = true;

        self.labels_countdown = self.labels_countdown.saturating_sub(1);
        let labels = force_labels || self.labels_countdown == 0;
        if labels {
            self.labels_countdown = self.labels_every;
        }
        Ok(PollRequest { labels })
    }

    pub fn finish(&mut self, outcome: &PollOutcome) {
        self.in_flight = false;
        if matches!(outcome.labels, Some(Err(_))) {
            self.labels_countdown = 1;
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_polling(&self) -> bool {
        self.poll_timer.is_armed()
    }

    pub fn start_interval(&mut self, now: Instant) {
        self.poll_timer.arm_in(now, self.interval);
    }

    pub fn stop_interval(&mut self) {
        self.poll_timer.cancel();
    }

    /// Fires the recurring timer and re-arms it for the next interval.
    pub(crate) fn fire_interval(&mut self, now: Instant) -> bool {
        if !self.poll_timer.fire(now) {
            return false;
        }
        self.poll_timer.arm_in(now, self.interval);
        true
    }

    pub fn cancel_timers(&mut self) {
        self.poll_timer.cancel();
        self.startup_grace.cancel();
        self.fallback_grace.cancel();
        self.post_command_refresh.cancel();
    }

    pub fn fallback_scheduled(&self) -> bool {
        self.fallback_grace.is_armed()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.poll_timer.deadline(),
            self.startup_grace.deadline(),
            self.fallback_grace.deadline(),
            self.post_command_refresh.deadline(),
        ])
    }
}

use preamp_protocol::{DeviceState, SelectorLabels};
use serde::Serialize;

/// Coarse connectivity indicator for the presentation layer.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Idle,
    Connecting,
    Live,
    Polling,
    Offline,
    Error,
}

impl LinkStatus {
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Idle => "Idle",
            LinkStatus::Connecting => "Connecting",
            LinkStatus::Live => "Connected",
            LinkStatus::Polling => "Polling",
            LinkStatus::Offline => "Disconnected",
            LinkStatus::Error => "Error",
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, LinkStatus::Live)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SyncUpdate {
    Status { status: LinkStatus },
    State { state: DeviceState },
    Labels { labels: SelectorLabels },
}

/// What the UI shows. State and labels are replaced wholesale on every parsed line.
#[derive(Debug, Clone)]
pub struct SyncModel {
    state: DeviceState,
    labels: SelectorLabels,
    status: LinkStatus,
    updates: Vec<SyncUpdate>,
}

impl Default for SyncModel {
    fn default() -> Self {
        Self {
            state: DeviceState::default(),
            labels: SelectorLabels::default(),
            status: LinkStatus::Idle,
            updates: Vec::new(),
        }
    }
}

impl SyncModel {
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn labels(&self) -> &SelectorLabels {
        &self.labels
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn replace_state(&mut self, state: DeviceState) {
        self.state = state.clone();
        self.updates.push(SyncUpdate::State { state });
    }

    pub fn replace_labels(&mut self, labels: SelectorLabels) {
        self.labels = labels.clone();
        self.updates.push(SyncUpdate::Labels { labels });
    }

    pub fn set_status(&mut self, status: LinkStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.updates.push(SyncUpdate::Status { status });
    }

    pub fn drain_updates(&mut self) -> Vec<SyncUpdate> {
        std::mem::take(&mut self.updates)
    }
}

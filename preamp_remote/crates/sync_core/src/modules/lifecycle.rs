use std::time::{Duration, Instant};

/// Host page lifecycle: visibility, the intentional-close flag and resume rate limiting.
#[derive(Debug, Clone)]
pub struct LifecycleCoordinator {
    visible: bool,
    intentional_close: bool,
    last_resume: Option<Instant>,
    resume_min_interval: Duration,
}

impl LifecycleCoordinator {
    pub fn new(resume_min_interval: Duration) -> Self {
        Self {
            visible: true,
            intentional_close: false,
            last_resume: None,
            resume_min_interval,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn intentional_close(&self) -> bool {
        self.intentional_close
    }

    pub fn mark_visible(&mut self) {
        self.visible = true;
        self.intentional_close = false;
    }

    pub fn mark_hidden(&mut self) {
        self.visible = false;
    }

    pub fn mark_discarded(&mut self) {
        self.visible = false;
        self.intentional_close = true;
    }

    /// Focus, visibility and page-restore signals tend to arrive together; only the first one
    /// inside the minimum interval is honored.
    pub fn allow_resume(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_resume {
            if now.saturating_duration_since(last) < self.resume_min_interval {
                return false;
            }
        }
        self.last_resume = Some(now);
        true
    }

    /// A close counts as intentional while suspended or while nobody is looking.
    pub fn close_is_intentional(&self) -> bool {
        self.intentional_close || !self.visible
    }
}

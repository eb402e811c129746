use std::time::{Duration, Instant};

/// A single-shot deadline. Recurring timers re-arm themselves after firing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn arm(&mut self, at: Instant) {
        self.deadline = Some(at);
    }

    pub fn arm_in(&mut self, now: Instant, after: Duration) {
        self.arm(now + after);
    }

    /// Arms only when nothing is pending. Returns whether it armed.
    pub fn arm_if_idle(&mut self, now: Instant, after: Duration) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.arm_in(now, after);
        true
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms and returns true when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

pub fn earliest<I>(deadlines: I) -> Option<Instant>
where
    I: IntoIterator<Item = Option<Instant>>,
{
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_at_deadline() {
        let t0 = Instant::now();
        let mut timer = Timer::default();
        timer.arm_in(t0, Duration::from_millis(10));

        assert!(!timer.fire(t0 + Duration::from_millis(9)));
        assert!(timer.fire(t0 + Duration::from_millis(10)));
        assert!(!timer.fire(t0 + Duration::from_millis(20)));
        assert!(!timer.is_armed());
    }

    #[test]
    fn arm_if_idle_keeps_first_deadline() {
        let t0 = Instant::now();
        let mut timer = Timer::default();
        assert!(timer.arm_if_idle(t0, Duration::from_millis(5)));
        assert!(!timer.arm_if_idle(t0, Duration::from_millis(50)));
        assert_eq!(timer.deadline(), Some(t0 + Duration::from_millis(5)));
    }

    #[test]
    fn earliest_skips_unarmed() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(1);
        assert_eq!(earliest([None, Some(later), Some(t0), None]), Some(t0));
        assert_eq!(earliest([None, None]), None);
    }
}

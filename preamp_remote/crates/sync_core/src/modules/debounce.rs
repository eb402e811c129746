use preamp_protocol::Attribute;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Continuous controls whose edits are debounced before they reach the send path.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Volume,
    Balance,
    Brightness,
}

impl Control {
    pub fn attribute(self) -> Attribute {
        match self {
            Control::Volume => Attribute::Vol,
            Control::Balance => Attribute::Bal,
            Control::Brightness => Attribute::Bri,
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    deadline: Instant,
    line: String,
}

/// Trailing-edge debouncer: one pending line per key, restarted on every edit.
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    pending: HashMap<K, Pending>,
}

impl<K> Default for Debouncer<K> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy> Debouncer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, key: K, line: impl Into<String>, delay: Duration, now: Instant) {
        self.pending.insert(
            key,
            Pending {
                deadline: now + delay,
                line: line.into(),
            },
        );
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Removes and returns every line whose quiet period has elapsed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, String)> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| *k)
            .collect();

        let mut fired: Vec<(Instant, K, String)> = due
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (p.deadline, k, p.line)))
            .collect();
        fired.sort_by_key(|(deadline, _, _)| *deadline);
        fired.into_iter().map(|(_, k, line)| (k, line)).collect()
    }
}

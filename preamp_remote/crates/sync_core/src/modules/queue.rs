use preamp_protocol::coalescing_key;
use std::collections::VecDeque;

pub const DEFAULT_QUEUE_CAPACITY: usize = 48;

/// A trimmed, non-empty command line plus its coalescing key (the attribute of `SET <ATTR>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    line: String,
    key: Option<String>,
}

impl OutboundCommand {
    pub fn new(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(Self {
            line: line.to_string(),
            key: coalescing_key(line),
        })
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub requeued: usize,
}

/// Commands waiting for the live connection. Holds at most one entry per coalescing key and
/// never more than `capacity` entries; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    entries: VecDeque<OutboundCommand>,
    capacity: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl CommandQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false when the line was empty after trimming.
    pub fn enqueue(&mut self, line: &str) -> bool {
        let Some(cmd) = OutboundCommand::new(line) else {
            return false;
        };

        if let Some(key) = cmd.key() {
            self.entries.retain(|queued| queued.key() != Some(key));
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(cmd);
        true
    }

    /// Sends every queued line in order. Lines whose send fails go back through `enqueue`.
    pub fn flush<E, F>(&mut self, mut send: F) -> FlushReport
    where
        F: FnMut(&str) -> Result<(), E>,
    {
        let mut report = FlushReport::default();
        if self.entries.is_empty() {
            return report;
        }

        let snapshot = std::mem::take(&mut self.entries);
        for cmd in snapshot {
            match send(cmd.line()) {
                Ok(()) => report.sent += 1,
                Err(_) => {
                    self.enqueue(cmd.line());
                    report.requeued += 1;
                }
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutboundCommand> {
        self.entries.iter()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|c| c.line.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

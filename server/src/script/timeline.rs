use super::runner::ScriptRunner;
use super::ScriptResult;

pub(crate) type TimelineAction = Box<dyn FnOnce(&ScriptRunner) -> ScriptResult + Send>;

pub(crate) struct TimelineEntry {
    pub at_ms: u64,
    seq: u64,
    pub action: TimelineAction,
}

/// Pending callbacks of one script, keyed by time then insertion order.
#[derive(Default)]
pub(crate) struct Timeline {
    entries: Vec<TimelineEntry>,
    next_seq: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at_ms: u64, action: TimelineAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(TimelineEntry { at_ms, seq, action });
    }

    /// Removes the earliest entry. Scans every time, since callbacks may add
    /// entries earlier than anything still queued.
    pub fn pop_earliest(&mut self) -> Option<TimelineEntry> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| (e.at_ms, e.seq))
            .map(|(i, _)| i)?;
        Some(self.entries.swap_remove(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

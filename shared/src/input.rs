//! Controller input samples and the per-actor input history ring buffer

use log::debug;
use serde::{Deserialize, Serialize};

/// Number of input samples each controllable actor keeps for replay
pub const HISTORY_SIZE: usize = 64;

/// Button bitmask values carried in [`Input::buttons`]
pub mod button {
    pub const UP: u16 = 0x1;
    pub const DOWN: u16 = 0x2;
    pub const LEFT: u16 = 0x4;
    pub const RIGHT: u16 = 0x8;
    pub const ACTION: u16 = 0x10;
}

/// A single normalized controller sample
///
/// Timestamps are milliseconds on the sampling client's clock and are
/// non-decreasing for a given actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub timestamp: u32,
    pub buttons: u16,
    pub axis_x: i8,
    pub axis_y: i8,
}

impl Input {
    /// A sample with no buttons held and centred axes
    pub fn neutral(timestamp: u32) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.buttons == 0 && self.axis_x == 0 && self.axis_y == 0
    }

    pub fn pressed(&self, flag: u16) -> bool {
        self.buttons & flag != 0
    }
}

/// Fixed-capacity ring of the most recent inputs for one actor
///
/// The buffer never shrinks. Once full, each `record` silently drops the
/// oldest sample. The newest `unconsumed` entries are those not yet applied
/// to the predicted state; the entry just before them is the last consumed one.
#[derive(Debug, Clone)]
pub struct InputHistory {
    slots: [Input; HISTORY_SIZE],
    next_free: usize,
    len: usize,
    unconsumed: usize,
}

impl InputHistory {
    pub fn new() -> Self {
        Self {
            slots: [Input::default(); HISTORY_SIZE],
            next_free: 0,
            len: 0,
            unconsumed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        HISTORY_SIZE
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot index of the `back`-th newest entry (0 = newest)
    fn slot_back(&self, back: usize) -> usize {
        (self.next_free + HISTORY_SIZE - 1 - back) % HISTORY_SIZE
    }

    fn nth_back(&self, back: usize) -> Option<&Input> {
        if back < self.len {
            Some(&self.slots[self.slot_back(back)])
        } else {
            None
        }
    }

    /// Appends a sample, overwriting the oldest slot when full
    ///
    /// A timestamp older than the newest entry is raised to match it so the
    /// live window stays non-decreasing.
    pub fn record(&mut self, mut input: Input) {
        if let Some(newest) = self.newest() {
            if input.timestamp < newest.timestamp {
                debug!(
                    "Input timestamp {} behind newest {}, clamping",
                    input.timestamp, newest.timestamp
                );
                input.timestamp = newest.timestamp;
            }
        }

        self.slots[self.next_free] = input;
        self.next_free = (self.next_free + 1) % HISTORY_SIZE;
        self.len = (self.len + 1).min(HISTORY_SIZE);
        self.unconsumed = (self.unconsumed + 1).min(self.len);
    }

    /// Appends only when strictly newer than the newest entry
    ///
    /// Used on the receiving end of an unreliable input stream where
    /// duplicates and late packets are expected.
    pub fn record_if_newer(&mut self, input: Input) -> bool {
        match self.newest() {
            Some(newest) if input.timestamp <= newest.timestamp => false,
            _ => {
                self.record(input);
                true
            }
        }
    }

    pub fn newest(&self) -> Option<&Input> {
        self.nth_back(0)
    }

    pub fn oldest(&self) -> Option<&Input> {
        self.len.checked_sub(1).and_then(|back| self.nth_back(back))
    }

    /// The most recent entry already applied, if it is still buffered
    pub fn last_consumed(&self) -> Option<&Input> {
        self.nth_back(self.unconsumed)
    }

    pub fn unconsumed_len(&self) -> usize {
        self.unconsumed
    }

    /// Unapplied entries, oldest first
    pub fn unconsumed(&self) -> impl Iterator<Item = &Input> + '_ {
        (0..self.unconsumed)
            .rev()
            .map(move |back| &self.slots[self.slot_back(back)])
    }

    pub fn consume_all(&mut self) {
        self.unconsumed = 0;
    }

    /// Moves the consumed pointer to the newest entry at or before `timestamp`
    ///
    /// Everything strictly newer becomes unconsumed again. Returns false when
    /// every live entry is newer than `timestamp`, leaving the pointer as is.
    pub fn rewind_to(&mut self, timestamp: u32) -> bool {
        for back in 0..self.len {
            if self.slots[self.slot_back(back)].timestamp <= timestamp {
                self.unconsumed = back;
                return true;
            }
        }
        false
    }
}

impl Default for InputHistory {
    fn default() -> Self {
        Self::new()
    }
}

//! Shared progress table for concurrently running agents.
//!
//! Each section owns one slot; agents only ever write their own slot, so
//! concurrent Phase 1 updates never clobber each other. Readers always
//! receive owned copies, never references into the table.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::SectionKey;

/// Thread-safe per-section progress, in the range `0.0..=1.0`.
///
/// Updates are monotonic: a slot never moves backwards, so a late or
/// out-of-order callback cannot undo progress already reported.
#[derive(Debug)]
pub struct ProgressTable {
    slots: Mutex<HashMap<SectionKey, f32>>,
}

impl ProgressTable {
    /// Creates a table with every known section at `0.0`.
    pub fn new() -> Self {
        let mut slots = HashMap::new();
        for key in SectionKey::PHASE1 {
            slots.insert(key, 0.0);
        }
        slots.insert(SectionKey::Integration, 0.0);
        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Raises the slot for `key` to `value` if it is higher than the current
    /// value. Values are clamped to `0.0..=1.0`.
    pub fn update(&self, key: SectionKey, value: f32) {
        let value = value.clamp(0.0, 1.0);
        let mut slots = self.lock();
        let slot = slots.entry(key).or_insert(0.0);
        if value > *slot {
            *slot = value;
        }
    }

    /// Forces the slot for `key` to `1.0`, marking the section finished
    /// regardless of how far its stream got.
    pub fn complete(&self, key: SectionKey) {
        self.lock().insert(key, 1.0);
    }

    /// Returns the current progress for one section.
    pub fn get(&self, key: SectionKey) -> f32 {
        self.lock().get(&key).copied().unwrap_or(0.0)
    }

    /// Returns an owned copy of every slot at a single point in time.
    pub fn snapshot(&self) -> HashMap<SectionKey, f32> {
        self.lock().clone()
    }

    /// Resets every slot to `0.0`. Monotonicity holds within one run, not
    /// across resets.
    pub fn reset(&self) {
        for value in self.lock().values_mut() {
            *value = 0.0;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SectionKey, f32>> {
        // A poisoned table only means a panicking writer; the values are
        // still the monotonic maxima observed so far
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for ProgressTable {
    fn default() -> Self {
        Self::new()
    }
}

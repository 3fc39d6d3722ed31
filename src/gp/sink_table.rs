// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sink table. Bounded by [`DriverConfig::sink_table_capacity`], a small
//! fixed-size array of GPD `source_id`s.

/// Sentinel returned for "not found" or "table full".
pub const INVALID_ENTRY: u8 = 0xFF;

/// Bounded, append-only table of GPD `source_id`s.
pub struct SinkTable {
    capacity: usize,
    entries: Vec<u32>,
}

impl SinkTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Adds `source_id`, returning its index. A duplicate `source_id`
    /// returns its existing index. Returns [`INVALID_ENTRY`] if the table
    /// is full.
    pub fn add_entry(&mut self, source_id: u32) -> u8 {
        let existing = self.index_of(source_id);
        if existing != INVALID_ENTRY {
            return existing;
        }
        if self.entries.len() >= self.capacity {
            return INVALID_ENTRY;
        }
        self.entries.push(source_id);
        (self.entries.len() - 1) as u8
    }

    /// Looks up `source_id`, returning [`INVALID_ENTRY`] if absent.
    #[must_use]
    pub fn index_of(&self, source_id: u32) -> u8 {
        self.entries
            .iter()
            .position(|&id| id == source_id)
            .map_or(INVALID_ENTRY, |i| i as u8)
    }

    #[must_use]
    pub fn contains(&self, source_id: u32) -> bool {
        self.index_of(source_id) != INVALID_ENTRY
    }

    /// Drops every entry. An operator-triggered escape hatch; nothing in
    /// the normal commissioning lifecycle calls this on its own.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

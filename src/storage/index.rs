//! Sparse frame offset index

use super::format::{disk_slot, INDEX_CAPACITY};
use crate::{Result, StreamError};

/// Offsets of every `increment`-th frame of one file, in key order
///
/// The on-disk table is stored back to front; conversion happens only when
/// loading the table and when the writer patches entries into the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetIndex {
    increment: u32,
    offsets: Vec<u32>,
}

impl OffsetIndex {
    /// Empty index
    #[must_use]
    pub fn new(increment: u32) -> Self {
        assert!(increment > 0, "index increment must be > 0");
        Self {
            increment,
            offsets: Vec::with_capacity(INDEX_CAPACITY),
        }
    }

    /// Load the populated part of an on-disk table
    ///
    /// # Errors
    ///
    /// Returns error if the header fields describing the table are invalid
    pub fn from_disk_table(
        table: &[u32; INDEX_CAPACITY],
        count: u32,
        increment: u32,
    ) -> Result<Self> {
        if increment == 0 {
            return Err(StreamError::InvalidFormat(
                "Index increment is zero".to_string(),
            ));
        }

        let count = count as usize;
        if count > INDEX_CAPACITY {
            return Err(StreamError::InvalidFormat(format!(
                "Index holds {count} keys, capacity is {INDEX_CAPACITY}"
            )));
        }

        let offsets = (0..count).map(|key| table[disk_slot(key)]).collect();
        Ok(Self { increment, offsets })
    }

    /// Record the position of `frame` if it starts a new key
    ///
    /// Returns `true` when an entry was stored.
    pub fn record(&mut self, frame: u32, position: u32) -> bool {
        if frame % self.increment != 0 {
            return false;
        }

        let key = (frame / self.increment) as usize;
        if key >= INDEX_CAPACITY {
            return false;
        }

        self.offsets.resize(key, 0);
        self.offsets.push(position);
        true
    }

    /// Nearest indexed position at or before `frame`
    ///
    /// Returns the offset together with the frame it belongs to. Key 0 is
    /// never used since the data start offset is known anyway.
    #[must_use]
    pub fn lookup(&self, frame: u64) -> Option<(u32, u64)> {
        let increment = u64::from(self.increment);
        let key = usize::try_from(frame / increment)
            .unwrap_or(usize::MAX)
            .min(self.offsets.len().checked_sub(1)?);

        if key == 0 {
            return None;
        }

        Some((self.offsets[key], key as u64 * increment))
    }

    /// Populated entries as `(key, offset)`
    pub fn entries(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.offsets.iter().copied().enumerate()
    }

    /// Frames between two entries
    #[must_use]
    pub fn increment(&self) -> u32 {
        self.increment
    }

    /// Number of populated keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True when no key is populated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_every_increment() {
        let mut index = OffsetIndex::new(50);
        for frame in 0..150u32 {
            index.record(frame, 1000 + frame * 10);
        }

        assert_eq!(index.len(), 3);
        let entries: Vec<_> = index.entries().collect();
        assert_eq!(entries, vec![(0, 1000), (1, 1500), (2, 2000)]);
    }

    #[test]
    fn test_record_stops_at_capacity() {
        let mut index = OffsetIndex::new(1);
        for frame in 0..600u32 {
            index.record(frame, frame);
        }
        assert_eq!(index.len(), INDEX_CAPACITY);
        assert!(!index.record(700, 700));
    }

    #[test]
    fn test_lookup() {
        let mut index = OffsetIndex::new(50);
        for frame in 0..150u32 {
            index.record(frame, frame * 100);
        }

        assert_eq!(index.lookup(0), None);
        assert_eq!(index.lookup(49), None);
        assert_eq!(index.lookup(50), Some((5000, 50)));
        assert_eq!(index.lookup(149), Some((10000, 100)));
        // past the indexed range the last key is used
        assert_eq!(index.lookup(10_000), Some((10000, 100)));

        assert_eq!(OffsetIndex::new(50).lookup(10), None);
    }

    #[test]
    fn test_from_disk_table_reverses() {
        let mut table = [0u32; INDEX_CAPACITY];
        table[511] = 3584;
        table[510] = 9000;
        table[509] = 15000;
        table[0] = 0xdead;

        let index = OffsetIndex::from_disk_table(&table, 3, 50).unwrap();
        let entries: Vec<_> = index.entries().collect();
        assert_eq!(entries, vec![(0, 3584), (1, 9000), (2, 15000)]);
    }

    #[test]
    fn test_from_disk_table_full() {
        let mut table = [0u32; INDEX_CAPACITY];
        for (slot, value) in table.iter_mut().enumerate() {
            *value = slot as u32;
        }

        let index = OffsetIndex::from_disk_table(&table, 512, 50).unwrap();
        assert_eq!(index.entries().nth(200), Some((200, 311)));
        assert_eq!(index.entries().last(), Some((511, 0)));
    }

    #[test]
    fn test_from_disk_table_rejects_invalid() {
        let table = [0u32; INDEX_CAPACITY];
        assert!(OffsetIndex::from_disk_table(&table, 513, 50).is_err());
        assert!(OffsetIndex::from_disk_table(&table, 1, 0).is_err());
    }
}

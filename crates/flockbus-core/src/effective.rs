//! Published effective values.
//!
//! [`EffectiveTable`] is the read-only surface the synthesis engine polls.
//! Values are stored as `f32` bits in atomics so readers on any thread see a
//! whole value without locking. The bus is the only writer.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::registry::{Registry, TARGET_COUNT};

/// Lock-free table of effective values, one per target.
pub struct EffectiveTable {
    values: [AtomicU32; TARGET_COUNT],
    /// Incremented once per publish.
    generation: AtomicU64,
}

impl EffectiveTable {
    /// Create a table seeded with each target's default.
    pub fn new(registry: &Registry) -> Self {
        let table = Self {
            values: std::array::from_fn(|_| AtomicU32::new(0.0f32.to_bits())),
            generation: AtomicU64::new(0),
        };
        for target in registry.iter() {
            table.values[target.index].store(target.safe_default().to_bits(), Ordering::Relaxed);
        }
        table
    }

    /// Read the effective value of one target.
    ///
    /// Returns `None` for an index outside the table.
    #[inline]
    pub fn get(&self, index: usize) -> Option<f32> {
        self.values
            .get(index)
            .map(|value| f32::from_bits(value.load(Ordering::Relaxed)))
    }

    /// Copy all effective values.
    pub fn snapshot(&self) -> [f32; TARGET_COUNT] {
        std::array::from_fn(|index| f32::from_bits(self.values[index].load(Ordering::Relaxed)))
    }

    /// Number of publishes so far.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace every value and bump the generation.
    pub(crate) fn publish(&self, values: &[f32; TARGET_COUNT]) {
        for (slot, value) in self.values.iter().zip(values) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
        self.generation.fetch_add(1, Ordering::Release);
    }
}

impl std::fmt::Debug for EffectiveTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveTable")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_holds_defaults() {
        let registry = Registry::build();
        let table = EffectiveTable::new(&registry);
        assert_eq!(table.get(0), Some(440.0));
        assert_eq!(table.generation(), 0);
        assert_eq!(table.get(TARGET_COUNT), None);
    }

    #[test]
    fn test_publish_replaces_values() {
        let registry = Registry::build();
        let table = EffectiveTable::new(&registry);
        let mut values = [0.25f32; TARGET_COUNT];
        values[3] = -1.0;

        table.publish(&values);

        assert_eq!(table.get(0), Some(0.25));
        assert_eq!(table.get(3), Some(-1.0));
        assert_eq!(table.generation(), 1);
        assert_eq!(table.snapshot(), values);
    }
}

//! Sizing knobs for slot tables.

/// Smallest capacity a table is ever created with.
pub const MIN_CAPACITY: usize = 16;

/// Default growth ceiling.
pub const DEFAULT_MAX_CAPACITY: usize = 1 << 30;

/// Capacity bounds for a [`SlotTable`](crate::SlotTable).
///
/// Both fields are normalized by [`TableConfig::new`]: rounded up to a power
/// of two, `initial_capacity >= MIN_CAPACITY`, and
/// `max_capacity >= initial_capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    initial_capacity: usize,
    max_capacity: usize,
}

impl TableConfig {
    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        let initial = normalize(initial_capacity).max(MIN_CAPACITY);
        let max = normalize(max_capacity).max(initial);
        Self {
            initial_capacity: initial,
            max_capacity: max,
        }
    }

    pub fn with_initial_capacity(self, initial_capacity: usize) -> Self {
        Self::new(initial_capacity, self.max_capacity)
    }

    pub fn with_max_capacity(self, max_capacity: usize) -> Self {
        Self::new(self.initial_capacity, max_capacity)
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new(MIN_CAPACITY, DEFAULT_MAX_CAPACITY)
    }
}

fn normalize(n: usize) -> usize {
    n.checked_next_power_of_two()
        .unwrap_or(DEFAULT_MAX_CAPACITY)
        .min(DEFAULT_MAX_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = TableConfig::default();
        assert_eq!(c.initial_capacity(), 16);
        assert_eq!(c.max_capacity(), 1 << 30);
    }

    #[test]
    fn rounds_and_clamps() {
        let c = TableConfig::new(3, 40);
        assert_eq!(c.initial_capacity(), 16);
        assert_eq!(c.max_capacity(), 64);

        let c = TableConfig::new(100, 8);
        assert_eq!(c.initial_capacity(), 128);
        assert_eq!(c.max_capacity(), 128);

        let c = TableConfig::new(usize::MAX, usize::MAX);
        assert_eq!(c.initial_capacity(), DEFAULT_MAX_CAPACITY);
        assert_eq!(c.max_capacity(), DEFAULT_MAX_CAPACITY);
    }
}

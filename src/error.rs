use thiserror::Error;

/// Failures a slot table can report. Absent keys are not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Inserting a new key would fill the last free slot of a table that is
    /// already at its configured maximum capacity.
    #[error("slot table exhausted: {len} entries at maximum capacity {max}")]
    CapacityExhausted { len: usize, max: usize },

    /// An internal invariant does not hold. Not recoverable.
    #[error("slot table corrupted at slot {index}: {reason}")]
    Corrupted { index: usize, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, TableError>;

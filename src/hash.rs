//! Spreading-hash assignment for slot keys.
//!
//! Hashes are drawn from a counter advanced by a fixed odd increment close to
//! `2^32 / φ`. Masking consecutive values to any power-of-two table size
//! scatters them with almost no clustering (Fibonacci hashing), so a slot
//! table never needs to hash key contents.

use core::sync::atomic::{AtomicU32, Ordering};

/// Difference between consecutively assigned hashes.
pub const HASH_INCREMENT: u32 = 0x61c8_8647;

/// Lock-free source of key hashes.
///
/// Any number of threads may draw from the same counter. Values are unique
/// until the counter wraps after `2^32` draws; uniqueness is not required for
/// correctness since tables resolve collisions by identity.
#[derive(Debug, Default)]
pub struct HashCounter {
    next: AtomicU32,
}

static GLOBAL: HashCounter = HashCounter::new();

impl HashCounter {
    /// A counter starting at zero.
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// A counter whose first returned hash is `start`.
    pub const fn starting_at(start: u32) -> Self {
        Self {
            next: AtomicU32::new(start),
        }
    }

    /// Process-wide default counter used by the convenience constructors.
    pub fn global() -> &'static HashCounter {
        &GLOBAL
    }

    /// Return the current value and advance by [`HASH_INCREMENT`].
    #[inline]
    pub fn next_hash(&self) -> u32 {
        // Only atomicity of the add matters; no other memory is published.
        self.next.fetch_add(HASH_INCREMENT, Ordering::Relaxed)
    }
}

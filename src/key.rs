//! Slot keys and the weak handles tables hold to them.
//!
//! A [`SlotKey`] is the identity of one context-local variable. Clones share
//! the same identity. Tables never own a key: each entry stores a
//! [`WeakKey`], and once every `SlotKey` clone has been dropped the entry is
//! stale and will be purged the next time a probe walks over it.

use crate::hash::HashCounter;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

#[derive(Debug)]
struct KeyCell {
    hash: u32,
}

/// Identity handle of a context-local variable.
#[derive(Clone)]
pub struct SlotKey {
    cell: Arc<KeyCell>,
}

impl SlotKey {
    /// New key drawing its hash from `counter`.
    pub fn new(counter: &HashCounter) -> Self {
        Self::with_hash(counter.next_hash())
    }

    /// New key with a caller-chosen hash. Distinct keys may share a hash;
    /// tables tell them apart by identity.
    pub fn with_hash(hash: u32) -> Self {
        Self {
            cell: Arc::new(KeyCell { hash }),
        }
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.cell.hash
    }

    /// Weak handle that stops resolving once every clone of this key is gone.
    pub fn downgrade(&self) -> WeakKey {
        WeakKey {
            cell: Arc::downgrade(&self.cell),
        }
    }
}

impl PartialEq for SlotKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for SlotKey {}

impl Hash for SlotKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.cell) as usize).hash(state);
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotKey({:#010x})", self.cell.hash)
    }
}

/// Non-owning reference to a [`SlotKey`].
///
/// Reclamation is observed, never driven: `is_live` turns false when the
/// last strong handle drops (possibly on another thread) and never turns
/// true again. The allocation stays reserved while any `WeakKey` exists, so
/// an address comparison cannot confuse a reclaimed key with a new one.
pub struct WeakKey {
    cell: Weak<KeyCell>,
}

impl WeakKey {
    /// Whether the referent is still reachable.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.cell.strong_count() > 0
    }

    /// Identity test against a strong key.
    #[inline]
    pub fn is(&self, key: &SlotKey) -> bool {
        core::ptr::eq(self.cell.as_ptr(), Arc::as_ptr(&key.cell))
    }

    /// Current referent, if still reachable.
    pub fn upgrade(&self) -> Option<SlotKey> {
        self.cell.upgrade().map(|cell| SlotKey { cell })
    }

    /// Drop the reference; the handle reads as stale from now on.
    pub fn clear(&mut self) {
        self.cell = Weak::new();
    }
}

impl fmt::Debug for WeakKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_live() {
            f.write_str("WeakKey(live)")
        } else {
            f.write_str("WeakKey(stale)")
        }
    }
}

//! SlotTable: weak-keyed open-addressing map owned by one execution context.
//!
//! Entries live in a power-of-two array and are found by linear probing from
//! `hash & (capacity - 1)`. Keys are held weakly; an entry whose key has been
//! reclaimed is *stale* and still occupies its slot until a probe walks over
//! it. Stale entries are purged a whole run at a time (a run is a maximal
//! stretch of occupied slots), and every purge re-seats the live entries that
//! follow it so that no probe sequence ever crosses a free slot.
//!
//! `len` counts occupied slots, stale or not. It only drops when staleness is
//! discovered, which is why lookups take `&mut self`.

use crate::config::{TableConfig, MIN_CAPACITY};
use crate::error::{Result, TableError};
use crate::key::{SlotKey, WeakKey};
use core::fmt;
use core::mem;
use tracing::{debug, trace, warn};

struct Entry<V> {
    key: WeakKey,
    // Cached so live entries can be re-seated without touching the key.
    hash: u32,
    value: V,
}

impl<V> Entry<V> {
    fn new(key: &SlotKey, value: V) -> Self {
        Self {
            key: key.downgrade(),
            hash: key.hash(),
            value,
        }
    }

    #[inline]
    fn is_stale(&self) -> bool {
        !self.key.is_live()
    }
}

pub struct SlotTable<V> {
    slots: Box<[Option<Entry<V>>]>,
    len: usize,
    threshold: usize,
    max_capacity: usize,
    // Set once a rehash wanted to grow past `max_capacity`.
    capped: bool,
}

#[inline]
fn ideal_index(hash: u32, capacity: usize) -> usize {
    hash as usize & (capacity - 1)
}

#[inline]
fn next_index(i: usize, capacity: usize) -> usize {
    (i + 1) & (capacity - 1)
}

#[inline]
fn prev_index(i: usize, capacity: usize) -> usize {
    i.wrapping_sub(1) & (capacity - 1)
}

#[inline]
fn threshold_for(capacity: usize) -> usize {
    capacity * 2 / 3
}

fn alloc_slots<V>(capacity: usize) -> Box<[Option<Entry<V>>]> {
    (0..capacity).map(|_| None).collect()
}

impl<V> SlotTable<V> {
    /// Table with default sizing holding one entry.
    pub fn new(first_key: &SlotKey, first_value: V) -> Self {
        Self::with_config(TableConfig::default(), first_key, first_value)
    }

    pub fn with_config(config: TableConfig, first_key: &SlotKey, first_value: V) -> Self {
        let capacity = config.initial_capacity();
        let mut slots = alloc_slots(capacity);
        slots[ideal_index(first_key.hash(), capacity)] = Some(Entry::new(first_key, first_value));
        Self {
            slots,
            len: 1,
            threshold: threshold_for(capacity),
            max_capacity: config.max_capacity(),
            capped: false,
        }
    }

    /// Occupied slots, including stale entries not yet discovered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupancy at which an insert triggers a rehash.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn get(&mut self, key: &SlotKey) -> Option<&V> {
        let i = self.find_index(key)?;
        self.slots[i].as_ref().map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &SlotKey) -> Option<&mut V> {
        let i = self.find_index(key)?;
        self.slots[i].as_mut().map(|e| &mut e.value)
    }

    pub fn contains_key(&mut self, key: &SlotKey) -> bool {
        self.find_index(key).is_some()
    }

    fn find_index(&mut self, key: &SlotKey) -> Option<usize> {
        let capacity = self.slots.len();
        let mut i = ideal_index(key.hash(), capacity);
        match &self.slots[i] {
            Some(e) if e.key.is(key) => return Some(i),
            None => return None,
            Some(_) => {}
        }
        loop {
            let e = self.slots[i].as_ref()?;
            if e.key.is(key) {
                return Some(i);
            }
            if e.is_stale() {
                // Something else moves into slot `i`; look at it again.
                self.expunge_stale_entry(i);
            } else {
                i = next_index(i, capacity);
            }
        }
    }

    /// Bind `value` to `key`, returning the value it replaces.
    ///
    /// Fails only when a new key would take the last free slot of a table
    /// that cannot grow; the table is left unchanged in that case.
    pub fn set(&mut self, key: &SlotKey, value: V) -> Result<Option<V>> {
        let capacity = self.slots.len();
        let mut i = ideal_index(key.hash(), capacity);
        while let Some(e) = self.slots[i].as_mut() {
            if e.key.is(key) {
                return Ok(Some(mem::replace(&mut e.value, value)));
            }
            if e.is_stale() {
                return Ok(self.replace_stale_entry(key, value, i));
            }
            i = next_index(i, capacity);
        }

        if self.len + 1 >= capacity {
            // Probing relies on at least one free slot.
            self.make_room()?;
            return self.set(key, value);
        }

        self.slots[i] = Some(Entry::new(key, value));
        self.len += 1;
        if !self.clean_some_slots(i, self.len) && self.len >= self.threshold {
            self.rehash();
        }
        Ok(None)
    }

    /// Unbind `key`, returning its value. Absent keys are a no-op.
    pub fn remove(&mut self, key: &SlotKey) -> Option<V> {
        let capacity = self.slots.len();
        let mut i = ideal_index(key.hash(), capacity);
        while let Some(e) = self.slots[i].as_mut() {
            if e.key.is(key) {
                e.key.clear();
                let removed = self.slots[i].take();
                // Repairs the run behind the hole; the slot itself is already empty.
                self.expunge_stale_entry(i);
                return removed.map(|e| e.value);
            }
            i = next_index(i, capacity);
        }
        None
    }

    /// Snapshot copy for a child context.
    ///
    /// Every live entry is offered to `transform`; `Some` becomes the child's
    /// value for that key, `None` leaves the key unbound in the child. Stale
    /// entries are never copied. The child has the parent's capacity and is
    /// laid out by fresh probing.
    pub fn inherit<F>(&self, mut transform: F) -> SlotTable<V>
    where
        F: FnMut(&SlotKey, &V) -> Option<V>,
    {
        let capacity = self.slots.len();
        let mut slots = alloc_slots(capacity);
        let mut len = 0;
        for entry in self.slots.iter().flatten() {
            let Some(key) = entry.key.upgrade() else {
                continue;
            };
            let Some(value) = transform(&key, &entry.value) else {
                continue;
            };
            let mut h = ideal_index(entry.hash, capacity);
            while slots[h].is_some() {
                h = next_index(h, capacity);
            }
            slots[h] = Some(Entry::new(&key, value));
            len += 1;
        }
        debug!(capacity, parent_len = self.len, child_len = len, "inherited slot table");
        SlotTable {
            slots,
            len,
            threshold: self.threshold,
            max_capacity: self.max_capacity,
            capped: self.capped,
        }
    }

    /// Check structural invariants and report the first violation.
    pub fn validate(&self) -> Result<()> {
        let capacity = self.slots.len();
        if !capacity.is_power_of_two() || capacity < MIN_CAPACITY {
            return Err(TableError::Corrupted {
                index: capacity,
                reason: "capacity is not a power of two of at least 16",
            });
        }
        let occupied = self.slots.iter().filter(|s| s.is_some()).count();
        if occupied != self.len {
            return Err(TableError::Corrupted {
                index: 0,
                reason: "entry count disagrees with occupied slots",
            });
        }
        if occupied >= capacity {
            return Err(TableError::Corrupted {
                index: 0,
                reason: "no free slot left",
            });
        }
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(e) = slot else { continue };
            let mut h = ideal_index(e.hash, capacity);
            while h != i {
                if self.slots[h].is_none() {
                    return Err(TableError::Corrupted {
                        index: i,
                        reason: "free slot inside probe sequence",
                    });
                }
                h = next_index(h, capacity);
            }
        }
        Ok(())
    }

    /// Called by `set` on a stale slot met before `key`. Reuses that slot for
    /// `key` and purges the stale entries of the surrounding run.
    fn replace_stale_entry(&mut self, key: &SlotKey, value: V, stale_slot: usize) -> Option<V> {
        let capacity = self.slots.len();

        // Earliest stale slot in the run, so the whole run is purged at once.
        let mut slot_to_expunge = stale_slot;
        let mut i = prev_index(stale_slot, capacity);
        while let Some(e) = &self.slots[i] {
            if e.is_stale() {
                slot_to_expunge = i;
            }
            i = prev_index(i, capacity);
        }

        let mut i = next_index(stale_slot, capacity);
        while let Some(e) = self.slots[i].as_mut() {
            if e.key.is(key) {
                let previous = mem::replace(&mut e.value, value);
                // Move the key up to the stale slot so its probe stays short.
                self.slots.swap(i, stale_slot);
                if slot_to_expunge == stale_slot {
                    slot_to_expunge = i;
                }
                trace!(stale_slot, found = i, slot_to_expunge, "stale slot swapped");
                let free = self.expunge_stale_entry(slot_to_expunge);
                self.clean_some_slots(free, capacity);
                return Some(previous);
            }
            if e.is_stale() && slot_to_expunge == stale_slot {
                slot_to_expunge = i;
            }
            i = next_index(i, capacity);
        }

        self.slots[stale_slot] = Some(Entry::new(key, value));
        if slot_to_expunge != stale_slot {
            trace!(stale_slot, slot_to_expunge, "stale slot reused");
            let free = self.expunge_stale_entry(slot_to_expunge);
            self.clean_some_slots(free, capacity);
        }
        None
    }

    /// Empty `stale_slot`, then walk its run purging stale entries and
    /// re-seating live ones. Returns the index of the free slot ending the run.
    fn expunge_stale_entry(&mut self, stale_slot: usize) -> usize {
        let capacity = self.slots.len();
        self.slots[stale_slot] = None;
        self.len -= 1;

        let mut i = next_index(stale_slot, capacity);
        while let Some(e) = &self.slots[i] {
            let stale = e.is_stale();
            let hash = e.hash;
            if stale {
                self.slots[i] = None;
                self.len -= 1;
            } else {
                let mut h = ideal_index(hash, capacity);
                if h != i {
                    let moved = self.slots[i].take();
                    // Several holes may precede `i`, so scan to the first one.
                    while self.slots[h].is_some() {
                        h = next_index(h, capacity);
                    }
                    self.slots[h] = moved;
                }
            }
            i = next_index(i, capacity);
        }
        i
    }

    /// Probe about `log2(n)` slots after `start` for stale entries. Each hit
    /// is expunged and stretches the scan to the whole table.
    fn clean_some_slots(&mut self, start: usize, mut n: usize) -> bool {
        let capacity = self.slots.len();
        let mut removed = false;
        let mut i = start;
        loop {
            i = next_index(i, capacity);
            if matches!(&self.slots[i], Some(e) if e.is_stale()) {
                n = capacity;
                removed = true;
                i = self.expunge_stale_entry(i);
            }
            n >>= 1;
            if n == 0 {
                return removed;
            }
        }
    }

    pub(crate) fn expunge_stale_entries(&mut self) {
        for j in 0..self.slots.len() {
            if matches!(&self.slots[j], Some(e) if e.is_stale()) {
                self.expunge_stale_entry(j);
            }
        }
    }

    fn rehash(&mut self) {
        let before = self.len;
        self.expunge_stale_entries();
        trace!(before, after = self.len, "full expunge pass");

        // Grow once live entries reach 3/4 of the threshold.
        if self.capped || self.len < self.threshold - self.threshold / 4 {
            return;
        }
        if let Err(err) = self.resize() {
            warn!(%err, "slot table growth capped");
            self.capped = true;
        }
    }

    fn make_room(&mut self) -> Result<()> {
        self.expunge_stale_entries();
        if self.len + 1 < self.slots.len() {
            return Ok(());
        }
        self.resize()
    }

    fn resize(&mut self) -> Result<()> {
        let old_capacity = self.slots.len();
        if old_capacity >= self.max_capacity {
            return Err(TableError::CapacityExhausted {
                len: self.len,
                max: self.max_capacity,
            });
        }
        let capacity = old_capacity * 2;
        let mut slots = alloc_slots(capacity);
        let mut len = 0;
        for entry in mem::take(&mut self.slots).into_vec().into_iter().flatten() {
            if entry.is_stale() {
                continue;
            }
            let mut h = ideal_index(entry.hash, capacity);
            while slots[h].is_some() {
                h = next_index(h, capacity);
            }
            slots[h] = Some(entry);
            len += 1;
        }
        debug!(old_capacity, capacity, dropped = self.len - len, len, "slot table grew");
        self.slots = slots;
        self.len = len;
        self.threshold = threshold_for(capacity);
        Ok(())
    }
}

impl<V> fmt::Debug for SlotTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotTable")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .field("threshold", &self.threshold)
            .field("capped", &self.capped)
            .finish()
    }
}

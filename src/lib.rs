//! context-slots: per-context slot tables backing context-local variables.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: every logical thread of control owns an independent map from
//!   variables to values, and a variable that is dropped everywhere must not
//!   be kept alive by the maps that still mention it.
//! - Layers:
//!   - HashCounter: lock-free Fibonacci hash assignment for keys.
//!   - SlotKey / WeakKey: identity of a variable, and the non-owning handle a
//!     table stores for it.
//!   - SlotTable<V>: open-addressing, linear-probing map from weak keys to
//!     values, with lazy stale purging and capacity doubling.
//!   - Context / ContextLocal<T>: typed variables bound per context, with
//!     suppliers and inheritance policies.
//!   - Contexts and the thread-bound current context: two ways of owning
//!     contexts (a generational arena for tasks, a thread-local for threads).
//!
//! Constraints
//! - Single owner per table: no locking, no atomics inside a table. The hash
//!   counter is the only state shared between threads.
//! - Keys are never hashed by content; each key carries a precomputed `u32`
//!   and tables compare by identity.
//! - No iteration API and no ordering guarantees.
//!
//! Staleness
//! - A binding goes stale when the last `SlotKey` clone drops, possibly on
//!   another thread. Tables observe this through `WeakKey::is_live`, which is
//!   monotonic; stale entries still occupy slots until a probe walks over
//!   them, so `SlotTable::len` is an upper bound on live bindings.
//! - Purging happens a run at a time: a lookup or insert meeting a stale slot
//!   clears the whole run and re-seats live entries behind it, and inserts
//!   scan `log2(len)` extra slots, widening to the full table once garbage is
//!   found.
//!
//! Growth
//! - Capacity starts at 16 (configurable via `TableConfig`) and only doubles.
//!   Crossing `2/3` occupancy triggers a full purge; the table doubles if it
//!   is still at least half full afterwards.
//! - At `max_capacity` the table keeps accepting keys past its threshold and
//!   only refuses (`TableError::CapacityExhausted`) the insert that would
//!   take its last free slot.
//!
//! Inheritance
//! - `SlotTable::inherit` builds a snapshot copy at the parent's capacity,
//!   offering every live entry to a transform that may decline it. Contexts
//!   use it with each variable's `InheritPolicy`; the default is to skip.
//!
//! Logging
//! - `tracing` events only: `debug` on growth and inheritance, `trace` on
//!   stale-run handling, `warn` once per table when growth is capped. No
//!   subscriber is installed by this crate.

mod config;
mod context;
mod contexts;
mod current;
mod error;
mod hash;
mod key;
mod slot_table;
mod slot_table_proptest;

// Public surface
pub use config::{TableConfig, DEFAULT_MAX_CAPACITY, MIN_CAPACITY};
pub use context::{Context, ContextLocal, InheritPolicy};
pub use contexts::{ContextId, Contexts};
pub use current::{replace_current, spawn_inheriting, with_current};
pub use error::{Result, TableError};
pub use hash::{HashCounter, HASH_INCREMENT};
pub use key::{SlotKey, WeakKey};
pub use slot_table::SlotTable;

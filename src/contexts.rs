//! Contexts: arena of logical threads of control for task-style runtimes.
//!
//! Ids are generational, so an id kept after its context was removed never
//! resolves to a context created later in the same slot.

use crate::config::TableConfig;
use crate::context::Context;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle to a [`Context`] inside [`Contexts`].
    pub struct ContextId;
}

#[derive(Default)]
pub struct Contexts {
    slots: SlotMap<ContextId, Context>,
    config: TableConfig,
}

impl Contexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena whose root contexts size their tables with `config`. Children
    /// inherit the parent's configuration.
    pub fn with_config(config: TableConfig) -> Self {
        Self {
            slots: SlotMap::with_key(),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.slots.contains_key(id)
    }

    /// New root context with no bindings.
    pub fn create(&mut self) -> ContextId {
        self.slots.insert(Context::with_config(self.config))
    }

    /// New context seeded from a snapshot of `parent`. `None` if `parent`
    /// is gone.
    pub fn spawn_child(&mut self, parent: ContextId) -> Option<ContextId> {
        let child = Context::inherit_from(self.slots.get(parent)?);
        Some(self.slots.insert(child))
    }

    pub fn get(&self, id: ContextId) -> Option<&Context> {
        self.slots.get(id)
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        self.slots.get_mut(id)
    }

    /// Destroy a context together with its table.
    pub fn remove(&mut self, id: ContextId) -> Option<Context> {
        self.slots.remove(id)
    }
}

//! Typed context-local variables on top of [`SlotTable`].
//!
//! A [`Context`] is the one table-reference field a thread of control owns.
//! A [`ContextLocal<T>`] is a variable: a [`SlotKey`] plus an optional value
//! supplier and an [`InheritPolicy`]. Values are stored type-erased; only the
//! `ContextLocal<T>` that wrote a binding can read it back, so downcasts always
//! succeed.

use crate::config::TableConfig;
use crate::error::Result;
use crate::hash::HashCounter;
use crate::key::SlotKey;
use crate::slot_table::SlotTable;
use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

type AnyValue = Box<dyn Any + Send>;
type ChildValueFn = Arc<dyn Fn(&(dyn Any + Send)) -> Option<AnyValue> + Send + Sync>;
type Supplier<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// What a child context receives for a variable bound in its parent.
pub struct InheritPolicy<T> {
    transform: Option<Arc<dyn Fn(&T) -> T + Send + Sync>>,
}

impl<T> InheritPolicy<T> {
    /// Child starts unbound.
    pub fn skip() -> Self {
        Self { transform: None }
    }

    /// Child starts with `f(parent_value)`.
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        Self {
            transform: Some(Arc::new(f)),
        }
    }
}

impl<T: Clone + 'static> InheritPolicy<T> {
    /// Child starts with a clone of the parent's value.
    pub fn clone_value() -> Self {
        Self::map(T::clone)
    }
}

impl<T> Default for InheritPolicy<T> {
    fn default() -> Self {
        Self::skip()
    }
}

impl<T> fmt::Debug for InheritPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transform {
            Some(_) => f.write_str("InheritPolicy::Map"),
            None => f.write_str("InheritPolicy::Skip"),
        }
    }
}

/// Erased value plus the transform a child context applies to it.
pub(crate) struct LocalValue {
    value: AnyValue,
    child: Option<ChildValueFn>,
}

impl LocalValue {
    fn inherit(&self) -> Option<LocalValue> {
        let child = self.child.as_ref()?;
        let value = child(&*self.value)?;
        Some(LocalValue {
            value,
            child: Some(Arc::clone(child)),
        })
    }
}

/// Per-context bindings. The table is allocated on the first write.
#[derive(Default)]
pub struct Context {
    table: Option<SlotTable<LocalValue>>,
    config: TableConfig,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TableConfig) -> Self {
        Self {
            table: None,
            config,
        }
    }

    /// Snapshot of `parent` filtered through each variable's inherit policy.
    pub fn inherit_from(parent: &Context) -> Self {
        Self {
            table: parent
                .table
                .as_ref()
                .map(|t| t.inherit(|_, v| v.inherit())),
            config: parent.config,
        }
    }

    /// Bindings held, counting ones whose variable was dropped but not yet
    /// purged.
    pub fn bindings(&self) -> usize {
        self.table.as_ref().map_or(0, SlotTable::len)
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> Option<&SlotTable<LocalValue>> {
        self.table.as_ref()
    }

    fn lookup(&mut self, key: &SlotKey) -> Option<&mut LocalValue> {
        self.table.as_mut()?.get_mut(key)
    }

    fn contains(&mut self, key: &SlotKey) -> bool {
        self.table.as_mut().is_some_and(|t| t.contains_key(key))
    }

    fn bind(&mut self, key: &SlotKey, value: LocalValue) -> Result<Option<LocalValue>> {
        match &mut self.table {
            Some(table) => table.set(key, value),
            None => {
                self.table = Some(SlotTable::with_config(self.config, key, value));
                Ok(None)
            }
        }
    }

    fn unbind(&mut self, key: &SlotKey) -> Option<LocalValue> {
        self.table.as_mut()?.remove(key)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("table", &self.table)
            .field("config", &self.config)
            .finish()
    }
}

/// A variable with an independent value in every [`Context`].
///
/// Clones refer to the same variable. Once every clone is dropped, the
/// bindings it left behind are stale and get purged lazily.
pub struct ContextLocal<T> {
    key: SlotKey,
    initial: Option<Supplier<T>>,
    child: Option<ChildValueFn>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> ContextLocal<T> {
    /// Variable keyed from the process-wide hash counter.
    pub fn new() -> Self {
        Self::with_counter(HashCounter::global())
    }

    pub fn with_counter(counter: &HashCounter) -> Self {
        Self::from_key(SlotKey::new(counter))
    }

    // Keys are only shared between clones, so every binding under a key
    // holds a `T`.
    fn from_key(key: SlotKey) -> Self {
        Self {
            key,
            initial: None,
            child: None,
            _marker: PhantomData,
        }
    }

    /// Variable whose first read in a context stores and returns `f()`.
    pub fn with_initial<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new().initial(f)
    }

    pub fn initial<F>(mut self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.initial = Some(Arc::new(f));
        self
    }

    pub fn inherit(mut self, policy: InheritPolicy<T>) -> Self {
        self.child = policy.transform.map(|f| {
            Arc::new(move |v: &(dyn Any + Send)| {
                v.downcast_ref::<T>()
                    .map(|t| Box::new(f(t)) as AnyValue)
            }) as ChildValueFn
        });
        self
    }

    pub fn key(&self) -> &SlotKey {
        &self.key
    }

    /// Value bound in `cx`. When unbound and a supplier exists, the supplied
    /// value is bound first.
    pub fn get<'a>(&self, cx: &'a mut Context) -> Result<Option<&'a T>> {
        if !cx.contains(&self.key) {
            match &self.initial {
                Some(init) => {
                    self.set(cx, init())?;
                }
                None => return Ok(None),
            }
        }
        Ok(cx
            .lookup(&self.key)
            .and_then(|v| v.value.downcast_ref::<T>()))
    }

    /// Mutable access to an existing binding. Never runs the supplier.
    pub fn get_mut<'a>(&self, cx: &'a mut Context) -> Option<&'a mut T> {
        cx.lookup(&self.key)
            .and_then(|v| v.value.downcast_mut::<T>())
    }

    /// Bind `value`, returning the previous binding.
    pub fn set(&self, cx: &mut Context, value: T) -> Result<Option<T>> {
        let local = LocalValue {
            value: Box::new(value),
            child: self.child.clone(),
        };
        Ok(cx.bind(&self.key, local)?.and_then(downcast_owned))
    }

    pub fn remove(&self, cx: &mut Context) -> Option<T> {
        cx.unbind(&self.key).and_then(downcast_owned)
    }

    pub fn is_set(&self, cx: &mut Context) -> bool {
        cx.contains(&self.key)
    }

    pub(crate) fn supplier(&self) -> Option<&Supplier<T>> {
        self.initial.as_ref()
    }
}

fn downcast_owned<T: 'static>(local: LocalValue) -> Option<T> {
    local.value.downcast::<T>().ok().map(|b| *b)
}

impl<T: Send + 'static> Default for ContextLocal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ContextLocal<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            initial: self.initial.clone(),
            child: self.child.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ContextLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextLocal")
            .field("key", &self.key)
            .field("initial", &self.initial.is_some())
            .field("inherit", &self.child.is_some())
            .finish()
    }
}

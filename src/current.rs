//! Thread-bound current context.
//!
//! Each OS thread lazily gets its own [`Context`]. `spawn_inheriting` starts
//! a thread whose context is a snapshot of the caller's, the way inheritable
//! thread-locals behave.
//!
//! Closures handed to [`with_current`] run while the thread's context is
//! borrowed and must not touch context locals themselves; doing so panics.
//! Suppliers are exempt: they always run outside the borrow.

use crate::context::{Context, ContextLocal};
use crate::error::Result;
use core::cell::RefCell;
use std::thread::{self, JoinHandle};

thread_local! {
    static CURRENT: RefCell<Context> = RefCell::new(Context::new());
}

pub fn with_current<R>(f: impl FnOnce(&mut Context) -> R) -> R {
    CURRENT.with(|cx| f(&mut cx.borrow_mut()))
}

/// Swap the calling thread's context for `cx`, returning the old one.
pub fn replace_current(cx: Context) -> Context {
    CURRENT.with(|cur| cur.replace(cx))
}

/// Run `f` on a new thread that starts with a snapshot of this thread's
/// context.
pub fn spawn_inheriting<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let snapshot = with_current(|cx| Context::inherit_from(cx));
    thread::spawn(move || {
        replace_current(snapshot);
        f()
    })
}

impl<T: Send + 'static> ContextLocal<T> {
    /// Call `f` with this thread's value, supplying it first if unbound.
    pub fn with_current<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> Result<R> {
        self.supply_current()?;
        with_current(|cx| {
            // None only when unbound and there is no supplier.
            let value = self.get_mut(cx).map(|v| &*v);
            Ok(f(value))
        })
    }

    pub fn get_current(&self) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.with_current(|v| v.cloned())
    }

    pub fn set_current(&self, value: T) -> Result<Option<T>> {
        with_current(|cx| self.set(cx, value))
    }

    pub fn remove_current(&self) -> Option<T> {
        with_current(|cx| self.remove(cx))
    }

    pub fn is_set_current(&self) -> bool {
        with_current(|cx| self.is_set(cx))
    }

    fn supply_current(&self) -> Result<()> {
        if self.is_set_current() {
            return Ok(());
        }
        let Some(init) = self.supplier() else {
            return Ok(());
        };
        // The supplier may read other context locals, so no borrow is held.
        let value = init();
        with_current(|cx| {
            // A supplier may have bound this variable itself; keep that value.
            if !self.is_set(cx) {
                self.set(cx, value)?;
            }
            Ok(())
        })
    }
}

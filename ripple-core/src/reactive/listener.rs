//! Change listeners for properties.
//!
//! A listener is a callback that receives a property's new value on every
//! write. Listeners are compared by identity: clones of one listener are the
//! same listener, two listeners built from identical closures are not.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a listener.
///
/// Each call to [`Listener::new`] gets a fresh ID. Clones share it, which is
/// what lets `off` remove a listener "by reference".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A callback invoked with a property's value when it changes.
pub struct Listener<T: ?Sized> {
    id: ListenerId,
    callback: Rc<dyn Fn(&T)>,
}

impl<T: ?Sized> Listener<T> {
    /// Wrap a callback as a listener.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) + 'static,
    {
        Self {
            id: ListenerId::next(),
            callback: Rc::new(callback),
        }
    }

    /// Get the listener's unique ID.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the callback with `value`.
    pub fn notify(&self, value: &T) {
        (self.callback)(value);
    }
}

impl<T: ?Sized> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<T: ?Sized> PartialEq for Listener<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: ?Sized> Eq for Listener<T> {}

impl<T: ?Sized> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

//! Per-event observer lists

use std::sync::Arc;

/// Shared callback for one event kind.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Ordered observer list keyed by `Arc` identity.
///
/// Adding the same `Arc` twice keeps a single entry; removing an entry that
/// is not present does nothing.
pub struct Listeners<E> {
    entries: Vec<Listener<E>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns false if the listener was already registered.
    pub fn add(&mut self, listener: Listener<E>) -> bool {
        if self.position(&listener).is_some() {
            return false;
        }
        self.entries.push(listener);
        true
    }

    /// Returns false if the listener was not registered.
    pub fn remove(&mut self, listener: &Listener<E>) -> bool {
        match self.position(listener) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Copy of the current list, safe to iterate while the original mutates.
    pub fn snapshot(&self) -> Vec<Listener<E>> {
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Compare data pointers only; vtable pointers for the same closure may differ
    // between codegen units.
    fn position(&self, listener: &Listener<E>) -> Option<usize> {
        let needle = Arc::as_ptr(listener) as *const ();
        self.entries
            .iter()
            .position(|l| Arc::as_ptr(l) as *const () == needle)
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

//! Event name to listener registry.
//!
//! A registry is local to one unit. It stores listener handles, not
//! callbacks; the unit decides what each handle does when notified. This
//! keeps registration free of borrowed closures.

use std::collections::HashMap;

use crate::event::WILDCARD;

/// Maps event names to ordered, duplicate-free listener lists.
#[derive(Debug, Clone)]
pub struct EventRegistry<L> {
    listeners: HashMap<String, Vec<L>>,
}

impl<L> Default for EventRegistry<L> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }
}

impl<L: PartialEq> EventRegistry<L> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `listener` for `name`. Registering the same pair twice has no
    /// further effect.
    pub fn register(&mut self, name: impl Into<String>, listener: L) {
        let list = self.listeners.entry(name.into()).or_default();
        if !list.contains(&listener) {
            list.push(listener);
        }
    }

    /// Remove `listener` from `name`. Unknown pairs are ignored.
    pub fn deregister(&mut self, name: &str, listener: &L) {
        if let Some(list) = self.listeners.get_mut(name) {
            list.retain(|l| l != listener);
            if list.is_empty() {
                self.listeners.remove(name);
            }
        }
    }

    /// Whether `listener` is registered for `name` exactly (wildcard
    /// registrations do not count).
    pub fn is_registered(&self, name: &str, listener: &L) -> bool {
        self.listeners
            .get(name)
            .is_some_and(|list| list.contains(listener))
    }

    /// Number of listeners registered for `name` exactly.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.get(name).map_or(0, Vec::len)
    }

    /// Whether `name` would reach any listener, directly or by wildcard.
    pub fn wants(&self, name: &str) -> bool {
        self.listener_count(name) > 0 || self.listener_count(WILDCARD) > 0
    }

    /// Remove every registration.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Call `f` once for every listener interested in `name`.
    ///
    /// Listeners registered for `name` come first in registration order,
    /// followed by wildcard listeners that were not already visited.
    /// Returns the number of listeners visited.
    pub fn notify<F>(&self, name: &str, mut f: F) -> usize
    where
        F: FnMut(&L),
    {
        let direct: &[L] = self.listeners.get(name).map_or(&[], Vec::as_slice);
        for listener in direct {
            f(listener);
        }
        let mut visited = direct.len();

        if name != WILDCARD {
            if let Some(wildcard) = self.listeners.get(WILDCARD) {
                for listener in wildcard.iter().filter(|l| !direct.contains(*l)) {
                    f(listener);
                    visited += 1;
                }
            }
        }
        visited
    }
}

//! Two-stage edit notification.
//!
//! Listeners see every edit twice, strictly in document order:
//! [`DocumentListener::before_modification`] runs before the content changes
//! and [`DocumentListener::after_modification`] runs once it has landed, with
//! a snapshot of the new content. Registration is scoped: the returned
//! [`Subscription`] unregisters on drop.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::TextSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Insert,
    Remove,
}

/// One document mutation in pre-edit coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentEvent {
    pub kind: EditKind,
    pub offset: usize,
    pub length: usize,
    /// Document version after the edit.
    pub version: u64,
}

impl DocumentEvent {
    /// Signed change in document length.
    pub fn delta(&self) -> isize {
        match self.kind {
            EditKind::Insert => self.length as isize,
            EditKind::Remove => -(self.length as isize),
        }
    }
}

/// Callbacks must not edit the document they observe.
pub trait DocumentListener: Send + Sync {
    fn before_modification(&self, event: &DocumentEvent);
    fn after_modification(&self, event: &DocumentEvent, text: &TextSnapshot);
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    entries: Vec<(u64, Arc<dyn DocumentListener>)>,
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, listener: Arc<dyn DocumentListener>) -> u64 {
        self.next_id += 1;
        self.entries.push((self.next_id, listener));
        self.next_id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry, _)| *entry != id);
    }

    /// Copy out the current listeners so none is invoked with the registry locked.
    pub(crate) fn collect(&self) -> Vec<Arc<dyn DocumentListener>> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Keeps a listener registered until dropped.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    registry: Weak<Mutex<ListenerRegistry>>,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(registry: &Arc<Mutex<ListenerRegistry>>, id: u64) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            id,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(self.id);
            tracing::trace!(target: "text.document", id = self.id, "listener_unsubscribed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

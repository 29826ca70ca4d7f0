//! Document abstraction consumed by the layout engine.
//!
//! [`Document`] is a `ropey` character sequence addressed by char offset,
//! with stable [`Anchor`]s and two-stage edit notification. Content lives
//! behind a `parking_lot::RwLock`; readers hold the read guard (or take a
//! cheap [`TextSnapshot`]) while consulting layout so both are observed at
//! the same version.
//!
//! Lock order for callers: document read lock first, then any layout lock.
//! Edits are serialized by an internal edit mutex held across both listener
//! stages, which is what guarantees listeners see edits in document order.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use ropey::Rope;

pub mod anchor;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod segment;
pub mod snapshot;
pub mod width;

pub use anchor::{Anchor, Bias};
pub use error::DocumentError;
pub use listener::{DocumentEvent, DocumentListener, EditKind, Subscription};
pub use metrics::{FontMetrics, MonospaceMetrics};
pub use snapshot::TextSnapshot;

use anchor::AnchorTable;
use listener::ListenerRegistry;

/// Content guarded by the document lock.
#[derive(Debug)]
pub struct DocumentState {
    rope: Rope,
    version: u64,
}

impl DocumentState {
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn snapshot(&self) -> TextSnapshot {
        TextSnapshot::new(self.rope.clone(), self.version)
    }
}

pub struct Document {
    state: RwLock<DocumentState>,
    // Separate from `state` so anchors can be created while a layout lock is
    // held without re-entering the document lock.
    anchors: Mutex<AnchorTable>,
    edits: Mutex<()>,
    listeners: Arc<Mutex<ListenerRegistry>>,
}

impl Document {
    pub fn new(text: &str) -> Self {
        Self {
            state: RwLock::new(DocumentState {
                rope: Rope::from_str(text),
                version: 0,
            }),
            anchors: Mutex::new(AnchorTable::default()),
            edits: Mutex::new(()),
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, DocumentState> {
        self.state.read()
    }

    pub fn snapshot(&self) -> TextSnapshot {
        self.state.read().snapshot()
    }

    pub fn len_chars(&self) -> usize {
        self.state.read().len_chars()
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn create_anchor(&self, offset: usize, bias: Bias) -> Result<Anchor, DocumentError> {
        let len = self.len_chars();
        if offset > len {
            return Err(DocumentError::OutOfRange { offset, len });
        }
        Ok(self.anchors.lock().create(offset, bias))
    }

    /// Create an anchor without bounds checking against the live content.
    /// Used by layout while rebuilding from a snapshot that already
    /// validated the offset.
    pub fn anchor_unchecked(&self, offset: usize, bias: Bias) -> Anchor {
        self.anchors.lock().create(offset, bias)
    }

    pub fn live_anchors(&self) -> usize {
        self.anchors.lock().live()
    }

    pub fn subscribe(&self, listener: Arc<dyn DocumentListener>) -> Subscription {
        let id = self.listeners.lock().add(listener);
        tracing::trace!(target: "text.document", id, "listener_subscribed");
        Subscription::new(&self.listeners, id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn insert(&self, offset: usize, text: &str) -> Result<(), DocumentError> {
        let length = text.chars().count();
        self.apply(EditKind::Insert, offset, length, |rope| rope.insert(offset, text))
    }

    pub fn remove(&self, offset: usize, length: usize) -> Result<(), DocumentError> {
        self.apply(EditKind::Remove, offset, length, |rope| {
            rope.remove(offset..offset + length)
        })
    }

    fn apply(
        &self,
        kind: EditKind,
        offset: usize,
        length: usize,
        edit: impl FnOnce(&mut Rope),
    ) -> Result<(), DocumentError> {
        let _serial = self.edits.lock();
        let (len, version) = {
            let state = self.state.read();
            (state.len_chars(), state.version)
        };
        let end = match kind {
            EditKind::Insert => offset,
            EditKind::Remove => offset.saturating_add(length),
        };
        if end > len {
            return Err(DocumentError::OutOfRange { offset: end, len });
        }
        if length == 0 {
            return Ok(());
        }
        let event = DocumentEvent {
            kind,
            offset,
            length,
            version: version + 1,
        };
        let listeners = self.listeners.lock().collect();
        for l in &listeners {
            l.before_modification(&event);
        }
        let snapshot = {
            let mut state = self.state.write();
            edit(&mut state.rope);
            state.version = event.version;
            let mut anchors = self.anchors.lock();
            match kind {
                EditKind::Insert => anchors.on_insert(offset, length),
                EditKind::Remove => anchors.on_remove(offset, length),
            }
            state.snapshot()
        };
        tracing::debug!(target: "text.document", ?kind, offset, length, version = event.version, "document_edit");
        for l in &listeners {
            l.after_modification(&event, &snapshot);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Document")
            .field("len_chars", &state.len_chars())
            .field("version", &state.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        log: StdMutex<Vec<String>>,
    }

    impl DocumentListener for Recorder {
        fn before_modification(&self, event: &DocumentEvent) {
            self.log
                .lock()
                .unwrap()
                .push(format!("before {:?}@{}+{}", event.kind, event.offset, event.length));
        }

        fn after_modification(&self, event: &DocumentEvent, text: &TextSnapshot) {
            self.log
                .lock()
                .unwrap()
                .push(format!("after v{} {}", event.version, text));
        }
    }

    #[test]
    fn insert_and_remove_notify_both_stages_in_order() {
        let doc = Document::new("abc\n");
        let rec = Arc::new(Recorder::default());
        let _sub = doc.subscribe(rec.clone());
        doc.insert(1, "XY").unwrap();
        doc.remove(0, 2).unwrap();
        let log = rec.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "before Insert@1+2",
                "after v1 aXYbc\n",
                "before Remove@0+2",
                "after v2 Ybc\n",
            ]
        );
    }

    #[test]
    fn out_of_range_edits_are_rejected_without_notification() {
        let doc = Document::new("ab");
        let rec = Arc::new(Recorder::default());
        let _sub = doc.subscribe(rec.clone());
        assert_eq!(
            doc.insert(3, "x"),
            Err(DocumentError::OutOfRange { offset: 3, len: 2 })
        );
        assert_eq!(
            doc.remove(1, 2),
            Err(DocumentError::OutOfRange { offset: 3, len: 2 })
        );
        assert!(rec.log.lock().unwrap().is_empty());
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let doc = Document::new("");
        let rec = Arc::new(Recorder::default());
        let sub = doc.subscribe(rec.clone());
        assert_eq!(doc.listener_count(), 1);
        drop(sub);
        assert_eq!(doc.listener_count(), 0);
        doc.insert(0, "a").unwrap();
        assert!(rec.log.lock().unwrap().is_empty());
    }

    #[test]
    fn anchors_track_edits() {
        let doc = Document::new("abc\ndef\n");
        let para = doc.create_anchor(4, Bias::Backward).unwrap();
        doc.insert(4, "Z").unwrap();
        assert_eq!(para.offset(), 4);
        doc.insert(0, "__").unwrap();
        assert_eq!(para.offset(), 6);
        doc.remove(1, 6).unwrap();
        assert_eq!(para.offset(), 1);
        assert!(doc.create_anchor(99, Bias::Forward).is_err());
    }
}

//! Stable document positions.
//!
//! An [`Anchor`] tracks a character offset across edits without the holder
//! renumbering anything. The document owns only weak references, so dropping
//! every clone of an anchor retires it and the next edit prunes the slot.
//!
//! Update rules:
//! * Insert at `off` of `len` chars: anchors above `off` shift by `len`. An
//!   anchor exactly at `off` shifts only when its bias is [`Bias::Forward`].
//! * Removal of `[off, off+len)`: anchors at or above the end shift down by
//!   `len`, anchors inside the removed span collapse onto `off`.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::DocumentError;

/// Which side of an insertion at its exact offset an anchor sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Stay before text inserted at the anchor offset.
    Backward,
    /// Move after text inserted at the anchor offset.
    Forward,
}

impl FromStr for Bias {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backward" | "b" => Ok(Bias::Backward),
            "forward" | "f" => Ok(Bias::Forward),
            other => Err(DocumentError::InvalidBias(other.to_string())),
        }
    }
}

#[derive(Debug)]
struct AnchorCell {
    offset: AtomicUsize,
    bias: Bias,
}

/// Shared handle to a tracked position. Clones refer to the same position.
#[derive(Debug, Clone)]
pub struct Anchor(Arc<AnchorCell>);

impl Anchor {
    pub fn offset(&self) -> usize {
        self.0.offset.load(Ordering::Acquire)
    }

    pub fn bias(&self) -> Bias {
        self.0.bias
    }

    /// True when both handles track the same position object.
    pub fn same(&self, other: &Anchor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct AnchorTable {
    cells: Vec<Weak<AnchorCell>>,
}

impl AnchorTable {
    pub(crate) fn create(&mut self, offset: usize, bias: Bias) -> Anchor {
        let cell = Arc::new(AnchorCell {
            offset: AtomicUsize::new(offset),
            bias,
        });
        self.cells.push(Arc::downgrade(&cell));
        Anchor(cell)
    }

    pub(crate) fn on_insert(&mut self, offset: usize, len: usize) {
        self.cells.retain(|weak| {
            let Some(cell) = weak.upgrade() else {
                return false;
            };
            let cur = cell.offset.load(Ordering::Acquire);
            if cur > offset || (cur == offset && cell.bias == Bias::Forward) {
                cell.offset.store(cur + len, Ordering::Release);
            }
            true
        });
    }

    pub(crate) fn on_remove(&mut self, offset: usize, len: usize) {
        let end = offset + len;
        self.cells.retain(|weak| {
            let Some(cell) = weak.upgrade() else {
                return false;
            };
            let cur = cell.offset.load(Ordering::Acquire);
            if cur >= end {
                cell.offset.store(cur - len, Ordering::Release);
            } else if cur > offset {
                cell.offset.store(offset, Ordering::Release);
            }
            true
        });
    }

    pub(crate) fn live(&self) -> usize {
        self.cells.iter().filter(|w| w.strong_count() > 0).count()
    }
}

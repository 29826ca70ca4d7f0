//! Per-transaction change descriptors.

use std::ops::Range;

/// Why a rebuild transaction ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildCause {
    /// Whole region rebuilt (attach, width/style reset, escalation).
    FullRebuild,
    /// Paragraph-level dirty region: lines may split or merge.
    RebuildParagraphs,
    /// Lazily unbuilt paragraphs get their runs.
    InitParagraphs,
    /// Document edit.
    ModUpdate,
    /// Character-level dirty region: attributes or shaping changed.
    CharRebuild,
}

/// Vertical effect of a transaction: the old range `y0..y1` now measures
/// `y1 - y0 + delta`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YChange {
    pub y0: f64,
    pub y1: f64,
    pub delta: f64,
}

impl YChange {
    /// Merge a later change, measured after `self` was applied and lying
    /// below it, into one change in pre-`self` coordinates.
    pub fn union(self, other: YChange) -> YChange {
        YChange {
            y0: self.y0.min(other.y0),
            y1: self.y1.max(other.y1 - self.delta),
            delta: self.delta + other.delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeDescriptor {
    /// `None` for layout-only transactions (width changes, lazy measurement).
    pub cause: Option<RebuildCause>,
    /// Dirty char range in post-transaction offsets.
    pub chars: Option<Range<usize>>,
    pub y: Option<YChange>,
}

impl ChangeDescriptor {
    pub fn rebuild(cause: RebuildCause, chars: Range<usize>, y: Option<YChange>) -> Self {
        Self {
            cause: Some(cause),
            chars: Some(chars),
            y,
        }
    }

    pub fn layout(y: YChange) -> Self {
        Self {
            cause: None,
            chars: None,
            y: Some(y),
        }
    }
}

//! Dirty-region notifications from annotation producers.
//!
//! Highlighters and fold providers report the document ranges whose layout
//! went stale. They tend to fire on every micro-change, so notifications are
//! never applied synchronously: [`RegionCoalescer`] unions everything that
//! arrives within a short window and [`DeferredDelivery`] hands the union to a
//! [`RegionSink`] once the window closes.
//!
//! Merge semantics:
//! - Any `Full` in the window makes the delivery `full` and drops partial ranges.
//! - Character regions merge into one half-open range `[min(start), max(end))`.
//! - Paragraph regions merge the same way, independently of character regions.
//! - Empty ranges are ignored.

use std::ops::Range;

mod deferred;

pub use deferred::{DeferredDelivery, RegionSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Content or attributes changed; run boundaries and metrics may differ but
    /// paragraph structure does not.
    Chars,
    /// Paragraph boundaries may have moved (lines split, merged or folded).
    Paragraphs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtyNotice {
    Region { kind: RegionKind, range: Range<usize> },
    Full,
}

impl DirtyNotice {
    pub fn chars(range: Range<usize>) -> Self {
        DirtyNotice::Region {
            kind: RegionKind::Chars,
            range,
        }
    }

    pub fn paragraphs(range: Range<usize>) -> Self {
        DirtyNotice::Region {
            kind: RegionKind::Paragraphs,
            range,
        }
    }
}

/// Union of the notices received in one delivery window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRegions {
    pub full: bool,
    pub chars: Option<Range<usize>>,
    pub paragraphs: Option<Range<usize>>,
}

impl PendingRegions {
    pub fn is_empty(&self) -> bool {
        !self.full && self.chars.is_none() && self.paragraphs.is_none()
    }

    /// Fold `other` into `self` with the same rules as [`RegionCoalescer::mark`].
    pub fn merge(&mut self, other: PendingRegions) {
        if self.full || other.full {
            *self = PendingRegions {
                full: true,
                ..PendingRegions::default()
            };
            return;
        }
        if let Some(r) = other.chars {
            union(&mut self.chars, r);
        }
        if let Some(r) = other.paragraphs {
            union(&mut self.paragraphs, r);
        }
    }
}

fn union(slot: &mut Option<Range<usize>>, range: Range<usize>) {
    *slot = Some(match slot.take() {
        Some(cur) => cur.start.min(range.start)..cur.end.max(range.end),
        None => range,
    });
}

#[derive(Debug, Default)]
pub struct RegionCoalescer {
    pending: PendingRegions,
    marks: u64,
}

impl RegionCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, notice: DirtyNotice) {
        tracing::trace!(target: "events.coalesce", ?notice, "region_mark");
        self.marks += 1;
        match notice {
            DirtyNotice::Full => {
                self.pending = PendingRegions {
                    full: true,
                    ..PendingRegions::default()
                };
            }
            DirtyNotice::Region { .. } if self.pending.full => {}
            DirtyNotice::Region { range, .. } if range.start >= range.end => {}
            DirtyNotice::Region {
                kind: RegionKind::Chars,
                range,
            } => union(&mut self.pending.chars, range),
            DirtyNotice::Region {
                kind: RegionKind::Paragraphs,
                range,
            } => union(&mut self.pending.paragraphs, range),
        }
    }

    /// Marks recorded since the last `take`.
    pub fn marks(&self) -> u64 {
        self.marks
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Return and reset the accumulated union, or `None` when nothing is pending.
    pub fn take(&mut self) -> Option<PendingRegions> {
        if self.pending.is_empty() {
            self.marks = 0;
            return None;
        }
        let merged = std::mem::take(&mut self.pending);
        tracing::debug!(target: "events.coalesce", ?merged, marks = self.marks, "region_collapse");
        self.marks = 0;
        Some(merged)
    }
}

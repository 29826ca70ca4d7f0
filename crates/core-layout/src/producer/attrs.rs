//! Text attributes and the highlight layer that reports their changes.

use std::ops::Range;

use core_events::DirtyNotice;
use parking_lot::RwLock;

use crate::run::AttrId;

/// Source of text attributes (highlighting). Text runs never span an
/// attribute boundary.
pub trait AttributeSource: Send + Sync {
    /// Attribute at `offset` and the offset where it stops applying.
    fn attrs_at(&self, offset: usize) -> (AttrId, usize);
}

/// Default attributes everywhere.
#[derive(Debug, Default)]
pub struct PlainAttributes;

impl AttributeSource for PlainAttributes {
    fn attrs_at(&self, _offset: usize) -> (AttrId, usize) {
        (AttrId::default(), usize::MAX)
    }
}

/// Span list set wholesale by an external highlighter.
#[derive(Debug, Default)]
pub struct HighlightLayer {
    spans: RwLock<Vec<(Range<usize>, AttrId)>>,
}

impl HighlightLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all spans. Returns the character region whose attributes
    /// changed, for the caller to report to the layout.
    pub fn set_spans(&self, mut spans: Vec<(Range<usize>, AttrId)>) -> Option<DirtyNotice> {
        spans.retain(|(r, _)| r.start < r.end);
        spans.sort_by_key(|(r, _)| r.start);
        let mut guard = self.spans.write();
        let mut lo = usize::MAX;
        let mut hi = 0usize;
        for (r, a) in guard.iter() {
            if !spans.iter().any(|(nr, na)| nr == r && na == a) {
                lo = lo.min(r.start);
                hi = hi.max(r.end);
            }
        }
        for (r, a) in &spans {
            if !guard.iter().any(|(or, oa)| or == r && oa == a) {
                lo = lo.min(r.start);
                hi = hi.max(r.end);
            }
        }
        *guard = spans;
        (lo < hi).then(|| DirtyNotice::chars(lo..hi))
    }
}

impl AttributeSource for HighlightLayer {
    fn attrs_at(&self, offset: usize) -> (AttrId, usize) {
        let spans = self.spans.read();
        let idx = spans.partition_point(|(r, _)| r.end <= offset);
        match spans.get(idx) {
            Some((r, a)) if r.start <= offset => (*a, r.end),
            Some((r, _)) => (AttrId::default(), r.start),
            None => (AttrId::default(), usize::MAX),
        }
    }
}

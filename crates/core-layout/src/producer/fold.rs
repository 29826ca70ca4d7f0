//! Collapsed folds.
//!
//! A collapsed fold replaces its whole range with one atomic placeholder
//! run. When the range contains line breaks the paragraph holding the fold
//! spans several source lines.

use std::ops::Range;
use std::sync::Arc;

use core_events::DirtyNotice;
use core_text::{Anchor, Bias, Document};
use parking_lot::RwLock;

use crate::error::{LayoutError, Result};
use crate::run::{AttrId, LeafRun, RunKind, content_hash};

use super::{NO_RUN, ProducerContext, RunProducer};

/// Placeholder width in narrow chars.
const PLACEHOLDER_CHARS: f64 = 3.0;

#[derive(Debug, Clone)]
struct Fold {
    start: Anchor,
    end: Anchor,
}

impl Fold {
    fn range(&self) -> Range<usize> {
        self.start.offset()..self.end.offset()
    }
}

/// Set of collapsed ranges tracked with document anchors.
#[derive(Debug, Default)]
pub struct FoldModel {
    folds: RwLock<Vec<Fold>>,
}

impl FoldModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collapse `range`. Folds it overlaps are absorbed. Returns the
    /// paragraph-level region the caller reports to the layout.
    pub fn collapse(&self, document: &Document, range: Range<usize>) -> Result<DirtyNotice> {
        let len = document.len_chars();
        if range.start >= range.end || range.end > len {
            return Err(LayoutError::OutOfRange {
                offset: range.end,
                start: 0,
                end: len,
            });
        }
        let mut folds = self.folds.write();
        let mut lo = range.start;
        let mut hi = range.end;
        folds.retain(|f| {
            let r = f.range();
            if r.start < hi && lo < r.end {
                lo = lo.min(r.start);
                hi = hi.max(r.end);
                false
            } else {
                true
            }
        });
        let fold = Fold {
            start: document.create_anchor(lo, Bias::Forward)?,
            end: document.create_anchor(hi, Bias::Backward)?,
        };
        let at = folds.partition_point(|f| f.start.offset() < lo);
        folds.insert(at, fold);
        tracing::debug!(target: "layout.builder", start = lo, end = hi, "fold_collapsed");
        Ok(DirtyNotice::paragraphs(lo..hi))
    }

    /// Expand every fold containing `offset`.
    pub fn expand_at(&self, offset: usize) -> Option<DirtyNotice> {
        let mut folds = self.folds.write();
        let mut lo = usize::MAX;
        let mut hi = 0;
        folds.retain(|f| {
            let r = f.range();
            if r.start <= offset && offset < r.end {
                lo = lo.min(r.start);
                hi = hi.max(r.end);
                false
            } else {
                true
            }
        });
        (lo < hi).then(|| DirtyNotice::paragraphs(lo..hi))
    }

    /// Current non-empty fold ranges in document order.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        let mut out: Vec<_> = self
            .folds
            .read()
            .iter()
            .map(Fold::range)
            .filter(|r| r.start < r.end)
            .collect();
        out.sort_by_key(|r| r.start);
        out
    }
}

/// Emits one [`RunKind::Fold`] run per collapsed fold.
pub struct FoldRunProducer {
    model: Arc<FoldModel>,
    pass: Vec<Range<usize>>,
}

impl FoldRunProducer {
    pub fn new(model: Arc<FoldModel>) -> Self {
        Self {
            model,
            pass: Vec::new(),
        }
    }

    fn fold_at(&self, start: usize) -> Option<&Range<usize>> {
        self.pass.iter().find(|r| r.start == start)
    }
}

impl RunProducer for FoldRunProducer {
    fn name(&self) -> &'static str {
        "fold"
    }

    fn weight(&self) -> u32 {
        100
    }

    fn restart(&mut self, _ctx: &ProducerContext<'_>, _start: usize, _end: usize, _materialize: bool) {
        // Nested or overlapping ranges collapse to the outermost.
        let mut pass: Vec<Range<usize>> = Vec::new();
        for r in self.model.ranges() {
            match pass.last_mut() {
                Some(last) if r.start < last.end => last.end = last.end.max(r.end),
                _ => pass.push(r),
            }
        }
        self.pass = pass;
    }

    fn next_run_start_offset(&mut self, _ctx: &ProducerContext<'_>, offset: usize) -> usize {
        self.pass
            .iter()
            .find(|r| r.start >= offset)
            .map_or(NO_RUN, |r| r.start)
    }

    fn create_run(
        &mut self,
        ctx: &ProducerContext<'_>,
        start: usize,
        limit: usize,
        forced: bool,
        reuse: Option<&LeafRun>,
        _reuse_end: usize,
    ) -> Option<LeafRun> {
        let end = self.run_end_offset(ctx, start, limit, forced)?;
        let length = end - start;
        let hash = content_hash(&ctx.text.slice(start..end));
        let attrs = AttrId::default();
        match reuse {
            Some(old) if old.matches(RunKind::Fold, length, attrs, hash) => Some(old.clone()),
            _ => Some(LeafRun::with_width(
                RunKind::Fold,
                length,
                PLACEHOLDER_CHARS * ctx.metrics.char_width(),
                attrs,
                hash,
                None,
            )),
        }
    }

    fn run_end_offset(
        &mut self,
        ctx: &ProducerContext<'_>,
        start: usize,
        limit: usize,
        forced: bool,
    ) -> Option<usize> {
        let fold = self.fold_at(start)?;
        // A fold never splits; under a forced limit it yields instead.
        if forced && fold.end > limit {
            return None;
        }
        let end = fold.end.min(limit).min(ctx.text.len_chars());
        (end > start).then_some(end)
    }

    /// A collapsed fold hides its line breaks.
    fn ends_paragraph(&self, _ctx: &ProducerContext<'_>, _start: usize, _end: usize) -> bool {
        false
    }

    fn finish_creation(&mut self) {
        self.pass.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::StaleHandle;
    use core_text::MonospaceMetrics;

    #[test]
    fn collapse_merges_overlaps_and_tracks_edits() {
        let doc = Document::new("fn a() {\n    x\n}\nrest\n");
        let model = FoldModel::new();
        assert_eq!(
            model.collapse(&doc, 8..12).unwrap(),
            DirtyNotice::paragraphs(8..12)
        );
        model.collapse(&doc, 10..15).unwrap();
        assert_eq!(model.ranges(), vec![8..15]);
        doc.insert(0, "pub ").unwrap();
        assert_eq!(model.ranges(), vec![12..19]);
        assert_eq!(model.expand_at(14), Some(DirtyNotice::paragraphs(12..19)));
        assert!(model.ranges().is_empty());
        assert!(model.collapse(&doc, 5..99).is_err());
    }

    #[test]
    fn fold_run_is_atomic_and_yields_to_forced_limit() {
        let doc = Document::new("ab\ncd\nef\n");
        let model = Arc::new(FoldModel::new());
        model.collapse(&doc, 2..5).unwrap();
        let text = doc.snapshot();
        let metrics = MonospaceMetrics::default();
        let stale = StaleHandle::new();
        let ctx = ProducerContext {
            text: &text,
            metrics: &metrics,
            stale: &stale,
        };
        let mut p = FoldRunProducer::new(model);
        p.restart(&ctx, 0, 9, true);
        assert_eq!(p.next_run_start_offset(&ctx, 0), 2);
        assert_eq!(p.next_run_start_offset(&ctx, 3), NO_RUN);
        let run = p.create_run(&ctx, 2, 9, false, None, NO_RUN).unwrap();
        assert_eq!((run.kind(), run.length(), run.width()), (RunKind::Fold, 3, 21.0));
        assert!(p.create_run(&ctx, 2, 4, true, None, NO_RUN).is_none());
        assert!(p.create_run(&ctx, 1, 9, false, None, NO_RUN).is_none());
        p.finish_creation();
        assert_eq!(p.next_run_start_offset(&ctx, 0), NO_RUN);
    }
}

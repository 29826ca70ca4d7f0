//! Bottom-weight fallback producer.
//!
//! Covers every offset. A run is one of: a newline, a stretch of tabs, or a
//! stretch of other text. Text runs stop at the first newline or tab, at an
//! attribute boundary, after `max_run_chars` chars, at the limit, and at
//! `reuse_end` so that later old runs line up again.

use std::sync::Arc;

use crate::run::{AttrId, LeafRun, RunKind, ShapedText, content_hash};

use super::{AttributeSource, PlainAttributes, ProducerContext, RunProducer};

pub struct TextRunProducer {
    max_run_chars: usize,
    attrs: Arc<dyn AttributeSource>,
}

impl TextRunProducer {
    pub fn new(max_run_chars: usize) -> Self {
        Self::with_attributes(max_run_chars, Arc::new(PlainAttributes))
    }

    pub fn with_attributes(max_run_chars: usize, attrs: Arc<dyn AttributeSource>) -> Self {
        Self {
            max_run_chars: max_run_chars.max(1),
            attrs,
        }
    }

    fn reuse_or(
        reuse: Option<&LeafRun>,
        kind: RunKind,
        length: usize,
        attrs: AttrId,
        hash: u64,
        make: impl FnOnce() -> LeafRun,
    ) -> LeafRun {
        match reuse {
            Some(old) if old.matches(kind, length, attrs, hash) => old.clone(),
            _ => make(),
        }
    }
}

impl RunProducer for TextRunProducer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn weight(&self) -> u32 {
        0
    }

    fn restart(&mut self, _ctx: &ProducerContext<'_>, _start: usize, _end: usize, _materialize: bool) {}

    fn next_run_start_offset(&mut self, _ctx: &ProducerContext<'_>, offset: usize) -> usize {
        offset
    }

    fn create_run(
        &mut self,
        ctx: &ProducerContext<'_>,
        start: usize,
        limit: usize,
        _forced: bool,
        reuse: Option<&LeafRun>,
        reuse_end: usize,
    ) -> Option<LeafRun> {
        let hard_end = limit.min(ctx.text.len_chars());
        let first = ctx.text.char_at(start)?;
        if start >= hard_end {
            return None;
        }
        let (attrs, attr_end) = self.attrs.attrs_at(start);
        if first == '\n' {
            let hash = content_hash("\n");
            return Some(Self::reuse_or(reuse, RunKind::Newline, 1, attrs, hash, || {
                LeafRun::with_width(RunKind::Newline, 1, ctx.metrics.char_width(), attrs, hash, None)
            }));
        }
        let mut end = hard_end
            .min(start.saturating_add(self.max_run_chars))
            .min(attr_end.max(start + 1));
        if reuse_end > start {
            end = end.min(reuse_end);
        }
        let is_tab = first == '\t';
        let mut body = String::new();
        for ch in ctx.text.chars_from(start).take(end - start) {
            if ch == '\n' || (ch == '\t') != is_tab {
                break;
            }
            body.push(ch);
        }
        let length = body.chars().count();
        let hash = content_hash(&body);
        if is_tab {
            let width = length as f64 * ctx.metrics.tab_width();
            return Some(Self::reuse_or(reuse, RunKind::Tab, length, attrs, hash, || {
                LeafRun::with_width(RunKind::Tab, length, width, attrs, hash, None)
            }));
        }
        Some(Self::reuse_or(reuse, RunKind::Text, length, attrs, hash, || {
            let shaped = Arc::new(ShapedText::new(ctx.metrics.advances(&body)));
            LeafRun::text(length, attrs, hash, shaped)
        }))
    }

    fn run_end_offset(
        &mut self,
        ctx: &ProducerContext<'_>,
        start: usize,
        limit: usize,
        _forced: bool,
    ) -> Option<usize> {
        let end = ctx.text.line_end_from(start, limit);
        (end > start).then_some(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::{HighlightLayer, StaleHandle};
    use core_text::{MonospaceMetrics, TextSnapshot};

    fn create(
        p: &mut TextRunProducer,
        text: &TextSnapshot,
        start: usize,
        limit: usize,
        reuse: Option<&LeafRun>,
        reuse_end: usize,
    ) -> LeafRun {
        let metrics = MonospaceMetrics::default();
        let stale = StaleHandle::new();
        let ctx = ProducerContext {
            text,
            metrics: &metrics,
            stale: &stale,
        };
        p.create_run(&ctx, start, limit, false, reuse, reuse_end).unwrap()
    }

    #[test]
    fn splits_at_newline_tab_and_run_cap() {
        let text = TextSnapshot::from_str("abcdef\t\tx\n");
        let mut p = TextRunProducer::new(4);
        let a = create(&mut p, &text, 0, 10, None, usize::MAX);
        assert_eq!((a.kind(), a.length()), (RunKind::Text, 4));
        let b = create(&mut p, &text, 4, 10, None, usize::MAX);
        assert_eq!((b.kind(), b.length()), (RunKind::Text, 2));
        let tab = create(&mut p, &text, 6, 10, None, usize::MAX);
        assert_eq!((tab.kind(), tab.length()), (RunKind::Tab, 2));
        assert_eq!(tab.width(), 2.0 * 56.0);
        let x = create(&mut p, &text, 8, 10, None, usize::MAX);
        assert_eq!(x.length(), 1);
        let nl = create(&mut p, &text, 9, 10, None, usize::MAX);
        assert_eq!(nl.kind(), RunKind::Newline);
    }

    #[test]
    fn cuts_at_reuse_end_and_reuses_matching_candidate() {
        let text = TextSnapshot::from_str("hello world\n");
        let mut p = TextRunProducer::new(256);
        let head = create(&mut p, &text, 0, 12, None, 5);
        assert_eq!(head.length(), 5);
        let again = create(&mut p, &text, 0, 12, Some(&head), 5);
        assert_eq!(again.id(), head.id());
        let other = TextSnapshot::from_str("jello world\n");
        let changed = create(&mut p, &other, 0, 12, Some(&head), 5);
        assert_ne!(changed.id(), head.id());
    }

    #[test]
    fn attribute_boundaries_split_runs() {
        let text = TextSnapshot::from_str("let x = 1;\n");
        let layer = Arc::new(HighlightLayer::new());
        layer.set_spans(vec![(0..3, AttrId(7))]);
        let mut p = TextRunProducer::with_attributes(256, layer);
        let kw = create(&mut p, &text, 0, 11, None, usize::MAX);
        assert_eq!((kw.length(), kw.attrs()), (3, AttrId(7)));
        let rest = create(&mut p, &text, 3, 11, None, usize::MAX);
        assert_eq!((rest.length(), rest.attrs()), (7, AttrId(0)));
    }

    #[test]
    fn estimation_stops_after_newline() {
        let text = TextSnapshot::from_str("ab\ncd");
        let metrics = MonospaceMetrics::default();
        let stale = StaleHandle::new();
        let ctx = ProducerContext {
            text: &text,
            metrics: &metrics,
            stale: &stale,
        };
        let mut p = TextRunProducer::new(256);
        assert_eq!(p.run_end_offset(&ctx, 0, 5, false), Some(3));
        assert_eq!(p.run_end_offset(&ctx, 3, 5, false), Some(5));
        assert_eq!(p.run_end_offset(&ctx, 5, 5, false), None);
    }
}

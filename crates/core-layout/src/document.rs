//! Root node: the paragraphs of one document region.

use std::fmt::Write as _;
use std::ops::Range;

use core_text::TextSnapshot;

use crate::change::YChange;
use crate::node_list::NodeList;
use crate::paragraph::{Allocation, ParagraphNode, ParentView, RenderContext};

#[derive(Debug)]
pub struct DocumentNode {
    paragraphs: NodeList<ParagraphNode>,
    region_start: usize,
    region_end: usize,
    width: f64,
    context: RenderContext,
    gap_threshold: usize,
}

impl DocumentNode {
    pub fn new(region: Range<usize>, context: RenderContext, gap_threshold: usize) -> Self {
        Self {
            paragraphs: NodeList::new(gap_threshold),
            region_start: region.start,
            region_end: region.end.max(region.start),
            width: 0.0,
            context,
            gap_threshold,
        }
    }

    pub fn paragraphs(&self) -> &NodeList<ParagraphNode> {
        &self.paragraphs
    }

    pub(crate) fn paragraphs_mut(&mut self) -> &mut NodeList<ParagraphNode> {
        &mut self.paragraphs
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn paragraph(&self, index: usize) -> Option<&ParagraphNode> {
        self.paragraphs.get(index)
    }

    pub fn region(&self) -> Range<usize> {
        self.region_start..self.region_end
    }

    pub(crate) fn set_region(&mut self, region: Range<usize>) {
        self.region_start = region.start;
        self.region_end = region.end.max(region.start);
    }

    /// Drop every paragraph. Used when no rebuild could succeed.
    pub(crate) fn clear(&mut self, region: Range<usize>) {
        self.paragraphs.take_all();
        self.set_region(region);
        self.width = 0.0;
    }

    pub fn gap_threshold(&self) -> usize {
        self.gap_threshold
    }

    pub fn paragraph_start(&self, index: usize) -> usize {
        self.region_start + self.paragraphs.start_offset(index)
    }

    pub fn paragraph_end(&self, index: usize) -> usize {
        self.region_start + self.paragraphs.end_offset(index)
    }

    pub fn paragraph_range(&self, index: usize) -> Range<usize> {
        self.paragraph_start(index)..self.paragraph_end(index)
    }

    /// Paragraph containing document offset `offset`, clamped to the region.
    pub fn paragraph_at_offset(&self, offset: usize) -> Option<usize> {
        self.paragraphs
            .index_at_offset(offset.saturating_sub(self.region_start))
    }

    pub fn paragraph_at_y(&self, y: f64) -> Option<usize> {
        self.paragraphs.index_at_visual(y.max(0.0))
    }

    pub fn paragraph_y(&self, index: usize) -> f64 {
        self.paragraphs.start_visual(index)
    }

    /// Widest unwrapped paragraph.
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.paragraphs.total_extent()
    }

    /// Size the tree would like to get from its container.
    pub fn preferred_size(&self) -> (f64, f64) {
        let width = match (self.context.wrap, self.context.available_width) {
            (Some(_), Some(available)) => self.width.min(available),
            _ => self.width,
        };
        (width, self.height())
    }

    pub(crate) fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    pub(crate) fn recompute_width(&mut self) {
        self.width = self.paragraphs.iter().map(ParagraphNode::width).fold(0.0, f64::max);
    }

    pub(crate) fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// Drop every paragraph's layout. Heights stay until re-measured.
    pub(crate) fn invalidate_layout(&mut self) {
        for i in 0..self.paragraphs.len() {
            self.paragraphs.update(i, ParagraphNode::invalidate_layout);
        }
    }

    /// Lay out every invalid paragraph in `range`. Returns the union of
    /// vertical changes.
    pub(crate) fn layout_paragraphs(&mut self, range: Range<usize>, text: &TextSnapshot) -> Option<YChange> {
        let ctx = self.context;
        let mut change: Option<YChange> = None;
        for i in range.start..range.end.min(self.paragraphs.len()) {
            if self.paragraphs[i].is_laid_out() {
                continue;
            }
            let y0 = self.paragraphs.start_visual(i);
            let old = self.paragraphs[i].height();
            let content = text.slice(self.paragraph_range(i));
            self.paragraphs.update(i, |p| p.layout(&content, &ctx));
            let delta = self.paragraphs[i].height() - old;
            if delta != 0.0 {
                let y = YChange { y0, y1: y0 + old, delta };
                change = Some(match change {
                    Some(c) => c.union(y),
                    None => y,
                });
            }
        }
        change
    }

    /// Structural dump used by integrity logging and the CLI.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "document region={}..{} paragraphs={} size={:.1}x{:.1} gapped={}",
            self.region_start,
            self.region_end,
            self.paragraphs.len(),
            self.width,
            self.height(),
            self.paragraphs.is_gapped(),
        );
        for (i, p) in self.paragraphs.iter().enumerate() {
            let _ = writeln!(
                out,
                "  p{i} {}..{} anchor={} y={:.1} h={:.1} w={:.1} flags={:?} rows={}",
                self.paragraph_start(i),
                self.paragraph_end(i),
                p.anchor().offset(),
                self.paragraphs.start_visual(i),
                p.height(),
                p.width(),
                p.flags(),
                p.row_count(),
            );
            let runs = p.runs();
            for (k, run) in runs.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "    r{k} {:?} {}..{} w={:.1} id={}",
                    run.kind(),
                    runs.start_offset(k),
                    runs.end_offset(k),
                    run.width(),
                    run.id().get(),
                );
            }
        }
        out
    }
}

impl ParentView for DocumentNode {
    fn child_allocation(&self, index: usize) -> Option<Allocation> {
        let p = self.paragraphs.get(index)?;
        let width = match self.context.available_width {
            Some(available) => available.max(p.wrap_info().map_or(p.width(), |w| w.width)),
            None => self.width,
        };
        Some(Allocation {
            x: 0.0,
            y: self.paragraphs.start_visual(index),
            width,
            height: p.height(),
        })
    }

    fn render_context(&self) -> RenderContext {
        self.context
    }
}

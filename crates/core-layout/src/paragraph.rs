//! Paragraph nodes and the capability they get from their parent.

use bitflags::bitflags;
use core_text::Anchor;

use crate::node_list::{GapNode, NodeList};
use crate::run::{LeafRun, RunKind};
use crate::wrap::{self, WrapInfo, WrapSettings};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParagraphFlags: u8 {
        /// Runs are present and cover the paragraph.
        const CHILDREN_VALID = 0b01;
        /// Height and wrap partition match the runs and the available width.
        const LAYOUT_VALID = 0b10;
    }
}

/// Rectangle a parent assigns to one child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Geometry shared by every paragraph of a tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    pub row_height: f64,
    pub ascent: f64,
    pub char_width: f64,
    /// `None` until a container reported its width.
    pub available_width: Option<f64>,
    /// `None` when wrapping is disabled.
    pub wrap: Option<WrapSettings>,
}

/// What a child may ask of the node that owns it.
pub trait ParentView {
    fn child_allocation(&self, index: usize) -> Option<Allocation>;
    fn render_context(&self) -> RenderContext;
}

#[derive(Debug, Clone)]
pub struct ParagraphNode {
    anchor: Anchor,
    length: usize,
    width: f64,
    height: f64,
    runs: NodeList<LeafRun>,
    flags: ParagraphFlags,
    wrap: Option<WrapInfo>,
    raw_end_offset: i64,
    raw_end_visual: f64,
}

impl ParagraphNode {
    /// A paragraph with materialized runs. Height is provisional until laid out.
    pub fn built(anchor: Anchor, runs: Vec<LeafRun>, gap_threshold: usize, row_height: f64) -> Self {
        let runs = NodeList::from_vec(runs, gap_threshold);
        Self {
            anchor,
            length: runs.total_length(),
            width: runs.total_extent(),
            height: row_height,
            runs,
            flags: ParagraphFlags::CHILDREN_VALID,
            wrap: None,
            raw_end_offset: 0,
            raw_end_visual: 0.0,
        }
    }

    /// A paragraph known only by length (estimation pass).
    pub fn estimated(anchor: Anchor, length: usize, char_width: f64, gap_threshold: usize, row_height: f64) -> Self {
        Self {
            anchor,
            length,
            width: length as f64 * char_width,
            height: row_height,
            runs: NodeList::new(gap_threshold),
            flags: ParagraphFlags::empty(),
            wrap: None,
            raw_end_offset: 0,
            raw_end_visual: 0.0,
        }
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Unwrapped preferred width.
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn flags(&self) -> ParagraphFlags {
        self.flags
    }

    pub fn has_children(&self) -> bool {
        self.flags.contains(ParagraphFlags::CHILDREN_VALID)
    }

    pub fn is_laid_out(&self) -> bool {
        self.flags.contains(ParagraphFlags::LAYOUT_VALID)
    }

    pub fn runs(&self) -> &NodeList<LeafRun> {
        &self.runs
    }

    pub fn wrap_info(&self) -> Option<&WrapInfo> {
        self.wrap.as_ref()
    }

    pub fn row_count(&self) -> usize {
        self.wrap.as_ref().map_or(1, |w| w.row_count().max(1))
    }

    pub fn ends_with_newline(&self) -> bool {
        self.runs
            .get(self.runs.len().wrapping_sub(1))
            .is_some_and(|r| r.kind() == RunKind::Newline)
    }

    /// Replace `remove` runs at `index`. Height is kept until the next layout.
    pub(crate) fn replace_runs(&mut self, index: usize, remove: usize, runs: Vec<LeafRun>) -> Vec<LeafRun> {
        let removed = self.runs.replace(index, remove, runs);
        self.length = self.runs.total_length();
        self.width = self.runs.total_extent();
        self.invalidate_layout();
        removed
    }

    pub(crate) fn set_height(&mut self, height: f64) {
        self.height = height;
    }

    pub(crate) fn set_estimated_width(&mut self, width: f64) {
        if !self.has_children() {
            self.width = width;
        }
    }

    pub(crate) fn invalidate_layout(&mut self) {
        self.flags.remove(ParagraphFlags::LAYOUT_VALID);
        self.wrap = None;
    }

    /// Measure against `ctx`. `text` is the paragraph's content.
    pub(crate) fn layout(&mut self, text: &str, ctx: &RenderContext) {
        self.wrap = match (ctx.wrap, ctx.available_width) {
            (Some(settings), Some(available)) if self.has_children() && self.width > available => Some(
                wrap::partition(&self.runs, text, available, ctx.char_width, &settings),
            ),
            _ => None,
        };
        let rows = match (&self.wrap, ctx.wrap, ctx.available_width) {
            (Some(w), _, _) => w.row_count().max(1),
            // Unbuilt paragraphs guess their row count from the estimated width.
            (None, Some(_), Some(available)) if !self.has_children() && available > 0.0 => {
                (self.width / available).ceil().max(1.0) as usize
            }
            _ => 1,
        };
        self.height = rows as f64 * ctx.row_height;
        self.flags.insert(ParagraphFlags::LAYOUT_VALID);
    }

    /// Horizontal position of local offset `local` from the paragraph start.
    fn run_x(&self, local: usize, char_width: f64) -> f64 {
        match self.runs.index_at_offset(local) {
            Some(i) if self.has_children() => {
                self.runs.start_visual(i) + self.runs[i].x_at(local - self.runs.start_offset(i))
            }
            _ => local as f64 * char_width,
        }
    }

    /// Row and x of local offset `local`.
    pub fn point_at(&self, local: usize, char_width: f64) -> (usize, f64) {
        let local = local.min(self.length);
        match &self.wrap {
            Some(w) => {
                let row = w.line_at_offset(local);
                let start = w.lines[row].start_offset;
                (row, self.run_x(local, char_width) - self.run_x(start, char_width))
            }
            None => (0, self.run_x(local, char_width)),
        }
    }

    /// Local offset nearest to `x` on `row`. The caret never lands after the
    /// terminator.
    pub fn offset_at(&self, row: usize, x: f64, char_width: f64) -> usize {
        let (start, end) = match &self.wrap {
            Some(w) => {
                let line = &w.lines[row.min(w.lines.len() - 1)];
                (line.start_offset, line.end_offset)
            }
            None => (0, self.length),
        };
        let last_row = self.wrap.as_ref().is_none_or(|w| row + 1 >= w.lines.len());
        let upper = if last_row && self.ends_with_newline() {
            end.saturating_sub(1)
        } else if !last_row {
            end.saturating_sub(1).max(start)
        } else {
            end
        };
        if !self.has_children() {
            let local = (x.max(0.0) / char_width).round() as usize;
            return local.clamp(start, upper.max(start));
        }
        let target = self.run_x(start, char_width) + x.max(0.0);
        let local = match self.runs.index_at_visual(target) {
            Some(i) => {
                self.runs.start_offset(i) + self.runs[i].offset_at_x(target - self.runs.start_visual(i))
            }
            None => 0,
        };
        local.clamp(start, upper.max(start))
    }
}

impl GapNode for ParagraphNode {
    fn length(&self) -> usize {
        self.length
    }

    fn extent(&self) -> f64 {
        self.height
    }

    fn raw_end_offset(&self) -> i64 {
        self.raw_end_offset
    }

    fn set_raw_end_offset(&mut self, raw: i64) {
        self.raw_end_offset = raw;
    }

    fn raw_end_visual(&self) -> f64 {
        self.raw_end_visual
    }

    fn set_raw_end_visual(&mut self, raw: f64) {
        self.raw_end_visual = raw;
    }
}

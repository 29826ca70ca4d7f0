//! Leaf runs: the smallest laid-out unit of a paragraph.

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHasher;

use crate::node_list::GapNode;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a run. Survives reuse, changes whenever a run is recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    pub fn next() -> Self {
        RunId(NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    Text,
    Tab,
    /// Paragraph terminator (`'\n'`).
    Newline,
    /// Collapsed fold. Atomic: never split by wrapping.
    Fold,
}

/// Attribute identity of a run, as reported by an attribute source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct AttrId(pub u32);

/// Cached shaping result: the advance of each char of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedText {
    pub advances: Vec<f64>,
    pub width: f64,
}

impl ShapedText {
    pub fn new(advances: Vec<f64>) -> Self {
        let width = advances.iter().sum();
        Self { advances, width }
    }
}

/// Hash of run content, stable within the process.
pub fn content_hash(text: &str) -> u64 {
    let mut h = AHasher::default();
    text.hash(&mut h);
    h.finish()
}

#[derive(Debug, Clone)]
pub struct LeafRun {
    id: RunId,
    kind: RunKind,
    length: usize,
    width: f64,
    attrs: AttrId,
    content_hash: u64,
    shaping: Option<Arc<ShapedText>>,
    raw_end_offset: i64,
    raw_end_visual: f64,
}

impl LeafRun {
    /// A text run measured by `shaping`.
    pub fn text(length: usize, attrs: AttrId, content_hash: u64, shaping: Arc<ShapedText>) -> Self {
        Self::with_width(RunKind::Text, length, shaping.width, attrs, content_hash, Some(shaping))
    }

    /// A run of fixed width without per-char shaping.
    pub fn with_width(
        kind: RunKind,
        length: usize,
        width: f64,
        attrs: AttrId,
        content_hash: u64,
        shaping: Option<Arc<ShapedText>>,
    ) -> Self {
        Self {
            id: RunId::next(),
            kind,
            length,
            width,
            attrs,
            content_hash,
            shaping,
            raw_end_offset: 0,
            raw_end_visual: 0.0,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn attrs(&self) -> AttrId {
        self.attrs
    }

    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    pub fn shaping(&self) -> Option<&Arc<ShapedText>> {
        self.shaping.as_ref()
    }

    /// Whether a freshly produced run with these properties could be
    /// replaced by this one.
    pub fn matches(&self, kind: RunKind, length: usize, attrs: AttrId, content_hash: u64) -> bool {
        self.kind == kind
            && self.length == length
            && self.attrs == attrs
            && self.content_hash == content_hash
    }

    /// Advance of each char in this run, `None` for atomic runs.
    pub fn char_advances(&self, char_width: f64) -> Option<Vec<f64>> {
        match self.kind {
            RunKind::Fold => None,
            RunKind::Text => Some(match &self.shaping {
                Some(s) => s.advances.clone(),
                None => vec![char_width; self.length],
            }),
            RunKind::Tab | RunKind::Newline => {
                Some(vec![self.width / self.length.max(1) as f64; self.length])
            }
        }
    }

    /// Horizontal position of local char offset `local` from the run start.
    pub fn x_at(&self, local: usize) -> f64 {
        if local == 0 {
            return 0.0;
        }
        if local >= self.length {
            return self.width;
        }
        match (&self.kind, &self.shaping) {
            (RunKind::Text, Some(s)) => s.advances[..local].iter().sum(),
            (RunKind::Fold, _) => self.width,
            _ => self.width * local as f64 / self.length as f64,
        }
    }

    /// Local char offset nearest to horizontal position `x` within the run.
    pub fn offset_at_x(&self, x: f64) -> usize {
        if x <= 0.0 {
            return 0;
        }
        if self.kind == RunKind::Fold {
            return if x < self.width / 2.0 { 0 } else { self.length };
        }
        let mut acc = 0.0;
        for i in 0..self.length {
            let adv = match (&self.kind, &self.shaping) {
                (RunKind::Text, Some(s)) => s.advances[i],
                _ => self.width / self.length as f64,
            };
            if x < acc + adv / 2.0 {
                return i;
            }
            acc += adv;
        }
        self.length
    }
}

impl GapNode for LeafRun {
    fn length(&self) -> usize {
        self.length
    }

    fn extent(&self) -> f64 {
        self.width
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

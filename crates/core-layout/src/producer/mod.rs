//! Protocol between the rebuild engine and pluggable run producers.
//!
//! Producers are polled from the highest weight down. The one whose next
//! start equals the creation offset is asked for a run; every higher-weight
//! producer that wants to start later bounds the run with a forced limit.
//! The bottom producer (weight 0) must cover every offset.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use core_text::{FontMetrics, TextSnapshot};

use crate::run::LeafRun;

mod attrs;
mod fold;
mod text;

pub use attrs::{AttributeSource, HighlightLayer, PlainAttributes};
pub use fold::{FoldModel, FoldRunProducer};
pub use text::TextRunProducer;

/// Returned by [`RunProducer::next_run_start_offset`] when a producer has
/// nothing more to offer in this pass.
pub const NO_RUN: usize = usize::MAX;

/// Cooperative cancellation flag for the current generation pass.
#[derive(Debug, Clone, Default)]
pub struct StaleHandle(Arc<AtomicBool>);

impl StaleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running pass to abort and retry.
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
        tracing::trace!(target: "layout.builder", "stale_marked");
    }

    pub fn is_stale(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything a producer may consult while creating runs.
pub struct ProducerContext<'a> {
    pub text: &'a TextSnapshot,
    pub metrics: &'a dyn FontMetrics,
    pub stale: &'a StaleHandle,
}

pub trait RunProducer: Send {
    fn name(&self) -> &'static str;

    /// Higher weights win when several producers want the same offset.
    fn weight(&self) -> u32;

    /// Start a pass over `start..end`. With `materialize == false` only
    /// [`RunProducer::run_end_offset`] is called during the pass.
    fn restart(&mut self, ctx: &ProducerContext<'_>, start: usize, end: usize, materialize: bool);

    /// Lowest offset `>= offset` where this producer would start a run, or [`NO_RUN`].
    fn next_run_start_offset(&mut self, ctx: &ProducerContext<'_>, offset: usize) -> usize;

    /// Create a run starting exactly at `start`, or decline with `None`.
    ///
    /// `reuse` is an old run starting at `start` that may be returned (cloned)
    /// when it is still accurate; `reuse_end` is where that run ends, or where
    /// the next old run starts when there is no candidate. Cutting at
    /// `reuse_end` lets later old runs be reused.
    fn create_run(
        &mut self,
        ctx: &ProducerContext<'_>,
        start: usize,
        limit: usize,
        forced: bool,
        reuse: Option<&LeafRun>,
        reuse_end: usize,
    ) -> Option<LeafRun>;

    /// Estimation counterpart of [`RunProducer::create_run`]: where the run would end.
    fn run_end_offset(
        &mut self,
        ctx: &ProducerContext<'_>,
        start: usize,
        limit: usize,
        forced: bool,
    ) -> Option<usize>;

    /// Whether the run `start..end` just created closes its paragraph.
    fn ends_paragraph(&self, ctx: &ProducerContext<'_>, _start: usize, end: usize) -> bool {
        end > 0 && ctx.text.char_at(end - 1) == Some('\n')
    }

    /// Generation continues past the end declared in `restart`.
    fn continue_creation(&mut self, _ctx: &ProducerContext<'_>, _start: usize, _end: usize) {}

    fn finish_creation(&mut self) {}
}

//! Incremental rebuild engine.
//!
//! A transaction runs in three phases over a tree that is only read until
//! the last one:
//! 1. [`plan`]: find the paragraphs and runs the change touches, the offset
//!    generation starts from and the offset where it is expected to realign
//!    with untouched content. Old runs around the change are donated for
//!    reuse.
//! 2. [`generate`]: pull runs from the producers, grow the replaced span in
//!    whole runs or paragraphs while generation overruns it. A stale mark
//!    aborts the pass, leaving the tree as it was.
//! 3. [`commit`]: splice the result in and describe the change.

use std::ops::Range;
use std::sync::Arc;

use core_config::BuildConfig;
use core_events::PendingRegions;
use core_text::{Document, DocumentEvent, EditKind, FontMetrics, TextSnapshot};
use tracing::{debug, info, warn};

use crate::change::{ChangeDescriptor, RebuildCause};
use crate::document::DocumentNode;
use crate::error::{LayoutError, Result};
use crate::producer::{ProducerContext, RunProducer, StaleHandle};

mod commit;
mod generate;
mod plan;

pub(crate) use plan::{Damage, RebuildRequest};

pub struct RebuildEngine {
    producers: Vec<Box<dyn RunProducer>>,
    metrics: Arc<dyn FontMetrics>,
    build: BuildConfig,
}

/// Everything a transaction reads besides the tree.
pub(crate) struct Inputs<'a> {
    pub document: &'a Document,
    pub text: &'a TextSnapshot,
    pub stale: &'a StaleHandle,
}

impl RebuildEngine {
    pub fn new(mut producers: Vec<Box<dyn RunProducer>>, metrics: Arc<dyn FontMetrics>, build: BuildConfig) -> Self {
        producers.sort_by_key(|p| std::cmp::Reverse(p.weight()));
        Self {
            producers,
            metrics,
            build,
        }
    }

    pub fn metrics(&self) -> &Arc<dyn FontMetrics> {
        &self.metrics
    }

    pub fn producer_names(&self) -> Vec<&'static str> {
        self.producers.iter().map(|p| p.name()).collect()
    }

    /// Run `req` with the stale-retry policy. The tree is untouched on error.
    pub(crate) fn rebuild(
        &mut self,
        tree: &mut DocumentNode,
        inputs: &Inputs<'_>,
        req: RebuildRequest,
    ) -> Result<ChangeDescriptor> {
        let attempts = self.build.rebuild_attempts.max(1);
        let ctx = ProducerContext {
            text: inputs.text,
            metrics: self.metrics.as_ref(),
            stale: inputs.stale,
        };
        for attempt in 1..=attempts {
            let last = attempt == attempts;
            if last && attempt > 1 {
                warn!(target: "layout.builder", attempts, cause = ?req.cause, "stale_retry_exhausted");
            }
            inputs.stale.reset();
            let plan = plan::plan(tree, &req, &self.build);
            match generate::generate(tree, req.damage, plan, &mut self.producers, &ctx, last) {
                Ok(generated) => {
                    return Ok(commit::commit(
                        tree,
                        inputs.document,
                        generated,
                        &req,
                        self.metrics.char_width(),
                        self.metrics.row_height(),
                    ));
                }
                Err(LayoutError::StaleCreation) => {
                    debug!(target: "layout.builder", attempt, "stale_retry");
                }
                Err(err) => return Err(err),
            }
        }
        Err(LayoutError::StaleCreation)
    }

    /// Rebuild the whole region `region`.
    pub(crate) fn rebuild_all(
        &mut self,
        tree: &mut DocumentNode,
        inputs: &Inputs<'_>,
        region: Range<usize>,
    ) -> Result<ChangeDescriptor> {
        let req = RebuildRequest {
            cause: RebuildCause::FullRebuild,
            damage: Damage::region(region.clone()),
            region,
            materialize: None,
            paragraphs: None,
        };
        self.rebuild(tree, inputs, req)
    }

    /// Apply a document edit that already landed in `inputs.text`.
    /// Returns `None` when the edit lies outside the displayed region.
    pub(crate) fn apply_edit(
        &mut self,
        tree: &mut DocumentNode,
        inputs: &Inputs<'_>,
        event: &DocumentEvent,
    ) -> Result<Option<ChangeDescriptor>> {
        let region = tree.region();
        let (offset, length) = (event.offset, event.length);
        let after = region_after(region.clone(), event);
        let (damage, straddles) = match event.kind {
            _ if length == 0 => return Ok(None),
            EditKind::Insert if offset < region.start => {
                tree.set_region(after);
                return Ok(None);
            }
            EditKind::Insert if offset > region.end => return Ok(None),
            EditKind::Insert => (Damage::insert(offset, length), false),
            EditKind::Remove if offset + length <= region.start => {
                tree.set_region(after);
                return Ok(None);
            }
            EditKind::Remove if offset >= region.end => return Ok(None),
            EditKind::Remove => (
                Damage::remove(offset, length),
                offset < region.start || offset + length > region.end,
            ),
        };
        let cause = if straddles || tree.paragraph_count() == 0 {
            info!(target: "layout.builder", offset, length, "full_rebuild_fallback");
            RebuildCause::FullRebuild
        } else {
            RebuildCause::ModUpdate
        };
        let req = RebuildRequest {
            cause,
            damage,
            region: after,
            materialize: None,
            paragraphs: None,
        };
        self.rebuild(tree, inputs, req).map(Some)
    }

    /// Apply coalesced dirty regions, clamped to the displayed region.
    pub(crate) fn apply_regions(
        &mut self,
        tree: &mut DocumentNode,
        inputs: &Inputs<'_>,
        regions: PendingRegions,
    ) -> Result<Vec<ChangeDescriptor>> {
        let region = tree.region();
        if regions.full || tree.paragraph_count() == 0 {
            return Ok(vec![self.rebuild_all(tree, inputs, region)?]);
        }
        let clamp = |r: Range<usize>| {
            let start = r.start.clamp(region.start, region.end);
            let end = r.end.clamp(start, region.end);
            start..end
        };
        let mut out = Vec::new();
        for (cause, range) in [
            (RebuildCause::RebuildParagraphs, regions.paragraphs),
            (RebuildCause::CharRebuild, regions.chars),
        ] {
            let Some(range) = range.map(clamp).filter(|r| !r.is_empty()) else {
                continue;
            };
            let req = RebuildRequest {
                cause,
                damage: Damage::region(range),
                region: tree.region(),
                materialize: None,
                paragraphs: None,
            };
            out.push(self.rebuild(tree, inputs, req)?);
        }
        Ok(out)
    }

    /// Materialize the runs of paragraphs `range` that were built by estimation.
    pub(crate) fn ensure_children(
        &mut self,
        tree: &mut DocumentNode,
        inputs: &Inputs<'_>,
        range: Range<usize>,
    ) -> Result<Option<ChangeDescriptor>> {
        let range = range.start.min(tree.paragraph_count())..range.end.min(tree.paragraph_count());
        let Some(first) = range.clone().find(|&i| !tree.paragraphs()[i].has_children()) else {
            return Ok(None);
        };
        let Some(last) = range.rev().find(|&i| !tree.paragraphs()[i].has_children()) else {
            return Ok(None);
        };
        let span = tree.paragraph_range(first).start..tree.paragraph_range(last).end;
        let req = RebuildRequest {
            cause: RebuildCause::InitParagraphs,
            damage: Damage::region(span),
            region: tree.region(),
            materialize: Some(true),
            paragraphs: Some(first..last + 1),
        };
        self.rebuild(tree, inputs, req).map(Some)
    }
}

/// Where `region` lies once `event` landed. Removals overlapping a
/// boundary clamp it.
pub(crate) fn region_after(region: Range<usize>, event: &DocumentEvent) -> Range<usize> {
    let (offset, length) = (event.offset, event.length);
    match event.kind {
        EditKind::Insert => {
            let start = if offset < region.start { region.start + length } else { region.start };
            let end = if offset <= region.end { region.end + length } else { region.end };
            start..end
        }
        EditKind::Remove => {
            let end = offset + length;
            let map = |x: usize| {
                if x <= offset {
                    x
                } else if x >= end {
                    x - length
                } else {
                    offset
                }
            };
            map(region.start)..map(region.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EditKind, offset: usize, length: usize) -> DocumentEvent {
        DocumentEvent {
            kind,
            offset,
            length,
            version: 1,
        }
    }

    #[test]
    fn region_follows_edits() {
        let r = 10..20;
        assert_eq!(region_after(r.clone(), &event(EditKind::Insert, 2, 3)), 13..23);
        assert_eq!(region_after(r.clone(), &event(EditKind::Insert, 10, 3)), 10..23);
        assert_eq!(region_after(r.clone(), &event(EditKind::Insert, 20, 3)), 10..23);
        assert_eq!(region_after(r.clone(), &event(EditKind::Insert, 21, 3)), 10..20);
        assert_eq!(region_after(r.clone(), &event(EditKind::Remove, 0, 5)), 5..15);
        assert_eq!(region_after(r.clone(), &event(EditKind::Remove, 8, 4)), 8..16);
        assert_eq!(region_after(r.clone(), &event(EditKind::Remove, 18, 5)), 10..18);
        assert_eq!(region_after(r, &event(EditKind::Remove, 5, 30)), 5..5);
    }
}

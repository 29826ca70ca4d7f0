//! Public face of the layout tree.
//!
//! [`LayoutHierarchy`] owns the tree behind a [`PriorityMutex`], listens to
//! its document through a scoped subscription and receives dirty regions
//! through a [`DeferredDelivery`] worker. Every operation takes the document
//! read lock before the tree lock.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use core_config::{Config, IntegrityMode};
use core_events::{DeferredDelivery, DirtyNotice, PendingRegions, RegionSink};
use core_text::{Document, DocumentEvent, DocumentListener, FontMetrics, MonospaceMetrics, Subscription, TextSnapshot};
use tracing::{debug, error};

use crate::builder::{Inputs, RebuildEngine, region_after};
use crate::change::ChangeDescriptor;
use crate::check;
use crate::document::DocumentNode;
use crate::error::{LayoutError, Result};
use crate::lock::PriorityMutex;
use crate::paragraph::{Allocation, ParentView, RenderContext};
use crate::producer::{RunProducer, StaleHandle, TextRunProducer};
use crate::wrap::WrapSettings;

/// Position of an offset in tree coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub paragraph: usize,
    pub row: usize,
}

/// How to attach a hierarchy to a document.
pub struct HierarchyOptions {
    config: Config,
    metrics: Option<Arc<dyn FontMetrics>>,
    producers: Vec<Box<dyn RunProducer>>,
    region: Option<Range<usize>>,
    available_width: Option<f64>,
}

impl HierarchyOptions {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            metrics: None,
            producers: Vec::new(),
            region: None,
            available_width: None,
        }
    }

    pub fn metrics(mut self, metrics: Arc<dyn FontMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn producer(mut self, producer: Box<dyn RunProducer>) -> Self {
        self.producers.push(producer);
        self
    }

    /// Display only `region` of the document.
    pub fn region(mut self, region: Range<usize>) -> Self {
        self.region = Some(region);
        self
    }

    pub fn available_width(mut self, width: f64) -> Self {
        self.available_width = Some(width);
        self
    }
}

struct TreeState {
    tree: DocumentNode,
    engine: RebuildEngine,
    /// Document version the tree reflects.
    version: u64,
    changes: Vec<ChangeDescriptor>,
    stashed: Option<PendingRegions>,
    last_error: Option<LayoutError>,
}

struct Shared {
    document: Arc<Document>,
    state: PriorityMutex<TreeState>,
    incoming: AtomicBool,
    stale: StaleHandle,
    integrity: IntegrityMode,
}

impl Shared {
    fn inputs<'a>(&'a self, text: &'a TextSnapshot) -> Inputs<'a> {
        Inputs {
            document: &self.document,
            text,
            stale: &self.stale,
        }
    }

    fn after_commit(&self, state: &mut TreeState, text: &TextSnapshot) -> Result<()> {
        if cfg!(debug_assertions) {
            check::enforce(&state.tree, text, self.integrity)?;
        }
        Ok(())
    }

    fn record(&self, state: &mut TreeState, outcome: Result<Vec<ChangeDescriptor>>, text: &TextSnapshot) {
        match outcome {
            Ok(changes) => {
                state.changes.extend(changes);
                if let Err(err) = self.after_commit(state, text) {
                    state.last_error = Some(err);
                }
            }
            Err(err) => {
                error!(target: "layout.builder", %err, "rebuild_failed");
                state.last_error = Some(err);
            }
        }
    }

    fn on_edit(&self, event: &DocumentEvent, text: &TextSnapshot) {
        let _doc = self.document.read();
        let mut guard = self.state.lock_priority();
        let state = &mut *guard;
        if event.version <= state.version {
            self.incoming.store(false, Ordering::Release);
            return;
        }
        let inputs = self.inputs(text);
        let outcome = match state.engine.apply_edit(&mut state.tree, &inputs, event) {
            Ok(change) => Ok(change.into_iter().collect()),
            Err(err) => {
                error!(target: "layout.builder", %err, offset = event.offset, "edit_rebuild_failed");
                // Escalate: rebuild everything, or leave an empty tree rather than a wrong one.
                let region = region_after(state.tree.region(), event);
                match state.engine.rebuild_all(&mut state.tree, &inputs, region.clone()) {
                    Ok(change) => {
                        state.last_error = Some(err);
                        Ok(vec![change])
                    }
                    Err(again) => {
                        state.tree.clear(region);
                        Err(again)
                    }
                }
            }
        };
        state.version = event.version;
        self.record(state, outcome, text);
        self.incoming.store(false, Ordering::Release);
        if let Some(stashed) = state.stashed.take() {
            debug!(target: "layout.builder", ?stashed, "stashed_regions_applied");
            let outcome = state.engine.apply_regions(&mut state.tree, &inputs, stashed);
            self.record(state, outcome, text);
        }
    }

    fn on_regions(&self, regions: PendingRegions) {
        let doc = self.document.read();
        let text = doc.snapshot();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.version != text.version() {
            // The tree has not caught up with the document yet.
            match state.stashed.as_mut() {
                Some(stashed) => stashed.merge(regions),
                None => state.stashed = Some(regions),
            }
            return;
        }
        let inputs = self.inputs(&text);
        let outcome = state.engine.apply_regions(&mut state.tree, &inputs, regions);
        self.record(state, outcome, &text);
    }
}

struct EditBridge(Weak<Shared>);

impl DocumentListener for EditBridge {
    fn before_modification(&self, event: &DocumentEvent) {
        if let Some(shared) = self.0.upgrade() {
            shared.incoming.store(true, Ordering::Release);
            tracing::trace!(target: "layout.builder", offset = event.offset, "modification_incoming");
        }
    }

    fn after_modification(&self, event: &DocumentEvent, text: &TextSnapshot) {
        if let Some(shared) = self.0.upgrade() {
            shared.on_edit(event, text);
        }
    }
}

struct RegionBridge(Weak<Shared>);

impl RegionSink for RegionBridge {
    fn deliver(&self, regions: PendingRegions) {
        if let Some(shared) = self.0.upgrade() {
            shared.on_regions(regions);
        }
    }
}

pub struct LayoutHierarchy {
    shared: Arc<Shared>,
    delivery: DeferredDelivery,
    _subscription: Subscription,
}

impl LayoutHierarchy {
    /// Build the tree for `document` and start following its edits.
    pub fn attach(document: Arc<Document>, options: HierarchyOptions) -> Result<Self> {
        let HierarchyOptions {
            config,
            metrics,
            mut producers,
            region,
            available_width,
        } = options;
        let metrics = metrics.unwrap_or_else(|| {
            let m = config.metrics();
            Arc::new(MonospaceMetrics {
                char_width: m.char_width,
                row_height: m.row_height,
                ascent: m.ascent,
                tab_size: m.tab_size,
            })
        });
        if !producers.iter().any(|p| p.weight() == 0) {
            producers.push(Box::new(TextRunProducer::new(config.build().max_text_run_chars)));
        }
        let context = RenderContext {
            row_height: metrics.row_height(),
            ascent: metrics.ascent(),
            char_width: metrics.char_width(),
            available_width,
            wrap: config.wrap().enabled.then(|| WrapSettings::from(config.wrap())),
        };
        let engine = RebuildEngine::new(producers, metrics, config.build().clone());
        let shared = Arc::new(Shared {
            document: Arc::clone(&document),
            state: PriorityMutex::new(TreeState {
                tree: DocumentNode::new(0..0, context, config.build().gap_threshold),
                engine,
                version: 0,
                changes: Vec::new(),
                stashed: None,
                last_error: None,
            }),
            incoming: AtomicBool::new(false),
            stale: StaleHandle::new(),
            integrity: config.integrity(),
        });

        // Subscribe before the first build so no edit slips in between.
        let subscription = document.subscribe(Arc::new(EditBridge(Arc::downgrade(&shared))));
        {
            let doc = document.read();
            let text = doc.snapshot();
            let len = text.len_chars();
            let region = region.map_or(0..len, |r| r.start.min(len)..r.end.clamp(r.start.min(len), len));
            let mut guard = shared.state.lock_priority();
            let state = &mut *guard;
            state.tree.set_region(region.start..region.start);
            let change = state.engine.rebuild_all(&mut state.tree, &shared.inputs(&text), region)?;
            state.version = text.version();
            state.changes.push(change);
            shared.after_commit(state, &text)?;
            debug!(
                target: "layout.builder",
                paragraphs = state.tree.paragraph_count(),
                producers = ?state.engine.producer_names(),
                "hierarchy_attached"
            );
        }
        let sink: Arc<dyn RegionSink> = Arc::new(RegionBridge(Arc::downgrade(&shared)));
        let delivery = DeferredDelivery::spawn(config.coalesce_delay(), sink)
            .map_err(|e| LayoutError::Worker(e.to_string()))?;
        Ok(Self {
            shared,
            delivery,
            _subscription: subscription,
        })
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.shared.document
    }

    /// Queue a dirty region for deferred, coalesced application.
    pub fn notify(&self, notice: DirtyNotice) {
        self.delivery.mark(notice);
    }

    /// Apply queued regions now. Must not be called with the tree locked.
    pub fn flush_pending(&self) {
        self.delivery.flush();
    }

    /// Handle producers use to abort the running generation pass.
    pub fn stale_handle(&self) -> StaleHandle {
        self.shared.stale.clone()
    }

    pub fn is_modification_incoming(&self) -> bool {
        self.shared.incoming.load(Ordering::Acquire)
    }

    /// Run `f` on the tree under both locks. `f` sees the document text at
    /// the tree's version unless a modification is in flight.
    pub fn with_tree<R>(&self, f: impl FnOnce(&DocumentNode, &TextSnapshot) -> R) -> R {
        let doc = self.shared.document.read();
        let text = doc.snapshot();
        let state = self.shared.state.lock_priority();
        f(&state.tree, &text)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut TreeState, &Shared, &TextSnapshot) -> R) -> R {
        let doc = self.shared.document.read();
        let text = doc.snapshot();
        let mut guard = self.shared.state.lock_priority();
        if guard.version != text.version() {
            debug!(
                target: "layout.builder",
                tree = guard.version,
                document = text.version(),
                "query_during_modification"
            );
        }
        f(&mut *guard, &self.shared, &text)
    }

    pub fn rebuild_all(&self) -> Result<ChangeDescriptor> {
        self.with_state(|state, shared, text| {
            ensure_current(state, text)?;
            let region = state.tree.region();
            let change = state.engine.rebuild_all(&mut state.tree, &shared.inputs(text), region)?;
            state.changes.push(change.clone());
            shared.after_commit(state, text)?;
            Ok(change)
        })
    }

    /// Materialize the runs of every estimated paragraph overlapping `chars`.
    pub fn ensure_children(&self, chars: Range<usize>) -> Result<Option<ChangeDescriptor>> {
        self.with_state(|state, shared, text| {
            if lagging(state, text) {
                return Ok(None);
            }
            ensure_children(state, shared, text, chars)
        })
    }

    /// New container width. Only invalidates cached layout; the next
    /// [`LayoutHierarchy::ensure_layout`] re-measures.
    pub fn set_available_width(&self, width: Option<f64>) {
        self.with_state(|state, _, _| {
            let ctx = state.tree.context_mut();
            if ctx.available_width == width {
                return;
            }
            ctx.available_width = width;
            let wraps = ctx.wrap.is_some();
            if wraps {
                state.tree.invalidate_layout();
            }
            debug!(target: "layout.wrap", ?width, invalidated = wraps, "available_width_changed");
        });
    }

    /// Lay out every paragraph intersecting `y`, building runs first where needed.
    pub fn ensure_layout(&self, y: Range<f64>) -> Result<Option<ChangeDescriptor>> {
        self.with_state(|state, shared, text| {
            if lagging(state, text) {
                return Ok(None);
            }
            let Some(range) = paragraphs_in(&state.tree, y.clone()) else {
                return Ok(None);
            };
            let chars = state.tree.paragraph_start(range.start)..state.tree.paragraph_end(range.end - 1);
            ensure_children(state, shared, text, chars)?;
            let Some(range) = paragraphs_in(&state.tree, y) else {
                return Ok(None);
            };
            let change = state
                .tree
                .layout_paragraphs(range, text)
                .map(ChangeDescriptor::layout);
            state.changes.extend(change.clone());
            Ok(change)
        })
    }

    /// While an edit is in flight the answer comes from the old tree as is,
    /// estimated paragraphs included.
    pub fn offset_to_point(&self, offset: usize) -> Result<Point> {
        self.with_state(|state, shared, text| {
            let region = state.tree.region();
            if offset < region.start || offset > region.end {
                return Err(LayoutError::OutOfRange {
                    offset,
                    start: region.start,
                    end: region.end,
                });
            }
            let Some(i) = state.tree.paragraph_at_offset(offset) else {
                return Ok(Point { x: 0.0, y: 0.0, paragraph: 0, row: 0 });
            };
            if !lagging(state, text) {
                prepare(state, shared, text, i)?;
            }
            let tree = &state.tree;
            let ctx = tree.render_context();
            let p = &tree.paragraphs()[i];
            let local = offset.saturating_sub(tree.paragraph_start(i));
            let (row, x) = p.point_at(local, ctx.char_width);
            Ok(Point {
                x,
                y: tree.paragraph_y(i) + row as f64 * ctx.row_height,
                paragraph: i,
                row,
            })
        })
    }

    pub fn point_to_offset(&self, x: f64, y: f64) -> Result<usize> {
        self.with_state(|state, shared, text| {
            let Some(i) = state.tree.paragraph_at_y(y) else {
                return Ok(state.tree.region().start);
            };
            if !lagging(state, text) {
                prepare(state, shared, text, i)?;
            }
            let tree = &state.tree;
            let ctx = tree.render_context();
            let p = &tree.paragraphs()[i];
            let row = ((y - tree.paragraph_y(i)).max(0.0) / ctx.row_height) as usize;
            let row = row.min(p.row_count() - 1);
            Ok(tree.paragraph_start(i) + p.offset_at(row, x, ctx.char_width))
        })
    }

    pub fn child_allocation(&self, index: usize) -> Option<Allocation> {
        self.with_state(|state, _, _| state.tree.child_allocation(index))
    }

    pub fn preferred_size(&self) -> (f64, f64) {
        self.with_state(|state, _, _| state.tree.preferred_size())
    }

    pub fn paragraph_count(&self) -> usize {
        self.with_state(|state, _, _| state.tree.paragraph_count())
    }

    /// Drain change descriptors recorded since the last call.
    pub fn take_changes(&self) -> Vec<ChangeDescriptor> {
        self.with_state(|state, _, _| std::mem::take(&mut state.changes))
    }

    /// Last failure of a transaction that had no caller to report to.
    pub fn take_error(&self) -> Option<LayoutError> {
        self.with_state(|state, _, _| state.last_error.take())
    }

    /// Run the integrity validator regardless of build profile. Fails with
    /// [`LayoutError::ModificationPending`] while an edit is in flight.
    pub fn check(&self) -> Result<()> {
        self.with_state(|state, _, text| {
            ensure_current(state, text)?;
            check::verify(&state.tree, text, true).map_err(LayoutError::Integrity)
        })
    }

    pub fn dump(&self) -> String {
        self.with_state(|state, _, _| state.tree.dump())
    }
}

fn paragraphs_in(tree: &DocumentNode, y: Range<f64>) -> Option<Range<usize>> {
    let first = tree.paragraph_at_y(y.start)?;
    let last = tree.paragraph_at_y(y.end.max(y.start))?;
    Some(first..last + 1)
}

fn ensure_children(
    state: &mut TreeState,
    shared: &Shared,
    text: &TextSnapshot,
    chars: Range<usize>,
) -> Result<Option<ChangeDescriptor>> {
    let tree = &state.tree;
    let (Some(first), Some(last)) = (
        tree.paragraph_at_offset(chars.start),
        tree.paragraph_at_offset(chars.end.saturating_sub(1).max(chars.start)),
    ) else {
        return Ok(None);
    };
    let change = state
        .engine
        .ensure_children(&mut state.tree, &shared.inputs(text), first..last + 1)?;
    if let Some(change) = &change {
        state.changes.push(change.clone());
        shared.after_commit(state, text)?;
    }
    Ok(change)
}

/// The document moved past the tree and the edit listener has not run yet.
/// Until it does the tree must not be touched: its offsets describe the old
/// text.
fn lagging(state: &TreeState, text: &TextSnapshot) -> bool {
    state.version != text.version()
}

fn ensure_current(state: &TreeState, text: &TextSnapshot) -> Result<()> {
    if lagging(state, text) {
        return Err(LayoutError::ModificationPending {
            tree: state.version,
            document: text.version(),
        });
    }
    Ok(())
}

/// Make paragraph `index` answer geometry queries exactly.
fn prepare(state: &mut TreeState, shared: &Shared, text: &TextSnapshot, index: usize) -> Result<()> {
    let range = state.tree.paragraph_range(index);
    ensure_children(state, shared, text, range)?;
    if let Some(y) = state.tree.layout_paragraphs(index..index + 1, text) {
        state.changes.push(ChangeDescriptor::layout(y));
    }
    Ok(())
}

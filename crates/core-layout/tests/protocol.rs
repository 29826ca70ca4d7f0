mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use common::{Capture, attach, attach_with, config, paragraph_ranges, paragraph_texts};
use core_layout::{
    AttrId, HierarchyOptions, LayoutError, LeafRun, NO_RUN, Point, ProducerContext, RebuildCause, RunKind,
    RunProducer,
};
use core_text::Document;
use pretty_assertions::assert_eq;
use tracing::dispatcher::{Dispatch, with_default};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::Registry;

/// Never creates runs; marks the pass stale while its budget lasts.
struct StaleMarker {
    budget: Arc<AtomicUsize>,
    restarts: Arc<AtomicUsize>,
}

impl RunProducer for StaleMarker {
    fn name(&self) -> &'static str {
        "stale-marker"
    }

    fn weight(&self) -> u32 {
        5
    }

    fn restart(&mut self, ctx: &ProducerContext<'_>, _start: usize, _end: usize, _materialize: bool) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        let left = self.budget.load(Ordering::SeqCst);
        if left > 0 {
            self.budget.store(left - 1, Ordering::SeqCst);
            ctx.stale.mark();
        }
    }

    fn next_run_start_offset(&mut self, _ctx: &ProducerContext<'_>, _offset: usize) -> usize {
        NO_RUN
    }

    fn create_run(
        &mut self,
        _ctx: &ProducerContext<'_>,
        _start: usize,
        _limit: usize,
        _forced: bool,
        _reuse: Option<&LeafRun>,
        _reuse_end: usize,
    ) -> Option<LeafRun> {
        None
    }

    fn run_end_offset(&mut self, _ctx: &ProducerContext<'_>, _start: usize, _limit: usize, _forced: bool) -> Option<usize> {
        None
    }
}

/// Once armed, claims every offset and returns empty runs.
struct Greedy {
    armed: Arc<AtomicBool>,
}

impl RunProducer for Greedy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn weight(&self) -> u32 {
        7
    }

    fn restart(&mut self, _ctx: &ProducerContext<'_>, _start: usize, _end: usize, _materialize: bool) {}

    fn next_run_start_offset(&mut self, _ctx: &ProducerContext<'_>, offset: usize) -> usize {
        if self.armed.load(Ordering::SeqCst) { offset } else { NO_RUN }
    }

    fn create_run(
        &mut self,
        _ctx: &ProducerContext<'_>,
        _start: usize,
        _limit: usize,
        _forced: bool,
        _reuse: Option<&LeafRun>,
        _reuse_end: usize,
    ) -> Option<LeafRun> {
        Some(LeafRun::with_width(RunKind::Text, 0, 0.0, AttrId(0), 0, None))
    }

    fn run_end_offset(&mut self, _ctx: &ProducerContext<'_>, start: usize, _limit: usize, _forced: bool) -> Option<usize> {
        Some(start)
    }
}

fn stale_marker(budget: usize) -> (Box<dyn RunProducer>, Arc<AtomicUsize>) {
    let restarts = Arc::new(AtomicUsize::new(0));
    let producer = StaleMarker {
        budget: Arc::new(AtomicUsize::new(budget)),
        restarts: restarts.clone(),
    };
    (Box::new(producer), restarts)
}

#[test]
fn stale_pass_is_retried() {
    let (producer, restarts) = stale_marker(1);
    let (_doc, h) = attach_with("ab\ncd\n", HierarchyOptions::new(config("")).producer(producer));
    assert_eq!(restarts.load(Ordering::SeqCst), 2);
    assert_eq!(paragraph_ranges(&h), vec![0..3, 3..6]);
    h.check().unwrap();
}

#[test]
fn last_attempt_ignores_staleness() {
    let (producer, restarts) = stale_marker(100);
    let capture = Capture::default();
    let dispatch = Dispatch::new(Registry::default().with(capture.clone()));
    let (_doc, h) = with_default(&dispatch, || {
        attach_with("ab\ncd\n", HierarchyOptions::new(config("")).producer(producer))
    });
    assert_eq!(restarts.load(Ordering::SeqCst), 3);
    assert!(capture.saw("layout.builder", "stale_retry_exhausted"));
    assert_eq!(paragraph_texts(&h), vec!["ab\n", "cd\n"]);
    h.check().unwrap();
}

#[test]
fn contract_violation_leaves_tree_untouched() {
    let armed = Arc::new(AtomicBool::new(false));
    let options = HierarchyOptions::new(config("")).producer(Box::new(Greedy { armed: armed.clone() }));
    let (doc, h) = attach_with("ab\ncd\n", options);
    let before = h.dump();

    armed.store(true, Ordering::SeqCst);
    let err = h.rebuild_all().unwrap_err();
    assert!(
        matches!(err, LayoutError::ContractViolation { producer: "greedy", offset: 0, .. }),
        "{err}"
    );
    assert_eq!(h.dump(), before);

    // An edit nobody can build leaves an empty tree and a recorded error.
    doc.insert(1, "x").unwrap();
    assert!(matches!(h.take_error(), Some(LayoutError::ContractViolation { .. })));
    assert_eq!(h.paragraph_count(), 0);

    armed.store(false, Ordering::SeqCst);
    h.rebuild_all().unwrap();
    assert_eq!(paragraph_texts(&h), vec!["axb\n", "cd\n"]);
    h.check().unwrap();
}

#[test]
fn large_rebuilds_estimate_until_children_are_needed() {
    let text: String = (0..5).map(|i| format!("line{i}\n")).collect();
    let (doc, h) = attach(&text, config("[build]\nmax_chars_for_local_runs = 8\n"));
    let built = |h: &core_layout::LayoutHierarchy| {
        h.with_tree(|tree, _| tree.paragraphs().iter().map(|p| p.has_children()).collect::<Vec<_>>())
    };
    assert_eq!(paragraph_ranges(&h), vec![0..6, 6..12, 12..18, 18..24, 24..30]);
    assert_eq!(built(&h), vec![false; 5]);
    h.take_changes();

    let change = h.ensure_children(6..12).unwrap().unwrap();
    assert_eq!(change.cause, Some(RebuildCause::InitParagraphs));
    assert_eq!(change.chars, Some(6..12));
    assert_eq!(change.y, None);
    assert_eq!(built(&h), vec![false, true, false, false, false]);
    assert_eq!(h.ensure_children(6..12).unwrap(), None);

    assert_eq!(
        h.offset_to_point(20).unwrap(),
        Point {
            x: 14.0,
            y: 48.0,
            paragraph: 3,
            row: 0
        }
    );
    assert_eq!(built(&h), vec![false, true, false, true, false]);

    doc.insert(26, "x").unwrap();
    assert_eq!(built(&h), vec![false, true, false, true, true]);
    assert_eq!(paragraph_ranges(&h)[4], 24..31);
    h.check().unwrap();
}

#[test]
fn dropping_the_hierarchy_unsubscribes() {
    let doc = Arc::new(Document::new("ab\n"));
    let h = core_layout::LayoutHierarchy::attach(doc.clone(), HierarchyOptions::new(config(""))).unwrap();
    assert_eq!(doc.listener_count(), 1);
    drop(h);
    assert_eq!(doc.listener_count(), 0);
    doc.insert(0, "x").unwrap();
}

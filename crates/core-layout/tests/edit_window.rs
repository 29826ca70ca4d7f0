mod common;

use std::sync::{Arc, Mutex, OnceLock, Weak};

use common::{config, paragraph_ranges};
use core_layout::{HierarchyOptions, LayoutError, LayoutHierarchy, Point};
use core_text::{Document, DocumentEvent, DocumentListener, TextSnapshot};
use pretty_assertions::assert_eq;

/// What the hierarchy answered while the document was ahead of it.
#[derive(Debug, Default)]
struct Answers {
    point: Option<Result<Point, LayoutError>>,
    offset: Option<Result<usize, LayoutError>>,
    children: Option<bool>,
    rebuild: Option<LayoutError>,
    check: Option<LayoutError>,
    paragraphs: usize,
}

/// Registered before the hierarchy, so it runs first after every edit.
#[derive(Default)]
struct EarlyQuery {
    hierarchy: OnceLock<Weak<LayoutHierarchy>>,
    answers: Mutex<Answers>,
}

impl DocumentListener for EarlyQuery {
    fn before_modification(&self, _event: &DocumentEvent) {}

    fn after_modification(&self, _event: &DocumentEvent, _text: &TextSnapshot) {
        let Some(h) = self.hierarchy.get().and_then(Weak::upgrade) else {
            return;
        };
        let mut answers = self.answers.lock().unwrap();
        answers.point = Some(h.offset_to_point(50));
        answers.offset = Some(h.point_to_offset(14.0, 40.0));
        answers.children = Some(h.ensure_children(0..2700).unwrap().is_some());
        answers.rebuild = h.rebuild_all().err();
        answers.check = h.check().err();
        answers.paragraphs = h.paragraph_count();
    }
}

fn lines(n: usize) -> String {
    (0..n).map(|i| format!("line {i:03}\n")).collect()
}

#[test]
fn queries_between_edit_stages_leave_the_tree_alone() {
    // 2700 chars: the initial build only estimates paragraphs.
    let text = lines(300);
    let doc = Arc::new(Document::new(&text));
    let early = Arc::new(EarlyQuery::default());
    let _sub = doc.subscribe(early.clone());
    let h = Arc::new(LayoutHierarchy::attach(Arc::clone(&doc), HierarchyOptions::new(config(""))).unwrap());
    let _ = early.hierarchy.set(Arc::downgrade(&h));

    doc.insert(2, "XYZ\n").unwrap();

    {
        let answers = early.answers.lock().unwrap();
        // Answered from the old tree: offset 50 is in "line 005\n" at 45..54.
        let point = answers.point.clone().unwrap().unwrap();
        assert_eq!(point, Point { x: 35.0, y: 80.0, paragraph: 5, row: 0 });
        assert_eq!(answers.offset.clone().unwrap().unwrap(), 20);
        assert_eq!(answers.children, Some(false));
        assert!(matches!(
            answers.rebuild,
            Some(LayoutError::ModificationPending { tree: 0, document: 1 })
        ));
        assert!(matches!(answers.check, Some(LayoutError::ModificationPending { .. })));
        assert_eq!(answers.paragraphs, 300);
    }

    assert_eq!(h.take_error(), None);
    h.check().unwrap();
    let ranges = paragraph_ranges(&h);
    assert_eq!(ranges.len(), 301);
    assert_eq!(&ranges[..3], &[0..6, 6..13, 13..22]);
    assert_eq!(ranges[300], 2695..2704);

    // Once caught up the same query materializes and answers exactly.
    // Offset 50 now sits one char into "line 005\n" at 49..58.
    let point = h.offset_to_point(50).unwrap();
    assert_eq!(point, Point { x: 7.0, y: 96.0, paragraph: 6, row: 0 });
    h.check().unwrap();
}

#[test]
fn queries_between_edit_stages_on_a_built_tree() {
    let doc = Arc::new(Document::new("abc\ndef\n"));
    let early = Arc::new(EarlyQuery::default());
    let _sub = doc.subscribe(early.clone());
    let h = Arc::new(LayoutHierarchy::attach(Arc::clone(&doc), HierarchyOptions::new(config(""))).unwrap());
    let _ = early.hierarchy.set(Arc::downgrade(&h));

    doc.remove(3, 1).unwrap();

    assert_eq!(early.answers.lock().unwrap().paragraphs, 2);
    assert_eq!(h.take_error(), None);
    h.check().unwrap();
    assert_eq!(paragraph_ranges(&h), vec![0..7]);
}

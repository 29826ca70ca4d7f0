#![allow(dead_code)] // Shared across integration test binaries; each uses a subset.

use std::ops::Range;
use std::sync::{Arc, Mutex};

use core_config::Config;
use core_layout::{HierarchyOptions, LayoutHierarchy, RunId};
use core_text::Document;
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Default config with strict integrity checks and the given TOML overrides.
pub fn config(extra: &str) -> Config {
    let toml = format!("[check]\nintegrity = \"strict\"\n{extra}");
    Config::from_toml_str(&toml).unwrap()
}

pub fn attach(text: &str, config: Config) -> (Arc<Document>, LayoutHierarchy) {
    attach_with(text, HierarchyOptions::new(config))
}

pub fn attach_with(text: &str, options: HierarchyOptions) -> (Arc<Document>, LayoutHierarchy) {
    let doc = Arc::new(Document::new(text));
    let hierarchy = LayoutHierarchy::attach(Arc::clone(&doc), options).unwrap();
    (doc, hierarchy)
}

pub fn paragraph_ranges(h: &LayoutHierarchy) -> Vec<Range<usize>> {
    h.with_tree(|tree, _| (0..tree.paragraph_count()).map(|i| tree.paragraph_range(i)).collect())
}

pub fn paragraph_texts(h: &LayoutHierarchy) -> Vec<String> {
    h.with_tree(|tree, text| {
        (0..tree.paragraph_count())
            .map(|i| text.slice(tree.paragraph_range(i)))
            .collect()
    })
}

pub fn run_ids(h: &LayoutHierarchy, paragraph: usize) -> Vec<RunId> {
    h.with_tree(|tree, _| tree.paragraphs()[paragraph].runs().iter().map(|r| r.id()).collect())
}

pub fn all_run_ids(h: &LayoutHierarchy) -> Vec<RunId> {
    h.with_tree(|tree, _| {
        tree.paragraphs()
            .iter()
            .flat_map(|p| p.runs().iter().map(|r| r.id()))
            .collect()
    })
}

/// Paragraph-local row ranges of a wrapped paragraph; one row when unwrapped.
pub fn rows(h: &LayoutHierarchy, paragraph: usize) -> Vec<Range<usize>> {
    h.with_tree(|tree, _| {
        let p = &tree.paragraphs()[paragraph];
        p.wrap_info().map_or_else(|| vec![0..p.length()], |w| w.row_ranges())
    })
}

/// Records `target: message` for every event.
#[derive(Clone, Default)]
pub struct Capture {
    events: Arc<Mutex<Vec<String>>>,
}

impl Capture {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn saw(&self, target: &str, message: &str) -> bool {
        let needle = format!("{target}: {message}");
        self.events().iter().any(|e| e == &needle)
    }
}

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::always()
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        let line = format!("{}: {}", event.metadata().target(), visitor.0.unwrap_or_default());
        self.events.lock().unwrap().push(line);
    }
}

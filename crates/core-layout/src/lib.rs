//! Incrementally maintained visual-line layout tree.
//!
//! The tree has two levels under a [`DocumentNode`]: [`ParagraphNode`]s
//! (usually one source line each) owning [`LeafRun`]s. Both levels keep
//! cumulative offsets and visual positions in a [`NodeList`] whose gap index
//! makes local edits cheap. Edits and dirty regions go through the
//! [`builder`] engine, which regenerates the smallest span it can while
//! reusing runs that did not change. Wrapping into rows is computed lazily
//! per paragraph by [`wrap::partition`].

pub mod builder;
pub mod change;
pub mod check;
pub mod document;
pub mod error;
pub mod gap;
pub mod hierarchy;
pub mod lock;
pub mod node_list;
pub mod paragraph;
pub mod producer;
pub mod run;
pub mod wrap;

pub use builder::RebuildEngine;
pub use change::{ChangeDescriptor, RebuildCause, YChange};
pub use document::DocumentNode;
pub use error::{LayoutError, Result};
pub use hierarchy::{HierarchyOptions, LayoutHierarchy, Point};
pub use lock::PriorityMutex;
pub use node_list::{GapNode, NodeList};
pub use paragraph::{Allocation, ParagraphFlags, ParagraphNode, ParentView, RenderContext};
pub use producer::{
    AttributeSource, FoldModel, FoldRunProducer, HighlightLayer, NO_RUN, PlainAttributes, ProducerContext,
    RunProducer, StaleHandle, TextRunProducer,
};
pub use run::{AttrId, LeafRun, RunId, RunKind, ShapedText};
pub use wrap::{Fragment, WrapInfo, WrapLine, WrapSettings};

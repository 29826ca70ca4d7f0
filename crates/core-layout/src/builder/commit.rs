//! Splice a generated pass into the tree.

use core_text::{Bias, Document};

use crate::change::{ChangeDescriptor, YChange};
use crate::document::DocumentNode;
use crate::paragraph::ParagraphNode;

use super::generate::Generated;
use super::plan::RebuildRequest;

/// Measurements of a removed paragraph that a new one with the same span inherits.
struct Removed {
    start: Option<usize>,
    length: usize,
    height: f64,
    width: f64,
}

pub(crate) fn commit(
    tree: &mut DocumentNode,
    document: &Document,
    generated: Generated,
    req: &RebuildRequest,
    char_width: f64,
    row_height: f64,
) -> ChangeDescriptor {
    let Generated {
        start_creation,
        match_offset,
        first,
        mut remove,
        built,
    } = generated;
    let n = tree.paragraph_count();
    let i0 = first.as_ref().map_or(remove.start, |f| f.para);
    let y0 = if i0 < n { tree.paragraph_y(i0) } else { tree.height() };
    let old_end = remove.end.max(i0 + usize::from(first.is_some()));
    let old_height: f64 = (i0..old_end).map(|i| tree.paragraphs()[i].height()).sum();
    let old_count = old_end - i0;

    let mut widest_removed = 0.0f64;
    let mut keep_first = None;
    if let Some(f) = first {
        let para = &tree.paragraphs()[f.para];
        widest_removed = para.width();
        if f.keep == 0 && f.runs.is_empty() && f.remove_end == para.runs().len() {
            remove.start = f.para;
        } else {
            keep_first = Some(f);
        }
    }

    // Measured before anything moves: offsets are still pre-change.
    let removed: Vec<Removed> = remove
        .clone()
        .map(|i| {
            let p = &tree.paragraphs()[i];
            widest_removed = widest_removed.max(p.width());
            Removed {
                start: req.damage.post_start(tree.paragraph_start(i), tree.paragraph_end(i)),
                length: p.length(),
                height: p.height(),
                width: p.width(),
            }
        })
        .collect();

    let keeps_first = keep_first.is_some();
    if let Some(f) = keep_first {
        tree.paragraphs_mut()
            .update(f.para, |p| p.replace_runs(f.keep, f.remove_end - f.keep, f.runs));
    }

    let threshold = tree.gap_threshold();
    let mut old = removed.iter().peekable();
    let nodes: Vec<ParagraphNode> = built
        .into_iter()
        .map(|np| {
            let anchor = np
                .anchor
                .unwrap_or_else(|| document.anchor_unchecked(np.start, Bias::Backward));
            let mut node = match np.runs {
                Some(runs) => ParagraphNode::built(anchor, runs, threshold, row_height),
                None => ParagraphNode::estimated(anchor, np.length, char_width, threshold, row_height),
            };
            while old.peek().is_some_and(|r| r.start.is_none_or(|s| s < np.start)) {
                old.next();
            }
            if let Some(r) = old.peek().filter(|r| r.start == Some(np.start) && r.length == np.length) {
                node.set_height(r.height);
                node.set_estimated_width(r.width);
                old.next();
            }
            node
        })
        .collect();

    let new_count = nodes.len() + usize::from(keeps_first);
    let built_count = nodes.len();
    let new_widest = nodes.iter().map(ParagraphNode::width).fold(0.0, f64::max);
    tree.paragraphs_mut().replace(remove.start, remove.len(), nodes);
    tree.set_region(req.region.clone());

    let first_width = if keeps_first { tree.paragraphs()[i0].width() } else { 0.0 };
    if widest_removed >= tree.width() {
        tree.recompute_width();
    } else {
        tree.set_width(tree.width().max(new_widest).max(first_width));
    }

    let new_height: f64 = (i0..i0 + new_count).map(|i| tree.paragraphs()[i].height()).sum();
    let delta = new_height - old_height;
    let y = (delta != 0.0 || old_count != new_count || new_count > 1).then_some(YChange {
        y0,
        y1: y0 + old_height,
        delta,
    });
    let end = if keeps_first && built_count == 0 && remove.is_empty() {
        tree.paragraph_end(i0)
    } else {
        match_offset
    };
    tracing::debug!(
        target: "layout.builder",
        cause = ?req.cause,
        start = start_creation,
        end,
        removed = old_count,
        added = new_count,
        delta,
        "rebuild_committed"
    );
    ChangeDescriptor::rebuild(req.cause, start_creation..end, y)
}

//! Span computation: which part of the tree a transaction replaces.

use std::ops::Range;

use core_config::BuildConfig;
use core_text::Anchor;

use crate::change::RebuildCause;
use crate::document::DocumentNode;
use crate::run::LeafRun;

/// Text damage of one transaction in absolute offsets.
///
/// `start..end_pre` is the affected range before the change and
/// `start..end_post` after it; everything at or above `end_pre` moves by
/// `shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Damage {
    pub start: usize,
    pub end_pre: usize,
    pub shift: isize,
    pub end_post: usize,
    pub text_changed: bool,
}

impl Damage {
    pub fn insert(offset: usize, length: usize) -> Self {
        Self {
            start: offset,
            end_pre: offset,
            shift: length as isize,
            end_post: offset + length,
            text_changed: true,
        }
    }

    pub fn remove(offset: usize, length: usize) -> Self {
        Self {
            start: offset,
            end_pre: offset + length,
            shift: -(length as isize),
            end_post: offset,
            text_changed: true,
        }
    }

    /// Attributes or structure changed over `range`, text did not.
    pub fn region(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end_pre: range.end,
            shift: 0,
            end_post: range.end,
            text_changed: false,
        }
    }

    /// Post-change start of old content `pre_start..pre_end`, or `None`
    /// when the change touched it.
    pub fn post_start(&self, pre_start: usize, pre_end: usize) -> Option<usize> {
        if !self.text_changed || pre_end <= self.start {
            Some(pre_start)
        } else if pre_start >= self.end_pre {
            Some(pre_start.wrapping_add_signed(self.shift))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RebuildRequest {
    pub cause: RebuildCause,
    pub damage: Damage,
    /// Region the tree displays once the transaction commits.
    pub region: Range<usize>,
    pub materialize: Option<bool>,
    /// Explicit paragraph range (lazy initialization).
    pub paragraphs: Option<Range<usize>>,
}

/// Runs of the first affected paragraph replaced in place: the node keeps
/// its identity and runs `keep..remove_end` give way to `runs`.
#[derive(Debug)]
pub(crate) struct FirstReplace {
    pub para: usize,
    pub keep: usize,
    pub remove_end: usize,
    pub closed: bool,
    pub runs: Vec<LeafRun>,
}

#[derive(Debug)]
pub(crate) struct Plan {
    pub materialize: bool,
    pub start_creation: usize,
    pub match_offset: usize,
    pub region_end: usize,
    pub first: Option<FirstReplace>,
    /// Old paragraphs replaced wholesale.
    pub remove: Range<usize>,
    pub donated_runs: Vec<(usize, LeafRun)>,
    pub donated_anchors: Vec<Anchor>,
}

impl Plan {
    /// Offer the runs `runs` of old paragraph `index` (and its anchor when
    /// `with_anchor`) for reuse.
    pub fn donate(
        &mut self,
        tree: &DocumentNode,
        damage: &Damage,
        index: usize,
        runs: Range<usize>,
        with_anchor: bool,
    ) {
        donate_into(&mut self.donated_runs, self.materialize, tree, damage, index, runs);
        if with_anchor {
            self.donated_anchors.push(tree.paragraphs()[index].anchor().clone());
        }
    }
}

/// Push post-change starts of the runs `runs` of old paragraph `index`.
pub(crate) fn donate_into(
    out: &mut Vec<(usize, LeafRun)>,
    materialize: bool,
    tree: &DocumentNode,
    damage: &Damage,
    index: usize,
    runs: Range<usize>,
) {
    if !materialize {
        return;
    }
    let p = &tree.paragraphs()[index];
    if !p.has_children() {
        return;
    }
    let base = tree.paragraph_start(index);
    let list = p.runs();
    for k in runs {
        let pre_start = base + list.start_offset(k);
        let pre_end = base + list.end_offset(k);
        if let Some(post) = damage.post_start(pre_start, pre_end) {
            out.push((post, list[k].clone()));
        }
    }
}

pub(crate) fn plan(tree: &DocumentNode, req: &RebuildRequest, build: &BuildConfig) -> Plan {
    let n = tree.paragraph_count();
    let dmg = req.damage;
    if req.cause == RebuildCause::FullRebuild || n == 0 {
        let region = req.region.clone();
        let materialize = req
            .materialize
            .unwrap_or(build.accurate_span || region.len() <= build.max_chars_for_local_runs);
        let mut plan = Plan {
            materialize,
            start_creation: region.start,
            match_offset: region.end,
            region_end: region.end,
            first: None,
            remove: 0..n,
            donated_runs: Vec::new(),
            donated_anchors: Vec::new(),
        };
        for i in 0..n {
            let runs = 0..tree.paragraphs()[i].runs().len();
            plan.donate(tree, &dmg, i, runs, true);
        }
        return plan;
    }

    if let Some(range) = req.paragraphs.clone() {
        let range = range.start.min(n)..range.end.min(n);
        let mut plan = Plan {
            materialize: req.materialize.unwrap_or(true),
            start_creation: tree.paragraph_start(range.start.min(n - 1)),
            match_offset: if range.is_empty() {
                tree.paragraph_start(range.start.min(n - 1))
            } else {
                tree.paragraph_end(range.end - 1)
            },
            region_end: req.region.end,
            first: None,
            remove: range.clone(),
            donated_runs: Vec::new(),
            donated_anchors: Vec::new(),
        };
        for i in range {
            let runs = 0..tree.paragraphs()[i].runs().len();
            plan.donate(tree, &dmg, i, runs, true);
        }
        return plan;
    }

    let ps = tree.paragraph_at_offset(dmg.start).unwrap_or(0);
    let mut pe = if dmg.end_pre > dmg.start {
        tree.paragraph_at_offset(dmg.end_pre - 1).unwrap_or(ps).max(ps)
    } else {
        ps
    };
    // Removing a terminator merges the next paragraph in.
    if dmg.text_changed && dmg.shift < 0 && dmg.end_pre == tree.paragraph_end(pe) && pe + 1 < n {
        pe += 1;
    }
    let ps_start = tree.paragraph_start(ps);
    let end_creation = dmg.end_post + tree.paragraph_end(pe).saturating_sub(dmg.end_pre);
    let materialize = req.materialize.unwrap_or(
        build.accurate_span || end_creation.saturating_sub(ps_start) <= build.max_chars_for_local_runs,
    );
    let para = &tree.paragraphs()[ps];
    let local = materialize
        && para.has_children()
        && !para.runs().is_empty()
        && matches!(req.cause, RebuildCause::ModUpdate | RebuildCause::CharRebuild);

    let mut plan = Plan {
        materialize,
        start_creation: ps_start,
        match_offset: end_creation,
        region_end: req.region.end,
        first: None,
        remove: ps..pe + 1,
        donated_runs: Vec::new(),
        donated_anchors: Vec::new(),
    };

    if !local {
        for i in ps..=pe {
            let runs = 0..tree.paragraphs()[i].runs().len();
            plan.donate(tree, &dmg, i, runs, true);
        }
        return plan;
    }

    let runs = para.runs();
    let l_start = dmg.start.saturating_sub(ps_start);
    let mut li = runs.index_at_offset(l_start).unwrap_or(0);
    while li > 0 && l_start.saturating_sub(runs.start_offset(li)) < build.look_back_tolerance {
        li -= 1;
    }
    plan.start_creation = ps_start + runs.start_offset(li);

    let remove_end = if pe == ps {
        let le = dmg.end_pre - ps_start;
        let ri = runs.index_at_offset(le).unwrap_or(0).max(li);
        if le > runs.start_offset(ri) {
            plan.match_offset = (ps_start + runs.end_offset(ri)).wrapping_add_signed(dmg.shift);
            ri + 1
        } else {
            plan.match_offset = dmg.end_post;
            ri
        }
    } else {
        runs.len()
    };
    plan.remove = ps + 1..pe + 1;
    plan.donate(tree, &dmg, ps, li..remove_end, false);
    for i in ps + 1..=pe {
        let runs = 0..tree.paragraphs()[i].runs().len();
        plan.donate(tree, &dmg, i, runs, true);
    }
    plan.first = Some(FirstReplace {
        para: ps,
        keep: li,
        remove_end,
        closed: false,
        runs: Vec::new(),
    });
    plan
}

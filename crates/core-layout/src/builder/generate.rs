//! Generation loop: pull runs from producers until the new content
//! realigns with the old tree.

use std::collections::VecDeque;
use std::ops::Range;

use core_text::Anchor;

use crate::document::DocumentNode;
use crate::error::{LayoutError, Result};
use crate::producer::{NO_RUN, ProducerContext, RunProducer};
use crate::run::LeafRun;

use super::plan::{Damage, FirstReplace, Plan, donate_into};

/// Old runs offered for reuse, keyed by post-change start.
#[derive(Debug, Default)]
pub(crate) struct ReuseCursor {
    entries: VecDeque<(usize, LeafRun)>,
}

impl ReuseCursor {
    pub fn extend(&mut self, runs: Vec<(usize, LeafRun)>) {
        for (start, run) in runs {
            if self.entries.back().is_some_and(|(last, _)| *last >= start) {
                continue;
            }
            self.entries.push_back((start, run));
        }
    }

    /// Candidate starting exactly at `creation` and where it ends; without a
    /// candidate, where the next old run starts.
    pub fn at(&mut self, creation: usize) -> (Option<LeafRun>, usize) {
        while self.entries.front().is_some_and(|(s, _)| *s < creation) {
            self.entries.pop_front();
        }
        match self.entries.front() {
            Some((s, run)) if *s == creation => (Some(run.clone()), creation + run.length()),
            Some((s, _)) => (None, *s),
            None => (None, NO_RUN),
        }
    }
}

/// A paragraph produced by the pass.
#[derive(Debug)]
pub(crate) struct NewParagraph {
    pub start: usize,
    pub length: usize,
    pub anchor: Option<Anchor>,
    pub runs: Option<Vec<LeafRun>>,
}

#[derive(Debug)]
pub(crate) struct Generated {
    pub start_creation: usize,
    pub match_offset: usize,
    pub first: Option<FirstReplace>,
    pub remove: Range<usize>,
    pub built: Vec<NewParagraph>,
}

struct Pass<'a> {
    tree: &'a DocumentNode,
    damage: Damage,
    materialize: bool,
    start_creation: usize,
    creation: usize,
    match_offset: usize,
    region_end: usize,
    first: Option<FirstReplace>,
    remove: Range<usize>,
    reuse: ReuseCursor,
    anchors: VecDeque<Anchor>,
    open: Option<NewParagraph>,
    built: Vec<NewParagraph>,
    next_starts: Vec<usize>,
}

fn violation(producer: &'static str, offset: usize, detail: String) -> LayoutError {
    LayoutError::ContractViolation {
        producer,
        offset,
        detail,
    }
}

/// Run one generation pass over `plan`. Producers are in descending weight.
pub(crate) fn generate(
    tree: &DocumentNode,
    damage: Damage,
    plan: Plan,
    producers: &mut [Box<dyn RunProducer>],
    ctx: &ProducerContext<'_>,
    ignore_stale: bool,
) -> Result<Generated> {
    let mut reuse = ReuseCursor::default();
    reuse.extend(plan.donated_runs);
    let mut pass = Pass {
        tree,
        damage,
        materialize: plan.materialize,
        start_creation: plan.start_creation,
        creation: plan.start_creation,
        match_offset: plan.match_offset,
        region_end: plan.region_end,
        first: plan.first,
        remove: plan.remove,
        reuse,
        anchors: plan.donated_anchors.into(),
        open: None,
        built: Vec::new(),
        next_starts: Vec::with_capacity(producers.len()),
    };
    tracing::trace!(
        target: "layout.builder",
        start = pass.start_creation,
        match_offset = pass.match_offset,
        materialize = pass.materialize,
        local = pass.first.is_some(),
        "generation_start"
    );
    let out = pass.run(producers, ctx, ignore_stale);
    for p in producers.iter_mut() {
        p.finish_creation();
    }
    out?;
    Ok(Generated {
        start_creation: pass.start_creation,
        match_offset: pass.match_offset,
        first: pass.first,
        remove: pass.remove,
        built: pass.built,
    })
}

impl Pass<'_> {
    fn run(
        &mut self,
        producers: &mut [Box<dyn RunProducer>],
        ctx: &ProducerContext<'_>,
        ignore_stale: bool,
    ) -> Result<()> {
        for p in producers.iter_mut() {
            p.restart(ctx, self.start_creation, self.match_offset, self.materialize);
            let next = p.next_run_start_offset(ctx, self.start_creation);
            if next < self.start_creation {
                return Err(violation(
                    p.name(),
                    self.start_creation,
                    format!("next run start {next} below requested offset"),
                ));
            }
            self.next_starts.push(next);
        }
        loop {
            if self.creation >= self.match_offset {
                if !self.keep_going(producers, ctx) {
                    break;
                }
                continue;
            }
            let (end, run, eol) = self.produce(producers, ctx)?;
            self.append(end, run);
            self.creation = end;
            if eol {
                self.end_of_line(producers, ctx);
            }
            while self.creation > self.match_offset {
                self.overrun(producers, ctx);
            }
            if !ignore_stale && ctx.stale.is_stale() {
                tracing::debug!(target: "layout.builder", offset = self.creation, "generation_stale");
                return Err(LayoutError::StaleCreation);
            }
        }
        if let Some(open) = self.open.take() {
            self.built.push(open);
        }
        Ok(())
    }

    fn first_open(&self) -> Option<&FirstReplace> {
        self.first.as_ref().filter(|f| !f.closed)
    }

    /// Old runs of the first paragraph after the replaced ones.
    fn has_tail(&self) -> bool {
        self.first_open()
            .is_some_and(|f| f.remove_end < self.tree.paragraphs()[f.para].runs().len())
    }

    /// Called when generation reached the match offset.
    fn keep_going(&mut self, producers: &mut [Box<dyn RunProducer>], ctx: &ProducerContext<'_>) -> bool {
        if self.creation >= self.region_end {
            return false;
        }
        if self.first_open().is_some() {
            if self.has_tail() {
                return false;
            }
        } else if self.open.is_none() {
            return false;
        }
        // Mid-paragraph at an old paragraph boundary: the next one merges in.
        self.extend_paragraph(producers, ctx);
        true
    }

    fn produce(
        &mut self,
        producers: &mut [Box<dyn RunProducer>],
        ctx: &ProducerContext<'_>,
    ) -> Result<(usize, Option<LeafRun>, bool)> {
        let creation = self.creation;
        let mut limit = self.region_end;
        let mut forced = false;
        let (candidate, mut reuse_end) = if self.materialize {
            self.reuse.at(creation)
        } else {
            (None, NO_RUN)
        };
        if candidate.is_none() && self.match_offset > creation {
            reuse_end = reuse_end.min(self.match_offset);
        }
        let mut bottom = "none";
        for (i, p) in producers.iter_mut().enumerate() {
            bottom = p.name();
            let mut next = self.next_starts[i];
            if next < creation {
                next = p.next_run_start_offset(ctx, creation);
                if next < creation {
                    return Err(violation(
                        p.name(),
                        creation,
                        format!("next run start {next} below creation offset"),
                    ));
                }
            }
            if next == creation {
                let made = if self.materialize {
                    p.create_run(ctx, creation, limit, forced, candidate.as_ref(), reuse_end)
                        .map(|run| (creation + run.length(), Some(run)))
                } else {
                    p.run_end_offset(ctx, creation, limit, forced).map(|end| (end, None))
                };
                if let Some((end, run)) = made {
                    self.next_starts[i] = next;
                    if end <= creation {
                        return Err(violation(p.name(), creation, "empty run".to_string()));
                    }
                    if end > limit {
                        return Err(violation(
                            p.name(),
                            creation,
                            format!("run ends at {end} past limit {limit}"),
                        ));
                    }
                    let eol = p.ends_paragraph(ctx, creation, end);
                    return Ok((end, run, eol));
                }
                next = p.next_run_start_offset(ctx, creation + 1);
                if next <= creation {
                    return Err(violation(
                        p.name(),
                        creation,
                        format!("declined but still starts at {next}"),
                    ));
                }
            }
            self.next_starts[i] = next;
            if next < limit {
                limit = next;
                forced = true;
            }
        }
        Err(violation(bottom, creation, "no producer covers offset".to_string()))
    }

    fn append(&mut self, end: usize, run: Option<LeafRun>) {
        let start = self.creation;
        if let Some(first) = self.first.as_mut().filter(|f| !f.closed) {
            first.runs.extend(run);
            return;
        }
        if self.open.is_none() {
            let anchor = self.take_anchor(start);
            self.open = Some(NewParagraph {
                start,
                length: 0,
                anchor,
                runs: self.materialize.then(Vec::new),
            });
        }
        if let Some(open) = self.open.as_mut() {
            open.length += end - start;
            if let (Some(runs), Some(run)) = (open.runs.as_mut(), run) {
                runs.push(run);
            }
        }
    }

    fn take_anchor(&mut self, offset: usize) -> Option<Anchor> {
        while self.anchors.front().is_some_and(|a| a.offset() < offset) {
            self.anchors.pop_front();
        }
        if self.anchors.front().is_some_and(|a| a.offset() == offset) {
            return self.anchors.pop_front();
        }
        None
    }

    fn end_of_line(&mut self, producers: &mut [Box<dyn RunProducer>], ctx: &ProducerContext<'_>) {
        let tree = self.tree;
        let Some(first) = self.first.as_mut().filter(|f| !f.closed) else {
            if let Some(open) = self.open.take() {
                self.built.push(open);
            }
            return;
        };
        first.closed = true;
        let para = first.para;
        let count = tree.paragraphs()[para].runs().len();
        if first.remove_end >= count {
            return;
        }
        // The rest of the old paragraph moves into new paragraphs.
        let tail = first.remove_end..count;
        first.remove_end = count;
        let runs = tree.paragraphs()[para].runs();
        let length: usize = tail.clone().map(|k| runs[k].length()).sum();
        let mut donated = Vec::new();
        donate_into(&mut donated, self.materialize, tree, &self.damage, para, tail);
        self.reuse.extend(donated);
        let from = self.match_offset;
        self.match_offset += length;
        for p in producers.iter_mut() {
            p.continue_creation(ctx, from, self.match_offset);
        }
        self.repoll(producers, ctx);
    }

    /// Generation passed the match offset: take in more old content.
    fn overrun(&mut self, producers: &mut [Box<dyn RunProducer>], ctx: &ProducerContext<'_>) {
        let tree = self.tree;
        if let Some(first) = self.first.as_mut().filter(|f| !f.closed) {
            let runs = tree.paragraphs()[first.para].runs();
            if first.remove_end < runs.len() {
                self.match_offset += runs[first.remove_end].length();
                first.remove_end += 1;
                return;
            }
        }
        self.extend_paragraph(producers, ctx);
    }

    fn extend_paragraph(&mut self, producers: &mut [Box<dyn RunProducer>], ctx: &ProducerContext<'_>) {
        let tree = self.tree;
        let from = self.match_offset;
        let next = self.remove.end;
        if next < tree.paragraph_count() {
            let p = &tree.paragraphs()[next];
            self.match_offset += p.length();
            let mut donated = Vec::new();
            donate_into(&mut donated, self.materialize, tree, &self.damage, next, 0..p.runs().len());
            self.reuse.extend(donated);
            self.anchors.push_back(p.anchor().clone());
            self.remove.end += 1;
        } else {
            self.match_offset = self.region_end.max(self.creation);
        }
        tracing::trace!(target: "layout.builder", from, to = self.match_offset, "match_extended");
        for p in producers.iter_mut() {
            p.continue_creation(ctx, from, self.match_offset);
        }
        self.repoll(producers, ctx);
    }

    /// Producers may offer new starts once the pass range grew.
    fn repoll(&mut self, producers: &mut [Box<dyn RunProducer>], ctx: &ProducerContext<'_>) {
        for (i, p) in producers.iter_mut().enumerate() {
            if self.next_starts[i] == NO_RUN {
                self.next_starts[i] = p.next_run_start_offset(ctx, self.creation);
            }
        }
    }
}

//! Greedy partition of a paragraph's runs into visual rows.
//!
//! The partition works on a flat sequence of units: one per char for text,
//! tab and newline runs, one per fold run (folds are never split). Rows are
//! reported as index ranges of whole runs plus at most one leading and one
//! trailing fragment for runs that straddle a row boundary. Fragments are
//! views only, the tree never stores them.

use core_config::{WrapConfig, WrapMode};
use core_text::segment::{cluster_starts, is_word_char};
use smallvec::SmallVec;

use crate::node_list::NodeList;
use crate::run::{LeafRun, RunKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapSettings {
    pub mode: WrapMode,
    pub allow_trailing_whitespace: bool,
    pub keep_terminator_with_row: bool,
}

impl Default for WrapSettings {
    fn default() -> Self {
        Self::from(&WrapConfig::default())
    }
}

impl From<&WrapConfig> for WrapSettings {
    fn from(cfg: &WrapConfig) -> Self {
        Self {
            mode: cfg.mode,
            allow_trailing_whitespace: cfg.allow_trailing_whitespace,
            keep_terminator_with_row: cfg.keep_terminator_with_row,
        }
    }
}

/// Portion of run `run` covering its local chars `start..end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub run: usize,
    pub start: usize,
    pub end: usize,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrapLine {
    pub start_fragment: Option<Fragment>,
    /// Whole runs `first_run..end_run` between the fragments.
    pub first_run: usize,
    pub end_run: usize,
    pub end_fragment: Option<Fragment>,
    /// Paragraph-local char range of the row.
    pub start_offset: usize,
    pub end_offset: usize,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrapInfo {
    pub lines: SmallVec<[WrapLine; 2]>,
    pub available_width: f64,
    /// Widest row.
    pub width: f64,
}

impl WrapInfo {
    pub fn row_count(&self) -> usize {
        self.lines.len()
    }

    /// Row containing paragraph-local `offset`. Offsets past the end map to the last row.
    pub fn line_at_offset(&self, offset: usize) -> usize {
        let idx = self.lines.partition_point(|l| l.start_offset <= offset);
        idx.saturating_sub(1)
    }

    pub fn row_ranges(&self) -> Vec<std::ops::Range<usize>> {
        self.lines.iter().map(|l| l.start_offset..l.end_offset).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Unit {
    run: usize,
    local: usize,
    offset: usize,
    chars: usize,
    advance: f64,
    ch: char,
}

fn flatten(runs: &NodeList<LeafRun>, text: &[char], char_width: f64) -> Vec<Unit> {
    let mut units = Vec::with_capacity(text.len());
    for (r, run) in runs.iter().enumerate() {
        let start = runs.start_offset(r);
        match run.char_advances(char_width) {
            None => units.push(Unit {
                run: r,
                local: 0,
                offset: start,
                chars: run.length(),
                advance: run.width(),
                ch: '\u{2026}',
            }),
            Some(advances) => {
                for (k, advance) in advances.into_iter().enumerate() {
                    let fallback = if run.kind() == RunKind::Newline { '\n' } else { ' ' };
                    units.push(Unit {
                        run: r,
                        local: k,
                        offset: start + k,
                        chars: 1,
                        advance,
                        ch: text.get(start + k).copied().unwrap_or(fallback),
                    });
                }
            }
        }
    }
    units
}

fn rows(units: &[Unit], available: f64, settings: &WrapSettings, starts: &[bool]) -> Vec<(usize, usize)> {
    let is_cluster_start = |u: usize| starts.get(units[u].offset).copied().unwrap_or(true);
    let mut out = Vec::new();
    let mut row_start = 0usize;
    let mut x = 0.0f64;
    let mut i = 0usize;
    while i < units.len() {
        let u = units[i];
        if i == row_start || x + u.advance <= available {
            x += u.advance;
            i += 1;
            continue;
        }
        let brk = if u.ch == '\n' {
            if settings.keep_terminator_with_row && !units[i - 1].ch.is_whitespace() {
                x += u.advance;
                i += 1;
                continue;
            }
            i
        } else if u.ch.is_whitespace() && settings.allow_trailing_whitespace {
            i + 1
        } else {
            let word = match settings.mode {
                WrapMode::Words => (row_start + 1..=i).rev().find(|&b| {
                    !(is_word_char(units[b - 1].ch) && is_word_char(units[b].ch)) && is_cluster_start(b)
                }),
                WrapMode::Chars => None,
            };
            word.unwrap_or_else(|| {
                let mut b = i;
                while b > row_start + 1 && !is_cluster_start(b) {
                    b -= 1;
                }
                b
            })
        };
        out.push((row_start, brk));
        row_start = brk;
        i = brk;
        x = 0.0;
    }
    if row_start < units.len() {
        out.push((row_start, units.len()));
    }
    out
}

fn to_line(runs: &NodeList<LeafRun>, units: &[Unit], (u0, u1): (usize, usize)) -> WrapLine {
    let first = units[u0];
    let last = units[u1 - 1];
    let width: f64 = units[u0..u1].iter().map(|u| u.advance).sum();
    let run_width = |run: usize| -> f64 {
        units[u0..u1]
            .iter()
            .filter(|u| u.run == run)
            .map(|u| u.advance)
            .sum()
    };
    let (sr, s_local) = (first.run, first.local);
    let (er, e_local_end) = (last.run, last.local + last.chars);
    let er_len = runs[er].length();
    let (start_fragment, first_run, end_run, end_fragment) =
        if sr == er && (s_local > 0 || e_local_end < er_len) {
            let frag = Fragment {
                run: sr,
                start: s_local,
                end: e_local_end,
                width,
            };
            (Some(frag), sr + 1, sr + 1, None)
        } else {
            let (sf, fr) = if s_local > 0 {
                let frag = Fragment {
                    run: sr,
                    start: s_local,
                    end: runs[sr].length(),
                    width: run_width(sr),
                };
                (Some(frag), sr + 1)
            } else {
                (None, sr)
            };
            let (ef, er_excl) = if e_local_end < er_len {
                let frag = Fragment {
                    run: er,
                    start: 0,
                    end: e_local_end,
                    width: run_width(er),
                };
                (Some(frag), er)
            } else {
                (None, er + 1)
            };
            (sf, fr, er_excl, ef)
        };
    WrapLine {
        start_fragment,
        first_run,
        end_run,
        end_fragment,
        start_offset: first.offset,
        end_offset: last.offset + last.chars,
        width,
    }
}

/// Partition `runs` (with paragraph text `text`) into rows no wider than
/// `available` where the policies allow.
pub fn partition(
    runs: &NodeList<LeafRun>,
    text: &str,
    available: f64,
    char_width: f64,
    settings: &WrapSettings,
) -> WrapInfo {
    let chars: Vec<char> = text.chars().collect();
    let units = flatten(runs, &chars, char_width);
    let starts = cluster_starts(text);
    let lines: SmallVec<[WrapLine; 2]> = rows(&units, available, settings, &starts)
        .into_iter()
        .map(|row| to_line(runs, &units, row))
        .collect();
    let width = lines.iter().map(|l| l.width).fold(0.0, f64::max);
    tracing::trace!(target: "layout.wrap", rows = lines.len(), available, "wrap_partition");
    WrapInfo {
        lines,
        available_width: available,
        width,
    }
}

//! Cell width of grapheme clusters.
//!
//! Layout measures text in cells of a monospace grid and converts cells to
//! visual units through [`crate::FontMetrics`]. All width decisions go through
//! [`cluster_cells`], which classifies a cluster and over-estimates emoji
//! composites: an extra blank cell is harmless, an under-estimate makes later
//! columns drift.

use unicode_width::UnicodeWidthChar;

const ZWJ: char = '\u{200D}';
const KEYCAP: char = '\u{20E3}';

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_extended_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
        || ('\u{1AB0}'..='\u{1AFF}').contains(&c)
        || ('\u{1DC0}'..='\u{1DFF}').contains(&c)
        || ('\u{20D0}'..='\u{20FF}').contains(&c)
        || ('\u{FE20}'..='\u{FE2F}').contains(&c)
}

/// Cells occupied by one char rendered on its own.
pub fn char_cells(c: char) -> u16 {
    if is_combining_mark(c) || c == ZWJ {
        return 0;
    }
    let w = c.width().unwrap_or(0) as u16;
    if is_extended_pictographic(c) { w.max(2) } else { w }
}

/// Cells occupied by a single grapheme cluster. Empty input is zero wide.
pub fn cluster_cells(cluster: &str) -> u16 {
    let mut chars = cluster.chars();
    let Some(first) = chars.next() else {
        return 0;
    };
    let rest = chars.as_str();
    if rest.is_empty() {
        return char_cells(first);
    }
    if rest.ends_with(KEYCAP) || rest.contains(ZWJ) {
        return 2;
    }
    if is_regional_indicator(first) && rest.chars().next().is_some_and(is_regional_indicator) {
        return 2;
    }
    if is_extended_pictographic(first) {
        return 2;
    }
    // Base plus marks or selectors: the base decides.
    char_cells(first).max(1)
}

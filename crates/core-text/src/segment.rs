//! Grapheme segmentation and word classification over char offsets.
//!
//! Layout addresses text by char offset, so these helpers translate
//! `unicode-segmentation` results (byte based) into char counts.

use unicode_segmentation::UnicodeSegmentation;

use crate::width::cluster_cells;

/// One grapheme cluster measured in chars and cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cluster {
    /// Char offset of the cluster start within the segmented text.
    pub start: usize,
    pub chars: usize,
    pub cells: u16,
}

/// Segment `text` into clusters covering it completely, in order.
pub fn clusters(text: &str) -> Vec<Cluster> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for g in text.graphemes(true) {
        let chars = g.chars().count();
        out.push(Cluster {
            start,
            chars,
            cells: cluster_cells(g),
        });
        start += chars;
    }
    out
}

/// Per-char flag: true where a grapheme cluster begins. Has one extra
/// trailing entry (always true) for the end of text.
pub fn cluster_starts(text: &str) -> Vec<bool> {
    let total = text.chars().count();
    let mut starts = vec![false; total + 1];
    for c in clusters(text) {
        starts[c.start] = true;
    }
    starts[total] = true;
    starts
}

/// Letters and digits form words; everything else separates them.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clusters_cover_text_in_chars() {
        let cs = clusters("ae\u{0301}漢");
        assert_eq!(
            cs,
            vec![
                Cluster { start: 0, chars: 1, cells: 1 },
                Cluster { start: 1, chars: 2, cells: 1 },
                Cluster { start: 3, chars: 1, cells: 2 },
            ]
        );
    }

    #[test]
    fn cluster_starts_marks_combining_tail() {
        assert_eq!(cluster_starts("e\u{0301}x"), vec![true, false, true, true]);
        assert_eq!(cluster_starts(""), vec![true]);
    }

    #[test]
    fn word_chars() {
        assert!(is_word_char('a'));
        assert!(is_word_char('9'));
        assert!(is_word_char('é'));
        assert!(!is_word_char(' '));
        assert!(!is_word_char('-'));
    }
}

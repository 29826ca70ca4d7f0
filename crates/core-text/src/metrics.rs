//! Font metrics provider.
//!
//! The layout engine never measures glyphs itself. It asks a [`FontMetrics`]
//! implementation for row geometry and per-char advances of a run's text.

use crate::segment::clusters;

pub trait FontMetrics: Send + Sync + std::fmt::Debug {
    fn row_height(&self) -> f64;
    fn ascent(&self) -> f64;
    /// Advance of an average narrow char.
    fn char_width(&self) -> f64;
    /// Advance of one tab char.
    fn tab_width(&self) -> f64;
    /// Advance of every char of `text`, one entry per char.
    fn advances(&self, text: &str) -> Vec<f64>;
}

/// Fixed cell grid: every cluster advances by its cell count times the cell width.
#[derive(Debug, Clone)]
pub struct MonospaceMetrics {
    pub char_width: f64,
    pub row_height: f64,
    pub ascent: f64,
    pub tab_size: usize,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            row_height: 16.0,
            ascent: 12.0,
            tab_size: 8,
        }
    }
}

impl FontMetrics for MonospaceMetrics {
    fn row_height(&self) -> f64 {
        self.row_height
    }

    fn ascent(&self) -> f64 {
        self.ascent
    }

    fn char_width(&self) -> f64 {
        self.char_width
    }

    fn tab_width(&self) -> f64 {
        self.tab_size as f64 * self.char_width
    }

    fn advances(&self, text: &str) -> Vec<f64> {
        let mut out = Vec::with_capacity(text.len());
        for cluster in clusters(text) {
            out.push(f64::from(cluster.cells) * self.char_width);
            // Trailing chars of a cluster add nothing.
            out.extend(std::iter::repeat_n(0.0, cluster.chars - 1));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monospace_advances_follow_clusters() {
        let m = MonospaceMetrics {
            char_width: 10.0,
            ..MonospaceMetrics::default()
        };
        assert_eq!(m.advances("ab"), vec![10.0, 10.0]);
        assert_eq!(m.advances("e\u{0301}漢"), vec![10.0, 0.0, 20.0]);
        assert_eq!(m.tab_width(), 80.0);
    }
}

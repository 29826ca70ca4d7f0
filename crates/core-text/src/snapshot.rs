//! Immutable view of document content at one version.
//!
//! Cloning a `Rope` is O(1) and shares structure, so a snapshot can be handed
//! to layout producers and held across an entire rebuild without keeping the
//! document locked.

use std::ops::Range;

use ropey::Rope;

#[derive(Debug, Clone)]
pub struct TextSnapshot {
    rope: Rope,
    version: u64,
}

impl TextSnapshot {
    pub fn new(rope: Rope, version: u64) -> Self {
        Self { rope, version }
    }

    /// Convenience for tests and tools that do not own a [`crate::Document`].
    pub fn from_str(text: &str) -> Self {
        Self::new(Rope::from_str(text), 0)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        (offset < self.rope.len_chars()).then(|| self.rope.char(offset))
    }

    /// Chars of `range`, clamped to the document end.
    pub fn slice(&self, range: Range<usize>) -> String {
        let len = self.rope.len_chars();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        self.rope.slice(start..end).to_string()
    }

    /// Iterate chars from `offset` (clamped) to the end.
    pub fn chars_from(&self, offset: usize) -> impl Iterator<Item = char> + '_ {
        self.rope.chars_at(offset.min(self.rope.len_chars()))
    }

    /// Offset just past the next `'\n'` at or after `offset`, bounded by `limit`.
    pub fn line_end_from(&self, offset: usize, limit: usize) -> usize {
        let limit = limit.min(self.rope.len_chars());
        let mut pos = offset;
        for ch in self.chars_from(offset) {
            if pos >= limit {
                break;
            }
            pos += 1;
            if ch == '\n' {
                return pos;
            }
        }
        limit.max(offset)
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }
}

impl std::fmt::Display for TextSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for chunk in self.rope.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_clamps_to_length() {
        let snap = TextSnapshot::from_str("héllo\n");
        assert_eq!(snap.len_chars(), 6);
        assert_eq!(snap.slice(1..3), "él");
        assert_eq!(snap.slice(4..99), "o\n");
        assert_eq!(snap.slice(50..60), "");
        assert_eq!(snap.char_at(5), Some('\n'));
        assert_eq!(snap.char_at(6), None);
    }

    #[test]
    fn line_end_scans_to_newline_or_limit() {
        let snap = TextSnapshot::from_str("ab\ncd\nef");
        assert_eq!(snap.line_end_from(0, 8), 3);
        assert_eq!(snap.line_end_from(3, 8), 6);
        assert_eq!(snap.line_end_from(6, 8), 8);
        assert_eq!(snap.line_end_from(0, 2), 2);
    }
}

//! Tree integrity checks.

use core_config::IntegrityMode;
use core_text::TextSnapshot;

use crate::document::DocumentNode;
use crate::error::{LayoutError, Result};

/// Validate `tree` against `text`. `anchors` also compares paragraph
/// anchors with paragraph starts, which only holds between edits.
pub fn verify(tree: &DocumentNode, text: &TextSnapshot, anchors: bool) -> std::result::Result<(), String> {
    let paragraphs = tree.paragraphs();
    paragraphs.verify().map_err(|e| format!("paragraph list: {e}"))?;
    let region = tree.region();
    if region.end > text.len_chars() {
        return Err(format!("region end {} past document length {}", region.end, text.len_chars()));
    }
    if paragraphs.total_length() != region.len() {
        return Err(format!(
            "paragraphs cover {} chars, region {}..{} has {}",
            paragraphs.total_length(),
            region.start,
            region.end,
            region.len()
        ));
    }
    let n = paragraphs.len();
    for (i, p) in paragraphs.iter().enumerate() {
        let start = tree.paragraph_start(i);
        let end = tree.paragraph_end(i);
        if p.has_children() {
            p.runs().verify().map_err(|e| format!("paragraph {i} runs: {e}"))?;
            if p.runs().total_length() != p.length() {
                return Err(format!(
                    "paragraph {i}: runs cover {} chars, length is {}",
                    p.runs().total_length(),
                    p.length()
                ));
            }
        }
        if p.length() == 0 {
            return Err(format!("paragraph {i} is empty"));
        }
        if i + 1 < n && text.char_at(end - 1) != Some('\n') {
            return Err(format!("paragraph {i} ({start}..{end}) does not end with a line break"));
        }
        if anchors && p.anchor().offset() != start {
            return Err(format!(
                "paragraph {i}: anchor at {} but starts at {start}",
                p.anchor().offset()
            ));
        }
    }
    Ok(())
}

/// Run [`verify`] and react per `mode`.
pub(crate) fn enforce(tree: &DocumentNode, text: &TextSnapshot, mode: IntegrityMode) -> Result<()> {
    if mode == IntegrityMode::Off {
        return Ok(());
    }
    match verify(tree, text, true) {
        Ok(()) => Ok(()),
        Err(detail) => {
            tracing::error!(target: "layout.check", %detail, dump = %tree.dump(), "integrity_failed");
            match mode {
                IntegrityMode::Strict => Err(LayoutError::Integrity(detail)),
                _ => Ok(()),
            }
        }
    }
}

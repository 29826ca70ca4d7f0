//! Ordered node sequence with gap-indexed offset and visual axes.
//!
//! Offsets and visual positions are local to the list: the first node starts
//! at 0 on both axes. Lists shorter than the configured threshold keep no
//! gap and renumber directly on every change.

use crate::gap::Gap;

/// A node that can live in a [`NodeList`].
pub trait GapNode {
    fn length(&self) -> usize;
    /// Size along the visual axis of the owning list.
    fn extent(&self) -> f64;
    fn raw_end_offset(&self) -> i64;
    fn set_raw_end_offset(&mut self, raw: i64);
    fn raw_end_visual(&self) -> f64;
    fn set_raw_end_visual(&mut self, raw: f64);
}

#[derive(Debug, Clone)]
pub struct NodeList<T> {
    items: Vec<T>,
    offsets: Gap<i64>,
    visuals: Gap<f64>,
    threshold: usize,
    gapped: bool,
}

impl<T: GapNode> NodeList<T> {
    pub fn new(threshold: usize) -> Self {
        Self::from_vec(Vec::new(), threshold)
    }

    pub fn from_vec(items: Vec<T>, threshold: usize) -> Self {
        let mut list = Self {
            offsets: Gap::parked(items.len()),
            visuals: Gap::parked(items.len()),
            items,
            threshold: threshold.max(2),
            gapped: false,
        };
        list.renumber_from(0);
        list.gapped = list.items.len() >= list.threshold;
        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn is_gapped(&self) -> bool {
        self.gapped
    }

    pub fn offset_gap(&self) -> &Gap<i64> {
        &self.offsets
    }

    pub fn visual_gap(&self) -> &Gap<f64> {
        &self.visuals
    }

    pub fn end_offset(&self, index: usize) -> usize {
        self.offsets.real(index, self.items[index].raw_end_offset()) as usize
    }

    pub fn start_offset(&self, index: usize) -> usize {
        if index == 0 { 0 } else { self.end_offset(index - 1) }
    }

    pub fn end_visual(&self, index: usize) -> f64 {
        self.visuals.real(index, self.items[index].raw_end_visual())
    }

    pub fn start_visual(&self, index: usize) -> f64 {
        if index == 0 { 0.0 } else { self.end_visual(index - 1) }
    }

    pub fn total_length(&self) -> usize {
        match self.items.len() {
            0 => 0,
            n => self.end_offset(n - 1),
        }
    }

    pub fn total_extent(&self) -> f64 {
        match self.items.len() {
            0 => 0.0,
            n => self.end_visual(n - 1),
        }
    }

    /// Index of the node containing `offset`, clamped to the last node.
    /// Among zero-length nodes at `offset` the first one wins.
    pub fn index_at_offset(&self, offset: usize) -> Option<usize> {
        let n = self.items.len();
        if n == 0 {
            return None;
        }
        let (mut lo, mut hi) = (0usize, n);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.end_offset(mid) <= offset {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let mut index = lo.min(n - 1);
        while index > 0 && self.start_offset(index - 1) == offset && self.items[index - 1].length() == 0 {
            index -= 1;
        }
        Some(index)
    }

    /// Index of the node covering visual position `pos`, clamped to the last node.
    pub fn index_at_visual(&self, pos: f64) -> Option<usize> {
        let n = self.items.len();
        if n == 0 {
            return None;
        }
        let (mut lo, mut hi) = (0usize, n);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.end_visual(mid) <= pos {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Some(lo.min(n - 1))
    }

    /// Replace `remove` nodes at `index` with `added`, shifting everything
    /// after the replaced range through the gaps.
    pub fn replace(&mut self, index: usize, remove: usize, added: Vec<T>) -> Vec<T> {
        let end = index + remove;
        debug_assert!(end <= self.items.len());
        let start_off = self.start_offset(index) as i64;
        let start_vis = self.start_visual(index);
        let old_end_off = if remove == 0 { start_off } else { self.end_offset(end - 1) as i64 };
        let old_end_vis = if remove == 0 { start_vis } else { self.end_visual(end - 1) };

        if !self.gapped {
            let removed: Vec<T> = self.items.splice(index..end, added).collect();
            self.renumber_from(index);
            self.regap();
            return removed;
        }

        self.move_gaps(end);
        let added_count = added.len();
        let removed: Vec<T> = self.items.splice(index..end, added).collect();
        let mut off = start_off;
        let mut vis = start_vis;
        for item in &mut self.items[index..index + added_count] {
            off += item.length() as i64;
            vis += item.extent();
            item.set_raw_end_offset(off);
            item.set_raw_end_visual(vis);
        }
        let gap_at = index + added_count;
        self.offsets.set_index(gap_at, off);
        self.visuals.set_index(gap_at, vis);
        self.offsets.shift(off - old_end_off);
        self.visuals.shift(vis - old_end_vis);
        self.regap();
        removed
    }

    /// Mutate node `index` in place, then propagate any change of its
    /// length or extent to the nodes after it.
    pub fn update<R>(&mut self, index: usize, f: impl FnOnce(&mut T) -> R) -> R {
        let old_len = self.items[index].length() as i64;
        let old_ext = self.items[index].extent();
        let out = f(&mut self.items[index]);
        let d_len = self.items[index].length() as i64 - old_len;
        let d_ext = self.items[index].extent() - old_ext;
        if d_len == 0 && d_ext == 0.0 {
            return out;
        }
        if !self.gapped {
            self.renumber_from(index);
            return out;
        }
        self.move_gaps(index + 1);
        let end_off = self.items[index].raw_end_offset() + d_len;
        let end_vis = self.items[index].raw_end_visual() + d_ext;
        self.items[index].set_raw_end_offset(end_off);
        self.items[index].set_raw_end_visual(end_vis);
        self.offsets.set_index(index + 1, end_off);
        self.visuals.set_index(index + 1, end_vis);
        self.offsets.shift(d_len);
        self.visuals.shift(d_ext);
        out
    }

    /// Take every node out, leaving the list empty.
    pub fn take_all(&mut self) -> Vec<T> {
        let n = self.items.len();
        self.replace(0, n, Vec::new())
    }

    /// Check that raw values reconstruct contiguous real values matching
    /// every node's own length and extent.
    pub fn verify(&self) -> Result<(), String> {
        let mut off = 0usize;
        let mut vis = 0.0f64;
        for (i, item) in self.items.iter().enumerate() {
            let real_end = self.offsets.real(i, item.raw_end_offset());
            if real_end < 0 {
                return Err(format!("node {i}: negative end offset {real_end}"));
            }
            off += item.length();
            if real_end as usize != off {
                return Err(format!(
                    "node {i}: end offset {real_end} != start + length {off}"
                ));
            }
            vis += item.extent();
            let real_vis = self.visuals.real(i, item.raw_end_visual());
            if (real_vis - vis).abs() > 1e-6 {
                return Err(format!("node {i}: end visual {real_vis} != {vis}"));
            }
        }
        Ok(())
    }

    fn move_gaps(&mut self, index: usize) {
        self.offsets.move_to(
            &mut self.items,
            index,
            |n| n.raw_end_offset(),
            |n, v| n.set_raw_end_offset(v),
        );
        self.visuals.move_to(
            &mut self.items,
            index,
            |n| n.raw_end_visual(),
            |n, v| n.set_raw_end_visual(v),
        );
    }

    /// Assign real values from `index` on and park the gaps at the end.
    fn renumber_from(&mut self, index: usize) {
        let mut off = self.start_offset_direct(index);
        let mut vis = self.start_visual_direct(index);
        for item in &mut self.items[index..] {
            off += item.length() as i64;
            vis += item.extent();
            item.set_raw_end_offset(off);
            item.set_raw_end_visual(vis);
        }
        let n = self.items.len();
        self.offsets = Gap::parked(n);
        self.visuals = Gap::parked(n);
        self.offsets.set_index(n, off);
        self.visuals.set_index(n, vis);
    }

    fn start_offset_direct(&self, index: usize) -> i64 {
        if index == 0 { 0 } else { self.end_offset(index - 1) as i64 }
    }

    fn start_visual_direct(&self, index: usize) -> f64 {
        if index == 0 { 0.0 } else { self.end_visual(index - 1) }
    }

    /// Switch between gapped and direct numbering after a size change.
    fn regap(&mut self) {
        let n = self.items.len();
        if self.gapped && n < self.threshold {
            let end = n;
            self.move_gaps(end);
            self.offsets = Gap::parked(n);
            self.visuals = Gap::parked(n);
            self.gapped = false;
            tracing::trace!(target: "layout.gap", len = n, "gap_released");
        } else if !self.gapped && n >= self.threshold {
            self.gapped = true;
            tracing::trace!(target: "layout.gap", len = n, "gap_allocated");
        }
    }
}

impl<T> std::ops::Index<usize> for NodeList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

//! Movable gap over cumulative raw values.
//!
//! Nodes store their end position as a "raw" value. Nodes before
//! `index` store the real value; nodes at or after it store
//! `real + length`. Shifting every node after some position by `delta`
//! therefore only needs the gap moved there followed by `length -= delta`,
//! and moving the gap touches exactly the nodes it passes over.

use std::fmt::Debug;
use std::ops::{Add, Sub};

pub trait GapValue:
    Copy + Default + PartialEq + PartialOrd + Debug + Add<Output = Self> + Sub<Output = Self>
{
}

impl GapValue for i64 {}
impl GapValue for f64 {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap<V> {
    index: usize,
    /// Real value at the gap (end of the node just before it). Informational.
    start: V,
    length: V,
}

impl<V: GapValue> Gap<V> {
    /// A gap parked after `len` nodes with nothing pending.
    pub fn parked(len: usize) -> Self {
        Self {
            index: len,
            start: V::default(),
            length: V::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start(&self) -> V {
        self.start
    }

    pub fn length(&self) -> V {
        self.length
    }

    #[inline]
    pub fn real(&self, index: usize, raw: V) -> V {
        if index < self.index { raw } else { raw - self.length }
    }

    #[inline]
    pub fn raw(&self, index: usize, real: V) -> V {
        if index < self.index { real } else { real + self.length }
    }

    /// Move the gap to `new_index`, rewriting only the nodes in between.
    pub fn move_to<T>(
        &mut self,
        items: &mut [T],
        new_index: usize,
        get: impl Fn(&T) -> V,
        set: impl Fn(&mut T, V),
    ) {
        debug_assert!(new_index <= items.len());
        if new_index < self.index {
            let stop = self.index.min(items.len());
            for item in &mut items[new_index..stop] {
                let raw = get(item) + self.length;
                set(item, raw);
            }
        } else if new_index > self.index {
            for item in &mut items[self.index..new_index] {
                let raw = get(item) - self.length;
                set(item, raw);
            }
        }
        self.index = new_index;
        self.start = if new_index == 0 {
            V::default()
        } else {
            get(&items[new_index - 1])
        };
    }

    /// Record that every node at or after the gap moved by `delta`.
    pub fn shift(&mut self, delta: V) {
        self.length = self.length - delta;
    }

    /// Place the gap at `index` without touching nodes. Only valid when the
    /// caller has just assigned real values to every node before `index`.
    pub fn set_index(&mut self, index: usize, start: V) {
        self.index = index;
        self.start = start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reals(gap: &Gap<i64>, raws: &[i64]) -> Vec<i64> {
        raws.iter().enumerate().map(|(i, r)| gap.real(i, *r)).collect()
    }

    #[test]
    fn shift_then_move_keeps_reals() {
        let mut raws = vec![3i64, 5, 9, 10];
        let mut gap = Gap::parked(raws.len());
        gap.move_to(&mut raws, 1, |r| *r, |r, v| *r = v);
        gap.shift(4);
        assert_eq!(reals(&gap, &raws), vec![3, 9, 13, 14]);
        gap.move_to(&mut raws, 3, |r| *r, |r, v| *r = v);
        assert_eq!(reals(&gap, &raws), vec![3, 9, 13, 14]);
        assert_eq!(gap.start(), 13);
        gap.move_to(&mut raws, 0, |r| *r, |r, v| *r = v);
        assert_eq!(reals(&gap, &raws), vec![3, 9, 13, 14]);
        assert_eq!(gap.raw(2, 13), 13 + gap.length());
    }

    #[test]
    fn moving_back_from_past_a_shrunk_list_stops_at_its_end() {
        let mut raws = vec![3i64, 5];
        let mut gap = Gap::parked(4);
        gap.shift(2);
        gap.move_to(&mut raws, 0, |r| *r, |r, v| *r = v);
        assert_eq!(gap.index(), 0);
        assert_eq!(raws, vec![1, 3]);
        assert_eq!(reals(&gap, &raws), vec![3, 5]);
    }
}

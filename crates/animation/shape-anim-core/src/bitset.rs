//! Compact ordered sets of node and object indices.
//!
//! Sequences, masks and transitions all describe "which nodes" with an
//! [`IndexSet`]. Iteration is always in ascending index order, which the
//! evaluator relies on to pair set members with their dense keyframe slots.

use std::ops::Range;

use serde::{Deserialize, Serialize};

const WORD_BITS: usize = u32::BITS as usize;

/// Growable bit set over `usize` indices.
///
/// Indices passed to [`IndexSet::set`] grow the set as needed; testing an
/// index past the end reports `false`. Serialized as a sorted index list.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct IndexSet {
    words: Vec<u32>,
}

#[inline]
fn split(index: usize) -> (usize, u32) {
    (index / WORD_BITS, 1u32 << (index % WORD_BITS))
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set containing `0..n`.
    pub fn with_all(n: usize) -> Self {
        let mut set = Self::new();
        set.set_all(n);
        set
    }

    /// A set containing every index in `range`.
    pub fn from_range(range: Range<usize>) -> Self {
        let mut set = Self::with_all(range.end);
        for index in 0..range.start.min(range.end) {
            set.clear(index);
        }
        set
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        let (w, bit) = split(index);
        if w >= self.words.len() {
            self.words.resize(w + 1, 0);
        }
        self.words[w] |= bit;
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        let (w, bit) = split(index);
        if let Some(word) = self.words.get_mut(w) {
            *word &= !bit;
        }
    }

    #[inline]
    pub fn test(&self, index: usize) -> bool {
        let (w, bit) = split(index);
        matches!(self.words.get(w), Some(word) if word & bit != 0)
    }

    /// Replace the contents with `0..n`.
    pub fn set_all(&mut self, n: usize) {
        self.words.clear();
        self.words.resize(n / WORD_BITS, u32::MAX);
        let rem = n % WORD_BITS;
        if rem > 0 {
            self.words.push((1u32 << rem) - 1);
        }
    }

    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Intersect in place.
    pub fn overlap(&mut self, other: &IndexSet) {
        for (i, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    /// Subtract `other` in place.
    pub fn take_away(&mut self, other: &IndexSet) {
        for (word, o) in self.words.iter_mut().zip(other.words.iter()) {
            *word &= !o;
        }
    }

    /// Union in place.
    pub fn union_with(&mut self, other: &IndexSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, o) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= o;
        }
    }

    /// First member, if any.
    #[inline]
    pub fn start(&self) -> Option<usize> {
        self.first_from(0)
    }

    /// Next member strictly after `index`.
    #[inline]
    pub fn next(&self, index: usize) -> Option<usize> {
        self.first_from(index + 1)
    }

    /// First member at or after `index`.
    pub fn first_from(&self, index: usize) -> Option<usize> {
        let mut w = index / WORD_BITS;
        if w >= self.words.len() {
            return None;
        }
        let mut bits = self.words[w] & (u32::MAX << (index % WORD_BITS));
        loop {
            if bits != 0 {
                return Some(w * WORD_BITS + bits.trailing_zeros() as usize);
            }
            w += 1;
            if w >= self.words.len() {
                return None;
            }
            bits = self.words[w];
        }
    }

    /// Whether any member falls inside `range`.
    #[inline]
    pub fn intersects_range(&self, range: &Range<usize>) -> bool {
        matches!(self.first_from(range.start), Some(i) if i < range.end)
    }

    /// Members inside `range`, in ascending order.
    pub fn iter_range(&self, range: Range<usize>) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = self.first_from(range.start);
        std::iter::from_fn(move || {
            let current = cursor.filter(|i| *i < range.end)?;
            cursor = self.next(current);
            Some(current)
        })
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Members in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            set: self,
            cursor: self.start(),
        }
    }

    /// Members in ascending order, paired with their rank in the set. The
    /// rank is the dense slot used by sequence keyframe storage.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.iter().enumerate()
    }
}

/// Ascending iterator over an [`IndexSet`].
pub struct Iter<'a> {
    set: &'a IndexSet,
    cursor: Option<usize>,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.cursor?;
        self.cursor = self.set.next(current);
        Some(current)
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = usize;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl PartialEq for IndexSet {
    fn eq(&self, other: &Self) -> bool {
        let n = self.words.len().max(other.words.len());
        (0..n).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for IndexSet {}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = IndexSet::new();
        for index in iter {
            set.set(index);
        }
        set
    }
}

impl From<Vec<usize>> for IndexSet {
    fn from(indices: Vec<usize>) -> Self {
        indices.into_iter().collect()
    }
}

impl From<IndexSet> for Vec<usize> {
    fn from(set: IndexSet) -> Self {
        set.iter().collect()
    }
}

//! Compact, fixed-universe bit-vector representation of one bipartition.
//!
//! # Overview
//! A split divides the tips of a tree into two groups. Each bit position
//! corresponds to a tip index; set bits are one side of the bipartition and
//! clear bits the other. A split and its complement denote the same
//! bipartition.
//!
//! # Example
//! For a tree with tips [A, B, C, D] mapped to indices [0, 1, 2, 3]:
//! - Split {A, C} | {B, D} → bits `0b0101` (or its complement `0b1010`)
//! - Split {B, C, D} | {A} → bits `0b1110` (trivial: one side is a single tip)
//!
//! # Masking
//! Words hold 64 tips each. Bits past `n_tips` in the last word carry no
//! meaning and are masked out by every operation, so complements never leak
//! into them.

use std::hash::{Hash, Hasher};

const WORD_BITS: usize = 64;

/// Number of `u64` words needed for `n_tips` bits.
#[inline]
pub fn words_for(n_tips: usize) -> usize {
    n_tips.div_ceil(WORD_BITS)
}

/// Mask selecting the meaningful bits of the last word.
#[inline]
fn last_word_mask(n_tips: usize) -> u64 {
    match n_tips % WORD_BITS {
        0 => u64::MAX,
        r => (1u64 << r) - 1,
    }
}

/// An immutable bipartition of `n_tips` tips.
///
/// # Memory efficiency
/// One bit per tip (8 bytes per 64 tips) plus the cached leaf count, so a
/// split list for a 1,000-tip tree takes roughly 125 KB.
#[derive(Clone, Debug)]
pub struct Split {
    words: Vec<u64>,
    n_tips: usize,
    leaf_count: usize,
}

impl Split {
    /// Creates a split from packed words, counting its set bits under the mask.
    ///
    /// `words` is resized to `ceil(n_tips / 64)`.
    ///
    /// # Example
    /// ```
    /// # use tree_info_distances::split::Split;
    /// let s = Split::new(vec![0b0011], 4);
    /// assert_eq!(s.leaf_count(), 2);
    /// assert_eq!(s.complement().words()[0], 0b1100);
    /// ```
    pub fn new(mut words: Vec<u64>, n_tips: usize) -> Self {
        words.resize(words_for(n_tips), 0);
        let mut split = Split {
            words,
            n_tips,
            leaf_count: 0,
        };
        split.leaf_count = (0..split.words.len())
            .map(|i| split.masked_word(i).count_ones() as usize)
            .sum();
        split
    }

    /// Creates a split whose leaf count the caller has already computed from
    /// `words`, which must carry no bits at or above `n_tips`.
    pub(crate) fn with_leaf_count(mut words: Vec<u64>, n_tips: usize, leaf_count: usize) -> Self {
        words.resize(words_for(n_tips), 0);
        let split = Split {
            words,
            n_tips,
            leaf_count,
        };
        debug_assert_eq!(
            leaf_count,
            (0..split.words.len())
                .map(|i| split.masked_word(i).count_ones() as usize)
                .sum::<usize>()
        );
        split
    }

    /// Creates a split with the given tip indices on the set side.
    ///
    /// Indices `>= n_tips` are ignored.
    ///
    /// # Example
    /// ```
    /// # use tree_info_distances::split::Split;
    /// let s = Split::from_tips(&[0, 5], 8);
    /// assert_eq!(s.words()[0], 0b0010_0001);
    /// ```
    pub fn from_tips(tips: &[usize], n_tips: usize) -> Self {
        let mut words = vec![0u64; words_for(n_tips)];
        for &tip in tips.iter().filter(|&&t| t < n_tips) {
            words[tip >> 6] |= 1u64 << (tip & 63);
        }
        Split::new(words, n_tips)
    }

    /// Number of tips on the set side.
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    #[inline]
    pub fn n_tips(&self) -> usize {
        self.n_tips
    }

    /// Raw packed words. Bits past `n_tips` are unspecified.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Whether tip `idx` is on the set side.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        idx < self.n_tips && self.words[idx >> 6] & (1u64 << (idx & 63)) != 0
    }

    #[inline]
    fn masked_word(&self, i: usize) -> u64 {
        if i + 1 == self.words.len() {
            self.words[i] & last_word_mask(self.n_tips)
        } else {
            self.words[i]
        }
    }

    /// The same bipartition seen from the other side.
    ///
    /// # Example
    /// Input: `0b0011` (4 tips) → Output: `0b1100`
    pub fn complement(&self) -> Split {
        let mut words: Vec<u64> = self.words.iter().map(|w| !w).collect();
        if let Some(last) = words.last_mut() {
            *last &= last_word_mask(self.n_tips);
        }
        Split {
            words,
            n_tips: self.n_tips,
            leaf_count: self.n_tips - self.leaf_count,
        }
    }

    /// Representation of the bipartition that does NOT contain tip 0.
    ///
    /// A split and its complement share one canonical form, so canonical
    /// splits can be hashed to compare bipartitions.
    pub fn canonical(&self) -> Split {
        if self.contains(0) {
            self.complement()
        } else {
            self.clone()
        }
    }

    /// Number of tips set in both splits.
    ///
    /// Both splits must be over the same universe.
    #[inline]
    pub fn count_overlap(&self, other: &Split) -> usize {
        debug_assert_eq!(self.n_tips, other.n_tips);
        (0..self.words.len())
            .map(|i| (self.masked_word(i) & other.masked_word(i)).count_ones() as usize)
            .sum()
    }

    /// Whether both splits describe the same bipartition, in either orientation.
    ///
    /// Walks the words once, tracking whether the splits may still be equal and
    /// whether they may still be complementary, and stops as soon as neither
    /// holds.
    pub fn equals_or_complement(&self, other: &Split) -> bool {
        if self.n_tips != other.n_tips {
            return false;
        }
        let n_words = self.words.len();
        if n_words == 0 {
            return true;
        }
        let mut maybe_equal = true;
        let mut maybe_complement = true;
        for i in 0..n_words - 1 {
            let (a, b) = (self.words[i], other.words[i]);
            maybe_equal &= a == b;
            maybe_complement &= a == !b;
            if !maybe_equal && !maybe_complement {
                return false;
            }
        }
        let mask = last_word_mask(self.n_tips);
        let (a, b) = (self.words[n_words - 1] & mask, other.words[n_words - 1] & mask);
        (maybe_equal && a == b) || (maybe_complement && a == !b & mask)
    }
}

impl PartialEq for Split {
    fn eq(&self, other: &Self) -> bool {
        self.n_tips == other.n_tips
            && self.leaf_count == other.leaf_count
            && (0..self.words.len()).all(|i| self.masked_word(i) == other.masked_word(i))
    }
}

impl Eq for Split {}

impl Hash for Split {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.n_tips.hash(state);
        for i in 0..self.words.len() {
            self.masked_word(i).hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic() {
        let s = Split::from_tips(&[0, 2], 4);
        assert_eq!(s.words()[0], 0b0101);
        assert_eq!(s.leaf_count(), 2);
        assert!(s.contains(2));
        assert!(!s.contains(1));
        assert!(!s.contains(7));
    }

    #[test]
    fn test_precounted_split_matches_counted() {
        let words = vec![u64::MAX, 0b1011];
        let counted = Split::new(words.clone(), 68);
        let precounted = Split::with_leaf_count(words, 68, 67);
        assert_eq!(counted.leaf_count(), 67);
        assert_eq!(precounted.leaf_count(), counted.leaf_count());
        assert_eq!(precounted, counted);
        assert_eq!(precounted.complement().leaf_count(), 1);
    }

    #[test]
    fn test_bits_past_universe_are_ignored() {
        // Garbage above bit 4 must not count.
        let s = Split::new(vec![0b1111_0011], 4);
        assert_eq!(s.leaf_count(), 2);
        assert_eq!(s, Split::from_tips(&[0, 1], 4));
        assert!(s.equals_or_complement(&Split::from_tips(&[2, 3], 4)));
    }

    #[test]
    fn test_double_complement_is_identity() {
        for n in [5usize, 63, 64, 65, 130] {
            let s = Split::from_tips(&[1, 3, n - 1], n);
            let back = s.complement().complement();
            assert_eq!(back, s);
            assert_eq!(back.words(), s.words());
            assert_eq!(s.complement().leaf_count(), n - 3);
        }
    }

    #[test]
    fn test_equals_or_complement() {
        let ab = Split::from_tips(&[0, 1], 6);
        let cdef = Split::from_tips(&[2, 3, 4, 5], 6);
        let ac = Split::from_tips(&[0, 2], 6);
        assert!(ab.equals_or_complement(&ab));
        assert!(ab.equals_or_complement(&cdef));
        assert!(ab.equals_or_complement(&ab.complement()));
        assert!(!ab.equals_or_complement(&ac));
        assert_ne!(ab, cdef);
    }

    #[test]
    fn test_equals_or_complement_across_words() {
        let n = 130;
        let s = Split::from_tips(&[0, 64, 65, 129], n);
        assert!(s.equals_or_complement(&s.complement()));
        let t = Split::from_tips(&[0, 64, 65, 128], n);
        assert!(!s.equals_or_complement(&t));
        assert!(!s.equals_or_complement(&t.complement()));
    }

    #[test]
    fn test_count_overlap() {
        let a = Split::from_tips(&[0, 1, 2, 70], 80);
        let b = Split::from_tips(&[1, 2, 3, 70, 71], 80);
        assert_eq!(a.count_overlap(&b), 3);
        assert_eq!(a.count_overlap(&a.complement()), 0);
    }

    #[test]
    fn test_canonical_drops_tip_zero() {
        let ab = Split::from_tips(&[0, 1], 4);
        let cd = Split::from_tips(&[2, 3], 4);
        assert_eq!(ab.canonical(), cd);
        assert_eq!(cd.canonical(), cd);
    }

    #[test]
    fn test_empty_universe() {
        let s = Split::new(Vec::new(), 0);
        assert_eq!(s.leaf_count(), 0);
        assert!(s.equals_or_complement(&s.complement()));
    }
}

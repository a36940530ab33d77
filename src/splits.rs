//! Extract the non-trivial splits of a phylogenetic tree.
//!
//! # Overview
//! Each internal edge of a tree divides the tips into two groups. A
//! [`SplitList`] records one [`Split`] per internal edge whose both sides hold
//! at least two tips; edges leading to a single tip carry no topological
//! information and are skipped.
//!
//! ```text
//!      root
//!     /    \
//!   {A,B}  {C,D}   ← both root edges induce {A,B}|{C,D}, kept once
//! ```
//!
//! # Tip indices
//! Node ids are assigned during parsing and differ across files, while tip
//! labels are stable. A [`TipIndex`] sorts labels alphabetically so identical
//! taxa map to identical bit positions in every tree.

use std::collections::HashMap;

use itertools::Itertools;
use phylotree::tree::Tree as PhyloTree;
use tracing::debug;

use crate::error::{DistanceError, ensure_same_size};
use crate::info;
use crate::split::{Split, words_for};

/// Stable mapping from tip labels to bit positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
}

impl TipIndex {
    /// Builds an index from labels; duplicates collapse to one position.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(Into::into)
            .sorted_unstable()
            .dedup()
            .collect();
        let positions = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), idx))
            .collect();
        TipIndex { labels, positions }
    }

    /// Builds an index from the leaf labels of `tree`.
    ///
    /// # Errors
    /// [`DistanceError::UnnamedLeaf`] if a leaf has no name.
    pub fn from_tree(tree: &PhyloTree) -> Result<Self, DistanceError> {
        let mut labels = Vec::new();
        for leaf_id in tree.get_leaves() {
            let name = tree.get(&leaf_id)?.name.clone();
            labels.push(name.ok_or(DistanceError::UnnamedLeaf)?);
        }
        Ok(TipIndex::from_labels(labels))
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied()
    }

    /// Labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The non-trivial splits of one tree over a fixed universe of tips.
///
/// Logically a multiset: order carries no meaning, and duplicate splits other
/// than the two edges below a bifurcating root are preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitList {
    splits: Vec<Split>,
    n_tips: usize,
}

impl SplitList {
    /// An empty list over `n_tips` tips (e.g. a star tree).
    pub fn new_empty(n_tips: usize) -> Self {
        SplitList {
            splits: Vec::new(),
            n_tips,
        }
    }

    /// Wraps ready-made splits, checking they share the universe size.
    pub fn from_splits(splits: Vec<Split>, n_tips: usize) -> Result<Self, DistanceError> {
        for split in &splits {
            ensure_same_size(n_tips, split.n_tips())?;
        }
        Ok(SplitList { splits, n_tips })
    }

    /// Extracts the splits of `tree`, numbering tips through `tips`.
    ///
    /// # Algorithm
    /// 1. Post-order DFS from the root; a leaf yields its single tip bit, an
    ///    internal node ORs its children's bits.
    /// 2. Every non-root node with `2 <= leaves <= n - 2` contributes a split.
    /// 3. When the root has exactly two children, both induce the same
    ///    bipartition; the second copy is dropped.
    ///
    /// # Errors
    /// - [`DistanceError::SizeMismatch`] if the tree and the index disagree on
    ///   the number of tips.
    /// - [`DistanceError::UnnamedLeaf`] / [`DistanceError::UnknownTip`] if a
    ///   leaf cannot be placed in the index.
    pub fn from_tree(tree: &PhyloTree, tips: &TipIndex) -> Result<Self, DistanceError> {
        let n_tips = tips.len();
        ensure_same_size(n_tips, tree.get_leaves().len())?;

        let root_id = tree.get_root()?;
        let mut splits = Vec::new();
        let mut root_child_slots = Vec::new();

        let root = tree.get(&root_id)?;
        for &child_id in &root.children {
            let (_, kept) = Self::collect(child_id, tree, tips, n_tips, &mut splits)?;
            // A kept child split is the last one pushed (post-order).
            root_child_slots.push(kept.then(|| splits.len() - 1));
        }

        if let [Some(first), Some(second)] = root_child_slots[..] {
            if splits[first].equals_or_complement(&splits[second]) {
                splits.remove(second);
            }
        }

        debug!(n_tips, n_splits = splits.len(), "Extracted splits");
        Ok(SplitList { splits, n_tips })
    }

    /// Recursively builds the tip bits below `node_id`, pushing qualifying
    /// splits in post-order. Returns the node's bits and whether its own
    /// split was pushed.
    fn collect(
        node_id: usize,
        tree: &PhyloTree,
        tips: &TipIndex,
        n_tips: usize,
        splits: &mut Vec<Split>,
    ) -> Result<(Vec<u64>, bool), DistanceError> {
        let node = tree.get(&node_id)?;
        let mut bits = vec![0u64; words_for(n_tips)];

        // Base case: leaf node
        if node.children.is_empty() {
            let name = node.name.as_deref().ok_or(DistanceError::UnnamedLeaf)?;
            let idx = tips
                .index_of(name)
                .ok_or_else(|| DistanceError::UnknownTip(name.to_string()))?;
            bits[idx >> 6] |= 1u64 << (idx & 63);
            return Ok((bits, false));
        }

        for &child_id in &node.children {
            let (child_bits, _) = Self::collect(child_id, tree, tips, n_tips, splits)?;
            for (a, b) in bits.iter_mut().zip(&child_bits) {
                *a |= *b;
            }
        }

        let leaves: usize = bits.iter().map(|w| w.count_ones() as usize).sum();
        let kept = leaves >= 2 && n_tips - leaves >= 2;
        if kept {
            splits.push(Split::with_leaf_count(bits.clone(), n_tips, leaves));
        }
        Ok((bits, kept))
    }

    pub fn n_tips(&self) -> usize {
        self.n_tips
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Split> {
        self.splits.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Split> {
        self.splits.iter()
    }

    pub fn as_slice(&self) -> &[Split] {
        &self.splits
    }

    /// Sum of the clustering entropies of all splits, in bits.
    pub fn total_clustering_entropy(&self) -> f64 {
        self.splits
            .iter()
            .map(|s| info::split_clustering_entropy(s.leaf_count(), self.n_tips))
            .sum()
    }

    /// Sum of the phylogenetic information of all splits, in bits.
    pub fn total_phylogenetic_info(&self) -> f64 {
        self.splits
            .iter()
            .map(|s| info::split_phylogenetic_info(s.leaf_count(), self.n_tips))
            .sum()
    }
}

impl<'a> IntoIterator for &'a SplitList {
    type Item = &'a Split;
    type IntoIter = std::slice::Iter<'a, Split>;

    fn into_iter(self) -> Self::IntoIter {
        self.splits.iter()
    }
}

/// Extracts the splits of `tree`, indexing tips by their sorted labels.
///
/// Trees with identical label sets receive identical tip indices, so lists
/// built this way can be compared directly.
pub fn build_splits(tree: &PhyloTree) -> Result<SplitList, DistanceError> {
    let tips = TipIndex::from_tree(tree)?;
    SplitList::from_tree(tree, &tips)
}

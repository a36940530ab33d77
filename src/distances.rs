//! Robinson-Foulds distances and batch pairwise matrices over split lists.
//!
//! This module implements the exact-match family of tree distances:
//!
//! 1. **Robinson-Foulds (RF)**: counts the bipartitions present in only one of
//!    the two trees. Range: [0, 2n-6] where n is the number of tips.
//!
//! 2. **Information-weighted RF**: like RF, but each unmatched split counts
//!    its phylogenetic information (bits) instead of 1.
//!
//! Both have normalized forms in [0, 1]. The clustering information distance
//! lives in [`crate::clustering`]; [`Metric`] and [`pairwise_distances`] tie
//! all of them together for batch use.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use phylotree::tree::Tree as PhyloTree;
use rayon::prelude::*;
use tracing::debug;

use crate::clustering::clustering_info_distance;
use crate::error::{DistanceError, ensure_same_size};
use crate::info;
use crate::split::Split;
use crate::splits::{SplitList, TipIndex};

/// Distinct bipartitions of a list, one canonical split each.
fn unique_bipartitions(list: &SplitList) -> HashSet<Split> {
    list.iter().map(Split::canonical).collect()
}

/// Compute the Robinson-Foulds distance between two split lists.
///
/// # Algorithm
/// RF = |A| + |B| - 2|A ∩ B|
///
/// Where A and B are the sets of distinct bipartitions of each tree. A split
/// and its complement are the same bipartition, so splits are canonicalized
/// (side without tip 0) and intersected as hash sets; any pairing of equal
/// bipartitions is optimal for this count.
///
/// # Example
/// ```text
/// Tree 1:  ((A,B),(C,D))     Bipartitions: {A,B}|{C,D}
/// Tree 2:  ((A,C),(B,D))     Bipartitions: {A,C}|{B,D}
///
/// Intersection: 0 bipartitions match
/// RF = 1 + 1 - 2*0 = 2
/// ```
///
/// # Errors
/// Returns [`DistanceError::SizeMismatch`] if the lists cover different tip counts.
pub fn robinson_foulds(a: &SplitList, b: &SplitList) -> Result<usize, DistanceError> {
    let (unique_a, unique_b, shared) = rf_counts(a, b)?;
    Ok(unique_a + unique_b - 2 * shared)
}

/// Robinson-Foulds distance divided by its maximum `|A| + |B|`.
///
/// Two trees without any non-trivial split are at distance 0.
pub fn normalized_robinson_foulds(a: &SplitList, b: &SplitList) -> Result<f64, DistanceError> {
    let (unique_a, unique_b, shared) = rf_counts(a, b)?;
    let max = unique_a + unique_b;
    if max == 0 {
        return Ok(0.0);
    }
    Ok((max - 2 * shared) as f64 / max as f64)
}

fn rf_counts(a: &SplitList, b: &SplitList) -> Result<(usize, usize, usize), DistanceError> {
    ensure_same_size(a.n_tips(), b.n_tips())?;
    let parts_a = unique_bipartitions(a);
    let parts_b = unique_bipartitions(b);
    let shared = parts_a.intersection(&parts_b).count();
    Ok((parts_a.len(), parts_b.len(), shared))
}

/// Compute the information-weighted Robinson-Foulds distance, in bits.
///
/// # Algorithm
/// For each split of A, scan B for the same bipartition; every split of A
/// that finds one adds its phylogenetic information to `matched`.
///
/// distance = info(A) + info(B) - 2 * matched
///
/// Splits with more information (those that are rarer among all trees, i.e.
/// more even) weigh more than lopsided ones.
pub fn info_robinson_foulds(a: &SplitList, b: &SplitList) -> Result<f64, DistanceError> {
    ensure_same_size(a.n_tips(), b.n_tips())?;
    let total = a.total_phylogenetic_info() + b.total_phylogenetic_info();
    Ok(total - 2.0 * matched_info(a, b))
}

/// Information-weighted RF divided by `info(A) + info(B)`.
pub fn normalized_info_robinson_foulds(a: &SplitList, b: &SplitList) -> Result<f64, DistanceError> {
    ensure_same_size(a.n_tips(), b.n_tips())?;
    let total = a.total_phylogenetic_info() + b.total_phylogenetic_info();
    if total <= 0.0 {
        return Ok(0.0);
    }
    Ok((total - 2.0 * matched_info(a, b)) / total)
}

fn matched_info(a: &SplitList, b: &SplitList) -> f64 {
    let n_tips = a.n_tips();
    a.iter()
        .filter(|split| b.iter().any(|other| split.equals_or_complement(other)))
        .map(|split| info::split_phylogenetic_info(split.leaf_count(), n_tips))
        .sum()
}

/// A tree distance computable from two split lists.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    Rf,
    NormalizedRf,
    InfoRf,
    NormalizedInfoRf,
    Cid,
    NormalizedCid,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Rf,
        Metric::NormalizedRf,
        Metric::InfoRf,
        Metric::NormalizedInfoRf,
        Metric::Cid,
        Metric::NormalizedCid,
    ];

    /// Short name used on the command line and in Python.
    pub fn label(self) -> &'static str {
        match self {
            Metric::Rf => "rf",
            Metric::NormalizedRf => "normalized-rf",
            Metric::InfoRf => "info-rf",
            Metric::NormalizedInfoRf => "normalized-info-rf",
            Metric::Cid => "cid",
            Metric::NormalizedCid => "normalized-cid",
        }
    }

    /// Distance between two trees under this metric.
    pub fn evaluate(self, a: &SplitList, b: &SplitList) -> Result<f64, DistanceError> {
        match self {
            Metric::Rf => robinson_foulds(a, b).map(|d| d as f64),
            Metric::NormalizedRf => normalized_robinson_foulds(a, b),
            Metric::InfoRf => info_robinson_foulds(a, b),
            Metric::NormalizedInfoRf => normalized_info_robinson_foulds(a, b),
            Metric::Cid => clustering_info_distance(a, b, a.n_tips(), false),
            Metric::NormalizedCid => clustering_info_distance(a, b, a.n_tips(), true),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = DistanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| DistanceError::InvalidInput(format!("unknown metric '{s}'")))
    }
}

/// Extract split lists for many trees against one shared tip index.
///
/// The index is taken from the first tree, so every later tree must carry
/// exactly the same labels.
pub fn build_split_lists(trees: &[PhyloTree]) -> Result<Vec<SplitList>, DistanceError> {
    let Some(first) = trees.first() else {
        return Ok(Vec::new());
    };
    let tips = TipIndex::from_tree(first)?;
    // phylotree trees cache state in `RefCell`s, so this pass stays sequential.
    trees
        .iter()
        .map(|tree| SplitList::from_tree(tree, &tips))
        .collect()
}

/// Compute a symmetric distance matrix for all pairs of split lists.
///
/// Pairs of the upper triangle are evaluated in parallel; each evaluation is
/// independent and only reads the shared lists.
pub fn pairwise_distances(
    lists: &[SplitList],
    metric: Metric,
) -> Result<Vec<Vec<f64>>, DistanceError> {
    let n = lists.len();
    debug!(trees = n, %metric, "Computing pairwise distances");

    let pairs: Vec<(usize, usize, f64)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j)))
        .map(|(i, j)| metric.evaluate(&lists[i], &lists[j]).map(|d| (i, j, d)))
        .collect::<Result<_, _>>()?;

    let mut matrix = vec![vec![0.0f64; n]; n];
    for (i, j, dist) in pairs {
        matrix[i][j] = dist;
        matrix[j][i] = dist;
    }
    Ok(matrix)
}

//! Mutual clustering information and the Clustering Information Distance.
//!
//! # Overview
//! Each split partitions the tips into two clusters. Two splits, one from each
//! tree, share some mutual information about how the tips cluster (zero when
//! they are independent, the full split entropy when they coincide). The
//! mutual clustering information of two trees is the largest total obtainable
//! by pairing their splits one-to-one, found with the assignment solver.
//!
//! The distance is the total entropy of both trees minus twice that shared
//! information, optionally divided by the total entropy:
//!
//! ```text
//! CID(A, B) = H(A) + H(B) - 2 * MCI(A, B)
//! ```
//!
//! # Integer scaling
//! The solver works on integers, so each pair's information (bits, at most 1)
//! is scaled by [`MAX_SCORE`] and stored as a cost `MAX_SCORE - scaled`.

use tracing::debug;

use crate::error::{DistanceError, ensure_same_size};
use crate::info::InfoTables;
use crate::lap::{CostMatrix, lap};
use crate::split::Split;
use crate::splits::SplitList;

/// Cost of a pair of splits sharing no information.
pub const MAX_SCORE: i64 = 1 << 32;

/// Raw distances this close to zero are rounding noise.
const ZERO_TOLERANCE: f64 = 1.490_116_119_384_765_6e-8; // sqrt(f64::EPSILON)

/// Result of matching two split lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringMatch {
    /// Mutual clustering information, in bits.
    pub info: f64,
    /// For each split of the first list, the split of the second it was
    /// paired with, if any.
    pub matching: Vec<Option<usize>>,
}

/// Contingency counts of two splits over `n` tips.
struct Contingency {
    both: usize,
    a_only: usize,
    b_only: usize,
    neither: usize,
}

impl Contingency {
    fn new(a: &Split, b: &Split, n: usize) -> Self {
        let both = a.count_overlap(b);
        let a_only = a.leaf_count() - both;
        let b_only = b.leaf_count() - both;
        let neither = n - a.leaf_count() - b_only;
        Contingency {
            both,
            a_only,
            b_only,
            neither,
        }
    }

    /// The splits describe the same bipartition.
    fn is_exact(&self) -> bool {
        (self.a_only == 0 && self.b_only == 0) || (self.both == 0 && self.neither == 0)
    }

    fn is_uniform(&self) -> bool {
        self.both == self.a_only && self.both == self.b_only && self.both == self.neither
    }
}

/// Solver cost of pairing splits `a` and `b`.
///
/// Sums `n_c * log2(n_c * n / (n_row * n_col))` over the four contingency
/// cells (Meila's variation-of-information terms), which is `n` times the
/// mutual information of the two splits. Each cell's row and column sums are
/// combined symmetrically so that swapping the operands transposes the
/// matrix exactly.
fn pair_cost(a: &Split, b: &Split, n: usize, tables: &InfoTables) -> i64 {
    let cells = Contingency::new(a, b, n);
    if cells.is_uniform() {
        // Independent splits; skip the logs so no rounding creeps in.
        return MAX_SCORE;
    }

    let n_a = a.leaf_count();
    let n_b = b.leaf_count();
    let lg2_n = tables.log2(n);
    let term = |cell: usize, row: usize, col: usize| -> f64 {
        if cell == 0 {
            0.0
        } else {
            cell as f64 * ((tables.log2(cell) + lg2_n) - (tables.log2(row) + tables.log2(col)))
        }
    };

    let info = term(cells.both, n_a, n_b)
        + term(cells.neither, n - n_a, n - n_b)
        + (term(cells.a_only, n_a, n - n_b) + term(cells.b_only, n - n_a, n_b));

    let scaled = (MAX_SCORE as f64 / n as f64 * info).round() as i64;
    MAX_SCORE - scaled.clamp(0, MAX_SCORE)
}

/// Match the splits of two trees and measure their mutual clustering
/// information.
///
/// # Algorithm
/// 1. Splits of A that coincide with a split of B are paired directly and
///    contribute their full entropy. A split of B may serve more than one
///    split of A here, which only matters for lists holding duplicates.
/// 2. The remaining splits are paired by solving an assignment problem on
///    `MAX_SCORE - scaled mutual information`, padded with `MAX_SCORE`.
/// 3. The solver's cost converts back to bits as
///    `(MAX_SCORE * dim - cost) / MAX_SCORE`.
///
/// # Errors
/// [`DistanceError::SizeMismatch`] if either list is not over `n_tips` tips.
pub fn mutual_clustering(
    a: &SplitList,
    b: &SplitList,
    n_tips: usize,
) -> Result<ClusteringMatch, DistanceError> {
    ensure_same_size(n_tips, a.n_tips())?;
    ensure_same_size(n_tips, b.n_tips())?;

    let mut matching = vec![None; a.len()];
    if a.is_empty() || b.is_empty() || n_tips == 0 {
        return Ok(ClusteringMatch {
            info: 0.0,
            matching,
        });
    }

    let tables = InfoTables::global();
    let n = n_tips;

    // Exact and complementary matches bypass the solver.
    let mut exact_score = 0.0;
    let mut exact_matches = 0usize;
    let mut b_matched = vec![false; b.len()];
    for (ai, split_a) in a.iter().enumerate() {
        let partner = b
            .iter()
            .position(|split_b| Contingency::new(split_a, split_b, n).is_exact());
        if let Some(bi) = partner {
            let na = split_a.leaf_count();
            exact_score += tables.matching_information(na, n - na);
            exact_matches += 1;
            matching[ai] = Some(bi);
            b_matched[bi] = true;
        }
    }

    let exact_info = exact_score / n as f64;
    let m = a.len().max(b.len()).saturating_sub(exact_matches);
    if m == 0 {
        debug!(exact_matches, "All splits matched exactly");
        return Ok(ClusteringMatch {
            info: exact_info,
            matching,
        });
    }

    let rows: Vec<usize> = (0..a.len()).filter(|&ai| matching[ai].is_none()).collect();
    let cols: Vec<usize> = (0..b.len()).filter(|&bi| !b_matched[bi]).collect();
    if rows.is_empty() || cols.is_empty() {
        return Ok(ClusteringMatch {
            info: exact_info,
            matching,
        });
    }

    let dim = m.max(rows.len()).max(cols.len());
    let mut costs = CostMatrix::filled(dim, MAX_SCORE);
    for (r, &ai) in rows.iter().enumerate() {
        let split_a = &a.as_slice()[ai];
        for (c, &bi) in cols.iter().enumerate() {
            costs.set(r, c, pair_cost(split_a, &b.as_slice()[bi], n, tables));
        }
    }

    let solution = lap(&costs);
    for (r, &ai) in rows.iter().enumerate() {
        matching[ai] = solution.row_to_col[r]
            .filter(|&c| c < cols.len())
            .map(|c| cols[c]);
    }

    let lap_info = (MAX_SCORE as f64 * dim as f64 - solution.cost as f64) / MAX_SCORE as f64;
    debug!(exact_matches, dim, lap_info, exact_info, "Matched splits");

    Ok(ClusteringMatch {
        info: lap_info + exact_info,
        matching,
    })
}

/// Mutual clustering information of two trees, in bits.
pub fn mutual_clustering_info(
    a: &SplitList,
    b: &SplitList,
    n_tips: usize,
) -> Result<f64, DistanceError> {
    mutual_clustering(a, b, n_tips).map(|m| m.info)
}

/// Compute the Clustering Information Distance between two trees.
///
/// `H(A) + H(B) - 2 * MCI(A, B)`, clamped at zero. With `normalize` the
/// result is divided by `H(A) + H(B)`, giving 0 for identical topologies and
/// 1 for trees sharing no clustering information.
///
/// # Errors
/// [`DistanceError::SizeMismatch`] if either list is not over `n_tips` tips.
pub fn clustering_info_distance(
    a: &SplitList,
    b: &SplitList,
    n_tips: usize,
    normalize: bool,
) -> Result<f64, DistanceError> {
    let mci = mutual_clustering_info(a, b, n_tips)?;
    let total_entropy = a.total_clustering_entropy() + b.total_clustering_entropy();
    let mut distance = total_entropy - 2.0 * mci;
    if distance < ZERO_TOLERANCE {
        distance = 0.0;
    }
    if normalize && total_entropy > 0.0 {
        Ok(distance / total_entropy)
    } else {
        Ok(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{random_newick, splits_of};
    use proptest::prelude::*;

    #[test]
    fn test_quartets_share_nothing() {
        let a = splits_of("((a,b),(c,d));");
        let b = splits_of("((a,c),(b,d));");
        assert_eq!(mutual_clustering_info(&a, &b, 4).unwrap(), 0.0);
        assert_eq!(clustering_info_distance(&a, &b, 4, true).unwrap(), 1.0);
        assert_eq!(clustering_info_distance(&a, &b, 4, false).unwrap(), 2.0);
    }

    #[test]
    fn test_identical_trees() {
        let a = splits_of("(((A,B),(C,D)),((E,F),(G,H)));");
        let b = splits_of("(((H,G),(E,F)),((C,D),(B,A)));");
        let m = mutual_clustering(&a, &b, 8).unwrap();
        assert!((m.info - a.total_clustering_entropy()).abs() < 1e-9);
        assert!(m.matching.iter().all(Option::is_some));
        assert_eq!(clustering_info_distance(&a, &b, 8, true).unwrap(), 0.0);
        assert_eq!(clustering_info_distance(&a, &b, 8, false).unwrap(), 0.0);
    }

    #[test]
    fn test_partial_agreement() {
        // Shares {A,B}; the other split differs but still carries information.
        let a = splits_of("(((A,B),C),(D,(E,F)));");
        let b = splits_of("(((A,B),D),(C,(E,F)));");
        let mci = mutual_clustering_info(&a, &b, 6).unwrap();
        let total = a.total_clustering_entropy() + b.total_clustering_entropy();
        let d = clustering_info_distance(&a, &b, 6, true).unwrap();
        assert!(mci > 0.0 && 2.0 * mci < total);
        assert!(d > 0.0 && d < 1.0);
        assert!((d - (total - 2.0 * mci) / total).abs() < 1e-12);
    }

    #[test]
    fn test_pair_cost_of_identical_split_is_zero() {
        let tables = InfoTables::global();
        let s = Split::from_tips(&[0, 1, 2], 8);
        // Mutual information equals the split entropy, so the cost nearly vanishes.
        let cost = pair_cost(&s, &s, 8, tables);
        let expected = MAX_SCORE as f64 * (1.0 - tables.split_clustering_entropy(3, 8));
        assert!((cost as f64 - expected).abs() <= 1.0);
        let uniform = pair_cost(&Split::from_tips(&[0, 1], 4), &Split::from_tips(&[0, 2], 4), 4, tables);
        assert_eq!(uniform, MAX_SCORE);
    }

    #[test]
    fn test_empty_lists_and_star_trees() {
        let star = splits_of("(A,B,C,D,E);");
        let tree = splits_of("((A,B),(C,(D,E)));");
        assert_eq!(mutual_clustering_info(&star, &tree, 5).unwrap(), 0.0);
        assert_eq!(clustering_info_distance(&star, &star, 5, true).unwrap(), 0.0);
        // All entropy belongs to the resolved tree.
        assert_eq!(clustering_info_distance(&star, &tree, 5, true).unwrap(), 1.0);
        let empty = SplitList::new_empty(0);
        assert_eq!(mutual_clustering_info(&empty, &empty, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_size_mismatch() {
        let a = splits_of("((A,B),(C,D));");
        assert!(matches!(
            clustering_info_distance(&a, &a, 5, true),
            Err(DistanceError::SizeMismatch { left: 5, right: 4 })
        ));
    }

    #[test]
    fn test_duplicate_splits_share_a_partner() {
        let n = 6;
        let ab = Split::from_tips(&[0, 1], n);
        let a = SplitList::from_splits(vec![ab.clone(), ab.complement()], n).unwrap();
        let b = SplitList::from_splits(vec![ab.clone()], n).unwrap();
        let m = mutual_clustering(&a, &b, n).unwrap();
        assert_eq!(m.matching, vec![Some(0), Some(0)]);
        let expected = 2.0 * InfoTables::global().split_clustering_entropy(2, n);
        assert!((m.info - expected).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_cid_is_a_metric(
            n in 5usize..12,
            p in proptest::collection::vec(0usize..64, 8),
            q in proptest::collection::vec(0usize..64, 8),
            r in proptest::collection::vec(0usize..64, 8),
        ) {
            let x = splits_of(&random_newick(n, &p));
            let y = splits_of(&random_newick(n, &q));
            let z = splits_of(&random_newick(n, &r));

            let dxy = clustering_info_distance(&x, &y, n, false).unwrap();
            let dyx = clustering_info_distance(&y, &x, n, false).unwrap();
            let dxz = clustering_info_distance(&x, &z, n, false).unwrap();
            let dyz = clustering_info_distance(&y, &z, n, false).unwrap();

            prop_assert_eq!(clustering_info_distance(&x, &x, n, false).unwrap(), 0.0);
            prop_assert!((dxy - dyx).abs() < 1e-6);
            prop_assert!(dxz <= dxy + dyz + 1e-6);

            let nxy = clustering_info_distance(&x, &y, n, true).unwrap();
            let nyx = clustering_info_distance(&y, &x, n, true).unwrap();
            let nxz = clustering_info_distance(&x, &z, n, true).unwrap();
            let nyz = clustering_info_distance(&y, &z, n, true).unwrap();
            prop_assert_eq!(clustering_info_distance(&x, &x, n, true).unwrap(), 0.0);
            prop_assert!((nxy - nyx).abs() < 1e-9);
            prop_assert!(nxz <= nxy + nyz + 1e-9);
            for d in [nxy, nxz, nyz] {
                prop_assert!((0.0..=1.0 + 1e-12).contains(&d));
            }
        }
    }
}

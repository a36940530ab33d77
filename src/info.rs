//! Precomputed logarithm tables feeding the entropy and information formulas.
//!
//! # Overview
//! Every information quantity in this crate reduces to sums of `log2(k)` and
//! `log2(k!!)` for small integers `k` bounded by the number of tips. These are
//! tabulated once per process (see [`InfoTables::global`]) and read without
//! locking afterwards. Arguments beyond the tabulated range are computed with
//! the same recurrences, so results never depend on the cache size.
//!
//! # Counting trees
//! The number of rooted binary trees on `n` labelled tips is `(2n - 3)!!`,
//! and an unrooted tree on `n` tips corresponds to a rooted tree on `n - 1`:
//!
//! | n | rooted | unrooted |
//! |---|--------|----------|
//! | 3 | 3      | 1        |
//! | 4 | 15     | 3        |
//! | 5 | 105    | 15       |

use std::sync::OnceLock;
use tracing::debug;

/// Tip count covered by the process-wide tables unless configured otherwise.
pub const DEFAULT_MAX_TIPS: usize = 4096;

static GLOBAL: OnceLock<InfoTables> = OnceLock::new();

/// Cached `log2(k)` and `log2(k!!)` values.
#[derive(Debug, Clone)]
pub struct InfoTables {
    max_tips: usize,
    log2: Vec<f64>,
    log2_double_factorial: Vec<f64>,
}

impl InfoTables {
    /// Builds tables sufficient for trees with up to `max_tips` tips.
    ///
    /// `log2` is tabulated on `0..=max_tips`, the double factorial on
    /// `0..=2 * max_tips` (rooted tree counts need `2n - 3`).
    pub fn new(max_tips: usize) -> Self {
        let log2 = (0..=max_tips).map(|k| (k as f64).log2()).collect();

        let df_len = 2 * max_tips + 1;
        let mut log2_double_factorial = vec![0.0f64; df_len.max(2)];
        for k in 2..df_len {
            log2_double_factorial[k] = log2_double_factorial[k - 2] + (k as f64).log2();
        }

        InfoTables {
            max_tips,
            log2,
            log2_double_factorial,
        }
    }

    /// The process-wide tables, built on first access.
    pub fn global() -> &'static InfoTables {
        GLOBAL.get_or_init(|| InfoTables::new(DEFAULT_MAX_TIPS))
    }

    /// Sizes the process-wide tables. Only the first initialization wins;
    /// returns `false` when the tables already existed.
    pub fn init_global(max_tips: usize) -> bool {
        let mut fresh = false;
        GLOBAL.get_or_init(|| {
            fresh = true;
            debug!(max_tips, "Initializing information tables");
            InfoTables::new(max_tips)
        });
        fresh
    }

    pub fn max_tips(&self) -> usize {
        self.max_tips
    }

    #[inline]
    pub fn log2(&self, k: usize) -> f64 {
        match self.log2.get(k) {
            Some(&v) => v,
            None => (k as f64).log2(),
        }
    }

    /// `log2(k!!)`, the log of `k * (k - 2) * ...` down to 1 or 2.
    pub fn log2_double_factorial(&self, k: usize) -> f64 {
        if let Some(&v) = self.log2_double_factorial.get(k) {
            return v;
        }
        // Continue the recurrence from the largest cached value of equal parity.
        let cached = self.log2_double_factorial.len();
        let mut start = cached - 1;
        if (start ^ k) & 1 == 1 {
            start -= 1;
        }
        let mut acc = self.log2_double_factorial[start];
        let mut j = start + 2;
        while j <= k {
            acc += (j as f64).log2();
            j += 2;
        }
        acc
    }

    /// `log2` of the number of rooted binary trees on `n` tips.
    pub fn log2_rooted_trees(&self, n: usize) -> f64 {
        if n < 3 {
            0.0
        } else {
            self.log2_double_factorial(2 * n - 3)
        }
    }

    /// `log2` of the number of unrooted binary trees on `n` tips.
    pub fn log2_unrooted_trees(&self, n: usize) -> f64 {
        self.log2_rooted_trees(n.saturating_sub(1))
    }

    /// Shannon entropy (bits) of a split dividing `n` tips into `a | n - a`.
    pub fn split_clustering_entropy(&self, a: usize, n: usize) -> f64 {
        if a == 0 || a >= n {
            return 0.0;
        }
        let p = a as f64 / n as f64;
        let q = (n - a) as f64 / n as f64;
        -p * p.log2() - q * q.log2()
    }

    /// Phylogenetic information (bits) of a split `a | n - a`: the log of the
    /// fraction of unrooted binary trees that contain it, negated.
    pub fn split_phylogenetic_info(&self, a: usize, n: usize) -> f64 {
        if a <= 1 || a >= n || n - a <= 1 {
            return 0.0;
        }
        self.log2_unrooted_trees(n) - self.log2_rooted_trees(a) - self.log2_rooted_trees(n - a)
    }

    /// Information, in tips x bits, shared by two identical splits `a | b`:
    /// `(a + b)log2(a + b) - a log2(a) - b log2(b)`.
    pub fn matching_information(&self, a: usize, b: usize) -> f64 {
        let total = a + b;
        let term = |k: usize| if k == 0 { 0.0 } else { k as f64 * self.log2(k) };
        term(total) - term(a) - term(b)
    }
}

pub fn log2(k: usize) -> f64 {
    InfoTables::global().log2(k)
}

pub fn log2_double_factorial(k: usize) -> f64 {
    InfoTables::global().log2_double_factorial(k)
}

pub fn log2_rooted_trees(n: usize) -> f64 {
    InfoTables::global().log2_rooted_trees(n)
}

pub fn log2_unrooted_trees(n: usize) -> f64 {
    InfoTables::global().log2_unrooted_trees(n)
}

pub fn split_clustering_entropy(a: usize, n: usize) -> f64 {
    InfoTables::global().split_clustering_entropy(a, n)
}

pub fn split_phylogenetic_info(a: usize, n: usize) -> f64 {
    InfoTables::global().split_phylogenetic_info(a, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    #[test]
    fn test_double_factorial_small_values() {
        let t = InfoTables::new(16);
        assert_eq!(t.log2_double_factorial(0), 0.0);
        assert_eq!(t.log2_double_factorial(1), 0.0);
        // 5!! = 15, 6!! = 48
        assert!((t.log2_double_factorial(5) - 15f64.log2()).abs() < TOL);
        assert!((t.log2_double_factorial(6) - 48f64.log2()).abs() < TOL);
    }

    #[test]
    fn test_out_of_range_matches_cached() {
        let small = InfoTables::new(4);
        let large = InfoTables::new(64);
        for k in [0usize, 3, 9, 10, 17, 50, 101, 128] {
            assert!(
                (small.log2_double_factorial(k) - large.log2_double_factorial(k)).abs() < 1e-9,
                "k = {k}"
            );
            assert!((small.log2(k) - large.log2(k)).abs() < TOL || k == 0);
        }
        assert!((small.log2_rooted_trees(30) - large.log2_rooted_trees(30)).abs() < 1e-9);
    }

    #[test]
    fn test_tree_counts() {
        let t = InfoTables::new(32);
        assert_eq!(t.log2_rooted_trees(2), 0.0);
        assert!((t.log2_rooted_trees(3) - 3f64.log2()).abs() < TOL);
        assert!((t.log2_rooted_trees(4) - 15f64.log2()).abs() < TOL);
        assert!((t.log2_unrooted_trees(4) - 3f64.log2()).abs() < TOL);
        assert!((t.log2_unrooted_trees(5) - 15f64.log2()).abs() < TOL);
        assert_eq!(t.log2_unrooted_trees(3), 0.0);
        assert_eq!(t.log2_unrooted_trees(0), 0.0);
    }

    #[test]
    fn test_clustering_entropy() {
        let t = InfoTables::new(16);
        assert_eq!(t.split_clustering_entropy(0, 8), 0.0);
        assert_eq!(t.split_clustering_entropy(8, 8), 0.0);
        assert!((t.split_clustering_entropy(4, 8) - 1.0).abs() < TOL);
        assert!((t.split_clustering_entropy(2, 8) - t.split_clustering_entropy(6, 8)).abs() < TOL);
    }

    #[test]
    fn test_phylogenetic_info() {
        let t = InfoTables::new(16);
        // One of the three unrooted quartets contains {a,b}|{c,d}.
        assert!((t.split_phylogenetic_info(2, 4) - 3f64.log2()).abs() < TOL);
        assert_eq!(t.split_phylogenetic_info(1, 6), 0.0);
        assert_eq!(t.split_phylogenetic_info(5, 6), 0.0);
        // 15 unrooted trees on 5 tips, 3 of them hold {a,b}|{c,d,e}.
        assert!((t.split_phylogenetic_info(2, 5) - 5f64.log2()).abs() < TOL);
    }

    #[test]
    fn test_matching_information_is_n_times_entropy() {
        let t = InfoTables::new(16);
        for (a, n) in [(2usize, 4usize), (3, 8), (5, 11)] {
            let expected = n as f64 * t.split_clustering_entropy(a, n);
            assert!((t.matching_information(a, n - a) - expected).abs() < 1e-9);
        }
        assert_eq!(t.matching_information(0, 5), 0.0);
    }
}

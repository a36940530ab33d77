//! Tree builders shared by the unit tests.

use phylotree::tree::Tree as PhyloTree;

use crate::splits::{SplitList, build_splits};

pub(crate) fn splits_of(newick: &str) -> SplitList {
    build_splits(&PhyloTree::from_newick(newick).unwrap()).unwrap()
}

/// Random rooted binary tree over tips `t00..t{n-1}`, joining pairs of
/// subtrees chosen by `picks`.
pub(crate) fn random_newick(n: usize, picks: &[usize]) -> String {
    let mut parts: Vec<String> = (0..n).map(|i| format!("t{i:02}")).collect();
    let mut k = 0;
    while parts.len() > 1 {
        let i = picks[k % picks.len()] % parts.len();
        let left = parts.swap_remove(i);
        let j = picks[(k + 1) % picks.len()] % parts.len();
        let right = parts.swap_remove(j);
        parts.push(format!("({left},{right})"));
        k += 2;
    }
    format!("{};", parts[0])
}

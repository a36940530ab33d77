//! Python binding layer for tree distance calculations.
//!
//! Provides Python functions for computing pairwise tree distances
//! from BEAST/NEXUS or Newick tree files.

use phylotree::tree::Tree as PhyloTree;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashSet;

use crate::distances::{Metric, build_split_lists, pairwise_distances as pairwise_matrix};
use crate::error::DistanceError;
use crate::io::{BurnIn, read_trees};

fn value_error(e: DistanceError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Compute a pairwise distance matrix from multiple tree files.
///
/// Args:
///     paths: List of file paths to BEAST/NEXUS or Newick tree files
///     metric: One of rf, normalized-rf, info-rf, normalized-info-rf, cid,
///         normalized-cid (default: cid)
///     burnin_trees: Number of trees to skip at the beginning of each file (default: 0)
///     burnin_states: Minimum STATE value to keep trees (default: 0)
///     use_real_taxa: Use TRANSLATE block for taxon names when available (default: True)
///
/// Returns:
///     A tuple of (tree_names, distance_matrix)
///
/// Raises:
///     ValueError: If no trees are found, trees have different leaf sets, or
///         the metric name is unknown
#[pyfunction]
#[pyo3(signature = (paths, metric="cid", burnin_trees=0, burnin_states=0, use_real_taxa=true))]
fn pairwise_distances(
    paths: Vec<String>,
    metric: &str,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<Vec<f64>>)> {
    let metric: Metric = metric.parse().map_err(value_error)?;
    let burnin = BurnIn {
        trees: burnin_trees,
        states: burnin_states,
    };
    compute(&paths, metric, &burnin, use_real_taxa)
}

/// Pairwise Robinson-Foulds distances (count of unshared splits).
#[pyfunction]
#[pyo3(signature = (paths, burnin_trees=0, burnin_states=0, use_real_taxa=true))]
fn pairwise_rf(
    paths: Vec<String>,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<Vec<usize>>)> {
    let burnin = BurnIn {
        trees: burnin_trees,
        states: burnin_states,
    };
    let (names, matrix) = compute(&paths, Metric::Rf, &burnin, use_real_taxa)?;
    let counts = matrix
        .into_iter()
        .map(|row| row.into_iter().map(|d| d as usize).collect())
        .collect();
    Ok((names, counts))
}

/// Pairwise clustering information distances, normalized to [0, 1] by default.
#[pyfunction]
#[pyo3(signature = (paths, normalize=true, burnin_trees=0, burnin_states=0, use_real_taxa=true))]
fn pairwise_cid(
    paths: Vec<String>,
    normalize: bool,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<Vec<f64>>)> {
    let metric = if normalize {
        Metric::NormalizedCid
    } else {
        Metric::Cid
    };
    let burnin = BurnIn {
        trees: burnin_trees,
        states: burnin_states,
    };
    compute(&paths, metric, &burnin, use_real_taxa)
}

fn compute(
    paths: &[String],
    metric: Metric,
    burnin: &BurnIn,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<Vec<f64>>)> {
    let (tree_names, trees) = read_all_trees(paths, burnin, use_real_taxa)?;
    sanity_check_trees(&trees)?;

    let lists = build_split_lists(&trees).map_err(value_error)?;
    let matrix = pairwise_matrix(&lists, metric).map_err(value_error)?;
    Ok((tree_names, matrix))
}

/// Helper function to read trees from multiple files
fn read_all_trees(
    paths: &[String],
    burnin: &BurnIn,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<PhyloTree>)> {
    let mut all_tree_names = Vec::new();
    let mut all_trees = Vec::new();

    for (file_idx, path) in paths.iter().enumerate() {
        let named_trees = read_trees(path, burnin, use_real_taxa)
            .map_err(|e| PyValueError::new_err(format!("Failed to read '{path}': {e}")))?;

        if named_trees.is_empty() {
            return Err(PyValueError::new_err(format!(
                "No trees found in file '{path}' after burnin removal"
            )));
        }

        // Prefix names with the file position so pooled runs stay distinct
        for (name, tree) in named_trees {
            all_tree_names.push(format!("file{file_idx}_{name}"));
            all_trees.push(tree);
        }
    }

    Ok((all_tree_names, all_trees))
}

fn leaf_label_set(tree: &PhyloTree) -> HashSet<String> {
    tree.get_leaves()
        .iter()
        .filter_map(|&id| tree.get(&id).ok()?.name.clone())
        .collect()
}

/// Perform sanity checks on trees
fn sanity_check_trees(trees: &[PhyloTree]) -> PyResult<()> {
    if trees.len() < 2 {
        return Err(PyValueError::new_err(
            "Need at least 2 trees to compute pairwise distances",
        ));
    }

    let first_leaves = leaf_label_set(&trees[0]);
    for (idx, tree) in trees.iter().enumerate().skip(1) {
        let leaves = leaf_label_set(tree);
        if leaves != first_leaves {
            return Err(PyValueError::new_err(format!(
                "Tree {idx} has {} leaves differing from tree 0 ({} leaves). All trees must have the same taxa.",
                leaves.len(),
                first_leaves.len()
            )));
        }
    }

    Ok(())
}

/// Python module definition
#[pymodule]
fn tree_info_distances(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(pairwise_distances, m)?)?;
    m.add_function(wrap_pyfunction!(pairwise_rf, m)?)?;
    m.add_function(wrap_pyfunction!(pairwise_cid, m)?)?;
    Ok(())
}

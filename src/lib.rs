//! Crate root: module orchestration and public re-exports.
//!
//! Modules:
//! - `info`: cached log2 tables and split information content.
//! - `split`: word-packed bipartition of a fixed tip set.
//! - `splits`: split lists extracted from `phylotree` trees.
//! - `lap`: Jonker-Volgenant linear assignment solver.
//! - `distances`: Robinson-Foulds family, metric selection, pairwise matrices.
//! - `clustering`: mutual clustering information and clustering info distance.
//! - `io`: reading BEAST/NEXUS and Newick tree files, writing TSV matrices.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod clustering;
pub mod distances;
pub mod error;
pub mod info;
pub mod io;
pub mod lap;
pub mod split;
pub mod splits;

#[cfg(test)]
mod testing;

#[cfg(feature = "python")]
pub mod api;

pub use clustering::{clustering_info_distance, mutual_clustering_info};
pub use distances::{
    Metric, info_robinson_foulds, normalized_info_robinson_foulds, normalized_robinson_foulds,
    robinson_foulds,
};
pub use error::DistanceError;
pub use io::{read_beast_trees, read_trees, write_matrix_tsv};
pub use lap::solve_assignment;
pub use split::Split;
pub use splits::{SplitList, TipIndex, build_splits};

//! Minimum-cost assignment of rows to columns (the linear assignment problem).
//!
//! # Overview
//! Dense shortest-augmenting-path solver after Jonker & Volgenant (1987). It
//! keeps a price `v[j]` per column and works on reduced costs
//! `c(i, j) - v[j]`:
//!
//! 1. **Column reduction**: each column is priced at its minimum entry and
//!    tentatively given to the row achieving it.
//! 2. **Reduction transfer**: rows holding exactly one column push their
//!    slack onto that column's price.
//! 3. **Augmenting row reduction** (two passes): free rows grab their best
//!    column, displacing its owner, while that strictly raises prices.
//! 4. **Augmentation**: a Dijkstra-style search from each remaining free row
//!    finds the cheapest alternating path to an unassigned column.
//!
//! Costs are integers. The callers in this crate scale floating-point
//! information scores to integers first; the tie tolerance in step 3 absorbs
//! the rounding that scaling introduces.

use tracing::debug;

use crate::error::DistanceError;

/// Largest accepted cost magnitude.
///
/// Leaves headroom for the price arithmetic over any realistic dimension.
pub const BIG: i64 = i64::MAX / 65_536;

/// Reduced costs above this magnitude are treated as equal within
/// [`TIE_TOLERANCE`].
const ROUND_PRECISION: i64 = 2048 * 2048;
const TIE_TOLERANCE: i64 = 8;

#[inline]
fn nontrivially_less_than(a: i64, b: i64) -> bool {
    let tolerance = if a > ROUND_PRECISION { TIE_TOLERANCE } else { 0 };
    a + tolerance < b
}

/// Square, row-major integer cost matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostMatrix {
    dim: usize,
    data: Vec<i64>,
}

impl CostMatrix {
    /// A `dim x dim` matrix filled with `fill`.
    pub fn filled(dim: usize, fill: i64) -> Self {
        CostMatrix {
            dim,
            data: vec![fill; dim * dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> i64 {
        self.data[row * self.dim + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: i64) {
        self.data[row * self.dim + col] = value;
    }
}

/// An optimal assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Sum of the chosen costs.
    pub cost: i64,
    /// Column assigned to each row; `None` when the row is unassigned.
    pub row_to_col: Vec<Option<usize>>,
    /// Row assigned to each column; `None` when the column is unassigned.
    pub col_to_row: Vec<Option<usize>>,
}

/// Solves a rectangular assignment problem given as a row-major slice.
///
/// The matrix is padded to square with a sentinel one above the largest cost
/// (never more than [`BIG`]). Rows or columns that end up
/// paired with padding are reported as `None`, and `cost` covers real cells
/// only. When `n_rows <= n_cols` every row is assigned (and vice versa).
///
/// # Errors
/// [`DistanceError::InvalidInput`] if `costs.len() != n_rows * n_cols` or a
/// cost exceeds [`BIG`] in magnitude.
///
/// # Example
/// ```
/// # use tree_info_distances::lap::solve_assignment;
/// let a = solve_assignment(&[1, 2, 2, 1], 2, 2).unwrap();
/// assert_eq!(a.cost, 2);
/// assert_eq!(a.row_to_col, vec![Some(0), Some(1)]);
/// ```
pub fn solve_assignment(
    costs: &[i64],
    n_rows: usize,
    n_cols: usize,
) -> Result<Assignment, DistanceError> {
    let expected = n_rows
        .checked_mul(n_cols)
        .ok_or_else(|| DistanceError::InvalidInput("matrix dimensions overflow".to_string()))?;
    if costs.len() != expected {
        return Err(DistanceError::InvalidInput(format!(
            "expected {n_rows} x {n_cols} = {expected} costs, got {}",
            costs.len()
        )));
    }
    if let Some(bad) = costs.iter().find(|c| c.unsigned_abs() > BIG as u64) {
        return Err(DistanceError::InvalidInput(format!(
            "cost {bad} exceeds the solver range of +/-{BIG}"
        )));
    }

    // Any constant padding leaves the optimal real cells unchanged; one above
    // the largest real cost keeps padded rows out of the tie tolerance.
    let pad = costs.iter().max().map_or(0, |&m| (m + 1).min(BIG));
    let dim = n_rows.max(n_cols);
    let mut matrix = CostMatrix::filled(dim, pad);
    for (row, chunk) in costs.chunks(n_cols.max(1)).take(n_rows).enumerate() {
        for (col, &cost) in chunk.iter().enumerate() {
            matrix.set(row, col, cost);
        }
    }

    let square = lap(&matrix);

    let row_to_col: Vec<Option<usize>> = square.row_to_col[..n_rows]
        .iter()
        .map(|c| c.filter(|&c| c < n_cols))
        .collect();
    let col_to_row: Vec<Option<usize>> = square.col_to_row[..n_cols]
        .iter()
        .map(|r| r.filter(|&r| r < n_rows))
        .collect();
    let cost = row_to_col
        .iter()
        .enumerate()
        .filter_map(|(row, col)| col.map(|col| costs[row * n_cols + col]))
        .sum();

    Ok(Assignment {
        cost,
        row_to_col,
        col_to_row,
    })
}

/// Solves an assignment problem given as one `Vec` per row.
///
/// # Errors
/// [`DistanceError::InvalidInput`] if the rows differ in length.
pub fn solve_assignment_rows(rows: &[Vec<i64>]) -> Result<Assignment, DistanceError> {
    let n_cols = rows.first().map_or(0, Vec::len);
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(DistanceError::InvalidInput(format!(
            "row {idx} has {} columns, expected {n_cols}",
            row.len()
        )));
    }
    let flat: Vec<i64> = rows.iter().flatten().copied().collect();
    solve_assignment(&flat, rows.len(), n_cols)
}

/// Solves a square assignment problem. The reported cost includes every
/// assigned cell, padding included.
pub(crate) fn lap(matrix: &CostMatrix) -> Assignment {
    let dim = matrix.dim();
    if dim == 0 {
        return Assignment {
            cost: 0,
            row_to_col: Vec::new(),
            col_to_row: Vec::new(),
        };
    }

    let c = |i: usize, j: usize| matrix.get(i, j);
    let mut v = vec![0i64; dim];
    let mut rowsol: Vec<Option<usize>> = vec![None; dim];
    let mut colsol: Vec<Option<usize>> = vec![None; dim];

    // Column reduction, scanning columns in reverse.
    let mut matches = vec![0usize; dim];
    for j in (0..dim).rev() {
        let mut imin = 0;
        let mut min = c(0, j);
        for i in 1..dim {
            if c(i, j) < min {
                min = c(i, j);
                imin = i;
            }
        }
        v[j] = min;
        matches[imin] += 1;
        match rowsol[imin] {
            None => {
                rowsol[imin] = Some(j);
                colsol[j] = Some(imin);
            }
            Some(j1) if v[j] < v[j1] => {
                rowsol[imin] = Some(j);
                colsol[j] = Some(imin);
                colsol[j1] = None;
            }
            Some(_) => colsol[j] = None,
        }
    }

    // Reduction transfer.
    let mut free_rows = Vec::with_capacity(dim);
    for i in 0..dim {
        match (matches[i], rowsol[i]) {
            (0, _) => free_rows.push(i),
            (1, Some(j1)) => {
                let slack = (0..dim)
                    .filter(|&j| j != j1)
                    .map(|j| c(i, j) - v[j])
                    .min();
                if let Some(slack) = slack {
                    v[j1] -= slack;
                }
            }
            _ => {}
        }
    }

    // Augmenting row reduction, two passes.
    for _ in 0..2 {
        let mut k = 0;
        let mut pending = std::mem::take(&mut free_rows);
        while k < pending.len() {
            let i = pending[k];
            k += 1;

            let mut umin = c(i, 0) - v[0];
            let mut j1 = 0;
            let mut usubmin = i64::MAX;
            let mut j2 = 0;
            for j in 1..dim {
                let h = c(i, j) - v[j];
                if h < usubmin {
                    if h >= umin {
                        usubmin = h;
                        j2 = j;
                    } else {
                        usubmin = umin;
                        umin = h;
                        j2 = j1;
                        j1 = j;
                    }
                }
            }

            let mut i0 = colsol[j1];
            let strict = dim > 1 && nontrivially_less_than(umin, usubmin);
            if strict {
                // Raise the reduced cost of j1 up to the runner-up.
                v[j1] -= usubmin - umin;
            } else if i0.is_some() && dim > 1 {
                // Tie: the runner-up column may be free.
                j1 = j2;
                i0 = colsol[j2];
            }

            rowsol[i] = Some(j1);
            colsol[j1] = Some(i);

            if let Some(i0) = i0 {
                rowsol[i0] = None;
                if strict {
                    // Continue the augmenting path from the displaced row.
                    k -= 1;
                    pending[k] = i0;
                } else {
                    free_rows.push(i0);
                }
            }
        }
    }

    // Augment a shortest alternating path from each remaining free row.
    let mut d = vec![0i64; dim];
    let mut predecessor = vec![0usize; dim];
    let mut col_list: Vec<usize> = (0..dim).collect();
    for &free_row in &free_rows {
        for j in 0..dim {
            d[j] = c(free_row, j) - v[j];
            predecessor[j] = free_row;
            col_list[j] = j;
        }

        // col_list[..low] are settled, col_list[low..up] sit at the current
        // minimum and col_list[up..] are still to be reached.
        let mut low = 0;
        let mut up = 0;
        let mut settled = 0;
        let mut min = 0i64;
        let mut end_of_path = None;

        while end_of_path.is_none() {
            if up == low {
                settled = low;
                min = d[col_list[up]];
                up += 1;
                for k in up..dim {
                    let j = col_list[k];
                    let h = d[j];
                    if h <= min {
                        if h < min {
                            up = low;
                            min = h;
                        }
                        col_list[k] = col_list[up];
                        col_list[up] = j;
                        up += 1;
                    }
                }
                end_of_path = col_list[low..up]
                    .iter()
                    .copied()
                    .find(|&j| colsol[j].is_none());
                if end_of_path.is_some() {
                    break;
                }
            }

            let j1 = col_list[low];
            low += 1;
            let Some(i) = colsol[j1] else {
                end_of_path = Some(j1);
                break;
            };
            let h = c(i, j1) - v[j1] - min;
            let mut k = up;
            while k < dim {
                let j = col_list[k];
                let v2 = c(i, j) - v[j] - h;
                if v2 < d[j] {
                    predecessor[j] = i;
                    if v2 == min {
                        if colsol[j].is_none() {
                            end_of_path = Some(j);
                            d[j] = v2;
                            break;
                        }
                        col_list[k] = col_list[up];
                        col_list[up] = j;
                        up += 1;
                    }
                    d[j] = v2;
                }
                k += 1;
            }
        }

        // Update prices of the settled columns.
        for &j in &col_list[..settled] {
            v[j] += d[j] - min;
        }

        // Flip assignments along the alternating path.
        let mut j = match end_of_path {
            Some(j) => j,
            None => continue,
        };
        loop {
            let i = predecessor[j];
            colsol[j] = Some(i);
            let next = rowsol[i];
            rowsol[i] = Some(j);
            if i == free_row {
                break;
            }
            match next {
                Some(next) => j = next,
                None => break,
            }
        }
    }

    let cost = rowsol
        .iter()
        .enumerate()
        .filter_map(|(i, j)| j.map(|j| c(i, j)))
        .sum();
    debug!(dim, cost, "Solved assignment");

    Assignment {
        cost,
        row_to_col: rowsol,
        col_to_row: colsol,
    }
}

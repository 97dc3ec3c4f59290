// State is (row, col1, col2). A cell shared by both agents on one row counts
// once. Values only need the row below; successors are kept for every row.

use ndarray::{Array2, Array3};
use tracing::debug;

use crate::environment::Pos;
use crate::error::{EngineError, Result};

/// Optimal joint route. Columns are 0-indexed, one entry per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub total: u64,
    pub path1: Vec<usize>,
    pub path2: Vec<usize>,
}

impl Plan {
    /// The two routes as 1-indexed board positions, row by row.
    pub fn positions(&self) -> impl Iterator<Item = (Pos, Pos)> + '_ {
        self.path1
            .iter()
            .zip(self.path2.iter())
            .enumerate()
            .map(|(i, (&c1, &c2))| (Pos::new(i + 1, c1 + 1), Pos::new(i + 1, c2 + 1)))
    }
}

fn row_reward(grid: &Array2<u32>, row: usize, j1: usize, j2: usize) -> u64 {
    let first = grid[[row, j1]] as u64;
    if j1 == j2 {
        first
    } else {
        first + grid[[row, j2]] as u64
    }
}

/// Best successor of `(j1, j2)` given the values of the row below.
///
/// Candidates are visited with `nj1` outer and `nj2` inner, both ascending,
/// and the stored choice only changes on a strict improvement, so the first
/// maximal pair wins.
fn best_next(next: &Array2<u64>, j1: usize, j2: usize, cols: usize) -> (u64, (usize, usize)) {
    let lo1 = j1.saturating_sub(1);
    let hi1 = (j1 + 1).min(cols - 1);
    let lo2 = j2.saturating_sub(1);
    let hi2 = (j2 + 1).min(cols - 1);

    let mut best_value = next[[lo1, lo2]];
    let mut best_move = (lo1, lo2);
    for nj1 in lo1..=hi1 {
        for nj2 in lo2..=hi2 {
            let value = next[[nj1, nj2]];
            if value > best_value {
                best_value = value;
                best_move = (nj1, nj2);
            }
        }
    }
    (best_value, best_move)
}

/// Maximum reward two agents can collect walking top to bottom, plus the
/// routes realizing it. Pure: the same grid always gives the same plan.
pub fn solve(grid: &Array2<u32>) -> Result<Plan> {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return Err(EngineError::InvalidGrid { reason: "grid is empty".into() });
    }
    if rows != cols {
        return Err(EngineError::InvalidGrid {
            reason: format!("grid is {}x{}, expected a square", rows, cols),
        });
    }

    let mut next = Array2::<u64>::zeros((cols, cols));
    for j1 in 0..cols {
        for j2 in 0..cols {
            next[[j1, j2]] = row_reward(grid, rows - 1, j1, j2);
        }
    }

    let mut choice = Array3::<(usize, usize)>::from_elem((rows, cols, cols), (0, 0));
    for i in (0..rows - 1).rev() {
        let mut current = Array2::<u64>::zeros((cols, cols));
        for j1 in 0..cols {
            for j2 in 0..cols {
                let (best_value, best_move) = best_next(&next, j1, j2, cols);
                current[[j1, j2]] = row_reward(grid, i, j1, j2) + best_value;
                choice[[i, j1, j2]] = best_move;
            }
        }
        next = current;
    }

    let total = next[[0, cols - 1]];

    let mut path1 = Vec::with_capacity(rows);
    let mut path2 = Vec::with_capacity(rows);
    let (mut j1, mut j2) = (0, cols - 1);
    for i in 0..rows {
        path1.push(j1);
        path2.push(j2);
        if i < rows - 1 {
            let (n1, n2) = choice[[i, j1, j2]];
            j1 = n1;
            j2 = n2;
        }
    }

    debug!(size = rows, total, "planned optimal routes");
    Ok(Plan { total, path1, path2 })
}

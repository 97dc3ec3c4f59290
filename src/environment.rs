use std::io::{Read, Write};

use ndarray::Array2;
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Rewards are drawn uniformly from `0..=MAX_REWARD`.
pub const MAX_REWARD: u32 = 49;

/// Largest accepted board side. The planner keeps one successor per
/// `(row, col1, col2)`, so memory grows with the cube of the size.
pub const MAX_BOARD_SIZE: usize = 128;

// Action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Down,
    DiagonalLeft,
    DiagonalRight,
}

impl Direction {
    pub fn into_vector(self) -> (isize, isize) {
        match self {
            Direction::Down          => (1,  0),
            Direction::DiagonalLeft  => (1, -1),
            Direction::DiagonalRight => (1,  1),
        }
    }

    pub fn actions() -> Vec<Direction> {
        vec![Direction::Down, Direction::DiagonalLeft, Direction::DiagonalRight]
    }
}

impl Distribution<Direction> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Direction {
        match rng.gen_range(0..3) {
            0 => Direction::Down,
            1 => Direction::DiagonalLeft,
            _ => Direction::DiagonalRight,
        }
    }
}

/// A 1-indexed board coordinate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Parses user-supplied board size text. Anything that is not an integer in
/// `1..=MAX_BOARD_SIZE` is rejected.
pub fn parse_board_size(input: &str) -> Result<usize> {
    match input.trim().parse::<usize>() {
        Ok(size) if (1..=MAX_BOARD_SIZE).contains(&size) => Ok(size),
        _ => Err(EngineError::InvalidSize { input: input.to_string() }),
    }
}

/// The N×N reward matrix together with the consumption state of every cell.
#[derive(Debug, Clone)]
pub struct RewardGrid {
    cells: Array2<u32>,
    consumed: Array2<bool>,
}

impl RewardGrid {
    /// Fills a fresh `size`×`size` grid with independent uniform rewards.
    /// The two top-row start cells always hold 0.
    pub fn generate<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Result<Self> {
        if !(1..=MAX_BOARD_SIZE).contains(&size) {
            return Err(EngineError::InvalidSize { input: size.to_string() });
        }
        let cells = Array2::from_shape_fn((size, size), |_| rng.gen_range(0..=MAX_REWARD));
        let grid = Self::from_cells(cells);
        debug!(size, "generated reward grid");
        Ok(grid)
    }

    /// Builds a grid from explicit rows, e.g. a fixture or an imported file.
    /// Start cells are forced to 0 like in a generated grid.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(EngineError::InvalidGrid { reason: "grid has no rows".into() });
        }
        if size > MAX_BOARD_SIZE {
            return Err(EngineError::InvalidGrid {
                reason: format!("{} rows, at most {} allowed", size, MAX_BOARD_SIZE),
            });
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != size) {
            return Err(EngineError::InvalidGrid {
                reason: format!("row {} has {} cells, expected {}", i + 1, row.len(), size),
            });
        }
        if let Some(value) = rows.iter().flatten().find(|&&v| v > MAX_REWARD) {
            return Err(EngineError::InvalidGrid {
                reason: format!("reward {} exceeds {}", value, MAX_REWARD),
            });
        }
        let flat: Vec<u32> = rows.into_iter().flatten().collect();
        let cells = Array2::from_shape_vec((size, size), flat)
            .map_err(|e| EngineError::InvalidGrid { reason: e.to_string() })?;
        Ok(Self::from_cells(cells))
    }

    fn from_cells(mut cells: Array2<u32>) -> Self {
        let size = cells.nrows();
        cells[[0, 0]] = 0;
        cells[[0, size - 1]] = 0;
        Self {
            consumed: Array2::from_elem((size, size), false),
            cells,
        }
    }

    pub fn size(&self) -> usize {
        self.cells.nrows()
    }

    fn index(&self, row: usize, col: usize) -> Result<[usize; 2]> {
        let size = self.size();
        if row < 1 || col < 1 || row > size || col > size {
            return Err(EngineError::OutOfBounds { row, col, size });
        }
        Ok([row - 1, col - 1])
    }

    /// Effective reward: 0 once the cell has been consumed.
    pub fn reward_at(&self, row: usize, col: usize) -> Result<u32> {
        let idx = self.index(row, col)?;
        if self.consumed[idx] {
            Ok(0)
        } else {
            Ok(self.cells[idx])
        }
    }

    /// Marks the cell consumed. Idempotent.
    pub fn consume(&mut self, row: usize, col: usize) -> Result<()> {
        let idx = self.index(row, col)?;
        self.consumed[idx] = true;
        Ok(())
    }

    pub fn is_consumed(&self, row: usize, col: usize) -> Result<bool> {
        let idx = self.index(row, col)?;
        Ok(self.consumed[idx])
    }

    /// Current effective rewards, 0-indexed.
    pub fn snapshot(&self) -> Array2<u32> {
        let mut snapshot = self.cells.clone();
        snapshot.zip_mut_with(&self.consumed, |reward, &consumed| {
            if consumed {
                *reward = 0;
            }
        });
        snapshot
    }

    /// Where `direction` takes an agent standing on `pos`, if that is still on the board.
    pub fn step(&self, pos: Pos, direction: Direction) -> Option<Pos> {
        let (drow, dcol) = direction.into_vector();
        let size = self.size() as isize;
        let row = pos.row as isize + drow;
        let col = pos.col as isize + dcol;
        if row < 1 || col < 1 || row > size || col > size {
            return None;
        }
        Some(Pos::new(row as usize, col as usize))
    }

    pub fn cells(&self) -> CellIter {
        CellIter::new(self.size())
    }

    /// Reads one grid row per CSV record. No header line.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(rows.len() + 1);
            let row = record
                .iter()
                .map(|field| {
                    field.parse::<u32>().map_err(|e| EngineError::GridFormat {
                        line,
                        reason: format!("{:?}: {}", field, e),
                    })
                })
                .collect::<Result<Vec<u32>>>()?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    /// Writes the raw rewards, ignoring consumption.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in self.cells.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Row-major walk over every 1-indexed cell of a square board.
pub struct CellIter {
    row: usize,
    col: usize,
    size: usize,
}

impl CellIter {
    fn new(size: usize) -> CellIter {
        CellIter { row: 1, col: 1, size }
    }
}

impl Iterator for CellIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        if self.row > self.size {
            return None;
        }
        let pos = Pos::new(self.row, self.col);
        self.col += 1;
        if self.col > self.size {
            self.col = 1;
            self.row += 1;
        }
        Some(pos)
    }
}

use thiserror::Error;

/// Errors raised by the grid engine.
///
/// Illegal moves are not errors; those come back as
/// [`MoveOutcome::Rejected`](crate::game::MoveOutcome).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Board size was not a positive integer.
    #[error("invalid board size: {input:?}")]
    InvalidSize { input: String },

    /// 1-indexed grid access outside `[1, size]`.
    #[error("cell ({row}, {col}) is outside a {size}x{size} grid")]
    OutOfBounds { row: usize, col: usize, size: usize },

    /// Planner input was empty or not square.
    #[error("invalid grid: {reason}")]
    InvalidGrid { reason: String },

    /// A grid file parsed as CSV but did not describe a reward grid.
    #[error("bad grid file at line {line}: {reason}")]
    GridFormat { line: usize, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! Error types for board construction and solver configuration.

use std::io;

/// Errors raised while building or editing a [`Board`](crate::engine::Board).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// The grid does not have exactly four rows.
    #[error("expected 4 rows, found {0}")]
    RowCount(usize),
    /// A row does not have exactly four cells.
    #[error("row {row} has {len} cells, expected 4")]
    RowLength { row: usize, len: usize },
    /// A cell holds something other than 0 or a power of two in 2..=32768.
    #[error("cell ({row}, {col}) holds {value}, expected 0 or a power of two between 2 and 32768")]
    TileValue { row: usize, col: usize, value: u64 },
    /// A tile was placed onto an occupied cell.
    #[error("cell ({row}, {col}) is already occupied")]
    Occupied { row: usize, col: usize },
}

impl BoardError {
    /// True for the errors that describe a malformed input grid.
    pub fn is_invalid_board(&self) -> bool {
        !matches!(self, BoardError::Occupied { .. })
    }
}

/// A direction token other than `UP`, `DOWN`, `LEFT` or `RIGHT`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown direction token `{0}`")]
pub struct ParseMoveError(pub String);

/// Errors raised while loading or validating evaluator weights.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed weights: {0}")]
    Json(#[from] serde_json::Error),
    #[error("weight `{feature}` for stage {stage} is not finite")]
    NonFiniteWeight { stage: &'static str, feature: &'static str },
    #[error("gradient cell ({row}, {col}) is not finite")]
    NonFiniteGradient { row: usize, col: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_error_display() {
        let err = BoardError::RowLength { row: 2, len: 3 };
        assert_eq!(format!("{err}"), "row 2 has 3 cells, expected 4");
        let err = BoardError::Occupied { row: 0, col: 1 };
        assert_eq!(format!("{err}"), "cell (0, 1) is already occupied");
    }

    #[test]
    fn placement_is_not_an_invalid_board() {
        assert!(BoardError::RowCount(3).is_invalid_board());
        assert!(BoardError::TileValue { row: 0, col: 0, value: 3 }.is_invalid_board());
        assert!(!BoardError::Occupied { row: 0, col: 0 }.is_invalid_board());
    }
}

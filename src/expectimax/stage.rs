use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::Board;

/// Coarse game phase, used to pick evaluator weights and search depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Early,
    Mid,
    Late,
}

impl Stage {
    /// Classify a board by its highest tile and number of empty cells.
    #[inline]
    pub fn of(board: Board) -> Stage { Stage::classify(board.max_tile(), board.count_empty()) }

    /// The first matching rung wins: early, then mid, else late.
    pub fn classify(max_tile: u64, empty: u32) -> Stage {
        if max_tile <= 256 || empty >= 8 {
            Stage::Early
        } else if max_tile <= 1024 || empty >= 4 {
            Stage::Mid
        } else {
            Stage::Late
        }
    }

    /// Extra plies added on top of the base search depth.
    #[inline]
    pub fn depth_offset(self) -> u32 {
        match self {
            Stage::Early => 0,
            Stage::Mid => 1,
            Stage::Late => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Early => "early",
            Stage::Mid => "mid",
            Stage::Late => "late",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

//! Expectimax search policy (single-threaded and parallel) for 2048.
//!
//! This module provides:
//! - [`Stage`]: early/mid/late classification of a board.
//! - [`Evaluator`]: the staged heuristic scored at search leaves.
//! - [`Expectimax`]: single-threaded expectimax.
//! - [`ExpectimaxParallel`]: rayon-based parallel expectimax returning the
//!   same values and moves as [`Expectimax`].
//! - [`SolverPolicy`]: stage-dependent depth plus fallbacks on top of a search.
//!
//! Max nodes try directions in [`Move::ALL`] order and keep the first best.
//! Chance nodes average over every empty cell, spawning a 2 with probability
//! 0.9 and a 4 with probability 0.1. Both node kinds consume one ply.
//!
//! Quick start
//! ```
//! use ai_2048_solver::engine::Board;
//! use ai_2048_solver::expectimax::SolverPolicy;
//!
//! let board = Board::from_rows(&[[2u64, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
//! let mut policy = SolverPolicy::new();
//! let dir = policy.choose_move(board);
//! assert!(board.simulate(dir).moved);
//! ```

use crate::engine::{Board, Move};

mod heuristic;
mod policy;
mod search_par;
mod search_seq;
mod stage;

pub use heuristic::{Evaluator, EvaluatorWeights, Features, Weights, GRADIENT};
pub use policy::{first_moving, SolverPolicy};
pub use search_par::ExpectimaxParallel;
pub use search_seq::Expectimax;
pub use stage::Stage;

/// Hard ceiling on search depth.
pub const MAX_DEPTH: u32 = 5;

/// Configurable knobs for Expectimax.
///
/// - `base_depth`: plies searched in the early stage; mid adds one, late two.
/// - `depth_cap`: optional tighter cap, e.g. to bound wall time.
/// - `cache_enabled`: memoize chance-node values by (board, depth).
/// - `weights`: evaluator weight table.
/// - `par_thresholds`: thresholds used only by the parallel implementation.
#[derive(Debug, Clone)]
pub struct ExpectimaxConfig {
    pub base_depth: u32,
    pub depth_cap: Option<u32>,
    pub cache_enabled: bool,
    pub weights: Weights,
    pub par_thresholds: ParThresholds,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            base_depth: 3,
            depth_cap: None,
            cache_enabled: true,
            weights: Weights::default(),
            par_thresholds: ParThresholds::default(),
        }
    }
}

impl ExpectimaxConfig {
    /// Depth to search for a board in `stage`, clamped to `depth_cap` and [`MAX_DEPTH`].
    pub fn depth_for(&self, stage: Stage) -> u32 {
        let depth = self.base_depth.saturating_add(stage.depth_offset());
        let cap = self.depth_cap.map_or(MAX_DEPTH, |cap| cap.min(MAX_DEPTH));
        depth.min(cap)
    }
}

/// Clamp an externally supplied depth into `0..=MAX_DEPTH`.
#[inline]
pub fn clamp_depth(depth: i64) -> u32 { depth.clamp(0, MAX_DEPTH as i64) as u32 }

/// Thresholds used to balance parallel overheads.
///
/// Nodes with fewer remaining plies, or chance nodes with fewer empty cells,
/// are expanded sequentially.
#[derive(Debug, Clone, Copy)]
pub struct ParThresholds {
    pub par_depth: u32,
    pub par_slots: usize,
    pub cache_min_depth: u32,
}

impl Default for ParThresholds {
    fn default() -> Self {
        Self { par_depth: 3, par_slots: 4, cache_min_depth: 2 }
    }
}

/// Value returned by a search node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub score: f64,
    /// Best direction at a max node; `None` at leaves, chance nodes and dead boards.
    pub move_dir: Option<Move>,
}

/// Per-branch expected value at the root (no normalization).
///
/// - `ev` is the expected value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Max and chance nodes visited.
    pub nodes: u64,
    /// Evaluator calls at leaves.
    pub evals: u64,
    pub cache_hits: u64,
    /// Depth the last search ran at.
    pub depth: u32,
    /// Largest `nodes` seen since the last reset.
    pub peak_nodes: u64,
}

/// A depth-bounded search that [`SolverPolicy`] can drive.
pub trait Search {
    fn config(&self) -> &ExpectimaxConfig;

    /// Run a max node on `board` with `depth` plies remaining.
    fn search(&mut self, board: Board, depth: u32) -> SearchResult;

    /// Statistics from the last call to [`Search::search`].
    fn last_stats(&self) -> SearchStats;
}

/// (exponent, probability) of the tiles a chance node may spawn.
pub(crate) const SPAWNS: [(u8, f64); 2] = [(1, 0.9), (2, 0.1)];

/// Cell indices (row-major) of the empty cells.
#[inline]
pub(crate) fn empty_slots(board: Board) -> impl Iterator<Item = usize> {
    (0..16).filter(move |&idx| board.exponent_at(idx) == 0)
}

/// Mean of per-cell expectations, summed in cell order so sequential and
/// parallel callers agree bit for bit.
#[inline]
pub(crate) fn chance_mean<I: IntoIterator<Item = f64>>(per_cell: I, cells: usize) -> f64 {
    per_cell.into_iter().fold(0.0, |acc, v| acc + v) / cells as f64
}

/// Common helper for constructors to ensure tables are initialized.
fn warm_engine_and_heuristics() {
    // Safe to call multiple times.
    crate::engine::new();
    heuristic::warm();
}

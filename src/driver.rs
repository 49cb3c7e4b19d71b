//! Reference game loop over the two collaborator interfaces.
//!
//! A [`BoardProvider`] reports the current grid and status; a [`MoveSink`]
//! applies a direction and says whether it moved anything. [`Driver`] polls the
//! provider, asks the [`SolverPolicy`] for a direction, sends it, and applies
//! the stall-breaker when the environment keeps rejecting moves.
//!
//! The records serialize to the JSON shape used by the HTTP game server
//! (`state`, lowercase `status`, uppercase direction tokens).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{Board, Move};
use crate::error::BoardError;
use crate::expectimax::{Expectimax, Search, SolverPolicy};

/// Consecutive rejected moves before the stall-breaker steps in.
pub const STALL_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Ongoing,
    Won,
    Over,
}

/// One snapshot from a [`BoardProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    #[serde(rename = "state", alias = "grid")]
    pub grid: Vec<Vec<u64>>,
    pub status: GameStatus,
    #[serde(default)]
    pub score: u64,
    #[serde(default, alias = "totalMoves")]
    pub total_moves: u64,
}

impl GameState {
    /// Validate the grid into a [`Board`].
    pub fn board(&self) -> Result<Board, BoardError> { Board::from_rows(&self.grid) }
}

/// Reply from a [`MoveSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub moved: bool,
    #[serde(flatten)]
    pub state: GameState,
}

/// Yields the current game state.
pub trait BoardProvider {
    fn state(&mut self) -> anyhow::Result<GameState>;
}

/// Accepts a direction and reports whether the board changed.
pub trait MoveSink {
    fn send(&mut self, dir: Move) -> anyhow::Result<MoveOutcome>;
}

/// Counts consecutive moves the environment rejected.
#[derive(Debug, Clone)]
pub struct StallBreaker {
    limit: u32,
    rejected: u32,
}

impl StallBreaker {
    pub fn new(limit: u32) -> Self { Self { limit: limit.max(1), rejected: 0 } }

    /// Record whether the last proposed move was accepted.
    ///
    /// Returns true once `limit` moves in a row have been rejected.
    pub fn observe(&mut self, moved: bool) -> bool {
        if moved {
            self.rejected = 0;
            return false;
        }
        self.rejected += 1;
        self.rejected >= self.limit
    }

    pub fn reset(&mut self) { self.rejected = 0; }

    /// Directions to try after `proposed` keeps failing, in fixed order.
    pub fn alternatives(proposed: Move) -> impl Iterator<Item = Move> {
        Move::ALL.into_iter().filter(move |&dir| dir != proposed)
    }
}

impl Default for StallBreaker { fn default() -> Self { Self::new(STALL_LIMIT) } }

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Stop after this many accepted moves.
    pub max_steps: Option<u64>,
    /// Treat `won` as terminal.
    pub stop_on_win: bool,
    pub stall_limit: u32,
}

impl Default for DriverConfig {
    fn default() -> Self { Self { max_steps: None, stop_on_win: true, stall_limit: STALL_LIMIT } }
}

/// Result of a driven game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Moves the environment accepted during this run.
    pub steps: u64,
    /// Moves the environment rejected.
    pub rejected: u64,
    /// Times the stall-breaker fired.
    pub stall_breaks: u64,
    pub score: u64,
    pub total_moves: u64,
    pub max_tile: u64,
    pub status: GameStatus,
    pub final_board: Board,
}

pub struct Driver<S = Expectimax> {
    policy: SolverPolicy<S>,
    cfg: DriverConfig,
}

impl<S: Search> Driver<S> {
    pub fn new(policy: SolverPolicy<S>, cfg: DriverConfig) -> Self { Self { policy, cfg } }

    #[inline]
    pub fn policy(&self) -> &SolverPolicy<S> { &self.policy }

    /// Play until the game ends, the step limit is hit, or no direction moves.
    pub fn run<E: BoardProvider + MoveSink>(&mut self, env: &mut E) -> anyhow::Result<RunSummary> {
        let mut breaker = StallBreaker::new(self.cfg.stall_limit);
        let (mut steps, mut rejected, mut stall_breaks) = (0u64, 0u64, 0u64);
        let mut state;
        loop {
            state = env.state().context("fetching game state")?;
            let terminal = match state.status {
                GameStatus::Over => true,
                GameStatus::Won => self.cfg.stop_on_win,
                GameStatus::Ongoing => false,
            };
            if terminal || self.cfg.max_steps.is_some_and(|max| steps >= max) {
                break;
            }
            let board = match state.board() {
                Ok(board) => board,
                Err(err) => {
                    warn!(%err, "provider returned an invalid grid");
                    return Err(err).context("provider returned an invalid grid");
                }
            };
            let dir = self.policy.choose_move(board);
            let outcome = env.send(dir).with_context(|| format!("sending {dir}"))?;
            debug!(step = steps, %dir, moved = outcome.moved, score = outcome.state.score, "move sent");
            if !breaker.observe(outcome.moved) {
                if outcome.moved {
                    steps += 1;
                } else {
                    rejected += 1;
                }
                continue;
            }
            rejected += 1;
            stall_breaks += 1;
            warn!(%dir, limit = self.cfg.stall_limit, "moves keep being rejected, trying alternatives");
            let mut unstuck = false;
            for alt in StallBreaker::alternatives(dir) {
                let outcome = env.send(alt).with_context(|| format!("sending {alt}"))?;
                if outcome.moved {
                    debug!(%alt, "stall broken");
                    steps += 1;
                    unstuck = true;
                    break;
                }
                rejected += 1;
            }
            breaker.reset();
            if !unstuck {
                warn!("no direction moves the board, stopping");
                state = env.state().context("fetching game state")?;
                break;
            }
        }
        let final_board = state.board().context("provider returned an invalid grid")?;
        let summary = RunSummary {
            steps,
            rejected,
            stall_breaks,
            score: state.score,
            total_moves: state.total_moves,
            max_tile: final_board.max_tile(),
            status: state.status,
            final_board,
        };
        info!(
            steps = summary.steps,
            score = summary.score,
            max_tile = summary.max_tile,
            status = ?summary.status,
            "run finished"
        );
        Ok(summary)
    }
}

impl Default for Driver<Expectimax> {
    fn default() -> Self { Self::new(SolverPolicy::new(), DriverConfig::default()) }
}

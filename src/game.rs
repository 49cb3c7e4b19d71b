//! In-memory 2048 game with the HTTP server's rules.
//!
//! A move that changes the board adds its merge score, bumps the move counter
//! and spawns one tile (2 with probability 0.9, else 4). A rejected move leaves
//! everything untouched. Status is `won` once any tile reaches 2048, else
//! `over` when no direction moves.

use rand::{rngs::StdRng, SeedableRng};

use crate::driver::{BoardProvider, GameState, GameStatus, MoveOutcome, MoveSink};
use crate::engine::{Board, Move};

pub const WIN_TILE: u64 = 2048;

#[derive(Debug, Clone)]
pub struct LocalGame {
    board: Board,
    score: u64,
    total_moves: u64,
    rng: StdRng,
}

impl LocalGame {
    /// Fresh game: empty board plus two random tiles.
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        Self { board, score: 0, total_moves: 0, rng }
    }

    /// Resume from `board` with no score; spawns draw from `seed`.
    pub fn from_board(board: Board, seed: u64) -> Self {
        Self { board, score: 0, total_moves: 0, rng: StdRng::seed_from_u64(seed) }
    }

    #[inline]
    pub fn board(&self) -> Board { self.board }

    #[inline]
    pub fn score(&self) -> u64 { self.score }

    #[inline]
    pub fn total_moves(&self) -> u64 { self.total_moves }

    pub fn status(&self) -> GameStatus {
        if self.board.max_tile() >= WIN_TILE {
            GameStatus::Won
        } else if self.board.is_game_over() {
            GameStatus::Over
        } else {
            GameStatus::Ongoing
        }
    }

    pub fn snapshot(&self) -> GameState {
        GameState {
            grid: self.board.to_grid().iter().map(|row| row.to_vec()).collect(),
            status: self.status(),
            score: self.score,
            total_moves: self.total_moves,
        }
    }

    pub fn apply(&mut self, dir: Move) -> MoveOutcome {
        let res = self.board.simulate(dir);
        if res.moved {
            self.score += res.score_gained;
            self.total_moves += 1;
            self.board = res.board.with_random_tile(&mut self.rng);
        }
        MoveOutcome { moved: res.moved, state: self.snapshot() }
    }
}

impl BoardProvider for LocalGame {
    fn state(&mut self) -> anyhow::Result<GameState> { Ok(self.snapshot()) }
}

impl MoveSink for LocalGame {
    fn send(&mut self, dir: Move) -> anyhow::Result<MoveOutcome> { Ok(self.apply(dir)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: [[u64; 4]; 4]) -> Board { Board::from_rows(&rows).unwrap() }

    #[test]
    fn new_game_has_two_tiles() {
        let game = LocalGame::new(7);
        assert_eq!(game.board().count_empty(), 14);
        assert_eq!(game.status(), GameStatus::Ongoing);
        assert_eq!(game.score(), 0);
        // Same seed, same opening.
        assert_eq!(LocalGame::new(7).board(), game.board());
    }

    #[test]
    fn accepted_move_scores_and_spawns() {
        let mut game = LocalGame::from_board(board([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]), 1);
        let out = game.apply(Move::Left);
        assert!(out.moved);
        assert_eq!(out.state.score, 4);
        assert_eq!(out.state.total_moves, 1);
        assert_eq!(game.board().tile(0, 0), 4);
        assert_eq!(game.board().count_empty(), 14);
    }

    #[test]
    fn rejected_move_changes_nothing() {
        let start = board([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let mut game = LocalGame::from_board(start, 1);
        let out = game.apply(Move::Up);
        assert!(!out.moved);
        assert_eq!(game.board(), start);
        assert_eq!(game.total_moves(), 0);
        assert_eq!(out.state.score, 0);
    }

    #[test]
    fn won_is_checked_before_over() {
        let full = board([[2048, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert_eq!(LocalGame::from_board(full, 0).status(), GameStatus::Won);
        let dead = board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert_eq!(LocalGame::from_board(dead, 0).status(), GameStatus::Over);
    }

    #[test]
    fn snapshot_grid_matches_board() {
        let b = board([[0, 2, 0, 0], [0; 4], [0, 0, 64, 0], [0, 0, 0, 4]]);
        let snap = LocalGame::from_board(b, 0).snapshot();
        assert_eq!(snap.board().unwrap(), b);
        assert_eq!(snap.grid[2][2], 64);
    }
}

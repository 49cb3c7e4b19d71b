//! ai-2048-solver: a 2048 move engine and Expectimax move chooser
//!
//! This crate provides:
//! - A packed `Board` with pure move simulation (`simulate`, `shift`, `is_game_over`)
//! - A staged heuristic evaluator and Expectimax search, single-threaded and parallel
//! - `SolverPolicy`, which picks a direction for a board at a stage-dependent depth
//! - A reference game loop (`driver`) with a stall-breaker, plus an in-memory game
//!
//! Quick start:
//! ```
//! use ai_2048_solver::engine::{Board, Move};
//! use ai_2048_solver::expectimax::SolverPolicy;
//!
//! let board = Board::from_rows(&[[2u64, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
//! let res = board.simulate(Move::Left);
//! assert_eq!(res.score_gained, 4);
//!
//! let mut policy = SolverPolicy::new();
//! let dir = policy.choose_move(board);
//! assert!(board.simulate(dir).moved);
//! ```
//!
//! Playing a whole seeded game locally:
//! ```no_run
//! use ai_2048_solver::driver::Driver;
//! use ai_2048_solver::game::LocalGame;
//!
//! let mut game = LocalGame::new(42);
//! let mut driver: Driver = Driver::default();
//! let summary = driver.run(&mut game).unwrap();
//! println!("score {} max tile {}", summary.score, summary.max_tile);
//! ```
pub mod driver;
pub mod engine;
pub mod error;
pub mod expectimax;
pub mod game;

use tracing::debug;

use crate::engine::{Board, Move};
use crate::error::BoardError;

use super::{clamp_depth, Expectimax, ExpectimaxConfig, ExpectimaxParallel, Search, SearchStats, Stage};

/// First direction in [`Move::ALL`] order, other than `skip`, that changes `board`.
pub fn first_moving(board: Board, skip: Option<Move>) -> Option<Move> {
    Move::ALL.into_iter().filter(|&dir| Some(dir) != skip).find(|&dir| board.simulate(dir).moved)
}

/// Top-level solver: stage-dependent depth on top of a [`Search`].
///
/// Stateless between calls apart from the wrapped search's statistics.
pub struct SolverPolicy<S = Expectimax> {
    search: S,
}

impl SolverPolicy<Expectimax> {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self { Self::from_search(Expectimax::with_config(cfg)) }
}

impl SolverPolicy<ExpectimaxParallel> {
    pub fn parallel(cfg: ExpectimaxConfig) -> Self { Self::from_search(ExpectimaxParallel::with_config(cfg)) }
}

impl Default for SolverPolicy<Expectimax> { fn default() -> Self { Self::new() } }

impl<S: Search> SolverPolicy<S> {
    pub fn from_search(search: S) -> Self { Self { search } }

    #[inline]
    pub fn search(&self) -> &S { &self.search }

    /// Depth the policy searches `board` at.
    #[inline]
    pub fn depth_for(&self, board: Board) -> u32 { self.search.config().depth_for(Stage::of(board)) }

    /// Pick a direction for `board`.
    ///
    /// Returns the search's best move; otherwise the first direction that
    /// moves; otherwise `Up`, leaving terminal detection to the caller.
    pub fn choose_move(&mut self, board: Board) -> Move {
        let depth = self.depth_for(board);
        self.choose_move_at_depth(board, depth as i64)
    }

    /// Like [`Self::choose_move`] for a raw grid, rejecting malformed input.
    pub fn choose_move_from_rows<R: AsRef<[u64]>>(&mut self, rows: &[R]) -> Result<Move, BoardError> {
        let board = Board::from_rows(rows)?;
        Ok(self.choose_move(board))
    }

    /// Search at an explicit depth, clamped into `0..=MAX_DEPTH`.
    pub fn choose_move_at_depth(&mut self, board: Board, depth: i64) -> Move {
        let depth = clamp_depth(depth);
        let res = self.search.search(board, depth);
        let stats = self.search.last_stats();
        debug!(
            stage = %Stage::of(board),
            depth,
            nodes = stats.nodes,
            evals = stats.evals,
            score = res.score,
            dir = ?res.move_dir,
            "search finished"
        );
        res.move_dir.or_else(|| first_moving(board, None)).unwrap_or(Move::Up)
    }

    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.search.last_stats() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: [[u64; 4]; 4]) -> Board { Board::from_rows(&rows).unwrap() }

    #[test]
    fn first_moving_respects_order_and_skip() {
        // Only RIGHT and DOWN move a tile sitting in the top-left corner.
        let b = board([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(first_moving(b, None), Some(Move::Right));
        assert_eq!(first_moving(b, Some(Move::Right)), Some(Move::Down));
        let dead = board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert_eq!(first_moving(dead, None), None);
    }

    #[test]
    fn no_legal_move_falls_back_to_up() {
        let dead = board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        let mut policy = SolverPolicy::new();
        assert_eq!(policy.choose_move(dead), Move::Up);
    }

    #[test]
    fn depth_zero_still_returns_a_mover() {
        let b = board([[0; 4], [0; 4], [0; 4], [0, 0, 0, 2]]);
        let mut policy = SolverPolicy::new();
        let dir = policy.choose_move_at_depth(b, -4);
        assert_eq!(policy.last_stats().depth, 0);
        assert_eq!(dir, Move::Up);
        assert!(b.simulate(dir).moved);
    }

    #[test]
    fn out_of_range_depth_is_clamped() {
        let b = board([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let mut policy = SolverPolicy::new();
        policy.choose_move_at_depth(b, 40);
        assert_eq!(policy.last_stats().depth, 5);
    }

    #[test]
    fn rejects_malformed_grids() {
        let mut policy = SolverPolicy::new();
        let short: Vec<Vec<u64>> = vec![vec![0; 4]; 3];
        assert_eq!(policy.choose_move_from_rows(&short), Err(BoardError::RowCount(3)));
        let odd: [[u64; 4]; 4] = [[0, 0, 0, 0], [0, 12, 0, 0], [0; 4], [0; 4]];
        assert!(matches!(policy.choose_move_from_rows(&odd), Err(BoardError::TileValue { value: 12, .. })));
    }

    #[test]
    fn parallel_policy_agrees_with_sequential() {
        let b = board([[8, 4, 2, 0], [4, 2, 0, 0], [2, 0, 0, 0], [0, 0, 0, 2]]);
        let mut seq = SolverPolicy::new();
        let mut par = SolverPolicy::parallel(ExpectimaxConfig::default());
        assert_eq!(seq.choose_move(b), par.choose_move(b));
        assert_eq!(seq.last_stats().depth, par.last_stats().depth);
    }
}

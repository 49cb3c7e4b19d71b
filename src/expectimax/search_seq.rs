use std::collections::HashMap;

use ahash::RandomState as AHasher;

use crate::engine::{Board, Move};

use super::heuristic::Evaluator;
use super::{
    chance_mean, empty_slots, warm_engine_and_heuristics, BranchEval, ExpectimaxConfig, Search, SearchResult,
    SearchStats, SPAWNS,
};

/// Chance-node values keyed by (board, plies remaining). Exact, never approximated.
type Cache = HashMap<(Board, u32), f64, AHasher>;

#[derive(Default)]
struct Ctx {
    cache: Cache,
    nodes: u64,
    evals: u64,
    cache_hits: u64,
}

/// Single-threaded Expectimax search.
///
/// Constructors warm engine/heuristic tables.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    evaluator: Evaluator,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        warm_engine_and_heuristics();
        let evaluator = Evaluator::new(cfg.weights.clone());
        Self { cfg, evaluator, stats: SearchStats::default() }
    }

    #[inline]
    pub fn evaluator(&self) -> &Evaluator { &self.evaluator }

    /// Value `board` as a max node with `depth` plies remaining.
    ///
    /// Example
    /// ```
    /// use ai_2048_solver::engine::{Board, Move};
    /// use ai_2048_solver::expectimax::Expectimax;
    /// let b = Board::from_rows(&[[2u64, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let mut ex = Expectimax::new();
    /// let res = ex.evaluate(b, 2);
    /// assert!(res.move_dir.is_some());
    /// // Depth zero is just the heuristic.
    /// assert_eq!(ex.evaluate(b, 0).score, ex.evaluator().score(b, 0));
    /// ```
    pub fn evaluate(&mut self, board: Board, depth: u32) -> SearchResult {
        let mut ctx = Ctx::default();
        let res = self.evaluate_max(board, depth, &mut ctx);
        self.record(&ctx, depth);
        res
    }

    /// Compute EV for each direction (no normalization).
    ///
    /// Returns a fixed array in [`Move::ALL`] order, each direction searched
    /// as the root's chance child with `depth - 1` plies, and marks illegal
    /// moves as `legal=false`.
    pub fn branch_evals(&mut self, board: Board, depth: u32) -> [BranchEval; 4] {
        let mut ctx = Ctx::default();
        let out = Move::ALL.map(|dir| {
            let res = board.simulate(dir);
            if res.moved {
                let ev = self.evaluate_chance(res.board, depth.saturating_sub(1), &mut ctx);
                BranchEval { dir, ev, legal: true }
            } else {
                BranchEval { dir, ev: 0.0, legal: false }
            }
        });
        self.record(&ctx, depth);
        out
    }

    /// Statistics collected from the last call to [`Self::evaluate`] or [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn record(&mut self, ctx: &Ctx, depth: u32) {
        self.stats.nodes = ctx.nodes;
        self.stats.evals = ctx.evals;
        self.stats.cache_hits = ctx.cache_hits;
        self.stats.depth = depth;
        self.stats.peak_nodes = self.stats.peak_nodes.max(ctx.nodes);
    }

    #[inline]
    fn leaf(&self, board: Board, depth: u32, ctx: &mut Ctx) -> f64 {
        ctx.evals += 1;
        self.evaluator.score(board, depth)
    }

    fn evaluate_max(&self, board: Board, depth: u32, ctx: &mut Ctx) -> SearchResult {
        ctx.nodes += 1;
        if depth == 0 {
            return SearchResult { score: self.leaf(board, 0, ctx), move_dir: None };
        }
        let mut best: Option<(f64, Move)> = None;
        for dir in Move::ALL {
            let res = board.simulate(dir);
            if !res.moved {
                continue;
            }
            let score = self.evaluate_chance(res.board, depth - 1, ctx);
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, dir));
            }
        }
        match best {
            Some((score, dir)) => SearchResult { score, move_dir: Some(dir) },
            None => SearchResult { score: self.leaf(board, depth, ctx), move_dir: None },
        }
    }

    fn evaluate_chance(&self, board: Board, depth: u32, ctx: &mut Ctx) -> f64 {
        ctx.nodes += 1;
        let num_empty_tiles = board.count_empty() as usize;
        if num_empty_tiles == 0 || depth == 0 {
            return self.leaf(board, depth, ctx);
        }
        if self.cfg.cache_enabled {
            if let Some(&score) = ctx.cache.get(&(board, depth)) {
                ctx.cache_hits += 1;
                return score;
            }
        }
        let mut per_cell = Vec::with_capacity(num_empty_tiles);
        for idx in empty_slots(board) {
            let mut cell = 0.0;
            for (exp, prob) in SPAWNS {
                let child = board.with_exponent(idx, exp);
                cell += prob * self.evaluate_max(child, depth - 1, ctx).score;
            }
            per_cell.push(cell);
        }
        let score = chance_mean(per_cell, num_empty_tiles);
        if self.cfg.cache_enabled {
            ctx.cache.insert((board, depth), score);
        }
        score
    }
}

impl Search for Expectimax {
    #[inline]
    fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    #[inline]
    fn search(&mut self, board: Board, depth: u32) -> SearchResult { self.evaluate(board, depth) }

    #[inline]
    fn last_stats(&self) -> SearchStats { self.stats }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: [[u64; 4]; 4]) -> Board { Board::from_rows(&rows).unwrap() }

    fn uncached() -> Expectimax {
        Expectimax::with_config(ExpectimaxConfig { cache_enabled: false, ..Default::default() })
    }

    #[test]
    fn depth_zero_is_the_heuristic() {
        let b = board([[2, 4, 0, 0], [0, 0, 8, 0], [0; 4], [0, 0, 0, 2]]);
        let mut ex = Expectimax::new();
        let res = ex.evaluate(b, 0);
        assert_eq!(res.score, ex.evaluator().score(b, 0));
        assert_eq!(res.move_dir, None);
        assert_eq!(ex.last_stats().evals, 1);
    }

    #[test]
    fn depth_one_picks_best_child_heuristic() {
        let b = board([[2, 2, 0, 0], [4, 0, 0, 0], [0; 4], [0; 4]]);
        let mut ex = uncached();
        let res = ex.evaluate(b, 1);
        // Chance children at zero plies are scored directly.
        let mut best: Option<(f64, Move)> = None;
        for dir in Move::ALL {
            let r = b.simulate(dir);
            if r.moved {
                let v = ex.evaluator().score(r.board, 0);
                if best.map_or(true, |(s, _)| v > s) {
                    best = Some((v, dir));
                }
            }
        }
        let (score, dir) = best.unwrap();
        assert_eq!(res.score, score);
        assert_eq!(res.move_dir, Some(dir));
    }

    #[test]
    fn chance_node_is_probability_weighted_mean() {
        // Single empty cell at (3,3).
        let b = board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 0]]);
        let ex = uncached();
        let mut ctx = Ctx::default();
        let v = ex.evaluate_chance(b, 2, &mut ctx);
        let with2 = ex.evaluate_max(b.with_exponent(15, 1), 1, &mut Ctx::default()).score;
        let with4 = ex.evaluate_max(b.with_exponent(15, 2), 1, &mut Ctx::default()).score;
        assert_eq!(v, (0.9 * with2 + 0.1 * with4) / 1.0);
    }

    #[test]
    fn dead_board_scores_at_remaining_depth() {
        let b = board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        let mut ex = Expectimax::new();
        let res = ex.evaluate(b, 3);
        assert_eq!(res.move_dir, None);
        assert_eq!(res.score, ex.evaluator().score(b, 3));
    }

    #[test]
    fn cache_preserves_values() {
        let b = board([[4, 2, 0, 0], [2, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 2]]);
        let mut cached = Expectimax::new();
        let mut plain = uncached();
        let a = cached.evaluate(b, 4);
        let p = plain.evaluate(b, 4);
        assert_eq!(a.score.to_bits(), p.score.to_bits());
        assert_eq!(a.move_dir, p.move_dir);
        assert!(cached.last_stats().cache_hits > 0);
        assert!(cached.last_stats().nodes < plain.last_stats().nodes);
    }

    #[test]
    fn branch_evals_mark_illegal_moves() {
        // Tiles packed into the top-left corner: UP and LEFT are no-ops.
        let b = board([[4, 2, 0, 0], [2, 0, 0, 0], [0; 4], [0; 4]]);
        let mut ex = Expectimax::new();
        let evals = ex.branch_evals(b, 3);
        let dirs: Vec<Move> = evals.iter().map(|e| e.dir).collect();
        assert_eq!(dirs, Move::ALL.to_vec());
        assert!(!evals[0].legal && !evals[3].legal);
        assert!(evals[1].legal && evals[2].legal);
        let best = ex.evaluate(b, 3);
        let top = evals.iter().filter(|e| e.legal).map(|e| e.ev).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(best.score, top);
    }
}

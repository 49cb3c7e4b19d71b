use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState as AHasher;
use dashmap::DashMap;
use rayon::prelude::*;

use crate::engine::{Board, Move};

use super::heuristic::Evaluator;
use super::{
    chance_mean, empty_slots, warm_engine_and_heuristics, BranchEval, ExpectimaxConfig, ParThresholds, Search,
    SearchResult, SearchStats, SPAWNS,
};

type Cache = DashMap<(Board, u32), f64, AHasher>;

#[derive(Default)]
struct Counters {
    nodes: AtomicU64,
    evals: AtomicU64,
    cache_hits: AtomicU64,
}

/// Parallel Expectimax using rayon and a shared `DashMap` transposition table.
///
/// Children are valued in parallel but reduced in enumeration order, so scores
/// and moves match [`Expectimax`](super::Expectimax) bit for bit.
pub struct ExpectimaxParallel {
    cfg: ExpectimaxConfig,
    evaluator: Evaluator,
    stats: SearchStats,
}

impl ExpectimaxParallel {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        warm_engine_and_heuristics();
        let evaluator = Evaluator::new(cfg.weights.clone());
        Self { cfg, evaluator, stats: SearchStats::default() }
    }

    #[inline]
    pub fn evaluator(&self) -> &Evaluator { &self.evaluator }

    /// Value `board` as a max node with `depth` plies remaining.
    pub fn evaluate(&mut self, board: Board, depth: u32) -> SearchResult {
        let map: Cache = DashMap::with_hasher(AHasher::new());
        let counters = Counters::default();
        let res = self.evaluate_max_parallel(board, depth, &map, &counters);
        self.record(&counters, depth);
        res
    }

    /// Compute EV for each direction in parallel.
    ///
    /// Returns a fixed array in [`Move::ALL`] order and marks illegal moves as `legal=false`.
    pub fn branch_evals(&mut self, board: Board, depth: u32) -> [BranchEval; 4] {
        let map: Cache = DashMap::with_hasher(AHasher::new());
        let counters = Counters::default();
        let out_vec: Vec<BranchEval> = Move::ALL
            .par_iter()
            .map(|&dir| {
                let res = board.simulate(dir);
                if res.moved {
                    let ev = self.evaluate_chance_parallel(res.board, depth.saturating_sub(1), &map, &counters);
                    BranchEval { dir, ev, legal: true }
                } else {
                    BranchEval { dir, ev: 0.0, legal: false }
                }
            })
            .collect();
        // Convert to fixed array preserving order
        let mut out = Move::ALL.map(|dir| BranchEval { dir, ev: 0.0, legal: false });
        for (slot, be) in out.iter_mut().zip(out_vec) {
            *slot = be;
        }
        self.record(&counters, depth);
        out
    }

    /// Statistics collected from the last call to [`Self::evaluate`] or [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn record(&mut self, counters: &Counters, depth: u32) {
        let nodes = counters.nodes.load(Ordering::Relaxed);
        self.stats.nodes = nodes;
        self.stats.evals = counters.evals.load(Ordering::Relaxed);
        self.stats.cache_hits = counters.cache_hits.load(Ordering::Relaxed);
        self.stats.depth = depth;
        self.stats.peak_nodes = self.stats.peak_nodes.max(nodes);
    }

    #[inline]
    fn leaf(&self, board: Board, depth: u32, counters: &Counters) -> f64 {
        counters.evals.fetch_add(1, Ordering::Relaxed);
        self.evaluator.score(board, depth)
    }

    fn evaluate_max_parallel(&self, board: Board, depth: u32, map: &Cache, counters: &Counters) -> SearchResult {
        counters.nodes.fetch_add(1, Ordering::Relaxed);
        if depth == 0 {
            return SearchResult { score: self.leaf(board, 0, counters), move_dir: None };
        }
        let child = |dir: Move| {
            let res = board.simulate(dir);
            res.moved.then(|| self.evaluate_chance_parallel(res.board, depth - 1, map, counters))
        };
        let values: Vec<Option<f64>> = if depth >= self.cfg.par_thresholds.par_depth {
            Move::ALL.par_iter().map(|&dir| child(dir)).collect()
        } else {
            Move::ALL.iter().map(|&dir| child(dir)).collect()
        };
        // First best in enumeration order, as in the sequential search.
        let mut best: Option<(f64, Move)> = None;
        for (dir, value) in Move::ALL.into_iter().zip(values) {
            if let Some(score) = value {
                if best.map_or(true, |(best_score, _)| score > best_score) {
                    best = Some((score, dir));
                }
            }
        }
        match best {
            Some((score, dir)) => SearchResult { score, move_dir: Some(dir) },
            None => SearchResult { score: self.leaf(board, depth, counters), move_dir: None },
        }
    }

    fn evaluate_chance_parallel(&self, board: Board, depth: u32, map: &Cache, counters: &Counters) -> f64 {
        counters.nodes.fetch_add(1, Ordering::Relaxed);
        let num_empty_tiles = board.count_empty() as usize;
        if num_empty_tiles == 0 || depth == 0 {
            return self.leaf(board, depth, counters);
        }
        let ParThresholds { par_depth, par_slots, cache_min_depth } = self.cfg.par_thresholds;
        let use_cache = self.cfg.cache_enabled && depth >= cache_min_depth;
        if use_cache {
            if let Some(entry) = map.get(&(board, depth)) {
                counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                return *entry;
            }
        }
        let cell_value = |idx: usize| {
            let mut cell = 0.0;
            for (exp, prob) in SPAWNS {
                let child = board.with_exponent(idx, exp);
                cell += prob * self.evaluate_max_parallel(child, depth - 1, map, counters).score;
            }
            cell
        };
        let slots: Vec<usize> = empty_slots(board).collect();
        let per_cell: Vec<f64> = if depth >= par_depth && slots.len() >= par_slots {
            slots.par_iter().map(|&idx| cell_value(idx)).collect()
        } else {
            slots.iter().map(|&idx| cell_value(idx)).collect()
        };
        let score = chance_mean(per_cell, num_empty_tiles);
        if use_cache {
            map.insert((board, depth), score);
        }
        score
    }
}

impl Search for ExpectimaxParallel {
    #[inline]
    fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    #[inline]
    fn search(&mut self, board: Board, depth: u32) -> SearchResult { self.evaluate(board, depth) }

    #[inline]
    fn last_stats(&self) -> SearchStats { self.stats }
}

impl Default for ExpectimaxParallel { fn default() -> Self { Self::new() } }

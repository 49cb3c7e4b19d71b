use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::engine::{self as GameEngine, Board};
use crate::error::ConfigError;

use super::stage::Stage;

/// Positional weights biasing big tiles toward the top-left corner.
///
/// Halves with every step away from the corner along either axis.
pub const GRADIENT: [[f64; 4]; 4] = [
    [64.0, 32.0, 16.0, 8.0],
    [32.0, 16.0, 8.0, 4.0],
    [16.0, 8.0, 4.0, 2.0],
    [8.0, 4.0, 2.0, 1.0],
];

/// Per-feature multipliers for one [`Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorWeights {
    pub weighted_sum: f64,
    pub empty_count: f64,
    pub monotonicity: f64,
    pub smoothness: f64,
    pub merge_potential: f64,
    pub max_tile: f64,
    pub depth_bonus: f64,
}

impl EvaluatorWeights {
    pub const EARLY: EvaluatorWeights = EvaluatorWeights {
        weighted_sum: 1.0,
        empty_count: 27_000.0,
        monotonicity: 10_000.0,
        smoothness: 10_000.0,
        merge_potential: 5_000.0,
        max_tile: 1_000.0,
        depth_bonus: 10.0,
    };

    pub const MID: EvaluatorWeights = EvaluatorWeights {
        weighted_sum: 1.0,
        empty_count: 25_000.0,
        monotonicity: 12_000.0,
        smoothness: 12_000.0,
        merge_potential: 8_000.0,
        max_tile: 1_000.0,
        depth_bonus: 10.0,
    };

    pub const LATE: EvaluatorWeights = EvaluatorWeights {
        weighted_sum: 1.0,
        empty_count: 22_000.0,
        monotonicity: 14_000.0,
        smoothness: 15_000.0,
        merge_potential: 10_000.0,
        max_tile: 1_000.0,
        depth_bonus: 10.0,
    };

    fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("weighted_sum", self.weighted_sum),
            ("empty_count", self.empty_count),
            ("monotonicity", self.monotonicity),
            ("smoothness", self.smoothness),
            ("merge_potential", self.merge_potential),
            ("max_tile", self.max_tile),
            ("depth_bonus", self.depth_bonus),
        ]
    }
}

/// The full weight table: one gradient shared by all stages plus per-stage multipliers.
///
/// Missing keys in a JSON override fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub gradient: [[f64; 4]; 4],
    pub early: EvaluatorWeights,
    pub mid: EvaluatorWeights,
    pub late: EvaluatorWeights,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            gradient: GRADIENT,
            early: EvaluatorWeights::EARLY,
            mid: EvaluatorWeights::MID,
            late: EvaluatorWeights::LATE,
        }
    }
}

impl Weights {
    #[inline]
    pub fn for_stage(&self, stage: Stage) -> &EvaluatorWeights {
        match stage {
            Stage::Early => &self.early,
            Stage::Mid => &self.mid,
            Stage::Late => &self.late,
        }
    }

    /// Reject any NaN or infinite entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (row, cells) in self.gradient.iter().enumerate() {
            if let Some(col) = cells.iter().position(|w| !w.is_finite()) {
                return Err(ConfigError::NonFiniteGradient { row, col });
            }
        }
        for stage in [Stage::Early, Stage::Mid, Stage::Late] {
            for (feature, w) in self.for_stage(stage).named() {
                if !w.is_finite() {
                    return Err(ConfigError::NonFiniteWeight { stage: stage.name(), feature });
                }
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON weight table.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let weights: Weights = serde_json::from_str(s)?;
        weights.validate()?;
        Ok(weights)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}

/// Raw, unweighted feature values of a board.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Features {
    pub weighted_sum: f64,
    pub empty_count: f64,
    /// Negated sum of log2 steps along every row and column (0 or below).
    pub monotonicity: f64,
    /// Negated log2 gaps between non-zero right/down neighbours (0 or below).
    pub smoothness: f64,
    pub merge_potential: f64,
    pub max_tile: f64,
}

impl Features {
    pub fn of(board: Board, gradient: &[[f64; 4]; 4]) -> Features {
        let table = line_features();
        let mut lines = LineFeatures::default();
        for line in board.rows().into_iter().chain(board.cols()) {
            let lf = table[line as usize];
            lines.monotonicity += lf.monotonicity;
            lines.smoothness += lf.smoothness;
            lines.merge_potential += lf.merge_potential;
        }
        let mut weighted_sum = 0.0;
        for (idx, w) in gradient.iter().flatten().enumerate() {
            weighted_sum += GameEngine::exponent_to_value(board.exponent_at(idx)) as f64 * w;
        }
        Features {
            weighted_sum,
            empty_count: board.count_empty() as f64,
            monotonicity: lines.monotonicity,
            smoothness: lines.smoothness,
            merge_potential: lines.merge_potential,
            max_tile: board.max_tile() as f64,
        }
    }

    /// Weighted sum of the features plus the depth bonus.
    pub fn combine(&self, w: &EvaluatorWeights, depth_remaining: u32) -> f64 {
        self.weighted_sum * w.weighted_sum
            + self.empty_count * w.empty_count
            + self.monotonicity * w.monotonicity
            + self.smoothness * w.smoothness
            + self.merge_potential * w.merge_potential
            + self.max_tile * w.max_tile
            + depth_remaining as f64 * w.depth_bonus
    }
}

/// Staged board heuristic. Deterministic and side-effect free.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    weights: Weights,
}

impl Evaluator {
    pub fn new(weights: Weights) -> Self {
        warm();
        Self { weights }
    }

    #[inline]
    pub fn weights(&self) -> &Weights { &self.weights }

    /// Score `board`, weighting features by the board's own stage.
    #[inline]
    pub fn score(&self, board: Board, depth_remaining: u32) -> f64 {
        let stage = Stage::of(board);
        Features::of(board, &self.weights.gradient).combine(self.weights.for_stage(stage), depth_remaining)
    }
}

// Row and column features decompose into independent 16-bit lines, so they are
// precomputed once per line like the move tables.
#[derive(Debug, Clone, Copy, Default)]
struct LineFeatures {
    monotonicity: f64,
    smoothness: f64,
    merge_potential: f64,
}

static LINE_FEATURES: OnceLock<Box<[LineFeatures]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = line_features();
}

fn line_features() -> &'static [LineFeatures] {
    LINE_FEATURES
        .get_or_init(|| (0..=u16::MAX).map(calc_line_features).collect::<Vec<_>>().into_boxed_slice())
        .as_ref()
}

fn calc_line_features(line: u16) -> LineFeatures {
    let tiles = GameEngine::line_exponents(line);
    let mut out = LineFeatures::default();
    for pair in tiles.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let gap = a.abs_diff(b) as f64;
        out.monotonicity -= gap;
        if a != 0 && b != 0 {
            out.smoothness -= gap;
            if a == b {
                out.merge_potential += GameEngine::exponent_to_value(a) as f64;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn board(rows: [[u64; 4]; 4]) -> Board { Board::from_rows(&rows).unwrap() }

    #[test]
    fn line_features_follow_log2_steps() {
        // exponents 1,1,3,0 -> values 2,2,8,_
        let lf = calc_line_features(0x1130);
        assert_eq!(lf.monotonicity, -(0.0 + 2.0 + 3.0));
        assert_eq!(lf.smoothness, -2.0);
        assert_eq!(lf.merge_potential, 2.0);
        let flat = calc_line_features(0x0000);
        assert_eq!((flat.monotonicity, flat.smoothness, flat.merge_potential), (0.0, 0.0, 0.0));
    }

    #[test]
    fn features_of_small_board() {
        let b = board([[4, 4, 0, 0], [2, 0, 0, 0], [0; 4], [0; 4]]);
        let f = Features::of(b, &GRADIENT);
        assert_eq!(f.weighted_sum, 4.0 * 64.0 + 4.0 * 32.0 + 2.0 * 32.0);
        assert_eq!(f.empty_count, 13.0);
        assert_eq!(f.max_tile, 4.0);
        // Row 0 pair (4,4) and nothing else adjacent-equal.
        assert_eq!(f.merge_potential, 4.0);
        // Only non-zero neighbours: (0,0)-(0,1) gap 0, (0,0)-(1,0) gap 1.
        assert_eq!(f.smoothness, -1.0);
        // rows: [2,2,0,0] -> 2, [1,0,0,0] -> 1; cols: [2,1,0,0] -> 2, [2,0,0,0] -> 2
        assert_eq!(f.monotonicity, -7.0);
    }

    #[test]
    fn combine_applies_stage_weights() {
        let f = Features {
            weighted_sum: 2.0,
            empty_count: 1.0,
            monotonicity: -1.0,
            smoothness: -1.0,
            merge_potential: 1.0,
            max_tile: 1.0,
        };
        let v = f.combine(&EvaluatorWeights::EARLY, 3);
        assert_eq!(v, 2.0 + 27_000.0 - 10_000.0 - 10_000.0 + 5_000.0 + 1_000.0 + 30.0);
    }

    #[test]
    fn score_is_deterministic_and_stage_aware() {
        let ev = Evaluator::default();
        let b = board([[2048, 1024, 512, 256], [128, 64, 32, 16], [8, 4, 2, 4], [2, 0, 0, 8]]);
        assert_eq!(Stage::of(b), Stage::Late);
        let a = ev.score(b, 2);
        assert_eq!(a.to_bits(), ev.score(b, 2).to_bits());
        let expected = Features::of(b, &GRADIENT).combine(&EvaluatorWeights::LATE, 2);
        assert_eq!(a, expected);
        assert_eq!(ev.score(b, 3) - ev.score(b, 2), 10.0);
    }

    #[test]
    fn corner_board_beats_scattered_board() {
        let ev = Evaluator::default();
        let corner = board([[64, 16, 4, 2], [0; 4], [0; 4], [0; 4]]);
        let scattered = board([[2, 0, 0, 16], [0; 4], [0, 64, 0, 0], [4, 0, 0, 0]]);
        assert!(ev.score(corner, 0) > ev.score(scattered, 0));
    }

    #[test]
    fn weights_json_overrides_and_validates() {
        let json = r#"{"late": {"weighted_sum": 2.0, "empty_count": 1.0, "monotonicity": 1.0,
            "smoothness": 1.0, "merge_potential": 1.0, "max_tile": 1.0, "depth_bonus": 0.0}}"#;
        let w = Weights::from_json_str(json).unwrap();
        assert_eq!(w.late.weighted_sum, 2.0);
        assert_eq!(w.early, EvaluatorWeights::EARLY);
        assert_eq!(w.gradient, GRADIENT);

        let mut bad = Weights::default();
        bad.mid.smoothness = f64::NAN;
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::NonFiniteWeight { stage: "mid", feature: "smoothness" })
        ));
        assert!(matches!(Weights::from_json_str("{not json"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn weights_file_round_trip() {
        let tmp = NamedTempFile::new().unwrap();
        let mut w = Weights::default();
        w.gradient[3][3] = 0.5;
        fs::write(tmp.path(), serde_json::to_string(&w).unwrap()).unwrap();
        assert_eq!(Weights::from_json_file(tmp.path()).unwrap(), w);
        assert!(matches!(Weights::from_json_file("/nonexistent/weights.json"), Err(ConfigError::Io(_))));
    }
}

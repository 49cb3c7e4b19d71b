use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ai_2048_solver::driver::{Driver, DriverConfig, GameStatus, RunSummary};
use ai_2048_solver::engine as GameEngine;
use ai_2048_solver::expectimax::{ExpectimaxConfig, ParThresholds, SolverPolicy, Weights};
use ai_2048_solver::game::LocalGame;
use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "parallel", about = "Batch 2048 runner using the parallel expectimax search")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 10)]
    games: u64,

    /// Seed of the first game; game i uses seed + i
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Per-game: stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Plies searched in the early stage
    #[arg(long, default_value_t = 3)]
    depth: u32,

    /// Never search deeper than this
    #[arg(long)]
    depth_cap: Option<u32>,

    /// Remaining plies at which nodes fan out across threads
    #[arg(long, default_value_t = 3)]
    par_depth: u32,

    /// JSON file overriding the evaluator weights
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Keep playing after reaching 2048
    #[arg(long)]
    keep_going: bool,

    /// Suppress the spinner status line
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let args = Args::parse();
    GameEngine::new();

    let weights = match &args.weights {
        Some(path) => Weights::from_json_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Weights::default(),
    };
    let cfg = ExpectimaxConfig {
        base_depth: args.depth,
        depth_cap: args.depth_cap,
        weights,
        par_thresholds: ParThresholds { par_depth: args.par_depth, ..Default::default() },
        ..Default::default()
    };
    let driver_cfg = DriverConfig { max_steps: args.steps, stop_on_win: !args.keep_going, ..Default::default() };
    let mut driver = Driver::new(SolverPolicy::parallel(cfg), driver_cfg);

    let pb = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new(args.games);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} | Games: {pos}/{len} | {msg}")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let start = Instant::now();
    let mut runs: Vec<RunSummary> = Vec::with_capacity(args.games as usize);
    for i in 0..args.games {
        let mut game = LocalGame::new(args.seed.wrapping_add(i));
        let summary = driver.run(&mut game).with_context(|| format!("game {i}"))?;
        runs.push(summary);
        if let Some(pb) = &pb {
            let moves: u64 = runs.iter().map(|r| r.steps).sum();
            let rate = moves as f64 / start.elapsed().as_secs_f64().max(1e-6);
            pb.set_position(i + 1);
            pb.set_message(format!("moves/sec: {rate:.1} | last score: {}", runs[runs.len() - 1].score));
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    report(&runs, start.elapsed());
    Ok(())
}

fn report(runs: &[RunSummary], elapsed: Duration) {
    if runs.is_empty() {
        println!("No games played");
        return;
    }
    let n = runs.len() as f64;
    let moves: u64 = runs.iter().map(|r| r.steps).sum();
    let mean_score = runs.iter().map(|r| r.score as f64).sum::<f64>() / n;
    let best = runs.iter().map(|r| r.score).max().unwrap_or(0);
    let wins = runs.iter().filter(|r| r.status == GameStatus::Won || r.max_tile >= 2048).count();
    let stalls: u64 = runs.iter().map(|r| r.stall_breaks).sum();
    let mut tiles: BTreeMap<u64, usize> = BTreeMap::new();
    for r in runs {
        *tiles.entry(r.max_tile).or_default() += 1;
    }

    println!(
        "Games: {} | moves: {} | moves/sec: {:.1} | mean score: {:.1} | best score: {} | reached 2048: {:.1}% | stall breaks: {}",
        runs.len(),
        moves,
        moves as f64 / elapsed.as_secs_f64().max(1e-6),
        mean_score,
        best,
        100.0 * wins as f64 / n,
        stalls
    );
    for (tile, count) in tiles.iter().rev() {
        println!("  max tile {tile:>6}: {count}");
    }
}

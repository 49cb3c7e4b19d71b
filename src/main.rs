use std::path::PathBuf;

use ai_2048_solver::engine::{self as GameEngine, Board};
use ai_2048_solver::expectimax::{ExpectimaxConfig, Search, SolverPolicy, Weights};
use ai_2048_solver::game::LocalGame;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ai-2048-solver", about = "Play one seeded 2048 game with the expectimax policy")]
struct Args {
    /// RNG seed for tile spawns (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Plies searched in the early stage
    #[arg(long, default_value_t = 3)]
    depth: u32,

    /// Never search deeper than this
    #[arg(long)]
    depth_cap: Option<u32>,

    /// JSON file overriding the evaluator weights
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Use the rayon-parallel search
    #[arg(long)]
    parallel: bool,

    /// Keep playing after reaching 2048
    #[arg(long)]
    keep_going: bool,

    /// Only print the final board
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let args = Args::parse();
    GameEngine::new();

    let weights = match &args.weights {
        Some(path) => Weights::from_json_file(path)?,
        None => Weights::default(),
    };
    let cfg = ExpectimaxConfig { base_depth: args.depth, depth_cap: args.depth_cap, weights, ..Default::default() };
    if args.parallel {
        play(SolverPolicy::parallel(cfg), &args)
    } else {
        play(SolverPolicy::with_config(cfg), &args)
    }
}

fn play<S: Search>(mut policy: SolverPolicy<S>, args: &Args) -> anyhow::Result<()> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut game = LocalGame::new(seed);
    if !args.quiet {
        println!("{}", game.board());
    }
    let mut peak_nodes = 0;
    while !game.board().is_game_over() {
        if !args.keep_going && game.board().max_tile() >= ai_2048_solver::game::WIN_TILE {
            break;
        }
        if args.steps.is_some_and(|limit| game.total_moves() >= limit) {
            break;
        }
        let board: Board = game.board();
        let dir = policy.choose_move(board);
        let outcome = game.apply(dir);
        if !outcome.moved {
            // The policy only returns a non-moving direction on a dead board.
            break;
        }
        peak_nodes = peak_nodes.max(policy.last_stats().nodes);
        if !args.quiet {
            println!("{dir}\n{}", game.board());
        }
    }
    if args.quiet {
        println!("{}", game.board());
    }
    println!(
        "Seed: {seed}, Moves made: {}, Score: {}, Max tile: {}, Status: {:?}, Max states considered for a move: {peak_nodes}",
        game.total_moves(),
        game.score(),
        game.board().max_tile(),
        game.status()
    );
    Ok(())
}

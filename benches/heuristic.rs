use ai_2048_solver::engine::{self as GameEngine, Board, Move};
use ai_2048_solver::expectimax::{Evaluator, Features, Stage, GRADIENT};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(1337);
    let mut boards = Vec::new();
    boards.push(Board::EMPTY);
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..24 {
        let res = b.simulate(seq[i % seq.len()]);
        if res.moved { b = res.board.with_random_tile(&mut rng); }
        boards.push(b);
    }
    boards
}

fn bench_heuristic(c: &mut Criterion) {
    GameEngine::new();
    let evaluator = Evaluator::default();
    let boards = corpus();
    c.bench_function("heuristic/score", |bch| {
        bch.iter(|| {
            let mut acc = 0f64;
            for &bd in &boards {
                acc = acc.mul_add(1.000_000_1, evaluator.score(bd, 0));
            }
            black_box(acc)
        })
    });
    c.bench_function("heuristic/features", |bch| {
        bch.iter(|| {
            let mut acc = 0f64;
            for &bd in &boards { acc += Features::of(bd, &GRADIENT).smoothness; }
            black_box(acc)
        })
    });
    c.bench_function("heuristic/stage", |bch| {
        bch.iter(|| boards.iter().filter(|&&bd| Stage::of(bd) == Stage::Late).count())
    });
}

criterion_group!(heuristic, bench_heuristic);
criterion_main!(heuristic);

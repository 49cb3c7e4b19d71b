use ai_2048_solver::engine::{self as GameEngine, Board, Move};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(99);
    let mut boards = Vec::new();
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..256 {
        let res = b.simulate(seq[i % seq.len()]);
        b = if res.moved { res.board.with_random_tile(&mut rng) } else { b.with_random_tile(&mut rng) };
        if b.is_game_over() {
            b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        }
        boards.push(b);
    }
    boards
}

fn bench_engine(c: &mut Criterion) {
    GameEngine::new();
    let boards = corpus();
    c.bench_function("engine/simulate_all_dirs", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards {
                for dir in Move::ALL {
                    let res = bd.simulate(dir);
                    acc = acc.wrapping_add(res.board.raw() ^ res.score_gained);
                }
            }
            black_box(acc)
        })
    });
    c.bench_function("engine/is_game_over", |bch| {
        bch.iter(|| boards.iter().filter(|&&bd| bd.is_game_over()).count())
    });
    c.bench_function("engine/random_tile", |bch| {
        let mut rng = StdRng::seed_from_u64(5);
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards { acc ^= bd.with_random_tile(&mut rng).raw(); }
            black_box(acc)
        })
    });
}

criterion_group!(engine_ops, bench_engine);
criterion_main!(engine_ops);

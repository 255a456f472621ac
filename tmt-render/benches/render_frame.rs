use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;
use tmt_core::{BoardView, Node};
use tmt_render::{load_font, BoardStyle, Hud, Scene, SkiaRenderer};
use tmt_timing::HighPrecisionTimer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn nodes() -> Vec<Node> {
    // 25 nodes on a loose spiral inside the board
    (1..=25u32)
        .map(|i| {
            let a = i as f32 * 0.7;
            let r = 40.0 + i as f32 * 10.0;
            Node::new(i, i.to_string(), 620.0 + r * a.cos(), 300.0 + r * 0.8 * a.sin())
        })
        .collect()
}

fn harness() -> (SkiaRenderer, Vec<u8>, HighPrecisionTimer) {
    let r = SkiaRenderer::new(WIDTH, HEIGHT, BoardStyle::default(), load_font(None))
        .expect("renderer");
    let fb = vec![0u8; (WIDTH * HEIGHT * 4) as usize];
    (r, fb, HighPrecisionTimer::new())
}

pub fn bench_game_frame(c: &mut Criterion) {
    let nodes = nodes();
    let hud = Hud {
        title: "Test B",
        elapsed: Duration::from_millis(12_345),
        errors: 2,
        notice: Some("That's an error!"),
    };
    let mut g = c.benchmark_group("render_frame");
    g.sample_size(40);

    // revision changes every frame: board re-rasterized
    g.bench_function("board_redraw", |b| {
        b.iter_batched(
            harness,
            |(mut r, mut fb, mut t)| {
                for rev in 0..4u64 {
                    let scene = Scene::Game {
                        hud,
                        board: Some(BoardView {
                            nodes: &nodes,
                            progress: rev as u32 * 5,
                            revision: rev,
                            start_marker: None,
                        }),
                    };
                    black_box(r.render_frame(&scene, &mut fb, &mut t).ok());
                }
            },
            BatchSize::SmallInput,
        )
    });

    // clock tick only: board comes from cache
    g.bench_function("clock_tick", |b| {
        let (mut r, mut fb, mut t) = harness();
        let scene = Scene::Game {
            hud,
            board: Some(BoardView {
                nodes: &nodes,
                progress: 10,
                revision: 1,
                start_marker: None,
            }),
        };
        b.iter(|| black_box(r.render_frame(&scene, &mut fb, &mut t).ok()))
    });

    g.finish();
}

criterion_group!(benches, bench_game_frame);
criterion_main!(benches);

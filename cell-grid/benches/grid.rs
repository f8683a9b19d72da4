use criterion::AxisScale;
use criterion::PlotConfiguration;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use cell_grid::CellGrid;
use rand::Rng;

const WIDTH: f64 = 2000.;
const HEIGHT: f64 = 2000.;
const CELL: f64 = 100.;
const MOVE: f64 = 2.;

criterion_group!(benches, load, query, relocate);
criterion_main!(benches);

fn plotconf() -> PlotConfiguration {
    PlotConfiguration::default().summary_scale(AxisScale::Logarithmic)
}

fn gen_points(num: usize) -> Vec<[f64; 2]> {
    let mut rng = rand::rng();
    (0..num)
        .map(|_| [rng.random_range(0.0..WIDTH), rng.random_range(0.0..HEIGHT)])
        .collect()
}

fn build(points: &[[f64; 2]]) -> (CellGrid<usize>, Vec<usize>) {
    let mut grid = CellGrid::new(WIDTH, HEIGHT, CELL);
    let cells = points
        .iter()
        .enumerate()
        .map(|(i, p)| grid.insert(i, p))
        .collect();
    (grid, cells)
}

fn load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    group.plot_config(plotconf());
    group.warm_up_time(std::time::Duration::from_millis(200));
    group.measurement_time(std::time::Duration::from_secs(1));
    group.sample_size(50);
    for s in 3..8 {
        let num = 1 << (s * 2);
        let points = gen_points(num);
        group.bench_with_input(BenchmarkId::new("grid", num), &num, |b, _num| {
            b.iter(|| build(black_box(&points)))
        });
    }
    group.finish();
}

fn query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    group.plot_config(plotconf());
    group.warm_up_time(std::time::Duration::from_millis(200));
    group.measurement_time(std::time::Duration::from_secs(1));
    group.sample_size(250);
    for s in 6..15 {
        let num = 1 << s;
        let points = gen_points(num);
        let (grid, _) = build(&points);
        let mut rng = rand::rng();
        group.bench_with_input(BenchmarkId::new("grid", num), &num, |b, _num| {
            b.iter_with_setup(
                || [rng.random_range(0.0..WIDTH), rng.random_range(0.0..HEIGHT)],
                |center| grid.query_point(&center).count(),
            )
        });
    }
    group.finish();
}

fn relocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("relocate");
    group.plot_config(plotconf());
    group.warm_up_time(std::time::Duration::from_millis(200));
    group.measurement_time(std::time::Duration::from_secs(1));
    group.sample_size(50);
    for s in 6..15 {
        let num = 1 << s;
        let mut points = gen_points(num);
        let (mut grid, mut cells) = build(&points);
        let mut rng = rand::rng();
        group.bench_with_input(BenchmarkId::new("grid", num), &num, |b, _num| {
            b.iter(|| {
                // one tick worth of movement
                for (i, p) in points.iter_mut().enumerate() {
                    p[0] = (p[0] + rng.random_range(-MOVE..MOVE)).clamp(0., WIDTH);
                    p[1] = (p[1] + rng.random_range(-MOVE..MOVE)).clamp(0., HEIGHT);
                    cells[i] = grid.relocate(i, cells[i], p);
                }
            })
        });
    }
    group.finish();
}

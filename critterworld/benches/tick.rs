use criterion::AxisScale;
use criterion::PlotConfiguration;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use critterworld::App;
use critterworld::config::Config;

criterion_group!(benches, tick);
criterion_main!(benches);

fn plotconf() -> PlotConfiguration {
    PlotConfiguration::default().summary_scale(AxisScale::Logarithmic)
}

fn tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.plot_config(plotconf());
    group.warm_up_time(std::time::Duration::from_millis(500));
    group.measurement_time(std::time::Duration::from_secs(3));
    group.sample_size(50);
    for s in 6..11 {
        let num = 1 << s;
        let mut config = Config::default();
        config.population.initial = num;
        config.population.max = num * 2;
        let mut app = App::new(config, 77).unwrap();
        // get past the initial think wave
        for _ in 0..30 {
            app.tick();
        }
        group.bench_with_input(BenchmarkId::new("critters", num), &num, |b, _num| {
            b.iter(|| app.tick())
        });
    }
    group.finish();
}

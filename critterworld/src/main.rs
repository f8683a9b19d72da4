// Runs the simulation without any visualisation.
//
// A "frame" here is just one iteration of the main loop, it advances the world by `--speed`
// ticks. The loop stops after `--ticks` ticks or when everything died.
// Set RUST_LOG=critterworld=debug to see species come and go.

use anyhow::{Context, Result};
use clap::Parser;
use critterworld::App;
use critterworld::config::Config;
use critterworld::events::Event;
use critterworld::terrain::Biome;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "critterworld", version, about = "headless artificial life simulation")]
struct Cli {
    /// world seed
    #[arg(long, default_value_t = 1234)]
    seed: u64,

    /// total number of ticks to simulate
    #[arg(long, default_value_t = 20_000)]
    ticks: u64,

    /// ticks per frame
    #[arg(long, default_value_t = 1)]
    speed: u64,

    /// json file overriding parts of the default config
    #[arg(long)]
    config: Option<PathBuf>,

    /// print a report every n frames, 0 for only the final one
    #[arg(long, default_value_t = 0)]
    report_every: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening config {}", path.display()))?;
            Config::from_json(std::io::BufReader::new(file))
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => Config::default(),
    };

    let mut app = App::new(config, cli.seed).context("creating world")?;
    app.subscribe(|e| match e {
        Event::StatsUpdate {
            tick,
            population,
            species,
        } => info!(tick, population, species, "stats"),
        Event::SpeciesNew(s) => {
            info!(name = %s.name, generation = s.generation, "species appeared")
        }
        Event::SpeciesExtinct(s) => info!(name = %s.name, "species died out"),
        // logs are already mirrored by the bus
        Event::Log { .. } | Event::SelectionChanged(_) => {}
    });

    let speed = cli.speed.max(1);
    let mut frame = 0;
    while app.tick_count() < cli.ticks {
        let remaining = cli.ticks - app.tick_count();
        for _ in 0..speed.min(remaining) {
            app.tick();
        }
        frame += 1;
        if cli.report_every > 0 && frame % cli.report_every == 0 {
            println!("{}\n", app.report());
        }
        if app.critters().is_empty() {
            info!(tick = app.tick_count(), "everything died");
            break;
        }
    }

    println!("{}", app.report());
    let coverage = app.terrain().coverage();
    for (biome, share) in Biome::ALL.iter().zip(coverage) {
        println!("{:<10} {:>5.1}%", format!("{:?}", biome), share * 100.);
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use agent_core::sim::{SimSettings, SimWorld};
use agent_core::{BotController, RarityLootFilter};
use app::config_file;
use app::logging;
use app::runner::BotRunner;
use app::seed::SeedChoice;
use app::status_file::StatusFile;
use app::summary_line;
use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::{info, warn};

const STATUS_WRITE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(author, version, about = "Runs the farming agent against the simulated world", long_about = None)]
struct Args {
    /// TOML configuration file; defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Named preset, overriding any configuration file
    #[arg(short, long)]
    preset: Option<String>,
    /// Simulation seed; generated when omitted
    #[arg(short, long)]
    seed: Option<u64>,
    /// Stop after this many agent ticks
    #[arg(short, long)]
    ticks: Option<u64>,
    /// Where to keep the JSON status file
    #[arg(long)]
    status_file: Option<PathBuf>,
    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Number of monsters per simulated map
    #[arg(long, default_value_t = 6)]
    monsters: usize,
    /// Enable the seasonal event in the simulated world
    #[arg(long)]
    season: bool,
}

fn lift<T>(result: anyhow::Result<T>) -> Result<T> {
    result.map_err(|err| eyre!("{err:#}"))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let config = lift(config_file::resolve(args.config.as_deref(), args.preset.as_deref()))?;
    let _log_guard = lift(logging::init(&config.log_level, args.log_file.as_deref()))?;

    let seed = SeedChoice::resolve(args.seed);
    info!(seed = seed.value(), generated = matches!(seed, SeedChoice::Generated(_)), "starting agent");

    let settings = SimSettings {
        seed: seed.value(),
        tick: config.tick_interval(),
        monsters: args.monsters,
        season: args.season,
        ..SimSettings::default()
    };
    let status_path = args.status_file.or_else(StatusFile::get_default_path);
    let mut status_file = StatusFile::new(seed.value(), args.preset.clone());

    let mut handle = lift(BotRunner::spawn(config, args.ticks, move |config| {
        let world = SimWorld::new(settings, config.abilities.clone());
        let loot = RarityLootFilter::new(&config.loot);
        Ok(BotController::new(config, world.provider(), world.actuator(), loot)?)
    }))?;

    while !handle.is_finished() {
        thread::sleep(STATUS_WRITE_INTERVAL);
        if let Some(status) = handle.latest_status() {
            status_file.record(status.clone());
        }
        if let Some(path) = &status_path
            && let Err(err) = status_file.write_atomic(path)
        {
            warn!(path = %path.display(), %err, "could not write status file");
        }
    }

    let statistics = lift(handle.join())?;
    status_file.finish(statistics);
    if let Some(path) = &status_path {
        status_file.write_atomic(path)?;
    }
    println!("{}", summary_line(&statistics));
    Ok(())
}

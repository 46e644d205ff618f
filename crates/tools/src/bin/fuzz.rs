use std::time::Instant;

use agent_core::sim::{SimSettings, SimWorld};
use agent_core::{BotConfig, BotController, Delegation, PRESET_NAMES, RarityLootFilter, Statistics};
use anyhow::{Result, bail};
use clap::Parser;
use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    /// Number of independent runs
    #[arg(short, long, default_value_t = 8)]
    runs: u32,
    #[arg(short, long, default_value_t = 4000)]
    ticks: u32,
}

fn choose<T: Copy>(rng: &mut ChaCha8Rng, slice: &[T]) -> T {
    let p = rng.next_u64() as usize % slice.len();
    slice[p]
}

/// Chance out of 1000 per tick.
fn roll(rng: &mut ChaCha8Rng, per_mille: u64) -> bool {
    rng.next_u64() % 1000 < per_mille
}

fn counters_monotone(before: &Statistics, after: &Statistics) -> bool {
    after.monsters_killed >= before.monsters_killed
        && after.bosses_killed >= before.bosses_killed
        && after.items_looted >= before.items_looted
        && after.maps_cleared >= before.maps_cleared
        && after.deaths >= before.deaths
        && after.runtime_ms >= before.runtime_ms
}

fn fuzz_run(run_seed: u64, ticks: u32) -> Result<Statistics> {
    let mut rng = ChaCha8Rng::seed_from_u64(run_seed);
    let preset = choose(&mut rng, &PRESET_NAMES);
    let config = BotConfig::preset(preset)?;
    let step = config.tick_interval();
    let settings = SimSettings {
        seed: rng.next_u64(),
        tick: step,
        monsters: 2 + (rng.next_u64() % 8) as usize,
        items: (rng.next_u64() % 8) as usize,
        walls: (rng.next_u64() % 10) as usize,
        boss: roll(&mut rng, 600),
        season: roll(&mut rng, 300),
        ..SimSettings::default()
    };
    debug!(run_seed, preset, ?settings, "fuzz run");

    let world = SimWorld::new(settings, config.abilities.clone());
    let loot = RarityLootFilter::new(&config.loot);
    let mut bot = BotController::new(config, world.provider(), world.actuator(), loot)?;
    bot.start();

    let mut now = Instant::now();
    let mut previous = bot.statistics();
    let mut link_down_for = 0u32;
    for tick in 0..ticks {
        if link_down_for == 0 && roll(&mut rng, 3) {
            link_down_for = 1 + (rng.next_u64() % 200) as u32;
            world.set_linked(false);
        } else if link_down_for > 0 {
            link_down_for -= 1;
            if link_down_for == 0 {
                world.set_linked(true);
            }
        }
        if roll(&mut rng, 1) {
            world.kill_player();
        }
        if roll(&mut rng, 2) {
            bot.pause();
        } else if roll(&mut rng, 20) {
            bot.resume();
        }

        let report = bot.tick(now);
        now += step;

        if report.delegated != Delegation::None && !world.player().alive {
            bail!("run {run_seed}: tick {tick} delegated {:?} while the player was dead", report.delegated);
        }
        let current = bot.statistics();
        if !counters_monotone(&previous, &current) {
            bail!("run {run_seed}: counters went backwards at tick {tick}: {previous:?} -> {current:?}");
        }
        if current.monsters_killed > world.counters().kills {
            bail!("run {run_seed}: agent counted kills the world never saw");
        }
        previous = current;
    }

    bot.stop();
    Ok(bot.statistics())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    println!("Starting fuzz harness on seed {} for {} runs of {} ticks...", args.seed, args.runs, args.ticks);
    let mut seeds = ChaCha8Rng::seed_from_u64(args.seed);
    let mut totals = Statistics::default();
    for run in 0..args.runs {
        let run_seed = seeds.next_u64();
        let stats = fuzz_run(run_seed, args.ticks)?;
        info!(run, run_seed, kills = stats.monsters_killed, deaths = stats.deaths, "run passed");
        totals.monsters_killed += stats.monsters_killed;
        totals.items_looted += stats.items_looted;
        totals.maps_cleared += stats.maps_cleared;
        totals.deaths += stats.deaths;
    }

    println!(
        "Fuzzing completed successfully: {} kills, {} items, {} maps, {} deaths.",
        totals.monsters_killed, totals.items_looted, totals.maps_cleared, totals.deaths
    );
    Ok(())
}

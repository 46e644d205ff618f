use std::hash::Hasher;
use std::time::{Duration, Instant};

use agent_core::sim::{SimSettings, SimWorld};
use agent_core::{BotConfig, BotController, RarityLootFilter, StatusSnapshot};
use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use xxhash_rust::xxh3::Xxh3;

#[derive(Parser)]
#[command(author, version, about = "Headless batch run of the agent on a virtual clock", long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    #[arg(short, long, default_value_t = 12_000)]
    ticks: u64,
    /// Named configuration preset
    #[arg(short, long, default_value = "balanced")]
    preset: String,
    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct BatchReport {
    seed: u64,
    preset: String,
    ticks: u64,
    fingerprint: String,
    world_kills: u64,
    world_pickups: u64,
    final_status: StatusSnapshot,
}

/// Folds each tick's decision into the running trace hash.
fn fold_status(hasher: &mut Xxh3, status: &StatusSnapshot) {
    hasher.write_u64(status.tick);
    hasher.write(status.bot_state.as_str().as_bytes());
    hasher.write(status.combat_state.as_str().as_bytes());
    hasher.write(status.navigation_state.as_str().as_bytes());
    hasher.write_u32(status.exploration_progress.to_bits());
    let stats = &status.statistics;
    for counter in [
        stats.monsters_killed,
        stats.bosses_killed,
        stats.items_looted,
        stats.maps_cleared,
        stats.deaths,
    ] {
        hasher.write_u64(counter);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = BotConfig::preset(&args.preset)?;
    let settings = SimSettings { seed: args.seed, tick: config.tick_interval(), ..SimSettings::default() };
    let step = config.tick_interval();

    let world = SimWorld::new(settings, config.abilities.clone());
    let loot = RarityLootFilter::new(&config.loot);
    let mut bot = BotController::new(config, world.provider(), world.actuator(), loot)?;
    bot.start();

    let mut hasher = Xxh3::new();
    let mut now = Instant::now();
    for _ in 0..args.ticks {
        bot.tick(now);
        fold_status(&mut hasher, &bot.status());
        now += step;
    }
    bot.stop();

    let counters = world.counters();
    let report = BatchReport {
        seed: args.seed,
        preset: args.preset,
        ticks: args.ticks,
        fingerprint: format!("0x{:016x}", hasher.finish()),
        world_kills: counters.kills,
        world_pickups: counters.pickups,
        final_status: bot.status(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let stats = report.final_status.statistics;
    println!("Batch run complete.");
    println!("Seed: {} ({})", report.seed, report.preset);
    println!("Virtual time: {:?}", Duration::from_millis(stats.runtime_ms));
    println!("Kills: {} (bosses {}), world saw {}", stats.monsters_killed, stats.bosses_killed, report.world_kills);
    println!("Items looted: {}, world saw {}", stats.items_looted, report.world_pickups);
    println!("Maps cleared: {}", stats.maps_cleared);
    println!("Deaths: {}", stats.deaths);
    println!("Trace fingerprint: {}", report.fingerprint);
    Ok(())
}

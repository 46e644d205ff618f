//! Tracing subscriber setup for the agent process.
//! Console output goes to stderr; a log file is optional.

use std::env;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the filter from the configured level; `RUST_LOG` directives win
/// where they overlap.
pub fn env_filter(log_level: &str) -> EnvFilter {
    let overrides = env::var(EnvFilter::DEFAULT_ENV).ok();
    merge_filter(log_level, overrides.as_deref())
}

fn merge_filter(log_level: &str, overrides: Option<&str>) -> EnvFilter {
    let base = EnvFilter::builder().parse_lossy(log_level);
    overrides
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .filter_map(|directive| directive.parse().ok())
        .fold(base, |filter, directive| filter.add_directive(directive))
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole run or buffered file output is lost.
pub fn init(log_level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console = fmt::layer().with_writer(io::stderr).with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            let name = path.file_name().context("log file path has no file name")?;
            let appender = rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(console)
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(guard)
}

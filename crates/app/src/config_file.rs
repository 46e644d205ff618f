//! Agent configuration on disk.

use std::fs;
use std::path::{Path, PathBuf};

use agent_core::BotConfig;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use tracing::info;

use crate::APP_NAME;

pub const CONFIG_FILE_NAME: &str = "agent.toml";

pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|proj_dirs| {
        let mut path = proj_dirs.config_dir().to_path_buf();
        path.push(CONFIG_FILE_NAME);
        path
    })
}

/// Reads the configuration at `path`, writing the defaults there first when
/// the file does not exist yet.
pub fn load_or_create(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        let config = BotConfig::default();
        write(&config, path)?;
        info!(path = %path.display(), "wrote default configuration");
        return Ok(config);
    }
    load(path)
}

pub fn load(path: &Path) -> Result<BotConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: BotConfig =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    ensure_valid(&config).with_context(|| format!("validating {}", path.display()))?;
    Ok(config)
}

pub fn write(config: &BotConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(config).context("serializing configuration")?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// A named preset wins over any file; otherwise the explicit path, then the
/// platform config directory, then built-in defaults.
pub fn resolve(explicit: Option<&Path>, preset: Option<&str>) -> Result<BotConfig> {
    if let Some(name) = preset {
        return Ok(BotConfig::preset(name)?);
    }
    match explicit {
        Some(path) => load(path),
        None => match default_path() {
            Some(path) => load_or_create(&path),
            None => Ok(BotConfig::default()),
        },
    }
}

pub fn ensure_valid(config: &BotConfig) -> Result<()> {
    let problems = config.validate();
    if problems.is_empty() {
        return Ok(());
    }
    let listing = problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
    bail!("invalid configuration: {listing}");
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use agent_core::{StatusSnapshot, Statistics};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::APP_NAME;

pub const STATUS_FORMAT_VERSION: u32 = 1;

/// Latest agent status, for external dashboards and scripts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusFile {
    pub format_version: u32,
    pub seed: u64,
    pub preset: Option<String>,
    pub running: bool,
    pub status: Option<StatusSnapshot>,
    pub statistics: Statistics,
    pub updated_at_unix_ms: u64,
}

impl StatusFile {
    pub fn new(seed: u64, preset: Option<String>) -> Self {
        Self {
            format_version: STATUS_FORMAT_VERSION,
            seed,
            preset,
            running: true,
            status: None,
            statistics: Statistics::default(),
            updated_at_unix_ms: unix_ms_now(),
        }
    }

    pub fn get_default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|proj_dirs| {
            let mut path = proj_dirs.data_dir().to_path_buf();
            path.push("status.json");
            path
        })
    }

    pub fn record(&mut self, status: StatusSnapshot) {
        self.statistics = status.statistics;
        self.status = Some(status);
        self.updated_at_unix_ms = unix_ms_now();
    }

    pub fn finish(&mut self, statistics: Statistics) {
        self.running = false;
        self.statistics = statistics;
        self.updated_at_unix_ms = unix_ms_now();
    }

    pub fn write_atomic(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

pub mod config_file;
pub mod logging;
pub mod runner;
pub mod seed;
pub mod status_file;

use agent_core::Statistics;

pub const APP_NAME: &str = "FarmAgent";

/// Render a duration in milliseconds as `HH:MM:SS`.
pub fn format_runtime(runtime_ms: u64) -> String {
    let secs = runtime_ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// One-line run summary for logs and the terminal.
pub fn summary_line(statistics: &Statistics) -> String {
    format!(
        "runtime {} | kills {} (bosses {}) | items {} | maps {} | deaths {}",
        format_runtime(statistics.runtime_ms),
        statistics.monsters_killed,
        statistics.bosses_killed,
        statistics.items_looted,
        statistics.maps_cleared,
        statistics.deaths,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_is_zero_padded() {
        assert_eq!(format_runtime(0), "00:00:00");
        assert_eq!(format_runtime(61_500), "00:01:01");
        assert_eq!(format_runtime(3_723_000), "01:02:03");
    }

    #[test]
    fn summary_lists_every_counter() {
        let statistics = Statistics {
            monsters_killed: 12,
            bosses_killed: 1,
            items_looted: 4,
            maps_cleared: 2,
            deaths: 3,
            runtime_ms: 90_000,
        };
        assert_eq!(
            summary_line(&statistics),
            "runtime 00:01:30 | kills 12 (bosses 1) | items 4 | maps 2 | deaths 3"
        );
    }
}

use std::env;
use std::path::PathBuf;

use chrono::NaiveDate;

const DEFAULT_SEASON: &str = "2025-26";
const DEFAULT_MODEL_VERSION: &str = "hss-1.1.0";
const DEFAULT_SCOREBOARD_URL: &str =
    "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/scoreboard";

/// Per-run configuration sourced from the environment (with `.env` support
/// via dotenvy in the binaries). Everything has a sensible default.
#[derive(Debug, Clone)]
pub struct Config {
    pub season: String,
    pub season_start_year: i32,
    pub model_version: String,
    /// `<data_dir>/current`, `<data_dir>/historical`: category/team stat CSVs.
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub scoreboard_url: String,
    pub apply_injuries: bool,
    pub reference_enabled: bool,
    /// Predict games this many days ahead of today (the nightly cycle runs
    /// for tomorrow's slate).
    pub target_offset_days: i64,
    /// Reconciliation sweep window around today.
    pub results_days_back: i64,
    pub results_days_forward: i64,
    /// Fixed run date override for reproducible runs; None means today.
    pub run_date: Option<NaiveDate>,
}

impl Config {
    pub fn from_env() -> Self {
        let season = env::var("SEASON").unwrap_or_else(|_| DEFAULT_SEASON.to_string());
        let season_start_year = season
            .split('-')
            .next()
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(2025);

        Self {
            season,
            season_start_year,
            model_version: env::var("MODEL_VERSION")
                .unwrap_or_else(|_| DEFAULT_MODEL_VERSION.to_string()),
            data_dir: env_path("DATA_DIR", "data"),
            export_dir: env_path("EXPORT_DIR", "exports"),
            scoreboard_url: env::var("SCOREBOARD_URL")
                .unwrap_or_else(|_| DEFAULT_SCOREBOARD_URL.to_string()),
            apply_injuries: env_bool("INJURY_ADJUSTMENT", true),
            reference_enabled: env_bool("REFERENCE_ENABLED", true),
            target_offset_days: env_i64("TARGET_OFFSET_DAYS", 1).clamp(0, 30),
            results_days_back: env_i64("RESULTS_DAYS_BACK", 5).clamp(0, 60),
            results_days_forward: env_i64("RESULTS_DAYS_FORWARD", 1).clamp(0, 7),
            run_date: env::var("RUN_DATE")
                .ok()
                .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()),
        }
    }

    pub fn current_data_dir(&self) -> PathBuf {
        self.data_dir.join("current")
    }

    pub fn historical_data_dir(&self) -> PathBuf {
        self.data_dir.join("historical")
    }

    pub fn schedule_dir(&self) -> PathBuf {
        self.data_dir.join("schedule")
    }

    pub fn injuries_csv(&self) -> PathBuf {
        self.data_dir.join("injuries.csv")
    }

    pub fn player_scores_csv(&self) -> PathBuf {
        self.data_dir.join("player_scores.csv")
    }

    pub fn history_path(&self) -> PathBuf {
        self.export_dir.join("prediction_history.json")
    }

    pub fn prediction_csv(&self) -> PathBuf {
        self.export_dir.join("prediction_results.csv")
    }

    pub fn win_loss_csv(&self) -> PathBuf {
        self.export_dir.join("win_loss_records.csv")
    }
}

fn env_path(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => !matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => default,
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_start_year_derives_from_season_label() {
        let cfg = Config::from_env();
        let expected = cfg
            .season
            .split('-')
            .next()
            .unwrap()
            .parse::<i32>()
            .unwrap();
        assert_eq!(cfg.season_start_year, expected);
    }

    #[test]
    fn derived_paths_hang_off_the_roots() {
        let mut cfg = Config::from_env();
        cfg.data_dir = PathBuf::from("/tmp/hc");
        cfg.export_dir = PathBuf::from("/tmp/out");
        assert_eq!(cfg.current_data_dir(), PathBuf::from("/tmp/hc/current"));
        assert_eq!(cfg.injuries_csv(), PathBuf::from("/tmp/hc/injuries.csv"));
        assert_eq!(
            cfg.history_path(),
            PathBuf::from("/tmp/out/prediction_history.json")
        );
    }
}

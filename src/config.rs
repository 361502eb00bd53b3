use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AppError, Result};

pub const DB_PATH: &str = "data/warehouse/navscan.sqlite";
pub const SILVER_ROOT: &str = "data/silver";
pub const SIGNALS_ROOT: &str = "data/gold/signals";
pub const SIGNALS_CONFIG: &str = "configs/signals.json";

/// Follow-up horizons (calendar days) used when HORIZONS is unset.
pub const DEFAULT_HORIZONS: &[i64] = &[1, 3, 5];

/// Rolling z-score window used when the signal config omits `zscore_window`.
pub const DEFAULT_ZSCORE_WINDOW: usize = 20;

pub const DEFAULT_TOP_N: usize = 10;

/// Cap on the liquidity score component (multiples of the reference dollar volume).
pub const LIQUIDITY_COMPONENT_CAP: f64 = 2.0;

/// Silver history file holding every standardized row across dates.
pub const ALL_DATES_FILE: &str = "all_dates.ndjson";
pub const SNAPSHOT_FILE: &str = "snapshot.ndjson";
pub const SCORED_UNIVERSE_FILE: &str = "scored_universe.ndjson";
pub const CANDIDATES_FILE: &str = "candidates_ranked.ndjson";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: PathBuf,
    pub silver_root: PathBuf,
    pub signals_root: PathBuf,
    pub signals_config: PathBuf,
    /// Scan date for the `scan` stage (SCAN_DATE). Latest silver date when unset.
    pub scan_date: Option<NaiveDate>,
    /// Scan dates for the `track` stage (SCAN_DATES, comma-separated). Empty = all discovered.
    pub scan_dates: Vec<NaiveDate>,
    /// Outcome horizons in calendar days (HORIZONS, comma-separated).
    pub horizons: Vec<i64>,
    pub top_n: usize,
    /// Cutoff for the reversion query (AS_OF_DATE).
    pub as_of_date: Option<NaiveDate>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let horizons = match std::env::var("HORIZONS") {
            Ok(raw) => parse_horizons(&raw)?,
            Err(_) => DEFAULT_HORIZONS.to_vec(),
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: env_path("DB_PATH", DB_PATH),
            silver_root: env_path("SILVER_ROOT", SILVER_ROOT),
            signals_root: env_path("SIGNALS_ROOT", SIGNALS_ROOT),
            signals_config: env_path("SIGNALS_CONFIG", SIGNALS_CONFIG),
            scan_date: env_date("SCAN_DATE")?,
            scan_dates: std::env::var("SCAN_DATES")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_date("SCAN_DATES", s))
                .collect::<Result<Vec<_>>>()?,
            horizons,
            top_n: std::env::var("TOP_N")
                .unwrap_or_else(|_| DEFAULT_TOP_N.to_string())
                .parse::<usize>()
                .map_err(|_| AppError::Config("TOP_N must be a non-negative integer".to_string()))?,
            as_of_date: env_date("AS_OF_DATE")?,
        })
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(std::env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn env_date(key: &str) -> Result<Option<NaiveDate>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_date(key, raw.trim()).map(Some),
        _ => Ok(None),
    }
}

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Config(format!("{key} must be YYYY-MM-DD, got {raw:?}")))
}

/// Parse a comma-separated horizon list. Horizons must be positive day counts.
pub fn parse_horizons(raw: &str) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let h = part
            .parse::<i64>()
            .map_err(|_| AppError::Config(format!("HORIZONS entry {part:?} is not an integer")))?;
        if h <= 0 {
            return Err(AppError::Config(format!("HORIZONS entry {h} must be positive")));
        }
        out.push(h);
    }
    if out.is_empty() {
        return Err(AppError::Config("HORIZONS must list at least one horizon".to_string()));
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

// ---------------------------------------------------------------------------
// Signal parameters (JSON file)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDataStatus {
    /// Every symbol in the universe had event data fetched.
    Full,
    Partial,
    Unavailable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtremeConfig {
    pub zscore_threshold: f64,
    /// Absolute premium/discount threshold, in percent.
    pub abs_pd_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityConfig {
    pub min_dollar_volume: f64,
    pub reference_dollar_volume: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventFilterConfig {
    #[serde(default = "default_true")]
    pub exclude_distribution_events: bool,
    pub event_data_status: EventDataStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreConfig {
    pub weight_extreme: f64,
    pub weight_liquidity: f64,
    pub weight_half_life: f64,
    pub penalty_nav_stale: f64,
    pub penalty_half_life_unavailable: f64,
    pub penalty_event_data_partial: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HalfLifeConfig {
    pub min_points: usize,
    pub max_half_life_days: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_zscore_window")]
    pub zscore_window: usize,
    pub extreme: ExtremeConfig,
    pub liquidity: LiquidityConfig,
    pub event_filter: EventFilterConfig,
    pub score: ScoreConfig,
    pub half_life: HalfLifeConfig,
}

fn default_true() -> bool {
    true
}

fn default_zscore_window() -> usize {
    DEFAULT_ZSCORE_WINDOW
}

impl SignalConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read signal config {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: SignalConfig = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("invalid signal config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("extreme.zscore_threshold", self.extreme.zscore_threshold),
            ("extreme.abs_pd_threshold", self.extreme.abs_pd_threshold),
            ("liquidity.reference_dollar_volume", self.liquidity.reference_dollar_volume),
            ("half_life.max_half_life_days", self.half_life.max_half_life_days),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(AppError::Config(format!("{name} must be > 0, got {value}")));
            }
        }

        let non_negative = [
            ("liquidity.min_dollar_volume", self.liquidity.min_dollar_volume),
            ("score.penalty_nav_stale", self.score.penalty_nav_stale),
            ("score.penalty_half_life_unavailable", self.score.penalty_half_life_unavailable),
            ("score.penalty_event_data_partial", self.score.penalty_event_data_partial),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(AppError::Config(format!("{name} must be >= 0, got {value}")));
            }
        }

        if self.half_life.min_points < 2 {
            return Err(AppError::Config("half_life.min_points must be >= 2".to_string()));
        }
        if self.zscore_window == 0 {
            return Err(AppError::Config("zscore_window must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_signal_config() -> SignalConfig {
    SignalConfig {
        zscore_window: 20,
        extreme: ExtremeConfig {
            zscore_threshold: 2.0,
            abs_pd_threshold: 8.0,
        },
        liquidity: LiquidityConfig {
            min_dollar_volume: 500_000.0,
            reference_dollar_volume: 5_000_000.0,
        },
        event_filter: EventFilterConfig {
            exclude_distribution_events: true,
            event_data_status: EventDataStatus::Full,
        },
        score: ScoreConfig {
            weight_extreme: 1.0,
            weight_liquidity: 0.5,
            weight_half_life: 2.0,
            penalty_nav_stale: 0.25,
            penalty_half_life_unavailable: 0.5,
            penalty_event_data_partial: 0.1,
        },
        half_life: HalfLifeConfig {
            min_points: 20,
            max_half_life_days: 252.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "extreme": {"zscore_threshold": 2.0, "abs_pd_threshold": 8.0},
        "liquidity": {"min_dollar_volume": 500000, "reference_dollar_volume": 5000000},
        "event_filter": {"event_data_status": "partial"},
        "score": {
            "weight_extreme": 1.0, "weight_liquidity": 0.5, "weight_half_life": 2.0,
            "penalty_nav_stale": 0.25, "penalty_half_life_unavailable": 0.5,
            "penalty_event_data_partial": 0.1
        },
        "half_life": {"min_points": 20, "max_half_life_days": 252}
    }"#;

    #[test]
    fn parses_with_defaults() {
        let cfg = SignalConfig::from_json(SAMPLE).unwrap();
        assert_eq!(cfg.zscore_window, DEFAULT_ZSCORE_WINDOW);
        assert!(cfg.event_filter.exclude_distribution_events);
        assert_eq!(cfg.event_filter.event_data_status, EventDataStatus::Partial);
    }

    #[test]
    fn missing_section_is_config_error() {
        let err = SignalConfig::from_json(r#"{"extreme": {"zscore_threshold": 2.0, "abs_pd_threshold": 8.0}}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn zero_pd_threshold_rejected() {
        let mut cfg = test_signal_config();
        cfg.extreme.abs_pd_threshold = 0.0;
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn horizons_are_sorted_and_deduplicated() {
        assert_eq!(parse_horizons("5, 1,3,1").unwrap(), vec![1, 3, 5]);
        assert!(parse_horizons("1,x").is_err());
        assert!(parse_horizons("0").is_err());
        assert!(parse_horizons(" ").is_err());
    }
}

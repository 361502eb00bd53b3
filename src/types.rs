use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Standardized input rows
// ---------------------------------------------------------------------------

/// Where each raw field of a standardized row came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceTrace {
    pub price_source: Option<String>,
    pub price_fetch_timestamp_utc: Option<String>,
    pub nav_source: Option<String>,
    pub nav_fetch_timestamp_utc: Option<String>,
    pub events_source: Option<String>,
    pub events_fetch_timestamp_utc: Option<String>,
    pub metadata_source: Option<String>,
    pub metadata_fetch_timestamp_utc: Option<String>,
    pub nav_reason: Option<String>,
}

/// One instrument on one date, as produced by the standardization step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub price_close: Option<f64>,
    pub nav: Option<f64>,
    /// Derived: (price / nav - 1) * 100. None unless price is present and nav > 0.
    pub premium_discount_pct: Option<f64>,
    pub volume: Option<f64>,
    /// Derived: price * volume.
    pub dollar_volume: Option<f64>,
    pub price_time: Option<String>,
    pub nav_time: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub nav_staleness_flag: bool,
    #[serde(default)]
    pub distribution_event_flag: bool,
    /// Rolling z-score of premium_discount_pct; unset until rolling stats run.
    #[serde(alias = "pd_zscore_20d")]
    pub pd_zscore: Option<f64>,
    pub zscore_window_used: Option<usize>,
    #[serde(default)]
    pub data_quality_flags: Vec<String>,
    #[serde(default)]
    pub source_trace: SourceTrace,
}

impl StandardizedRow {
    #[cfg(test)]
    pub fn new(
        date: NaiveDate,
        symbol: impl Into<String>,
        price_close: Option<f64>,
        nav: Option<f64>,
        volume: Option<f64>,
    ) -> Self {
        let mut row = Self {
            date,
            symbol: symbol.into(),
            price_close,
            nav,
            premium_discount_pct: None,
            volume,
            dollar_volume: None,
            price_time: None,
            nav_time: None,
            category: None,
            nav_staleness_flag: false,
            distribution_event_flag: false,
            pd_zscore: None,
            zscore_window_used: None,
            data_quality_flags: Vec::new(),
            source_trace: SourceTrace::default(),
        };
        row.recompute_derived();
        row
    }

    /// Re-derive premium/discount and dollar volume from the raw fields.
    pub fn recompute_derived(&mut self) {
        self.premium_discount_pct =
            crate::standardize::compute_premium_discount_pct(self.price_close, self.nav);
        self.dollar_volume = crate::standardize::compute_dollar_volume(self.price_close, self.volume);
    }
}

// ---------------------------------------------------------------------------
// Half-life estimation result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfLifeReason {
    Ok,
    InsufficientHistory,
    InsufficientRegressionPoints,
    ZeroVariance,
    InvalidBeta,
    NonMeanRevertingBeta,
    InvalidHalfLife,
    HalfLifeTooLong,
}

impl std::fmt::Display for HalfLifeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HalfLifeReason::Ok => "ok",
            HalfLifeReason::InsufficientHistory => "insufficient_history",
            HalfLifeReason::InsufficientRegressionPoints => "insufficient_regression_points",
            HalfLifeReason::ZeroVariance => "zero_variance",
            HalfLifeReason::InvalidBeta => "invalid_beta",
            HalfLifeReason::NonMeanRevertingBeta => "non_mean_reverting_beta",
            HalfLifeReason::InvalidHalfLife => "invalid_half_life",
            HalfLifeReason::HalfLifeTooLong => "half_life_too_long",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfLifeEstimate {
    pub half_life_days: Option<f64>,
    pub reason: HalfLifeReason,
}

impl HalfLifeEstimate {
    pub fn found(half_life_days: f64) -> Self {
        Self {
            half_life_days: Some(half_life_days),
            reason: HalfLifeReason::Ok,
        }
    }

    pub fn unavailable(reason: HalfLifeReason) -> Self {
        Self {
            half_life_days: None,
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    NavStale,
    HalfLifeUnavailable,
    InsufficientHistory,
    EventDataPartial,
}

impl std::fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskFlag::NavStale => "nav_stale",
            RiskFlag::HalfLifeUnavailable => "half_life_unavailable",
            RiskFlag::InsufficientHistory => "insufficient_history",
            RiskFlag::EventDataPartial => "event_data_partial",
        };
        write!(f, "{s}")
    }
}

/// Score and the named parts it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub score: f64,
    pub score_extreme_component: f64,
    pub score_liquidity_component: f64,
    pub score_half_life_component: f64,
    pub score_penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    #[serde(flatten)]
    pub row: StandardizedRow,
    pub half_life_days: Option<f64>,
    pub half_life_reason: HalfLifeReason,
    pub extreme_triggered: bool,
    pub extreme_reason: String,
    pub liquidity_pass: bool,
    pub liquidity_reason: String,
    pub event_pass: bool,
    pub event_reason: String,
    pub risk_flags: Vec<RiskFlag>,
    #[serde(flatten)]
    pub score: ScoreBreakdown,
    pub rationale: String,
}

impl ScoredRow {
    /// Passed every gate (extreme, liquidity, event).
    pub fn is_candidate(&self) -> bool {
        self.extreme_triggered && self.liquidity_pass && self.event_pass
    }
}

/// A scored row that passed every gate, with its rank for the scan date (1 = best).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub scored: ScoredRow,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub date: NaiveDate,
    pub universe_count: usize,
    pub candidate_count: usize,
    pub extreme_count: usize,
    pub liquidity_pass_count: usize,
    pub event_block_count: usize,
    pub half_life_available_count: usize,
}

// ---------------------------------------------------------------------------
// Outcome tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Follow-up snapshot found; reversion measured.
    Ok,
    /// No premium/discount at scan time. Terminal.
    MissingScanPd,
    /// Scan premium/discount was exactly zero. Terminal.
    ZeroScanPd,
    /// Target-date snapshot not ingested yet. Recomputable.
    MissingFollowupData,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::MissingScanPd => "missing_scan_pd",
            OutcomeStatus::ZeroScanPd => "zero_scan_pd",
            OutcomeStatus::MissingFollowupData => "missing_followup_data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(OutcomeStatus::Ok),
            "missing_scan_pd" => Some(OutcomeStatus::MissingScanPd),
            "zero_scan_pd" => Some(OutcomeStatus::ZeroScanPd),
            "missing_followup_data" => Some(OutcomeStatus::MissingFollowupData),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRecord {
    pub scan_date: NaiveDate,
    pub symbol: String,
    pub horizon_days: i64,
    pub target_date: NaiveDate,
    pub pd_scan: Option<f64>,
    pub pd_target: Option<f64>,
    /// |pd_scan| - |pd_target|; positive means the mispricing shrank.
    pub abs_pd_change: Option<f64>,
    pub reverted: Option<bool>,
    pub status: OutcomeStatus,
    pub reason: String,
    pub source_snapshot_date: Option<NaiveDate>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub ok: usize,
    pub missing_scan_pd: usize,
    pub zero_scan_pd: usize,
    pub missing_followup_data: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Ok => self.ok += 1,
            OutcomeStatus::MissingScanPd => self.missing_scan_pd += 1,
            OutcomeStatus::ZeroScanPd => self.zero_scan_pd += 1,
            OutcomeStatus::MissingFollowupData => self.missing_followup_data += 1,
        }
    }

    pub fn merge(&mut self, other: OutcomeCounts) {
        self.ok += other.ok;
        self.missing_scan_pd += other.missing_scan_pd;
        self.zero_scan_pd += other.zero_scan_pd;
        self.missing_followup_data += other.missing_followup_data;
    }
}

/// Point-in-time reversion tally for the top-N candidates of one scan date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversionSummary {
    pub scan_date: NaiveDate,
    pub as_of_date: NaiveDate,
    pub top_n: usize,
    pub candidate_count: usize,
    pub reverted_count: usize,
    pub with_followup_count: usize,
    pub missing_followup_count: usize,
}

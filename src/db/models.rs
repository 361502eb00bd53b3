//! Row types for the warehouse tables in `migrations/`.
//! Used by sqlx for typed queries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::types::OutcomeStatus;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SnapshotRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub price_close: Option<f64>,
    pub nav: Option<f64>,
    pub premium_discount_pct: Option<f64>,
    pub dollar_volume: Option<f64>,
    pub data_quality_flags_json: String,
    pub source_path: Option<String>,
    pub row_hash: String,
    pub first_seen_ts: DateTime<Utc>,
    pub last_seen_ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CandidateRecord {
    pub scan_date: NaiveDate,
    pub symbol: String,
    pub rank: i64,
    pub score: f64,
    pub premium_discount_pct_at_scan: Option<f64>,
    pub dollar_volume_at_scan: Option<f64>,
    pub rationale: String,
    pub risk_flags_json: String,
    pub source_path: Option<String>,
    pub row_hash: String,
    pub first_seen_ts: DateTime<Utc>,
    pub last_seen_ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct OutcomeRow {
    pub scan_date: NaiveDate,
    pub symbol: String,
    pub horizon_days: i64,
    pub target_date: NaiveDate,
    pub pd_scan: Option<f64>,
    pub pd_target: Option<f64>,
    pub abs_pd_change: Option<f64>,
    pub reverted_flag: Option<i64>,
    pub status: String,
    pub reason: String,
    pub source_snapshot_date: Option<NaiveDate>,
    pub computed_ts: DateTime<Utc>,
    pub row_hash: String,
    pub first_seen_ts: DateTime<Utc>,
    pub last_seen_ts: DateTime<Utc>,
}

impl OutcomeRow {
    pub fn is_ok(&self) -> bool {
        OutcomeStatus::parse(&self.status) == Some(OutcomeStatus::Ok)
    }

    pub fn reverted(&self) -> bool {
        self.reverted_flag == Some(1)
    }
}

// ---------------------------------------------------------------------------
// Hash payloads: the canonical (non-timestamp) field set of each table
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct SnapshotPayload<'a> {
    pub date: NaiveDate,
    pub symbol: &'a str,
    pub price_close: Option<f64>,
    pub nav: Option<f64>,
    pub premium_discount_pct: Option<f64>,
    pub dollar_volume: Option<f64>,
    pub data_quality_flags_json: String,
    pub source_path: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CandidatePayload<'a> {
    pub scan_date: NaiveDate,
    pub symbol: &'a str,
    pub rank: i64,
    pub score: f64,
    pub premium_discount_pct_at_scan: Option<f64>,
    pub dollar_volume_at_scan: Option<f64>,
    pub rationale: &'a str,
    pub risk_flags_json: String,
    pub source_path: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct OutcomePayload<'a> {
    pub scan_date: NaiveDate,
    pub symbol: &'a str,
    pub horizon_days: i64,
    pub target_date: NaiveDate,
    pub pd_scan: Option<f64>,
    pub pd_target: Option<f64>,
    pub abs_pd_change: Option<f64>,
    pub reverted_flag: Option<i64>,
    pub status: &'a str,
    pub reason: &'a str,
    pub source_snapshot_date: Option<NaiveDate>,
}

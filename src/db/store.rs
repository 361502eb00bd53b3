use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::db::hash::row_hash;
use crate::db::models::{
    CandidatePayload, CandidateRecord, OutcomePayload, OutcomeRow, SnapshotPayload, SnapshotRecord,
};
use crate::error::Result;
use crate::types::{Candidate, OutcomeRecord, StandardizedRow};

/// Idempotent warehouse for snapshots, candidates and outcomes.
///
/// Every upsert merges by natural key with last-write-wins on the non-key
/// columns; `first_seen_ts` survives re-ingestion, `last_seen_ts` and
/// `row_hash` are refreshed. Each batch is applied in one transaction.
/// Single writer only: the pool holds exactly one connection.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database; lives as long as the store.
    #[cfg(test)]
    pub(crate) async fn in_memory() -> Result<Self> {
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn record_run(&self, mode: &str, notes: &str, run_ts: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query("INSERT INTO runs (run_ts, mode, notes) VALUES (?, ?, ?)")
            .bind(run_ts)
            .bind(mode)
            .bind(notes)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    // -----------------------------------------------------------------------
    // Upserts
    // -----------------------------------------------------------------------

    pub async fn upsert_snapshots(
        &self,
        rows: &[StandardizedRow],
        source_path: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            let payload = SnapshotPayload {
                date: row.date,
                symbol: &row.symbol,
                price_close: row.price_close,
                nav: row.nav,
                premium_discount_pct: row.premium_discount_pct,
                dollar_volume: row.dollar_volume,
                data_quality_flags_json: serde_json::to_string(&row.data_quality_flags)?,
                source_path,
            };
            let hash = row_hash(&payload)?;

            sqlx::query(
                r#"
                INSERT INTO snapshots (
                    date, symbol, price_close, nav, premium_discount_pct, dollar_volume,
                    data_quality_flags_json, source_path, row_hash, first_seen_ts, last_seen_ts
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(date, symbol) DO UPDATE SET
                    price_close = excluded.price_close,
                    nav = excluded.nav,
                    premium_discount_pct = excluded.premium_discount_pct,
                    dollar_volume = excluded.dollar_volume,
                    data_quality_flags_json = excluded.data_quality_flags_json,
                    source_path = excluded.source_path,
                    row_hash = excluded.row_hash,
                    last_seen_ts = excluded.last_seen_ts
                "#,
            )
            .bind(payload.date)
            .bind(payload.symbol)
            .bind(payload.price_close)
            .bind(payload.nav)
            .bind(payload.premium_discount_pct)
            .bind(payload.dollar_volume)
            .bind(&payload.data_quality_flags_json)
            .bind(payload.source_path)
            .bind(&hash)
            .bind(seen_at)
            .bind(seen_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(rows = rows.len(), source_path, "snapshot batch committed");
        Ok(rows.len())
    }

    /// Upsert ranked candidates. Each scan date in the batch is treated as the
    /// full candidate set for that date: stored symbols missing from the batch
    /// are removed so ranks stay unique and contiguous.
    pub async fn upsert_candidates(
        &self,
        candidates: &[Candidate],
        source_path: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut batch_symbols: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
        for c in candidates {
            batch_symbols
                .entry(c.scored.row.date)
                .or_default()
                .insert(c.scored.row.symbol.as_str());
        }

        let mut tx = self.pool.begin().await?;

        let mut removed = 0u64;
        for (scan_date, keep) in &batch_symbols {
            let stored = sqlx::query_scalar::<_, String>("SELECT symbol FROM candidates WHERE scan_date = ?")
                .bind(*scan_date)
                .fetch_all(&mut *tx)
                .await?;
            for symbol in stored.iter().filter(|s| !keep.contains(s.as_str())) {
                removed += sqlx::query("DELETE FROM candidates WHERE scan_date = ? AND symbol = ?")
                    .bind(*scan_date)
                    .bind(symbol)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
            }
        }

        for c in candidates {
            let row = &c.scored.row;
            let payload = CandidatePayload {
                scan_date: row.date,
                symbol: &row.symbol,
                rank: i64::from(c.rank),
                score: c.scored.score.score,
                premium_discount_pct_at_scan: row.premium_discount_pct,
                dollar_volume_at_scan: row.dollar_volume,
                rationale: &c.scored.rationale,
                risk_flags_json: serde_json::to_string(&c.scored.risk_flags)?,
                source_path,
            };
            let hash = row_hash(&payload)?;

            sqlx::query(
                r#"
                INSERT INTO candidates (
                    scan_date, symbol, rank, score, premium_discount_pct_at_scan,
                    dollar_volume_at_scan, rationale, risk_flags_json, source_path,
                    row_hash, first_seen_ts, last_seen_ts
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(scan_date, symbol) DO UPDATE SET
                    rank = excluded.rank,
                    score = excluded.score,
                    premium_discount_pct_at_scan = excluded.premium_discount_pct_at_scan,
                    dollar_volume_at_scan = excluded.dollar_volume_at_scan,
                    rationale = excluded.rationale,
                    risk_flags_json = excluded.risk_flags_json,
                    source_path = excluded.source_path,
                    row_hash = excluded.row_hash,
                    last_seen_ts = excluded.last_seen_ts
                "#,
            )
            .bind(payload.scan_date)
            .bind(payload.symbol)
            .bind(payload.rank)
            .bind(payload.score)
            .bind(payload.premium_discount_pct_at_scan)
            .bind(payload.dollar_volume_at_scan)
            .bind(payload.rationale)
            .bind(&payload.risk_flags_json)
            .bind(payload.source_path)
            .bind(&hash)
            .bind(seen_at)
            .bind(seen_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(rows = candidates.len(), removed, source_path, "candidate batch committed");
        Ok(candidates.len())
    }

    pub async fn upsert_outcomes(&self, outcomes: &[OutcomeRecord], seen_at: DateTime<Utc>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for o in outcomes {
            let payload = OutcomePayload {
                scan_date: o.scan_date,
                symbol: &o.symbol,
                horizon_days: o.horizon_days,
                target_date: o.target_date,
                pd_scan: o.pd_scan,
                pd_target: o.pd_target,
                abs_pd_change: o.abs_pd_change,
                reverted_flag: o.reverted.map(i64::from),
                status: o.status.as_str(),
                reason: &o.reason,
                source_snapshot_date: o.source_snapshot_date,
            };
            let hash = row_hash(&payload)?;

            sqlx::query(
                r#"
                INSERT INTO outcomes (
                    scan_date, symbol, horizon_days, target_date, pd_scan, pd_target,
                    abs_pd_change, reverted_flag, status, reason, source_snapshot_date,
                    computed_ts, row_hash, first_seen_ts, last_seen_ts
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(scan_date, symbol, horizon_days, target_date) DO UPDATE SET
                    pd_scan = excluded.pd_scan,
                    pd_target = excluded.pd_target,
                    abs_pd_change = excluded.abs_pd_change,
                    reverted_flag = excluded.reverted_flag,
                    status = excluded.status,
                    reason = excluded.reason,
                    source_snapshot_date = excluded.source_snapshot_date,
                    computed_ts = excluded.computed_ts,
                    row_hash = excluded.row_hash,
                    last_seen_ts = excluded.last_seen_ts
                "#,
            )
            .bind(payload.scan_date)
            .bind(payload.symbol)
            .bind(payload.horizon_days)
            .bind(payload.target_date)
            .bind(payload.pd_scan)
            .bind(payload.pd_target)
            .bind(payload.abs_pd_change)
            .bind(payload.reverted_flag)
            .bind(payload.status)
            .bind(payload.reason)
            .bind(payload.source_snapshot_date)
            .bind(o.computed_at)
            .bind(&hash)
            .bind(seen_at)
            .bind(seen_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(rows = outcomes.len(), "outcome batch committed");
        Ok(outcomes.len())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn snapshot(&self, date: NaiveDate, symbol: &str) -> Result<Option<SnapshotRecord>> {
        let row = sqlx::query_as::<_, SnapshotRecord>(
            r#"
            SELECT date, symbol, price_close, nav, premium_discount_pct, dollar_volume,
                   data_quality_flags_json, source_path, row_hash, first_seen_ts, last_seen_ts
            FROM snapshots
            WHERE date = ? AND symbol = ?
            "#,
        )
        .bind(date)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Premium/discount of one stored snapshot; None when the snapshot is
    /// absent or its premium/discount is null.
    pub async fn fetch_snapshot_pd(&self, date: NaiveDate, symbol: &str) -> Result<Option<f64>> {
        Ok(self
            .snapshot(date, symbol)
            .await?
            .and_then(|s| s.premium_discount_pct))
    }

    /// All candidates of a scan date, best rank first.
    pub async fn candidates_for_date(&self, scan_date: NaiveDate) -> Result<Vec<CandidateRecord>> {
        self.top_candidates(scan_date, i64::MAX).await
    }

    pub async fn top_candidates(&self, scan_date: NaiveDate, limit: i64) -> Result<Vec<CandidateRecord>> {
        let rows = sqlx::query_as::<_, CandidateRecord>(
            r#"
            SELECT scan_date, symbol, rank, score, premium_discount_pct_at_scan,
                   dollar_volume_at_scan, rationale, risk_flags_json, source_path,
                   row_hash, first_seen_ts, last_seen_ts
            FROM candidates
            WHERE scan_date = ?
            ORDER BY rank ASC, symbol ASC
            LIMIT ?
            "#,
        )
        .bind(scan_date)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Outcomes of one candidate whose target date is on or before `as_of`,
    /// earliest target first.
    pub async fn outcomes_until(
        &self,
        scan_date: NaiveDate,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<OutcomeRow>> {
        let rows = sqlx::query_as::<_, OutcomeRow>(
            r#"
            SELECT scan_date, symbol, horizon_days, target_date, pd_scan, pd_target,
                   abs_pd_change, reverted_flag, status, reason, source_snapshot_date,
                   computed_ts, row_hash, first_seen_ts, last_seen_ts
            FROM outcomes
            WHERE scan_date = ? AND symbol = ? AND target_date <= ?
            ORDER BY target_date ASC, horizon_days ASC
            "#,
        )
        .bind(scan_date)
        .bind(symbol)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Distinct scan dates that have stored candidates, ascending.
    pub async fn candidate_scan_dates(&self) -> Result<Vec<NaiveDate>> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT DISTINCT scan_date FROM candidates ORDER BY scan_date ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(dates)
    }

    #[cfg(test)]
    pub(crate) async fn count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        Ok(sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_signal_config;
    use crate::context::StageContext;
    use crate::scorer::ranker::rank_candidates;
    use crate::scorer::score_row;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_771_000_000 + secs, 0).unwrap()
    }

    fn snapshot_row(price: f64) -> StandardizedRow {
        StandardizedRow::new(day(20), "PDI", Some(price), Some(20.0), Some(50_000.0))
    }

    #[tokio::test]
    async fn identical_snapshot_upsert_is_idempotent() {
        let store = Store::in_memory().await.unwrap();
        let rows = vec![snapshot_row(18.0)];

        store.upsert_snapshots(&rows, "silver/a.ndjson", at(0)).await.unwrap();
        let first = store.snapshot(day(20), "PDI").await.unwrap().unwrap();

        store.upsert_snapshots(&rows, "silver/a.ndjson", at(60)).await.unwrap();
        let second = store.snapshot(day(20), "PDI").await.unwrap().unwrap();

        assert_eq!(store.count("snapshots").await.unwrap(), 1);
        assert_eq!(first.row_hash, second.row_hash);
        assert_eq!(second.first_seen_ts, at(0));
        assert_eq!(second.last_seen_ts, at(60));
        assert!(second.last_seen_ts > first.last_seen_ts);
    }

    #[tokio::test]
    async fn changed_snapshot_overwrites_in_place() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_snapshots(&[snapshot_row(18.0)], "a", at(0)).await.unwrap();
        let before = store.snapshot(day(20), "PDI").await.unwrap().unwrap();

        store.upsert_snapshots(&[snapshot_row(19.0)], "a", at(10)).await.unwrap();
        let after = store.snapshot(day(20), "PDI").await.unwrap().unwrap();

        assert_eq!(store.count("snapshots").await.unwrap(), 1);
        assert_ne!(before.row_hash, after.row_hash);
        assert_eq!(after.price_close, Some(19.0));
        assert!((after.premium_discount_pct.unwrap() + 5.0).abs() < 1e-9);
        assert_eq!(after.first_seen_ts, at(0));
    }

    #[tokio::test]
    async fn fetch_snapshot_pd_handles_missing_rows_and_nulls() {
        let store = Store::in_memory().await.unwrap();
        let null_pd = StandardizedRow::new(day(21), "PDI", Some(18.0), None, None);
        store
            .upsert_snapshots(&[snapshot_row(22.0), null_pd], "a", at(0))
            .await
            .unwrap();

        let pd = store.fetch_snapshot_pd(day(20), "PDI").await.unwrap().unwrap();
        assert!((pd - 10.0).abs() < 1e-9);
        assert!(store.fetch_snapshot_pd(day(21), "PDI").await.unwrap().is_none());
        assert!(store.fetch_snapshot_pd(day(22), "PDI").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn candidates_come_back_in_rank_order() {
        let store = Store::in_memory().await.unwrap();
        let cfg = test_signal_config();
        let ctx = StageContext::new("test", "test");
        let scored = ["AAA", "BBB", "CCC"]
            .iter()
            .zip([90.0, 70.0, 80.0])
            .map(|(sym, price)| {
                let row = StandardizedRow::new(day(20), *sym, Some(price), Some(100.0), Some(100_000.0));
                score_row(row, &[], &cfg, &ctx)
            })
            .collect();
        let ranked = rank_candidates(scored);

        store.upsert_candidates(&ranked, "gold/c.ndjson", at(0)).await.unwrap();
        store.upsert_candidates(&ranked, "gold/c.ndjson", at(1)).await.unwrap();

        let stored = store.candidates_for_date(day(20)).await.unwrap();
        let symbols: Vec<&str> = stored.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BBB", "CCC", "AAA"]);
        assert_eq!(stored[0].rank, 1);
        assert!(stored[0].risk_flags_json.contains("half_life_unavailable"));
        assert_eq!(store.count("candidates").await.unwrap(), 3);

        let top = store.top_candidates(day(20), 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(store.candidate_scan_dates().await.unwrap(), vec![day(20)]);
        assert!(store.candidates_for_date(day(19)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rescan_replaces_candidate_set_for_date() {
        let store = Store::in_memory().await.unwrap();
        let cfg = test_signal_config();
        let ctx = StageContext::new("test", "test");
        let rank = |rows: &[(&str, f64)], date: NaiveDate| {
            rank_candidates(
                rows.iter()
                    .map(|(sym, price)| {
                        let row = StandardizedRow::new(date, *sym, Some(*price), Some(100.0), Some(100_000.0));
                        score_row(row, &[], &cfg, &ctx)
                    })
                    .collect(),
            )
        };

        store
            .upsert_candidates(&rank(&[("AAA", 70.0), ("BBB", 80.0)], day(20)), "gold/a", at(0))
            .await
            .unwrap();
        store
            .upsert_candidates(&rank(&[("ZZZ", 75.0)], day(21)), "gold/b", at(0))
            .await
            .unwrap();
        store
            .upsert_candidates(&rank(&[("CCC", 85.0), ("AAA", 70.0)], day(20)), "gold/a", at(5))
            .await
            .unwrap();

        let stored = store.candidates_for_date(day(20)).await.unwrap();
        let ranks: Vec<(&str, i64)> = stored.iter().map(|c| (c.symbol.as_str(), c.rank)).collect();
        assert_eq!(ranks, vec![("AAA", 1), ("CCC", 2)]);
        // AAA kept its key, so first_seen survives.
        assert_eq!(stored[0].first_seen_ts, at(0));

        let top: Vec<String> = store
            .top_candidates(day(20), 1)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.symbol)
            .collect();
        assert_eq!(top, vec!["AAA".to_string()]);
        // Other scan dates are untouched.
        assert_eq!(store.candidates_for_date(day(21)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_row_rolls_back_whole_batch() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_snapshots(&[snapshot_row(18.0)], "a", at(0)).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON snapshots WHEN NEW.symbol = 'BAD' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let batch = vec![
            snapshot_row(19.0),
            StandardizedRow::new(day(20), "UTG", Some(30.0), Some(31.0), Some(1_000.0)),
            StandardizedRow::new(day(20), "BAD", Some(10.0), Some(11.0), Some(1_000.0)),
        ];
        let result = store.upsert_snapshots(&batch, "b", at(60)).await;
        assert!(result.is_err());

        assert_eq!(store.count("snapshots").await.unwrap(), 1);
        assert!(store.snapshot(day(20), "UTG").await.unwrap().is_none());
        let pdi = store.snapshot(day(20), "PDI").await.unwrap().unwrap();
        assert_eq!(pdi.price_close, Some(18.0));
        assert_eq!(pdi.last_seen_ts, at(0));
    }

    #[tokio::test]
    async fn runs_get_increasing_ids() {
        let store = Store::in_memory().await.unwrap();
        let a = store.record_run("track", "horizons=[1]", at(0)).await.unwrap();
        let b = store.record_run("track", "horizons=[1]", at(0) + Duration::seconds(1)).await.unwrap();
        assert!(b > a);
    }
}

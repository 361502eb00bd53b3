use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

use crate::config::{
    Config, SignalConfig, ALL_DATES_FILE, CANDIDATES_FILE, SCORED_UNIVERSE_FILE, SNAPSHOT_FILE,
    SUMMARY_FILE,
};
use crate::context::StageContext;
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::ndjson::{discover_partition_dates, partition_dir, read_ndjson, write_json, write_ndjson};
use crate::scorer::{score_row, select_and_rank};
use crate::standardize::{apply_rolling_stats, pd_history_by_symbol};
use crate::tracking::{compute_and_store_outcomes, query_reverted_by_date};
use crate::types::{Candidate, OutcomeCounts, ReversionSummary, ScanSummary, ScoredRow, StandardizedRow};

/// Standardized rows for one date and the file they were read from.
#[derive(Debug, Clone)]
pub struct SilverBatch {
    pub date: NaiveDate,
    pub path: PathBuf,
    pub rows: Vec<StandardizedRow>,
}

#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub scored: Vec<ScoredRow>,
    pub candidates: Vec<Candidate>,
    pub summary: ScanSummary,
}

// ---------------------------------------------------------------------------
// Silver input
// ---------------------------------------------------------------------------

/// Load standardized rows grouped by date.
///
/// Per-date `date=YYYY-MM-DD/snapshot.ndjson` partitions win; without any,
/// the combined history file at the root is split by date. Derived fields are
/// recomputed on load.
pub fn load_silver_batches(root: &Path, ctx: &StageContext) -> Result<Vec<SilverBatch>> {
    let mut batches = Vec::new();
    for date in discover_partition_dates(root)? {
        let path = partition_dir(root, date).join(SNAPSHOT_FILE);
        let mut rows: Vec<StandardizedRow> = read_ndjson(&path)?;
        let before = rows.len();
        rows.retain(|r| r.date == date);
        if rows.len() != before {
            ctx.warn(
                &format!("{} rows outside partition {date} dropped", before - rows.len()),
                "partition_date_mismatch",
            );
        }
        if rows.is_empty() {
            continue;
        }
        rows.iter_mut().for_each(StandardizedRow::recompute_derived);
        batches.push(SilverBatch { date, path, rows });
    }
    if !batches.is_empty() {
        return Ok(batches);
    }

    let path = root.join(ALL_DATES_FILE);
    let mut by_date: BTreeMap<NaiveDate, Vec<StandardizedRow>> = BTreeMap::new();
    for mut row in read_ndjson::<StandardizedRow>(&path)? {
        row.recompute_derived();
        by_date.entry(row.date).or_default().push(row);
    }
    Ok(by_date
        .into_iter()
        .map(|(date, rows)| SilverBatch {
            date,
            path: path.clone(),
            rows,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Candidate building
// ---------------------------------------------------------------------------

/// Score every row of `scan_date` against history up to and including that date,
/// then rank the rows that pass all gates.
pub fn build_candidates(
    history: Vec<StandardizedRow>,
    scan_date: NaiveDate,
    cfg: &SignalConfig,
    ctx: &StageContext,
) -> ScanOutput {
    let mut rows: Vec<StandardizedRow> = history
        .into_iter()
        .filter(|r| r.date <= scan_date)
        .collect();
    rows.iter_mut().for_each(StandardizedRow::recompute_derived);
    apply_rolling_stats(&mut rows, cfg.zscore_window);

    let pd_history = pd_history_by_symbol(&rows);
    let scored: Vec<ScoredRow> = rows
        .into_iter()
        .filter(|r| r.date == scan_date)
        .map(|row| {
            let series = pd_history.get(&row.symbol).map(Vec::as_slice).unwrap_or(&[]);
            score_row(row, series, cfg, ctx)
        })
        .collect();

    let candidates = select_and_rank(&scored);
    let summary = ScanSummary {
        date: scan_date,
        universe_count: scored.len(),
        candidate_count: candidates.len(),
        extreme_count: scored.iter().filter(|s| s.extreme_triggered).count(),
        liquidity_pass_count: scored.iter().filter(|s| s.liquidity_pass).count(),
        event_block_count: scored.iter().filter(|s| !s.event_pass).count(),
        half_life_available_count: scored.iter().filter(|s| s.half_life_days.is_some()).count(),
    };

    ScanOutput {
        scored,
        candidates,
        summary,
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

pub fn run_scan(cfg: &Config) -> Result<ScanSummary> {
    let signals = SignalConfig::from_file(&cfg.signals_config)?;
    let ctx = StageContext::new("scan", cfg.silver_root.display().to_string());

    let history: Vec<StandardizedRow> = load_silver_batches(&cfg.silver_root, &ctx)?
        .into_iter()
        .flat_map(|b| b.rows)
        .collect();
    let scan_date = match cfg.scan_date {
        Some(d) => d,
        None => history
            .iter()
            .map(|r| r.date)
            .max()
            .ok_or_else(|| AppError::Input(format!("no silver rows under {}", cfg.silver_root.display())))?,
    };

    let output = build_candidates(history, scan_date, &signals, &ctx);
    if output.summary.universe_count == 0 {
        ctx.warn(&format!("no rows for {scan_date}"), "empty_universe");
    }

    let out_dir = partition_dir(&cfg.signals_root, scan_date);
    write_ndjson(&out_dir.join(SCORED_UNIVERSE_FILE), &output.scored)?;
    write_ndjson(&out_dir.join(CANDIDATES_FILE), &output.candidates)?;
    write_json(&out_dir.join(SUMMARY_FILE), &output.summary)?;

    let s = &output.summary;
    ctx.info(
        &format!(
            "scan_date={} universe={} extreme={} liquidity_pass={} event_blocked={} candidates={}",
            s.date, s.universe_count, s.extreme_count, s.liquidity_pass_count, s.event_block_count, s.candidate_count
        ),
        "scan_complete",
    );
    Ok(output.summary)
}

pub async fn run_track(cfg: &Config) -> Result<OutcomeCounts> {
    let store = Store::connect(&cfg.db_path).await?;
    let now = Utc::now();
    let horizons = cfg
        .horizons
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let run_id = store.record_run("track", &format!("horizons={horizons}"), now).await?;

    let ingest = StageContext::new("ingest", cfg.silver_root.display().to_string());
    let mut snapshot_count = 0;
    for batch in load_silver_batches(&cfg.silver_root, &ingest)? {
        ingest.debug(&format!("date={} rows={}", batch.date, batch.rows.len()), "snapshot_batch");
        snapshot_count += store
            .upsert_snapshots(&batch.rows, &batch.path.display().to_string(), now)
            .await?;
    }
    ingest.info(&format!("run_id={run_id} snapshots={snapshot_count}"), "snapshots_upserted");

    let selected: BTreeSet<NaiveDate> = if cfg.scan_dates.is_empty() {
        discover_partition_dates(&cfg.signals_root)?.into_iter().collect()
    } else {
        cfg.scan_dates.iter().copied().collect()
    };

    let candidates_ctx = StageContext::new("ingest", cfg.signals_root.display().to_string());
    for &scan_date in &selected {
        let path = partition_dir(&cfg.signals_root, scan_date).join(CANDIDATES_FILE);
        let candidates: Vec<Candidate> = read_ndjson(&path)?;
        if candidates.is_empty() {
            candidates_ctx.debug(&format!("no candidates file for {scan_date}"), "candidates_missing");
            continue;
        }
        if let Some(stray) = candidates.iter().find(|c| c.scored.row.date != scan_date) {
            return Err(AppError::Input(format!(
                "{}: candidate {} dated {} in partition {scan_date}",
                path.display(),
                stray.scored.row.symbol,
                stray.scored.row.date
            )));
        }
        store
            .upsert_candidates(&candidates, &path.display().to_string(), now)
            .await?;
    }

    let track = StageContext::new("track", cfg.db_path.display().to_string());
    let mut totals = OutcomeCounts::default();
    for scan_date in store.candidate_scan_dates().await? {
        if !cfg.scan_dates.is_empty() && !selected.contains(&scan_date) {
            continue;
        }
        let candidates = store.candidates_for_date(scan_date).await?;
        let counts =
            compute_and_store_outcomes(&store, scan_date, &candidates, &cfg.horizons, now, &track).await?;
        totals.merge(counts);
    }

    track.info(
        &format!(
            "run_id={run_id} ok={} missing_scan_pd={} zero_scan_pd={} missing_followup_data={}",
            totals.ok, totals.missing_scan_pd, totals.zero_scan_pd, totals.missing_followup_data
        ),
        "track_complete",
    );
    Ok(totals)
}

pub async fn run_query(cfg: &Config) -> Result<ReversionSummary> {
    let scan_date = cfg
        .scan_date
        .ok_or_else(|| AppError::Config("SCAN_DATE is required for query".to_string()))?;
    let as_of = cfg
        .as_of_date
        .ok_or_else(|| AppError::Config("AS_OF_DATE is required for query".to_string()))?;

    let store = Store::connect(&cfg.db_path).await?;
    let summary = query_reverted_by_date(&store, scan_date, cfg.top_n, as_of).await?;
    StageContext::new("query", cfg.db_path.display().to_string()).info(
        &format!(
            "scan_date={scan_date} as_of={as_of} top_n={} reverted={}/{}",
            cfg.top_n, summary.reverted_count, summary.with_followup_count
        ),
        "query_complete",
    );
    Ok(summary)
}

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::context::StageContext;
use crate::db::{CandidateRecord, Store};
use crate::error::{AppError, Result};
use crate::types::{OutcomeCounts, OutcomeRecord, OutcomeStatus};

/// Follow-up date for a horizon in calendar days.
pub fn target_date(scan_date: NaiveDate, horizon_days: i64) -> Result<NaiveDate> {
    scan_date
        .checked_add_signed(Duration::days(horizon_days))
        .ok_or_else(|| AppError::Input(format!("horizon {horizon_days}d overflows from {scan_date}")))
}

/// Classify one (candidate, horizon) pair.
///
/// `pd_target` is the target-date snapshot's premium/discount, None when that
/// snapshot is absent or carries no numeric value.
pub fn evaluate_outcome(
    scan_date: NaiveDate,
    symbol: &str,
    horizon_days: i64,
    target_date: NaiveDate,
    pd_scan: Option<f64>,
    pd_target: Option<f64>,
    computed_at: DateTime<Utc>,
) -> OutcomeRecord {
    let mut record = OutcomeRecord {
        scan_date,
        symbol: symbol.to_string(),
        horizon_days,
        target_date,
        pd_scan,
        pd_target: None,
        abs_pd_change: None,
        reverted: None,
        status: OutcomeStatus::MissingFollowupData,
        reason: String::new(),
        source_snapshot_date: Some(target_date),
        computed_at,
    };

    let scan = match pd_scan {
        None => {
            record.status = OutcomeStatus::MissingScanPd;
            record.reason = "scan_pd_missing".to_string();
            return record;
        }
        Some(pd) if pd == 0.0 => {
            record.status = OutcomeStatus::ZeroScanPd;
            record.reason = "cannot_assess_reversion_from_zero".to_string();
            return record;
        }
        Some(pd) => pd,
    };

    let Some(target) = pd_target else {
        record.reason = "snapshot_not_found".to_string();
        return record;
    };

    let reverted = target.abs() < scan.abs();
    record.pd_target = Some(target);
    record.abs_pd_change = Some(scan.abs() - target.abs());
    record.reverted = Some(reverted);
    record.status = OutcomeStatus::Ok;
    record.reason = if reverted { "reverted" } else { "not_reverted" }.to_string();
    record
}

/// Evaluate every horizon for every candidate of one scan date and upsert the
/// results in a single batch. Every outcome is stored, whatever its status.
pub async fn compute_and_store_outcomes(
    store: &Store,
    scan_date: NaiveDate,
    candidates: &[CandidateRecord],
    horizons: &[i64],
    now: DateTime<Utc>,
    ctx: &StageContext,
) -> Result<OutcomeCounts> {
    let mut counts = OutcomeCounts::default();
    let mut records = Vec::with_capacity(candidates.len() * horizons.len());

    // Lookups run before the upsert transaction opens: the pool holds one connection.
    for candidate in candidates {
        let pd_scan = candidate.premium_discount_pct_at_scan;
        let scan_valid = matches!(pd_scan, Some(pd) if pd != 0.0);

        for &horizon in horizons {
            let target = target_date(scan_date, horizon)?;
            let pd_target = if scan_valid {
                store.fetch_snapshot_pd(target, &candidate.symbol).await?
            } else {
                None
            };

            let record = evaluate_outcome(
                scan_date,
                &candidate.symbol,
                horizon,
                target,
                pd_scan,
                pd_target,
                now,
            );
            if record.status != OutcomeStatus::Ok {
                ctx.for_symbol(&candidate.symbol)
                    .debug(&format!("outcome h={horizon}d target={target}"), &record.reason);
            }
            counts.record(record.status);
            records.push(record);
        }
    }

    store.upsert_outcomes(&records, now).await?;
    ctx.info(
        &format!(
            "scan_date={scan_date} outcomes={} ok={} missing_followup={}",
            records.len(),
            counts.ok,
            counts.missing_followup_data
        ),
        "outcomes_stored",
    );
    Ok(counts)
}

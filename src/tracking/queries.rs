use chrono::NaiveDate;

use crate::db::Store;
use crate::error::Result;
use crate::types::ReversionSummary;

/// How many of the top-N candidates of `scan_date` had reverted by `as_of`.
///
/// Only `ok` outcomes with `target_date <= as_of` count. A candidate is
/// reverted when any such outcome reverted, at any horizon.
pub async fn query_reverted_by_date(
    store: &Store,
    scan_date: NaiveDate,
    top_n: usize,
    as_of: NaiveDate,
) -> Result<ReversionSummary> {
    let limit = i64::try_from(top_n).unwrap_or(i64::MAX);
    let candidates = store.top_candidates(scan_date, limit).await?;

    let mut summary = ReversionSummary {
        scan_date,
        as_of_date: as_of,
        top_n,
        candidate_count: candidates.len(),
        reverted_count: 0,
        with_followup_count: 0,
        missing_followup_count: 0,
    };

    for candidate in &candidates {
        let known: Vec<_> = store
            .outcomes_until(scan_date, &candidate.symbol, as_of)
            .await?
            .into_iter()
            .filter(|o| o.is_ok())
            .collect();

        if known.is_empty() {
            summary.missing_followup_count += 1;
            continue;
        }
        summary.with_followup_count += 1;
        if known.iter().any(|o| o.reverted()) {
            summary.reverted_count += 1;
        }
    }

    Ok(summary)
}

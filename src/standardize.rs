use std::collections::BTreeMap;

use crate::stats::rolling_zscore;
use crate::types::StandardizedRow;

pub fn compute_premium_discount_pct(price_close: Option<f64>, nav: Option<f64>) -> Option<f64> {
    let (price, nav) = (price_close?, nav?);
    if nav <= 0.0 {
        return None;
    }
    Some((price / nav - 1.0) * 100.0)
}

pub fn compute_dollar_volume(price_close: Option<f64>, volume: Option<f64>) -> Option<f64> {
    Some(price_close? * volume?)
}

/// Quality flag for a row whose rolling z-score could not be computed.
pub fn insufficient_history_flag(window: usize) -> String {
    format!("insufficient_history_{window}d")
}

pub fn build_data_quality_flags(row: &StandardizedRow, window: usize) -> Vec<String> {
    let mut flags = Vec::new();
    if row.price_close.is_none() {
        flags.push("missing_price".to_string());
    }
    if row.volume.is_none() {
        flags.push("missing_volume".to_string());
    }
    match row.nav {
        None => flags.push("missing_nav".to_string()),
        Some(nav) if nav <= 0.0 => flags.push("invalid_nav".to_string()),
        Some(_) => {}
    }
    if row.premium_discount_pct.is_none() {
        flags.push("missing_premium_discount".to_string());
    }
    if row.dollar_volume.is_none() {
        flags.push("missing_dollar_volume".to_string());
    }
    if row.pd_zscore.is_none() {
        flags.push(insufficient_history_flag(window));
    }
    if row.nav_staleness_flag {
        flags.push("nav_stale".to_string());
    }
    flags
}

/// Fill the rolling premium/discount z-score for every row, per symbol in date
/// order, then rebuild each row's data-quality flags.
///
/// Rows are sorted in place by (symbol, date).
pub fn apply_rolling_stats(rows: &mut [StandardizedRow], window: usize) {
    rows.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.date.cmp(&b.date)));

    let mut start = 0;
    while start < rows.len() {
        let end = start
            + rows[start..]
                .iter()
                .take_while(|r| r.symbol == rows[start].symbol)
                .count();
        let group = &mut rows[start..end];
        let values: Vec<Option<f64>> = group.iter().map(|r| r.premium_discount_pct).collect();
        for (row, z) in group.iter_mut().zip(rolling_zscore(&values, window)) {
            row.pd_zscore = z;
            row.zscore_window_used = Some(window);
        }
        start = end;
    }

    for row in rows.iter_mut() {
        row.data_quality_flags = build_data_quality_flags(row, window);
    }
}

/// Premium/discount history per symbol, ordered by date.
pub fn pd_history_by_symbol(rows: &[StandardizedRow]) -> BTreeMap<String, Vec<Option<f64>>> {
    let mut dated: BTreeMap<&str, Vec<(chrono::NaiveDate, Option<f64>)>> = BTreeMap::new();
    for row in rows {
        dated
            .entry(row.symbol.as_str())
            .or_default()
            .push((row.date, row.premium_discount_pct));
    }
    dated
        .into_iter()
        .map(|(symbol, mut points)| {
            points.sort_by_key(|(date, _)| *date);
            (symbol.to_string(), points.into_iter().map(|(_, pd)| pd).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn premium_discount_formula() {
        assert!((compute_premium_discount_pct(Some(110.0), Some(100.0)).unwrap() - 10.0).abs() < 1e-9);
        assert!((compute_premium_discount_pct(Some(90.0), Some(100.0)).unwrap() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn premium_discount_needs_positive_nav() {
        assert!(compute_premium_discount_pct(Some(100.0), Some(0.0)).is_none());
        assert!(compute_premium_discount_pct(Some(100.0), Some(-5.0)).is_none());
        assert!(compute_premium_discount_pct(None, Some(100.0)).is_none());
        assert!(compute_premium_discount_pct(Some(100.0), None).is_none());
    }

    #[test]
    fn dollar_volume_formula() {
        assert!((compute_dollar_volume(Some(10.5), Some(1000.0)).unwrap() - 10_500.0).abs() < 1e-9);
        assert!(compute_dollar_volume(None, Some(1000.0)).is_none());
        assert!(compute_dollar_volume(Some(10.5), None).is_none());
    }

    #[test]
    fn row_constructor_derives_fields() {
        let row = StandardizedRow::new(day(2), "PDI", Some(18.0), Some(-1.0), Some(100.0));
        assert!(row.premium_discount_pct.is_none());
        assert_eq!(row.dollar_volume, Some(1800.0));
    }

    #[test]
    fn quality_flags_cover_missing_inputs() {
        let mut row = StandardizedRow::new(day(2), "PDI", None, Some(0.0), None);
        row.nav_staleness_flag = true;
        let flags = build_data_quality_flags(&row, 20);
        for expected in [
            "missing_price",
            "missing_volume",
            "invalid_nav",
            "missing_premium_discount",
            "missing_dollar_volume",
            "insufficient_history_20d",
            "nav_stale",
        ] {
            assert!(flags.iter().any(|f| f == expected), "missing {expected} in {flags:?}");
        }
    }

    #[test]
    fn rolling_stats_are_per_symbol() {
        let mut rows = Vec::new();
        // Interleave two symbols and shuffle dates to check grouping and ordering.
        for d in [3, 1, 2] {
            rows.push(StandardizedRow::new(day(d), "BBB", Some(100.0 + d as f64), Some(100.0), Some(1.0)));
            rows.push(StandardizedRow::new(day(d), "AAA", Some(100.0), Some(100.0), Some(1.0)));
        }
        apply_rolling_stats(&mut rows, 3);

        let aaa: Vec<_> = rows.iter().filter(|r| r.symbol == "AAA").collect();
        let bbb: Vec<_> = rows.iter().filter(|r| r.symbol == "BBB").collect();
        // AAA is flat at 0% -> zero std -> undefined.
        assert!(aaa.iter().all(|r| r.pd_zscore.is_none()));
        assert!(aaa.iter().all(|r| r.data_quality_flags.contains(&"insufficient_history_3d".to_string())));
        // BBB rises 1%, 2%, 3%; only the third date has a full window.
        assert_eq!(bbb[2].date, day(3));
        assert!(bbb[0].pd_zscore.is_none());
        assert!(bbb[2].pd_zscore.unwrap() > 0.0);
        assert_eq!(bbb[2].zscore_window_used, Some(3));
    }

    #[test]
    fn history_is_date_ordered() {
        let rows = vec![
            StandardizedRow::new(day(2), "AAA", Some(102.0), Some(100.0), None),
            StandardizedRow::new(day(1), "AAA", Some(101.0), Some(100.0), None),
        ];
        let history = pd_history_by_symbol(&rows);
        let series = &history["AAA"];
        assert!((series[0].unwrap() - 1.0).abs() < 1e-9);
        assert!((series[1].unwrap() - 2.0).abs() < 1e-9);
    }
}

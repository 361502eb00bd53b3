use crate::config::{EventDataStatus, EventFilterConfig, LiquidityConfig};
use crate::standardize::insufficient_history_flag;
use crate::types::{RiskFlag, StandardizedRow};

/// Pass/fail verdict of a single gate with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub pass: bool,
    pub reason: String,
}

impl GateResult {
    fn pass() -> Self {
        Self {
            pass: true,
            reason: "ok".to_string(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            pass: false,
            reason: reason.into(),
        }
    }
}

pub fn liquidity_filter(row: &StandardizedRow, cfg: &LiquidityConfig) -> GateResult {
    let threshold = cfg.min_dollar_volume;
    match row.dollar_volume {
        None => GateResult::fail("missing_dollar_volume"),
        Some(dv) if dv < threshold => GateResult::fail(format!(
            "dollar_volume_below_threshold({dv:.2}<{threshold:.2})"
        )),
        Some(_) => GateResult::pass(),
    }
}

pub fn event_filter(row: &StandardizedRow, cfg: &EventFilterConfig) -> GateResult {
    if cfg.exclude_distribution_events && row.distribution_event_flag {
        return GateResult::fail("distribution_event_excluded");
    }
    GateResult::pass()
}

/// Risk flags attached to a scored row. `half_life_found` reports whether the
/// estimator produced a half-life for the row's symbol.
pub fn build_risk_flags(
    row: &StandardizedRow,
    half_life_found: bool,
    zscore_window: usize,
    event_data_status: EventDataStatus,
) -> Vec<RiskFlag> {
    let mut flags = Vec::new();
    if row.nav_staleness_flag {
        flags.push(RiskFlag::NavStale);
    }
    if !half_life_found {
        flags.push(RiskFlag::HalfLifeUnavailable);
    }
    let history_flag = insufficient_history_flag(zscore_window);
    if row.data_quality_flags.iter().any(|f| *f == history_flag) {
        flags.push(RiskFlag::InsufficientHistory);
    }
    if event_data_status != EventDataStatus::Full {
        flags.push(RiskFlag::EventDataPartial);
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(dollar_volume_shares: Option<f64>) -> StandardizedRow {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        StandardizedRow::new(date, "PDI", Some(10.0), Some(11.0), dollar_volume_shares)
    }

    fn liq() -> LiquidityConfig {
        LiquidityConfig {
            min_dollar_volume: 1_000.0,
            reference_dollar_volume: 10_000.0,
        }
    }

    #[test]
    fn liquidity_missing_volume_fails() {
        let res = liquidity_filter(&row(None), &liq());
        assert!(!res.pass);
        assert_eq!(res.reason, "missing_dollar_volume");
    }

    #[test]
    fn liquidity_below_threshold_reports_values() {
        let res = liquidity_filter(&row(Some(50.0)), &liq());
        assert!(!res.pass);
        assert_eq!(res.reason, "dollar_volume_below_threshold(500.00<1000.00)");
    }

    #[test]
    fn liquidity_at_threshold_passes() {
        let res = liquidity_filter(&row(Some(100.0)), &liq());
        assert!(res.pass);
        assert_eq!(res.reason, "ok");
    }

    #[test]
    fn event_filter_respects_config() {
        let mut r = row(Some(100.0));
        r.distribution_event_flag = true;

        let mut cfg = EventFilterConfig {
            exclude_distribution_events: true,
            event_data_status: EventDataStatus::Full,
        };
        let res = event_filter(&r, &cfg);
        assert!(!res.pass);
        assert_eq!(res.reason, "distribution_event_excluded");

        cfg.exclude_distribution_events = false;
        assert!(event_filter(&r, &cfg).pass);

        r.distribution_event_flag = false;
        cfg.exclude_distribution_events = true;
        assert!(event_filter(&r, &cfg).pass);
    }

    #[test]
    fn risk_flags_collect_each_condition() {
        let mut r = row(Some(100.0));
        r.nav_staleness_flag = true;
        r.data_quality_flags = vec!["insufficient_history_20d".to_string()];
        let flags = build_risk_flags(&r, false, 20, EventDataStatus::Partial);
        assert_eq!(
            flags,
            vec![
                RiskFlag::NavStale,
                RiskFlag::HalfLifeUnavailable,
                RiskFlag::InsufficientHistory,
                RiskFlag::EventDataPartial,
            ]
        );

        let clean = build_risk_flags(&row(Some(100.0)), true, 20, EventDataStatus::Full);
        assert!(clean.is_empty());
    }
}

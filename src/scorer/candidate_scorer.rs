use crate::config::{SignalConfig, LIQUIDITY_COMPONENT_CAP};
use crate::context::StageContext;
use crate::detector::{build_risk_flags, detect_extreme, event_filter, liquidity_filter};
use crate::stats::estimate_half_life_days;
use crate::types::{HalfLifeEstimate, RiskFlag, ScoreBreakdown, ScoredRow, StandardizedRow};

/// Inputs to the composite score for one row.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    pub extreme_component: f64,
    pub dollar_volume: Option<f64>,
    pub half_life_days: Option<f64>,
    pub nav_stale: bool,
    pub risk_flags: &'a [RiskFlag],
}

/// Composite ranking score (higher = stronger candidate). Not clamped.
/// Factors: extremeness, capped liquidity, reversion speed, minus penalties.
pub fn compute_score(inputs: &ScoreInputs<'_>, cfg: &SignalConfig) -> ScoreBreakdown {
    let weights = &cfg.score;
    let reference_dv = cfg.liquidity.reference_dollar_volume;

    let liquidity_component = match inputs.dollar_volume {
        Some(dv) if reference_dv > 0.0 => (dv / reference_dv).min(LIQUIDITY_COMPONENT_CAP),
        _ => 0.0,
    };

    let half_life_component = match inputs.half_life_days {
        Some(hl) if hl > 0.0 => 1.0 / (1.0 + hl),
        _ => 0.0,
    };

    let mut penalty = 0.0;
    if inputs.nav_stale {
        penalty += weights.penalty_nav_stale;
    }
    if inputs.half_life_days.is_none() {
        penalty += weights.penalty_half_life_unavailable;
    }
    if inputs.risk_flags.contains(&RiskFlag::EventDataPartial) {
        penalty += weights.penalty_event_data_partial;
    }

    let score = weights.weight_extreme * inputs.extreme_component
        + weights.weight_liquidity * liquidity_component
        + weights.weight_half_life * half_life_component
        - penalty;

    ScoreBreakdown {
        score,
        score_extreme_component: inputs.extreme_component,
        score_liquidity_component: liquidity_component,
        score_half_life_component: half_life_component,
        score_penalty: penalty,
    }
}

/// Run every gate and the scorer over one row. `pd_history` is the symbol's
/// premium/discount series up to and including the row's date.
pub fn score_row(
    row: StandardizedRow,
    pd_history: &[Option<f64>],
    cfg: &SignalConfig,
    ctx: &StageContext,
) -> ScoredRow {
    let half_life = estimate_half_life_days(
        pd_history,
        cfg.half_life.min_points,
        cfg.half_life.max_half_life_days,
    );
    if half_life.half_life_days.is_none() {
        ctx.for_symbol(&row.symbol)
            .debug("half_life_unavailable", &half_life.reason.to_string());
    }

    let extreme = detect_extreme(&row, &cfg.extreme);
    let liquidity = liquidity_filter(&row, &cfg.liquidity);
    let event = event_filter(&row, &cfg.event_filter);
    let risk_flags = build_risk_flags(
        &row,
        half_life.half_life_days.is_some(),
        cfg.zscore_window,
        cfg.event_filter.event_data_status,
    );

    let score = compute_score(
        &ScoreInputs {
            extreme_component: extreme.component,
            dollar_volume: row.dollar_volume,
            half_life_days: half_life.half_life_days,
            nav_stale: row.nav_staleness_flag,
            risk_flags: &risk_flags,
        },
        cfg,
    );

    let rationale = build_rationale(extreme.triggered, &extreme.reason, liquidity.pass, &half_life);

    ScoredRow {
        row,
        half_life_days: half_life.half_life_days,
        half_life_reason: half_life.reason,
        extreme_triggered: extreme.triggered,
        extreme_reason: extreme.reason,
        liquidity_pass: liquidity.pass,
        liquidity_reason: liquidity.reason,
        event_pass: event.pass,
        event_reason: event.reason,
        risk_flags,
        score,
        rationale,
    }
}

fn build_rationale(
    extreme_triggered: bool,
    extreme_reason: &str,
    liquidity_pass: bool,
    half_life: &HalfLifeEstimate,
) -> String {
    let mut bits = Vec::with_capacity(3);
    if extreme_triggered {
        bits.push(format!("extreme:{extreme_reason}"));
    }
    if liquidity_pass {
        bits.push("liquidity:pass".to_string());
    }
    match half_life.half_life_days {
        Some(hl) => bits.push(format!("half_life:{hl:.2}d")),
        None => bits.push(format!("half_life:{}", half_life.reason)),
    }
    bits.join("; ")
}

//! Mean-reversion half-life from a single-lag AR(1) fit.
//!
//! Regress the one-step change on the prior level:
//! `x[i] - x[i-1] = alpha + beta * x[i-1] + e`, then `half_life = -ln(2) / beta`.
//! This is the discrete Ornstein-Uhlenbeck half-life in sampling steps (days).

use crate::types::{HalfLifeEstimate, HalfLifeReason};

pub fn estimate_half_life_days(
    series: &[Option<f64>],
    min_points: usize,
    max_half_life_days: f64,
) -> HalfLifeEstimate {
    let clean: Vec<f64> = series.iter().flatten().copied().collect();
    if clean.len() < min_points {
        return HalfLifeEstimate::unavailable(HalfLifeReason::InsufficientHistory);
    }

    let x = &clean[..clean.len().saturating_sub(1)];
    let y: Vec<f64> = clean.windows(2).map(|w| w[1] - w[0]).collect();
    let n = x.len();
    if n < min_points.saturating_sub(1).max(3) {
        return HalfLifeEstimate::unavailable(HalfLifeReason::InsufficientRegressionPoints);
    }

    if x.iter().all(|v| *v == x[0]) {
        return HalfLifeEstimate::unavailable(HalfLifeReason::ZeroVariance);
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let var_x: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    if var_x == 0.0 {
        return HalfLifeEstimate::unavailable(HalfLifeReason::ZeroVariance);
    }

    let cov_xy: f64 = x
        .iter()
        .zip(&y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();
    let beta = cov_xy / var_x;

    if !beta.is_finite() {
        return HalfLifeEstimate::unavailable(HalfLifeReason::InvalidBeta);
    }
    if beta >= 0.0 {
        return HalfLifeEstimate::unavailable(HalfLifeReason::NonMeanRevertingBeta);
    }

    let half_life = -std::f64::consts::LN_2 / beta;
    if !half_life.is_finite() || half_life <= 0.0 {
        return HalfLifeEstimate::unavailable(HalfLifeReason::InvalidHalfLife);
    }
    if half_life > max_half_life_days {
        return HalfLifeEstimate::unavailable(HalfLifeReason::HalfLifeTooLong);
    }

    HalfLifeEstimate::found(half_life)
}

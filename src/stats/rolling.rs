/// Backward-looking rolling z-score.
///
/// Output `i` is defined only when the `window` values ending at `i` are all
/// present; mean and population variance use exactly those values. A window
/// with zero standard deviation yields `None`.
pub fn rolling_zscore(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| zscore_at(values, i, window))
        .collect()
}

fn zscore_at(values: &[Option<f64>], i: usize, window: usize) -> Option<f64> {
    if window == 0 || i + 1 < window {
        return None;
    }
    let current = values[i]?;
    let chunk = values[i + 1 - window..=i]
        .iter()
        .copied()
        .collect::<Option<Vec<f64>>>()?;
    // Rounding in the mean leaves a tiny positive variance on flat windows.
    if chunk.iter().all(|v| *v == chunk[0]) {
        return None;
    }

    let n = window as f64;
    let mean = chunk.iter().sum::<f64>() / n;
    let variance = chunk
        .iter()
        .map(|x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return None;
    }
    Some((current - mean) / std_dev)
}

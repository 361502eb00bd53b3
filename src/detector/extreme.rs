use crate::config::ExtremeConfig;
use crate::types::StandardizedRow;

/// Result of the extremeness gate.
///
/// `component` feeds the scorer: the absolute z-score when a z-score was
/// available, otherwise |pd%| divided by the pd threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeSignal {
    pub triggered: bool,
    pub component: f64,
    pub reason: String,
}

pub fn detect_extreme(row: &StandardizedRow, cfg: &ExtremeConfig) -> ExtremeSignal {
    if let Some(z) = row.pd_zscore {
        let abs_z = z.abs();
        return ExtremeSignal {
            triggered: abs_z >= cfg.zscore_threshold,
            component: abs_z,
            reason: format!("zscore={z:.4} threshold={}", cfg.zscore_threshold),
        };
    }

    if let Some(pd) = row.premium_discount_pct {
        let abs_pd = pd.abs();
        return ExtremeSignal {
            triggered: abs_pd >= cfg.abs_pd_threshold,
            component: abs_pd / cfg.abs_pd_threshold,
            reason: format!("abs_pd={abs_pd:.4}% threshold={}%", cfg.abs_pd_threshold),
        };
    }

    ExtremeSignal {
        triggered: false,
        component: 0.0,
        reason: "missing_pd_and_zscore".to_string(),
    }
}

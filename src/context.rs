//! Explicit logging context handed to each pipeline stage.
//!
//! Every event carries `stage`, `source`, `symbol` and `reason` fields so log
//! lines from different stages line up without any global logger state.

use tracing::{debug, info, warn};

const UNSET: &str = "-";

#[derive(Debug, Clone)]
pub struct StageContext {
    stage: &'static str,
    source: String,
    symbol: Option<String>,
}

impl StageContext {
    pub fn new(stage: &'static str, source: impl Into<String>) -> Self {
        Self {
            stage,
            source: source.into(),
            symbol: None,
        }
    }

    /// Same stage and source, scoped to one symbol.
    pub fn for_symbol(&self, symbol: &str) -> Self {
        Self {
            stage: self.stage,
            source: self.source.clone(),
            symbol: Some(symbol.to_string()),
        }
    }

    fn symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or(UNSET)
    }

    pub fn info(&self, msg: &str, reason: &str) {
        info!(
            stage = self.stage,
            source = %self.source,
            symbol = %self.symbol(),
            reason = %reason,
            "{msg}"
        );
    }

    pub fn debug(&self, msg: &str, reason: &str) {
        debug!(
            stage = self.stage,
            source = %self.source,
            symbol = %self.symbol(),
            reason = %reason,
            "{msg}"
        );
    }

    pub fn warn(&self, msg: &str, reason: &str) {
        warn!(
            stage = self.stage,
            source = %self.source,
            symbol = %self.symbol(),
            reason = %reason,
            "{msg}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_scope_keeps_stage_and_source() {
        let ctx = StageContext::new("scan", "silver");
        let scoped = ctx.for_symbol("PDI");
        assert_eq!(scoped.stage, "scan");
        assert_eq!(scoped.symbol(), "PDI");
        assert_eq!(ctx.symbol(), UNSET);
    }
}

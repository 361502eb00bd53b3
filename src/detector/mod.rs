pub mod extreme;
pub mod filters;

pub use extreme::detect_extreme;
pub use filters::{build_risk_flags, event_filter, liquidity_filter};

pub mod half_life;
pub mod rolling;

pub use half_life::estimate_half_life_days;
pub use rolling::rolling_zscore;

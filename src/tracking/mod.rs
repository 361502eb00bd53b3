pub mod outcomes;
pub mod queries;

pub use outcomes::compute_and_store_outcomes;
pub use queries::query_reverted_by_date;

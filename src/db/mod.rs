pub mod hash;
pub mod models;
pub mod store;

pub use models::CandidateRecord;
pub use store::Store;

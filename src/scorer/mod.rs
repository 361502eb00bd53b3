pub mod candidate_scorer;
pub mod ranker;

pub use candidate_scorer::score_row;
pub use ranker::select_and_rank;

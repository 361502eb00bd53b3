use crate::types::{Candidate, ScoredRow};

/// Order gate-passing rows by score (descending) and assign dense ranks 1..=K.
/// Equal scores fall back to symbol order so ranks are reproducible.
pub fn rank_candidates(mut passing: Vec<ScoredRow>) -> Vec<Candidate> {
    passing.sort_by(|a, b| {
        b.score
            .score
            .total_cmp(&a.score.score)
            .then_with(|| a.row.symbol.cmp(&b.row.symbol))
    });

    passing
        .into_iter()
        .enumerate()
        .map(|(i, scored)| Candidate {
            scored,
            rank: i as u32 + 1,
        })
        .collect()
}

/// Keep only rows that passed every gate, then rank them.
pub fn select_and_rank(scored: &[ScoredRow]) -> Vec<Candidate> {
    rank_candidates(scored.iter().filter(|r| r.is_candidate()).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_signal_config;
    use crate::context::StageContext;
    use crate::scorer::score_row;
    use crate::types::StandardizedRow;
    use chrono::NaiveDate;

    fn scored(symbol: &str, price: f64) -> ScoredRow {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let row = StandardizedRow::new(date, symbol, Some(price), Some(100.0), Some(100_000.0));
        score_row(row, &[], &test_signal_config(), &StageContext::new("scan", "test"))
    }

    #[test]
    fn ranks_are_dense_and_score_ordered() {
        let rows = vec![scored("AAA", 90.0), scored("BBB", 70.0), scored("CCC", 80.0)];
        let ranked = rank_candidates(rows);
        let ranks: Vec<u32> = ranked.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        let symbols: Vec<&str> = ranked.iter().map(|c| c.scored.row.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BBB", "CCC", "AAA"]);
        for pair in ranked.windows(2) {
            assert!(pair[0].scored.score.score >= pair[1].scored.score.score);
        }
    }

    #[test]
    fn ties_break_on_symbol() {
        let rows = vec![scored("ZZZ", 85.0), scored("AAA", 85.0), scored("MMM", 85.0)];
        let ranked = rank_candidates(rows);
        let symbols: Vec<&str> = ranked.iter().map(|c| c.scored.row.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "MMM", "ZZZ"]);
    }

    #[test]
    fn only_passing_rows_are_ranked() {
        // 99 vs nav 100 is a 1% discount: below the 8% threshold.
        let rows = vec![scored("AAA", 99.0), scored("BBB", 80.0)];
        let ranked = select_and_rank(&rows);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].scored.row.symbol, "BBB");
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn empty_input() {
        assert!(rank_candidates(Vec::new()).is_empty());
    }
}

//! Score statistics per item
//!
//! Shown to learners once their own grade is final.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub total: usize,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// Largest bucket count, for scaling histograms client-side.
    pub max_count: usize,
    /// (bucket floor, count) pairs in ascending bucket order.
    pub distribution: Vec<(i64, usize)>,
}

/// Aggregate all recorded scores for an item into summary statistics and a
/// bucketed distribution.
pub async fn score_stats(
    store: &dyn Store,
    item_id: &str,
    bucket_size: u32,
) -> Result<ScoreStats, CoreError> {
    let scores = store.item_scores(item_id).await?;

    if scores.is_empty() {
        return Ok(ScoreStats {
            total: 0,
            avg_score: 0.0,
            min_score: 0.0,
            max_score: 0.0,
            max_count: 0,
            distribution: vec![],
        });
    }

    let total = scores.len();
    let sum: f64 = scores.iter().sum();
    let min_score = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let bucket = i64::from(bucket_size.max(1));
    let mut buckets = std::collections::BTreeMap::new();
    for score in &scores {
        let floor = (*score as i64 / bucket) * bucket;
        *buckets.entry(floor).or_insert(0usize) += 1;
    }

    let max_count = buckets.values().copied().max().unwrap_or(0);

    Ok(ScoreStats {
        total,
        avg_score: sum / total as f64,
        min_score,
        max_score,
        max_count,
        distribution: buckets.into_iter().collect(),
    })
}

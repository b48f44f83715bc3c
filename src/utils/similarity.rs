//! Vector similarity functions.

use ndarray::ArrayView1;
use ordered_float::OrderedFloat;

/// Compute the cosine similarity between two f32 slices.
///
/// Returns `0.0` for empty slices, mismatched lengths, or zero vectors.
/// Returns a value in `[-1.0, 1.0]` for valid non-zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let dot = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// L2-normalize a vector, returning a new `Vec<f32>`.
///
/// Returns a zero vector of the same length if the input is a zero vector.
/// Returns an empty `Vec` for empty input.
pub fn normalize_l2(v: &[f32]) -> Vec<f32> {
    if v.is_empty() {
        return Vec::new();
    }

    let arr = ArrayView1::from(v);
    let norm = arr.dot(&arr).sqrt();

    if norm == 0.0 {
        return vec![0.0; v.len()];
    }

    v.iter().map(|x| x / norm).collect()
}

/// Score `candidates` against `query` by cosine similarity and return the
/// top `k` items with their scores, highest first.
///
/// Candidates whose similarity is below `min_score` are dropped.
pub fn top_k_by_cosine<T: Clone>(
    query: &[f32],
    candidates: &[(Vec<f32>, T)],
    k: usize,
    min_score: f32,
) -> Vec<(f32, T)> {
    let mut scored: Vec<(OrderedFloat<f32>, T)> = candidates
        .iter()
        .filter_map(|(vec, item)| {
            let score = cosine_similarity(query, vec);
            (score >= min_score).then(|| (OrderedFloat(score), item.clone()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(k)
        .map(|(score, item)| (score.0, item))
        .collect()
}

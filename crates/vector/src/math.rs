//! Small vector math helpers shared by the brute-force-based engines
//! (`Flat`, `Ivf`, `Nsg`). `Hnsw` uses `hnsw_rs`'s own distance kernel.

/// Cosine similarity in `[-1, 1]`, normalized to `[0, 1]` where `1` means
/// identical direction. Returns `0.0` for a zero-length vector rather than
/// dividing by zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    ((dot / (norm_a * norm_b)) + 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let score = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_zero() {
        let score = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!(score.abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn score_always_stays_in_unit_range(
            a in proptest::collection::vec(-100.0f32..100.0, 1..8),
            b in proptest::collection::vec(-100.0f32..100.0, 1..8),
        ) {
            let len = a.len().min(b.len());
            let score = cosine_similarity(&a[..len], &b[..len]);
            proptest::prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}

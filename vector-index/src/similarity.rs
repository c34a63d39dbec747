//! Similarity metrics (§4.D), all normalized to `[0, 1]` except `Dot`,
//! where higher always means more similar.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    Cosine,
    Dot,
    Euclidean,
}

impl Default for SimilarityMetric {
    fn default() -> Self {
        SimilarityMetric::Cosine
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot(a, b) / (na * nb) + 1.0) / 2.0
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    let sum_sq: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    1.0 / (1.0 + sum_sq.sqrt())
}

impl SimilarityMetric {
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::Dot => dot(a, b),
            SimilarityMetric::Euclidean => euclidean(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors_scores_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((SimilarityMetric::Cosine.score(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_scores_zero() {
        let zero = vec![0.0, 0.0];
        let other = vec![1.0, 1.0];
        assert_eq!(SimilarityMetric::Cosine.score(&zero, &other), 0.0);
    }

    #[test]
    fn cosine_opposite_vectors_scores_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((SimilarityMetric::Cosine.score(&a, &b) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn euclidean_identical_vectors_scores_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((SimilarityMetric::Euclidean.score(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dot_is_raw_unnormalized_inner_product() {
        let a = vec![2.0, 0.0];
        let b = vec![3.0, 0.0];
        assert_eq!(SimilarityMetric::Dot.score(&a, &b), 6.0);
    }
}

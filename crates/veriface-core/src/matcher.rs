//! Match scoring between two face representations.
//!
//! The embedding path scores Euclidean distance against a tolerance; the
//! heuristic path combines four normalized sub-scores into a weighted
//! similarity. Both paths produce a confidence percentage in [0, 100].

use thiserror::Error;

use crate::config::MatchPolicy;
use crate::types::{
    ComparisonResult, Embedding, FaceRepresentation, HeuristicFeatures, MatchMethod,
    SimilarityBreakdown,
};

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("embedding length mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
    #[error("comparison produced a non-finite score")]
    NonFiniteScore,
}

/// Compare two representations of the same variant.
///
/// # Panics
///
/// Panics when the two representations are of different variants. The
/// active variant is fixed per process, so a mixed pair can only come
/// from a caller bug.
pub fn compare(
    a: &FaceRepresentation,
    b: &FaceRepresentation,
    policy: &MatchPolicy,
) -> Result<ComparisonResult, CompareError> {
    match (a, b) {
        (FaceRepresentation::Embedding(ea), FaceRepresentation::Embedding(eb)) => {
            compare_embeddings(ea, eb, policy)
        }
        (FaceRepresentation::Heuristic(fa), FaceRepresentation::Heuristic(fb)) => {
            compare_heuristic(fa, fb, policy)
        }
        _ => panic!("cannot compare representations of different variants"),
    }
}

fn compare_embeddings(
    a: &Embedding,
    b: &Embedding,
    policy: &MatchPolicy,
) -> Result<ComparisonResult, CompareError> {
    if a.values.len() != b.values.len() {
        return Err(CompareError::DimensionMismatch {
            left: a.values.len(),
            right: b.values.len(),
        });
    }

    let distance = a.distance(b);
    if !distance.is_finite() {
        return Err(CompareError::NonFiniteScore);
    }

    let confidence = ((1.0 - distance) * 100.0).max(0.0);

    Ok(ComparisonResult {
        method: MatchMethod::Embedding,
        score: round_to(distance, 4),
        confidence: round_to(confidence, 2),
        is_match: distance <= policy.embedding_tolerance,
        breakdown: None,
    })
}

fn compare_heuristic(
    a: &HeuristicFeatures,
    b: &HeuristicFeatures,
    policy: &MatchPolicy,
) -> Result<ComparisonResult, CompareError> {
    let histogram_correlation = pearson_correlation(&a.histogram, &b.histogram);

    let intensity_similarity =
        (1.0 - (a.mean_intensity - b.mean_intensity).abs() / 255.0).max(0.0);

    let ratio_similarity = (1.0 - (a.aspect_ratio - b.aspect_ratio).abs()).max(0.0);

    let (small, large) = if a.area <= b.area {
        (a.area, b.area)
    } else {
        (b.area, a.area)
    };
    let size_similarity = if large > 0 {
        small as f32 / large as f32
    } else {
        0.0
    };

    let w = &policy.weights;
    let combined = histogram_correlation * w.histogram
        + intensity_similarity * w.intensity
        + ratio_similarity * w.ratio
        + size_similarity * w.size;

    if !combined.is_finite() {
        return Err(CompareError::NonFiniteScore);
    }

    let confidence = (combined * 100.0).clamp(0.0, 100.0);

    Ok(ComparisonResult {
        method: MatchMethod::Heuristic,
        score: round_to(combined, 4),
        confidence: round_to(confidence, 2),
        is_match: combined >= policy.heuristic_threshold,
        breakdown: Some(SimilarityBreakdown {
            histogram_correlation: round_to(histogram_correlation, 4),
            intensity_similarity: round_to(intensity_similarity, 4),
            ratio_similarity: round_to(ratio_similarity, 4),
            size_similarity: round_to(size_similarity, 4),
        }),
    })
}

/// Pearson correlation between two equal-length histograms, in [-1, 1].
///
/// A pair where either side has zero variance scores 1.0, the
/// correlation-comparison convention for constant histograms.
fn pearson_correlation(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }

    let mean_a = a[..n].iter().map(|&v| f64::from(v)).sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().map(|&v| f64::from(v)).sum::<f64>() / n as f64;

    let mut covariance = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for i in 0..n {
        let da = f64::from(a[i]) - mean_a;
        let db = f64::from(b[i]) - mean_b;
        covariance += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        1.0
    } else {
        (covariance / denom) as f32
    }
}

fn round_to(value: f32, places: i32) -> f32 {
    let factor = 10f32.powi(places);
    (value * factor).round() / factor
}

//! Shared data model for the verification pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Axis-aligned face region in pixel coordinates of the source image.
///
/// Invariant: `width` and `height` are positive and the region lies
/// within the bounds of the image it was located in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    /// Pixel area of the region.
    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Fixed-length face embedding produced by the ONNX encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Euclidean distance to another embedding. Lower = more similar.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Hand-engineered feature bundle used when no embedding encoder is
/// available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicFeatures {
    /// Leading bins of the 256-bin intensity histogram of the face crop.
    pub histogram: Vec<f32>,
    pub mean_intensity: f32,
    pub std_intensity: f32,
    /// Pixel area of the face region.
    pub area: u32,
    /// Width over height of the face region.
    pub aspect_ratio: f32,
}

/// The representation/comparison method active for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Embedding,
    Heuristic,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Embedding => "embedding",
            MatchMethod::Heuristic => "heuristic",
        }
    }
}

/// A comparable representation of a single face.
///
/// Exactly one representation is derived per face image. The active
/// variant is fixed at startup for the process lifetime and never mixed
/// within a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FaceRepresentation {
    Embedding(Embedding),
    Heuristic(HeuristicFeatures),
}

impl FaceRepresentation {
    pub fn method(&self) -> MatchMethod {
        match self {
            FaceRepresentation::Embedding(_) => MatchMethod::Embedding,
            FaceRepresentation::Heuristic(_) => MatchMethod::Heuristic,
        }
    }
}

/// Per-component sub-scores for the heuristic path, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    pub histogram_correlation: f32,
    pub intensity_similarity: f32,
    pub ratio_similarity: f32,
    pub size_similarity: f32,
}

/// Outcome of scoring one pair of representations.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub method: MatchMethod,
    /// Euclidean distance (embedding) or combined similarity (heuristic),
    /// rounded to 4 decimal places.
    pub score: f32,
    /// Confidence percentage in [0, 100], rounded to 2 decimal places.
    pub confidence: f32,
    pub is_match: bool,
    /// Always present on the heuristic path, never on the embedding path.
    pub breakdown: Option<SimilarityBreakdown>,
}

/// Human-facing confidence bucket derived from the numeric confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    #[serde(rename = "High confidence match")]
    HighConfidence,
    #[serde(rename = "Moderate confidence match")]
    ModerateConfidence,
    #[serde(rename = "Low confidence - manual review recommended")]
    ManualReview,
    #[serde(rename = "Moderate confidence match (basic method)")]
    ModerateConfidenceBasic,
    #[serde(rename = "Low confidence match (basic method)")]
    LowConfidenceBasic,
    #[serde(rename = "Very low confidence - manual review required")]
    ManualReviewBasic,
}

impl Recommendation {
    /// Bucket a confidence percentage for the given method.
    ///
    /// The heuristic tiers sit lower than the embedding tiers, matching
    /// the weaker discriminative power of hand-engineered features.
    pub fn for_confidence(method: MatchMethod, confidence: f32) -> Self {
        match method {
            MatchMethod::Embedding => {
                if confidence >= 80.0 {
                    Recommendation::HighConfidence
                } else if confidence >= 60.0 {
                    Recommendation::ModerateConfidence
                } else {
                    Recommendation::ManualReview
                }
            }
            MatchMethod::Heuristic => {
                if confidence >= 70.0 {
                    Recommendation::ModerateConfidenceBasic
                } else if confidence >= 50.0 {
                    Recommendation::LowConfidenceBasic
                } else {
                    Recommendation::ManualReviewBasic
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::HighConfidence => "High confidence match",
            Recommendation::ModerateConfidence => "Moderate confidence match",
            Recommendation::ManualReview => "Low confidence - manual review recommended",
            Recommendation::ModerateConfidenceBasic => "Moderate confidence match (basic method)",
            Recommendation::LowConfidenceBasic => "Low confidence match (basic method)",
            Recommendation::ManualReviewBasic => "Very low confidence - manual review required",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record emitted once per successful verification call.
///
/// Not persisted by this crate; collaborators decide what to do with it.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRecord {
    pub method: MatchMethod,
    /// "Verified" or "Not Verified".
    pub result: String,
    pub is_match: bool,
    pub confidence: f32,
    pub score: f32,
    /// Threshold the match decision was made against.
    pub tolerance_used: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<SimilarityBreakdown>,
    pub recommendation: Recommendation,
    /// Caller-supplied identity-document fields, attached verbatim.
    pub subject: BTreeMap<String, String>,
    /// ISO-8601 timestamp of record creation.
    pub timestamp: String,
}

impl VerificationRecord {
    /// Build the record for a scored comparison.
    pub fn new(
        comparison: ComparisonResult,
        tolerance_used: f32,
        subject: BTreeMap<String, String>,
    ) -> Self {
        let recommendation = Recommendation::for_confidence(comparison.method, comparison.confidence);
        let result = if comparison.is_match {
            "Verified"
        } else {
            "Not Verified"
        };
        Self {
            method: comparison.method,
            result: result.to_string(),
            is_match: comparison.is_match,
            confidence: comparison.confidence,
            score: comparison.score,
            tolerance_used,
            breakdown: comparison.breakdown,
            recommendation,
            subject,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

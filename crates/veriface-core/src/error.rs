//! Failure taxonomy surfaced to collaborators.
//!
//! Every failed verification call reduces to one enumerated code,
//! optionally tagged with the input image that triggered it. One failing
//! call never affects subsequent calls.

use serde::Serialize;

/// Which input image a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Camera,
    Document,
}

impl ImageRole {
    /// Prefix applied to failure codes for this image.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            ImageRole::Camera => "CAMERA_IMAGE",
            ImageRole::Document => "DOCUMENT_IMAGE",
        }
    }

    /// Human-readable label used in failure messages.
    pub fn label(&self) -> &'static str {
        match self {
            ImageRole::Camera => "Live camera image",
            ImageRole::Document => "Document image",
        }
    }
}

/// Enumerated failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    ImageReadError,
    LowResolution,
    TooDark,
    TooBright,
    BlurryImage,
    NoFaceDetected,
    MultipleFacesDetected,
    ComparisonError,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::ImageReadError => "IMAGE_READ_ERROR",
            FailureCode::LowResolution => "LOW_RESOLUTION",
            FailureCode::TooDark => "TOO_DARK",
            FailureCode::TooBright => "TOO_BRIGHT",
            FailureCode::BlurryImage => "BLURRY_IMAGE",
            FailureCode::NoFaceDetected => "NO_FACE_DETECTED",
            FailureCode::MultipleFacesDetected => "MULTIPLE_FACES_DETECTED",
            FailureCode::ComparisonError => "COMPARISON_ERROR",
        }
    }
}

/// A failed verification call.
#[derive(Debug, Clone)]
pub struct VerifyFailure {
    pub code: FailureCode,
    /// Set when the failure is attributable to one input image.
    pub role: Option<ImageRole>,
    pub message: String,
}

impl VerifyFailure {
    /// A failure not tied to either input image.
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            role: None,
            message: message.into(),
        }
    }

    /// A failure attributed to one input image.
    pub fn for_image(role: ImageRole, code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            role: Some(role),
            message: message.into(),
        }
    }

    /// Failure code string, prefixed with the offending image when known
    /// (e.g. `CAMERA_IMAGE_NO_FACE_DETECTED`).
    pub fn error_kind(&self) -> String {
        match self.role {
            Some(role) => format!("{}_{}", role.code_prefix(), self.code.as_str()),
            None => self.code.as_str().to_string(),
        }
    }

    /// Wire form: `{ "error_kind": ..., "message": ... }`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error_kind": self.error_kind(),
            "message": self.message,
        })
    }
}

impl std::fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_kind(), self.message)
    }
}

impl std::error::Error for VerifyFailure {}

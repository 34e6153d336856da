//! Verification pipeline: quality gate, face location, representation
//! extraction, comparison, and the final record.
//!
//! Stages run in a fixed order with terminal failure at any stage; there
//! are no backward transitions and no retries. The locator model and the
//! representation variant are resolved once at startup and reused for
//! every call.

use std::collections::BTreeMap;

use crate::config::{Config, MatchPolicy, QualityThresholds};
use crate::error::{FailureCode, ImageRole, VerifyFailure};
use crate::extractor::{EmbeddingExtractor, Extract, HeuristicExtractor};
use crate::frame::{Frame, ImageSource};
use crate::locator::{CascadeLocator, Locate, LocatorError};
use crate::matcher;
use crate::quality;
use crate::types::{FaceRegion, FaceRepresentation, MatchMethod, VerificationRecord};

/// Caller-supplied inputs for one verification call.
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    /// Overrides the configured embedding tolerance when set.
    pub tolerance: Option<f32>,
    /// Opaque identity-document fields, attached to the record verbatim.
    pub subject: BTreeMap<String, String>,
}

/// Sequences the pipeline stages over a camera capture and a document
/// photo.
pub struct Verifier {
    locator: Box<dyn Locate>,
    extractor: Box<dyn Extract>,
    quality: QualityThresholds,
    policy: MatchPolicy,
}

impl Verifier {
    /// Load the cascade model and resolve the representation variant.
    ///
    /// When the embedding encoder cannot be loaded, the process falls
    /// back to the heuristic variant for its entire lifetime; the
    /// fallback is decided here exactly once, never per call.
    pub fn new(config: &Config) -> Result<Self, LocatorError> {
        let locator = CascadeLocator::load(&config.cascade_model_path(), &config.locator)?;

        let extractor: Box<dyn Extract> = match EmbeddingExtractor::load(
            &config.embedding_model_path(),
        ) {
            Ok(encoder) => {
                tracing::info!("using embedding representation");
                Box::new(encoder)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "embedding encoder unavailable, using heuristic representation"
                );
                Box::new(HeuristicExtractor)
            }
        };

        Ok(Self::from_parts(Box::new(locator), extractor, config))
    }

    /// Assemble a verifier from preloaded stages.
    pub fn from_parts(
        locator: Box<dyn Locate>,
        extractor: Box<dyn Extract>,
        config: &Config,
    ) -> Self {
        Self {
            locator,
            extractor,
            quality: config.quality,
            policy: config.policy,
        }
    }

    /// The representation variant active for this process.
    pub fn method(&self) -> MatchMethod {
        self.extractor.method()
    }

    /// Run the full verification pipeline.
    pub fn verify(
        &mut self,
        camera: &ImageSource,
        document: &ImageSource,
        request: &VerifyRequest,
    ) -> Result<VerificationRecord, VerifyFailure> {
        let camera_frame = self.admit(ImageRole::Camera, camera)?;
        let document_frame = self.admit(ImageRole::Document, document)?;

        let camera_rep = self.represent(ImageRole::Camera, &camera_frame)?;
        let document_rep = self.represent(ImageRole::Document, &document_frame)?;

        let mut policy = self.policy;
        if let Some(tolerance) = request.tolerance {
            policy.embedding_tolerance = tolerance;
        }

        let comparison = matcher::compare(&camera_rep, &document_rep, &policy)
            .map_err(|err| VerifyFailure::new(FailureCode::ComparisonError, err.to_string()))?;

        tracing::info!(
            method = comparison.method.as_str(),
            score = comparison.score,
            confidence = comparison.confidence,
            is_match = comparison.is_match,
            "verification scored"
        );

        let tolerance_used = match comparison.method {
            MatchMethod::Embedding => policy.embedding_tolerance,
            MatchMethod::Heuristic => policy.heuristic_threshold,
        };

        Ok(VerificationRecord::new(
            comparison,
            tolerance_used,
            request.subject.clone(),
        ))
    }

    /// Locate face regions in a single image without running the full
    /// pipeline.
    pub fn locate_faces(&mut self, source: &ImageSource) -> Result<Vec<FaceRegion>, VerifyFailure> {
        let frame = source
            .decode()
            .map_err(|err| VerifyFailure::new(FailureCode::ImageReadError, err.to_string()))?;
        Ok(self.locator.locate(&frame))
    }

    /// Decode one input and run the quality gate.
    fn admit(&self, role: ImageRole, source: &ImageSource) -> Result<Frame, VerifyFailure> {
        let frame = source.decode().map_err(|err| {
            VerifyFailure::for_image(
                role,
                FailureCode::ImageReadError,
                format!("{}: {err}", role.label()),
            )
        })?;

        let report = quality::validate(&frame, &self.quality);
        if let Some(issue) = report.issue {
            tracing::warn!(role = role.label(), issue = %issue, "quality gate rejected image");
            return Err(VerifyFailure::for_image(
                role,
                issue.code(),
                format!("{}: {issue}", role.label()),
            ));
        }

        tracing::debug!(
            role = role.label(),
            brightness = report.brightness,
            sharpness = report.sharpness,
            "quality gate passed"
        );

        Ok(frame)
    }

    /// Locate faces and derive the representation for one image.
    ///
    /// Cardinality failures are attributed to the image; inference
    /// failures are internal and stay unprefixed.
    fn represent(
        &mut self,
        role: ImageRole,
        frame: &Frame,
    ) -> Result<FaceRepresentation, VerifyFailure> {
        let faces = self.locator.locate(frame);
        self.extractor.extract(frame, &faces).map_err(|err| {
            let code = err.code();
            match code {
                FailureCode::NoFaceDetected | FailureCode::MultipleFacesDetected => {
                    VerifyFailure::for_image(role, code, format!("{}: {err}", role.label()))
                }
                _ => VerifyFailure::new(code, err.to_string()),
            }
        })
    }
}

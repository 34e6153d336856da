//! Face representation and match scoring for identity verification.
//!
//! Gates captured images on quality, locates a single face, derives a
//! comparable representation (an ONNX embedding, or a heuristic feature
//! bundle when no encoder is available), and scores the pair into a
//! confidence-calibrated match decision with a recommendation tier.

pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod frame;
pub mod locator;
pub mod matcher;
pub mod quality;
pub mod types;
pub mod verifier;

pub use config::Config;
pub use error::{FailureCode, ImageRole, VerifyFailure};
pub use frame::{Frame, ImageSource};
pub use types::{
    ComparisonResult, FaceRegion, FaceRepresentation, MatchMethod, Recommendation,
    VerificationRecord,
};
pub use verifier::{Verifier, VerifyRequest};

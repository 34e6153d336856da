//! Face representation extraction.
//!
//! Two capability variants behind one interface: the embedding extractor
//! runs an ONNX face encoder over the cropped region, the heuristic
//! extractor computes a hand-engineered feature bundle from the grayscale
//! crop. The active variant is chosen once at startup and used for the
//! whole process lifetime.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::error::FailureCode;
use crate::frame::Frame;
use crate::types::{Embedding, FaceRegion, FaceRepresentation, HeuristicFeatures, MatchMethod};

// --- Encoder constants ---
const EMBED_INPUT_SIZE: u32 = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 127.5;
/// Output dimensionality of the embedding encoder.
pub const EMBEDDING_DIM: usize = 128;

/// Number of leading intensity-histogram bins kept in the heuristic bundle.
pub const HISTOGRAM_PREFIX_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("multiple faces detected ({0}), please use an image with a single face")]
    MultipleFaces(usize),
    #[error("embedding inference failed: {0}")]
    Inference(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl ExtractError {
    pub fn code(&self) -> FailureCode {
        match self {
            ExtractError::NoFaceDetected => FailureCode::NoFaceDetected,
            ExtractError::MultipleFaces(_) => FailureCode::MultipleFacesDetected,
            ExtractError::Inference(_) | ExtractError::Ort(_) => FailureCode::ComparisonError,
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("embedding model not found: {0}")]
    ModelNotFound(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Derives a comparable representation from exactly one located face.
///
/// Cardinality is enforced here: zero regions or more than one region is
/// a failure, never resolved by silently picking a region.
pub trait Extract: Send {
    fn method(&self) -> MatchMethod;
    fn extract(
        &mut self,
        frame: &Frame,
        faces: &[FaceRegion],
    ) -> Result<FaceRepresentation, ExtractError>;
}

/// Reject anything other than exactly one face region.
fn single_face(faces: &[FaceRegion]) -> Result<&FaceRegion, ExtractError> {
    match faces {
        [] => Err(ExtractError::NoFaceDetected),
        [one] => Ok(one),
        many => Err(ExtractError::MultipleFaces(many.len())),
    }
}

/// ONNX face encoder producing a fixed-length embedding.
pub struct EmbeddingExtractor {
    session: Session,
}

impl EmbeddingExtractor {
    /// Load the encoder model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, BackendError> {
        if !model_path.exists() {
            return Err(BackendError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "embedding encoder loaded");

        Ok(Self { session })
    }

    /// Resize the face crop to the encoder input and normalize into a
    /// NCHW float tensor. Grayscale is replicated across the three
    /// channels.
    fn preprocess(crop: &Frame) -> Array4<f32> {
        let resized = image::imageops::resize(
            &crop.to_gray_image(),
            EMBED_INPUT_SIZE,
            EMBED_INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );
        let pixels = resized.as_raw();

        let size = EMBED_INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for y in 0..size {
            for x in 0..size {
                let normalized = (f32::from(pixels[y * size + x]) - EMBED_MEAN) / EMBED_STD;
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        tensor
    }
}

impl Extract for EmbeddingExtractor {
    fn method(&self) -> MatchMethod {
        MatchMethod::Embedding
    }

    fn extract(
        &mut self,
        frame: &Frame,
        faces: &[FaceRegion],
    ) -> Result<FaceRepresentation, ExtractError> {
        let face = single_face(faces)?;
        let crop = frame.crop(face);
        let input = Self::preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractError::Inference(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(ExtractError::Inference(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(FaceRepresentation::Embedding(Embedding {
            values: raw.to_vec(),
        }))
    }
}

/// Hand-engineered fallback used when no embedding encoder is available.
pub struct HeuristicExtractor;

impl Extract for HeuristicExtractor {
    fn method(&self) -> MatchMethod {
        MatchMethod::Heuristic
    }

    fn extract(
        &mut self,
        frame: &Frame,
        faces: &[FaceRegion],
    ) -> Result<FaceRepresentation, ExtractError> {
        let face = single_face(faces)?;
        let crop = frame.crop(face);

        let (mean_intensity, std_intensity) = intensity_stats(&crop);

        Ok(FaceRepresentation::Heuristic(HeuristicFeatures {
            histogram: histogram_prefix(&crop),
            mean_intensity,
            std_intensity,
            area: face.area(),
            aspect_ratio: face.aspect_ratio(),
        }))
    }
}

/// First [`HISTOGRAM_PREFIX_LEN`] bins of the 256-bin intensity histogram.
fn histogram_prefix(crop: &Frame) -> Vec<f32> {
    let mut bins = [0u32; 256];
    for &p in &crop.data {
        bins[p as usize] += 1;
    }
    bins[..HISTOGRAM_PREFIX_LEN]
        .iter()
        .map(|&count| count as f32)
        .collect()
}

/// Mean and population standard deviation of the crop intensity.
fn intensity_stats(crop: &Frame) -> (f32, f32) {
    if crop.data.is_empty() {
        return (0.0, 0.0);
    }
    let n = crop.data.len() as f64;
    let mean = crop.data.iter().map(|&p| f64::from(p)).sum::<f64>() / n;
    let variance = crop
        .data
        .iter()
        .map(|&p| (f64::from(p) - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean as f32, variance.sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame {
            data,
            width,
            height,
        }
    }

    fn region(x: u32, y: u32, w: u32, h: u32) -> FaceRegion {
        FaceRegion {
            x,
            y,
            width: w,
            height: h,
        }
    }

    #[test]
    fn test_single_face_accepts_one() {
        let faces = [region(0, 0, 10, 10)];
        assert!(single_face(&faces).is_ok());
    }

    #[test]
    fn test_zero_faces_rejected() {
        assert!(matches!(
            single_face(&[]),
            Err(ExtractError::NoFaceDetected)
        ));
    }

    #[test]
    fn test_multiple_faces_rejected() {
        let faces = [region(0, 0, 10, 10), region(20, 0, 10, 10)];
        assert!(matches!(
            single_face(&faces),
            Err(ExtractError::MultipleFaces(2))
        ));
        let three = [
            region(0, 0, 10, 10),
            region(20, 0, 10, 10),
            region(40, 0, 10, 10),
        ];
        assert!(matches!(
            single_face(&three),
            Err(ExtractError::MultipleFaces(3))
        ));
    }

    #[test]
    fn test_cardinality_errors_map_to_codes() {
        assert_eq!(
            ExtractError::NoFaceDetected.code(),
            FailureCode::NoFaceDetected
        );
        assert_eq!(
            ExtractError::MultipleFaces(2).code(),
            FailureCode::MultipleFacesDetected
        );
        assert_eq!(
            ExtractError::Inference("shape".into()).code(),
            FailureCode::ComparisonError
        );
    }

    #[test]
    fn test_heuristic_extractor_enforces_cardinality() {
        let frame = frame_with(vec![100; 64 * 64], 64, 64);
        let mut extractor = HeuristicExtractor;
        assert!(matches!(
            extractor.extract(&frame, &[]),
            Err(ExtractError::NoFaceDetected)
        ));
        let two = [region(0, 0, 16, 16), region(32, 32, 16, 16)];
        assert!(matches!(
            extractor.extract(&frame, &two),
            Err(ExtractError::MultipleFaces(2))
        ));
    }

    #[test]
    fn test_heuristic_features_uniform_crop() {
        // Uniform value 40 lands in a single histogram bin within the
        // kept prefix.
        let frame = frame_with(vec![40; 64 * 64], 64, 64);
        let mut extractor = HeuristicExtractor;
        let rep = extractor
            .extract(&frame, &[region(8, 8, 32, 16)])
            .unwrap();

        let FaceRepresentation::Heuristic(features) = rep else {
            panic!("expected heuristic representation");
        };
        assert_eq!(features.histogram.len(), HISTOGRAM_PREFIX_LEN);
        assert!((features.histogram[40] - (32.0 * 16.0)).abs() < 1e-6);
        assert_eq!(
            features.histogram.iter().sum::<f32>(),
            32.0 * 16.0,
            "all crop pixels fall in bin 40"
        );
        assert!((features.mean_intensity - 40.0).abs() < 1e-4);
        assert!(features.std_intensity.abs() < 1e-4);
        assert_eq!(features.area, 32 * 16);
        assert!((features.aspect_ratio - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_heuristic_stats_two_level_crop() {
        // Crop covering half 60s and half 80s: mean 70, stddev 10.
        let mut data = vec![60u8; 32];
        data.extend(vec![80u8; 32]);
        let frame = frame_with(data, 8, 8);
        let mut extractor = HeuristicExtractor;
        let rep = extractor.extract(&frame, &[region(0, 0, 8, 8)]).unwrap();

        let FaceRepresentation::Heuristic(features) = rep else {
            panic!("expected heuristic representation");
        };
        assert!((features.mean_intensity - 70.0).abs() < 1e-4);
        assert!((features.std_intensity - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_histogram_prefix_ignores_high_bins() {
        // Intensity 200 is outside the kept prefix.
        let frame = frame_with(vec![200; 16], 4, 4);
        let bins = histogram_prefix(&frame);
        assert_eq!(bins.len(), HISTOGRAM_PREFIX_LEN);
        assert!(bins.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_preprocess_shape_and_channels() {
        let crop = frame_with(vec![128; 50 * 40], 50, 40);
        let tensor = EmbeddingExtractor::preprocess(&crop);
        assert_eq!(
            tensor.shape(),
            &[1, 3, EMBED_INPUT_SIZE as usize, EMBED_INPUT_SIZE as usize]
        );
        // Grayscale replicated: all channels identical.
        let (r, g, b) = (tensor[[0, 0, 5, 5]], tensor[[0, 1, 5, 5]], tensor[[0, 2, 5, 5]]);
        assert_eq!(r, g);
        assert_eq!(g, b);
        // Uniform 128 input: (128 - 127.5) / 127.5
        let expected = (128.0 - EMBED_MEAN) / EMBED_STD;
        assert!((r - expected).abs() < 1e-6);
    }

    #[test]
    fn test_load_missing_encoder() {
        let result = EmbeddingExtractor::load(Path::new("/nonexistent/mobilefacenet_128.onnx"));
        assert!(matches!(result, Err(BackendError::ModelNotFound(_))));
    }
}

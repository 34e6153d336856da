//! Cascade face locator.
//!
//! Wraps the SeetaFace funnelled cascade from the `rustface` crate with
//! fixed scan parameters. Result order follows the detector's internal
//! scan order and carries no meaning beyond first-match use.

use std::path::Path;

use rustface::ImageData;
use thiserror::Error;

use crate::config::LocatorParams;
use crate::frame::Frame;
use crate::types::FaceRegion;

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("cascade model not found: {0}")]
    ModelNotFound(String),
    #[error("cascade model failed to load: {0}")]
    ModelLoad(String),
}

/// Locates face regions in a grayscale frame.
///
/// An empty result is not an error; callers interpret cardinality.
pub trait Locate: Send {
    fn locate(&mut self, frame: &Frame) -> Vec<FaceRegion>;
}

/// SeetaFace cascade detector with fixed scan parameters.
///
/// Loaded once at startup and reused for every call; detection is
/// deterministic for identical pixels and parameters.
pub struct CascadeLocator {
    detector: Box<dyn rustface::Detector>,
}

// SAFETY: `rustface::create_detector` returns `Box<dyn Detector>`, which drops
// the `Send` auto-trait through type erasure. The concrete detector
// (`FuStDetector`) holds only owned `Vec`/scalar state — no `Rc`, `Cell`, or
// thread-affine handles — so it is `Send` in fact. The locator is moved onto
// the dedicated engine thread and only ever used from there, never shared.
unsafe impl Send for CascadeLocator {}

impl CascadeLocator {
    /// Load the cascade model and apply the configured scan parameters.
    pub fn load(model_path: &Path, params: &LocatorParams) -> Result<Self, LocatorError> {
        if !model_path.exists() {
            return Err(LocatorError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let mut detector = rustface::create_detector(model_path.to_string_lossy().as_ref())
            .map_err(|e| LocatorError::ModelLoad(e.to_string()))?;

        detector.set_min_face_size(params.min_face_size);
        // The pyramid shrink factor is the inverse of the scan scale step.
        detector.set_pyramid_scale_factor((1.0 / params.scale_factor).clamp(0.5, 0.99));
        // The ensemble score threshold plays the neighbour-vote role: a
        // region needs at least this much cascade agreement to be kept.
        detector.set_score_thresh(f64::from(params.min_neighbors));
        detector.set_slide_window_step(4, 4);

        tracing::info!(
            path = %model_path.display(),
            min_face_size = params.min_face_size,
            scale_factor = params.scale_factor,
            min_neighbors = params.min_neighbors,
            "cascade locator loaded"
        );

        Ok(Self { detector })
    }
}

impl Locate for CascadeLocator {
    fn locate(&mut self, frame: &Frame) -> Vec<FaceRegion> {
        let mut image = ImageData::new(&frame.data, frame.width, frame.height);
        let faces = self.detector.detect(&mut image);

        let regions: Vec<FaceRegion> = faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                clamp_to_bounds(
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height(),
                    frame.width,
                    frame.height,
                )
            })
            .collect();

        tracing::debug!(
            found = regions.len(),
            width = frame.width,
            height = frame.height,
            "face scan complete"
        );

        regions
    }
}

/// Clamp a raw detection rectangle to the image bounds.
///
/// Returns `None` when nothing of the region remains inside the image,
/// so every returned region has positive width and height.
fn clamp_to_bounds(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    image_width: u32,
    image_height: u32,
) -> Option<FaceRegion> {
    let x0 = i64::from(x.max(0));
    let y0 = i64::from(y.max(0));
    let x1 = (i64::from(x) + i64::from(width)).min(i64::from(image_width));
    let y1 = (i64::from(y) + i64::from(height)).min(i64::from(image_height));

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(FaceRegion {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside_untouched() {
        let region = clamp_to_bounds(10, 20, 30, 40, 640, 480).unwrap();
        assert_eq!(
            region,
            FaceRegion {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            }
        );
    }

    #[test]
    fn test_clamp_negative_origin() {
        let region = clamp_to_bounds(-5, -10, 50, 50, 640, 480).unwrap();
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.width, 45);
        assert_eq!(region.height, 40);
    }

    #[test]
    fn test_clamp_overflowing_edge() {
        let region = clamp_to_bounds(620, 470, 40, 40, 640, 480).unwrap();
        assert_eq!(region.width, 20);
        assert_eq!(region.height, 10);
    }

    #[test]
    fn test_clamp_fully_outside() {
        assert!(clamp_to_bounds(700, 0, 30, 30, 640, 480).is_none());
        assert!(clamp_to_bounds(-50, 0, 30, 30, 640, 480).is_none());
    }

    #[test]
    fn test_clamp_degenerate_dropped() {
        assert!(clamp_to_bounds(10, 10, 0, 30, 640, 480).is_none());
        assert!(clamp_to_bounds(10, 10, 30, 0, 640, 480).is_none());
    }

    #[test]
    fn test_load_missing_model() {
        let result = CascadeLocator::load(
            Path::new("/nonexistent/seeta_fd_frontal_v1.0.bin"),
            &LocatorParams::default(),
        );
        assert!(matches!(result, Err(LocatorError::ModelNotFound(_))));
    }
}

//! Image quality gate: resolution, illumination, sharpness.
//!
//! Checks run in a fixed order and the first failure wins. A failing
//! image is rejected outright; the caller must resubmit a new capture.

use serde::Serialize;
use thiserror::Error;

use crate::config::QualityThresholds;
use crate::error::FailureCode;
use crate::frame::Frame;

/// Why an image failed the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityIssue {
    #[error("image resolution too low: {width}x{height}, minimum {min}x{min} required")]
    LowResolution { width: u32, height: u32, min: u32 },
    #[error("image is too dark for face recognition (brightness {brightness:.2})")]
    TooDark { brightness: f32 },
    #[error("image is too bright for face recognition (brightness {brightness:.2})")]
    TooBright { brightness: f32 },
    #[error("image appears to be blurry (sharpness {sharpness:.2})")]
    #[serde(rename = "BLURRY_IMAGE")]
    Blurry { sharpness: f32 },
}

impl QualityIssue {
    pub fn code(&self) -> FailureCode {
        match self {
            QualityIssue::LowResolution { .. } => FailureCode::LowResolution,
            QualityIssue::TooDark { .. } => FailureCode::TooDark,
            QualityIssue::TooBright { .. } => FailureCode::TooBright,
            QualityIssue::Blurry { .. } => FailureCode::BlurryImage,
        }
    }
}

/// Outcome of the quality gate for a single image.
///
/// The measured statistics are reported whether or not the image passed.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub valid: bool,
    /// (width, height) in pixels.
    pub resolution: (u32, u32),
    /// Mean grayscale intensity (0-255).
    pub brightness: f32,
    /// Variance of the Laplacian response. Higher = sharper.
    pub sharpness: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<QualityIssue>,
}

/// Validate an image against the configured quality thresholds.
pub fn validate(frame: &Frame, thresholds: &QualityThresholds) -> QualityReport {
    let resolution = (frame.width, frame.height);
    let brightness = frame.mean_brightness();
    let sharpness = laplacian_variance(frame);

    let issue = if frame.width < thresholds.min_resolution
        || frame.height < thresholds.min_resolution
    {
        Some(QualityIssue::LowResolution {
            width: frame.width,
            height: frame.height,
            min: thresholds.min_resolution,
        })
    } else if brightness < thresholds.min_brightness {
        Some(QualityIssue::TooDark { brightness })
    } else if brightness > thresholds.max_brightness {
        Some(QualityIssue::TooBright { brightness })
    } else if sharpness < thresholds.min_sharpness {
        Some(QualityIssue::Blurry { sharpness })
    } else {
        None
    };

    QualityReport {
        valid: issue.is_none(),
        resolution,
        brightness,
        sharpness,
        issue,
    }
}

/// Variance of the 4-neighbour Laplacian response over interior pixels.
///
/// Images narrower than 3 pixels in either dimension have no interior
/// and score 0.0.
fn laplacian_variance(frame: &Frame) -> f32 {
    let w = frame.width as usize;
    let h = frame.height as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }

    let data = &frame.data;
    let mut responses = Vec::with_capacity((w - 2) * (h - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = f64::from(data[y * w + x]);
            let response = f64::from(data[y * w + x - 1])
                + f64::from(data[y * w + x + 1])
                + f64::from(data[(y - 1) * w + x])
                + f64::from(data[(y + 1) * w + x])
                - 4.0 * center;
            responses.push(response);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    let variance = responses.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance as f32
}

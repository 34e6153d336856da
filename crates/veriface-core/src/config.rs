//! Runtime configuration, loaded from `VERIFACE_*` environment variables.
//!
//! Every threshold the pipeline consults lives here; the algorithm
//! implementations never hardcode them.

use std::path::PathBuf;

const CASCADE_MODEL_FILE: &str = "seeta_fd_frontal_v1.0.bin";
const EMBEDDING_MODEL_FILE: &str = "mobilefacenet_128.onnx";

/// Quality gate thresholds.
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    /// Minimum width and height in pixels.
    pub min_resolution: u32,
    /// Lowest acceptable mean grayscale intensity.
    pub min_brightness: f32,
    /// Highest acceptable mean grayscale intensity.
    pub max_brightness: f32,
    /// Minimum Laplacian variance.
    pub min_sharpness: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_resolution: 100,
            min_brightness: 30.0,
            max_brightness: 225.0,
            min_sharpness: 100.0,
        }
    }
}

/// Cascade scan parameters.
#[derive(Debug, Clone, Copy)]
pub struct LocatorParams {
    /// Smallest face region accepted, in pixels.
    pub min_face_size: u32,
    /// Scale step between pyramid levels (> 1.0).
    pub scale_factor: f32,
    /// Neighbouring detections required to accept a region.
    pub min_neighbors: u32,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            min_face_size: 30,
            scale_factor: 1.1,
            min_neighbors: 5,
        }
    }
}

/// Weights for the four heuristic similarity components.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicWeights {
    pub histogram: f32,
    pub intensity: f32,
    pub ratio: f32,
    pub size: f32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            histogram: 0.4,
            intensity: 0.2,
            ratio: 0.2,
            size: 0.2,
        }
    }
}

/// Match decision thresholds.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    /// Maximum embedding distance still counted as a match. Lower = stricter.
    pub embedding_tolerance: f32,
    /// Minimum combined heuristic similarity counted as a match.
    pub heuristic_threshold: f32,
    pub weights: HeuristicWeights,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            embedding_tolerance: 0.6,
            heuristic_threshold: 0.4,
            weights: HeuristicWeights::default(),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the cascade and embedding model files.
    pub model_dir: PathBuf,
    pub quality: QualityThresholds,
    pub locator: LocatorParams,
    pub policy: MatchPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            quality: QualityThresholds::default(),
            locator: LocatorParams::default(),
            policy: MatchPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from `VERIFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            model_dir: std::env::var("VERIFACE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            quality: QualityThresholds {
                min_resolution: env_u32("VERIFACE_MIN_RESOLUTION", 100),
                min_brightness: env_f32("VERIFACE_MIN_BRIGHTNESS", 30.0),
                max_brightness: env_f32("VERIFACE_MAX_BRIGHTNESS", 225.0),
                min_sharpness: env_f32("VERIFACE_MIN_SHARPNESS", 100.0),
            },
            locator: LocatorParams {
                min_face_size: env_u32("VERIFACE_MIN_FACE_SIZE", 30),
                scale_factor: env_f32("VERIFACE_SCALE_FACTOR", 1.1),
                min_neighbors: env_u32("VERIFACE_MIN_NEIGHBORS", 5),
            },
            policy: MatchPolicy {
                embedding_tolerance: env_f32("VERIFACE_TOLERANCE", 0.6),
                heuristic_threshold: env_f32("VERIFACE_HEURISTIC_THRESHOLD", 0.4),
                weights: HeuristicWeights {
                    histogram: env_f32("VERIFACE_WEIGHT_HISTOGRAM", 0.4),
                    intensity: env_f32("VERIFACE_WEIGHT_INTENSITY", 0.2),
                    ratio: env_f32("VERIFACE_WEIGHT_RATIO", 0.2),
                    size: env_f32("VERIFACE_WEIGHT_SIZE", 0.2),
                },
            },
        }
    }

    /// Path to the cascade detection model.
    pub fn cascade_model_path(&self) -> PathBuf {
        self.model_dir.join(CASCADE_MODEL_FILE)
    }

    /// Path to the embedding encoder model.
    pub fn embedding_model_path(&self) -> PathBuf {
        self.model_dir.join(EMBEDDING_MODEL_FILE)
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

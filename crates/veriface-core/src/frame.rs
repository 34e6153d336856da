//! Decoded grayscale frames and image loading.

use std::path::{Path, PathBuf};

use crate::types::FaceRegion;

/// A decoded grayscale image.
///
/// Pixel data is row-major, `width * height` bytes, and read-only once
/// decoded.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("could not read image file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("could not decode image buffer: {0}")]
    Decode(#[from] image::ImageError),
}

impl Frame {
    /// Decode an image file and convert it to grayscale.
    pub fn from_path(path: &Path) -> Result<Self, FrameError> {
        let img = image::open(path).map_err(|source| FrameError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_dynamic(img))
    }

    /// Decode an in-memory encoded image buffer (PNG, JPEG, ...).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        Ok(Self::from_dynamic(image::load_from_memory(bytes)?))
    }

    fn from_dynamic(img: image::DynamicImage) -> Self {
        let gray = img.to_luma8();
        let (width, height) = gray.dimensions();
        Self {
            data: gray.into_raw(),
            width,
            height,
        }
    }

    /// Mean pixel brightness (0.0-255.0).
    pub fn mean_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.data.iter().map(|&p| f64::from(p)).sum();
        (sum / self.data.len() as f64) as f32
    }

    /// Copy out a rectangular region.
    ///
    /// The region is clamped to the frame bounds; locator output already
    /// satisfies the bounds invariant, so clamping is normally a no-op.
    pub fn crop(&self, region: &FaceRegion) -> Frame {
        let x0 = region.x.min(self.width);
        let y0 = region.y.min(self.height);
        let w = region.width.min(self.width - x0);
        let h = region.height.min(self.height - y0);

        let mut data = Vec::with_capacity((w * h) as usize);
        for y in y0..y0 + h {
            let row_start = (y * self.width + x0) as usize;
            data.extend_from_slice(&self.data[row_start..row_start + w as usize]);
        }

        Frame {
            data,
            width: w,
            height: h,
        }
    }

    /// View as an `image::GrayImage`, cloning the pixel buffer.
    pub fn to_gray_image(&self) -> image::GrayImage {
        image::GrayImage::from_raw(self.width, self.height, self.data.clone())
            .expect("frame buffer length matches dimensions")
    }
}

/// An input image: a file on disk, an in-memory encoded buffer, or an
/// already-decoded pixel grid.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Decoded(Frame),
}

impl ImageSource {
    /// Decode into a grayscale [`Frame`].
    pub fn decode(&self) -> Result<Frame, FrameError> {
        match self {
            ImageSource::Path(path) => Frame::from_path(path),
            ImageSource::Bytes(bytes) => Frame::from_bytes(bytes),
            ImageSource::Decoded(frame) => Ok(frame.clone()),
        }
    }
}

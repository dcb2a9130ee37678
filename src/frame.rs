use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Which side of the device a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// User-facing camera
    Front,
    /// Environment-facing camera
    Rear,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::Front => FacingMode::Rear,
            FacingMode::Rear => FacingMode::Front,
        }
    }
}

/// Uncompressed RGBA frame sampled from a video stream
#[derive(Debug, Clone)]
pub struct RasterFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// RGBA samples, row-major, 4 bytes per pixel
    pub data: Vec<u8>,
    /// When the frame was sampled
    pub timestamp: SystemTime,
}

impl RasterFrame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: SystemTime::now(),
        }
    }

    /// Solid-color frame, mostly useful for mocks and tests
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let data = rgba.iter().copied().cycle().take(pixels * 4).collect();
        Self::new(width, height, data)
    }

    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }

    /// Check the buffer length matches the dimensions
    pub fn validate_size(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_size()
    }
}

/// Encoded still image ready for staging/upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn jpeg(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            content_type: "image/jpeg".to_string(),
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Scale (width, height) down so the longer side fits `max_dimension`,
/// preserving aspect ratio. Dimensions already within bounds are kept.
pub fn clamp_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }

    let scale = max_dimension as f64 / longest as f64;
    let scaled_w = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let scaled_h = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    (scaled_w, scaled_h)
}

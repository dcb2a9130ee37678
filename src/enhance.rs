use crate::config::EnhanceConfig;
use crate::error::{CaptureError, Result};
use crate::frame::{EncodedImage, RasterFrame};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, RgbaImage};
use tracing::{debug, warn};

/// Mid-gray contrast pivot
const CONTRAST_PIVOT: f32 = 128.0;

/// Brightness/contrast correction applied to captured frames before JPEG
/// encoding. Enhancement is best-effort: when it cannot be applied the
/// unmodified frame is encoded instead.
#[derive(Debug, Clone)]
pub struct ImageEnhancer {
    config: EnhanceConfig,
}

impl ImageEnhancer {
    pub fn new(config: EnhanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnhanceConfig {
        &self.config
    }

    /// Adjust RGB channels in place; alpha is left untouched.
    pub fn enhance(&self, frame: &mut RasterFrame) -> Result<()> {
        if !frame.validate_size() {
            return Err(CaptureError::EnhancementFailed {
                details: format!(
                    "buffer of {} bytes cannot hold {}x{} RGBA",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ),
            }
            .into());
        }

        let lut = self.lookup_table();
        for pixel in frame.data.chunks_exact_mut(RasterFrame::BYTES_PER_PIXEL) {
            pixel[0] = lut[pixel[0] as usize];
            pixel[1] = lut[pixel[1] as usize];
            pixel[2] = lut[pixel[2] as usize];
        }

        Ok(())
    }

    /// Per-channel mapping: brightness first, then contrast around 128
    fn lookup_table(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (value, slot) in lut.iter_mut().enumerate() {
            let bright = value as f32 * self.config.brightness;
            let adjusted = (bright - CONTRAST_PIVOT) * self.config.contrast + CONTRAST_PIVOT;
            *slot = adjusted.round().clamp(0.0, 255.0) as u8;
        }
        lut
    }

    /// Enhance (if enabled) and JPEG-encode a captured frame.
    pub fn process(&self, mut frame: RasterFrame) -> Result<EncodedImage> {
        if self.config.enabled {
            let original = frame.data.clone();
            if let Err(e) = self.enhance(&mut frame) {
                warn!("Enhancement skipped, using unmodified frame: {}", e);
                frame.data = original;
            }
        }

        self.encode(&frame)
    }

    /// Encode an RGBA frame as JPEG at the configured quality
    pub fn encode(&self, frame: &RasterFrame) -> Result<EncodedImage> {
        let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| CaptureError::Encode {
                details: format!(
                    "buffer of {} bytes cannot hold {}x{} RGBA",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ),
            })?;
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, self.config.jpeg_quality)
            .encode(rgb.as_raw(), frame.width, frame.height, ColorType::Rgb8)
            .map_err(|e| CaptureError::Encode {
                details: format!("Failed to encode JPEG: {}", e),
            })?;

        debug!(
            "Encoded {}x{} frame as JPEG ({} bytes, quality {})",
            frame.width,
            frame.height,
            output.len(),
            self.config.jpeg_quality
        );

        Ok(EncodedImage::jpeg(output, frame.width, frame.height))
    }
}

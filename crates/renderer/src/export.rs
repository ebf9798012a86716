use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::EngineError;
use crate::types::{ExportFormat, ProcessedResult};

/// Quality used for JPEG output when the caller does not pick one.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encodes a processed image into `format`.
///
/// `quality` only affects JPEG and is clamped to 1..=100. JPEG has no alpha
/// channel, so alpha is dropped for that format.
pub fn export_encoded(
    result: &ProcessedResult,
    format: ExportFormat,
    quality: Option<u8>,
) -> Result<Vec<u8>, EngineError> {
    let expected = result.width as usize * result.height as usize * 4;
    if result.pixels.len() != expected {
        return Err(EngineError::InvalidImage(format!(
            "result buffer holds {} bytes but {}x{} RGBA8 needs {expected}",
            result.pixels.len(),
            result.width,
            result.height
        )));
    }

    let mut encoded = Vec::new();
    match format {
        ExportFormat::Png => PngEncoder::new(&mut encoded).write_image(
            &result.pixels,
            result.width,
            result.height,
            ExtendedColorType::Rgba8,
        )?,
        ExportFormat::Jpeg => {
            let quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
            let rgb: Vec<u8> = result
                .pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            JpegEncoder::new_with_quality(&mut encoded, quality).write_image(
                &rgb,
                result.width,
                result.height,
                ExtendedColorType::Rgb8,
            )?
        }
        ExportFormat::Bmp => BmpEncoder::new(&mut encoded).write_image(
            &result.pixels,
            result.width,
            result.height,
            ExtendedColorType::Rgba8,
        )?,
    }

    tracing::debug!(
        %format,
        width = result.width,
        height = result.height,
        bytes = encoded.len(),
        "encoded result"
    );
    Ok(encoded)
}

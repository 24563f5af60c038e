//! Image encoding: `DynamicImage` → base64 PNG for the model request body.
//!
//! PNG over JPEG because it is lossless — text crispness matters far more
//! than payload size for transcription accuracy, and compression artefacts
//! on rendered text measurably degrade vision-model output.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A rendered page ready for the vision model.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index.
    pub page_index: usize,
    /// Base64-encoded PNG bytes.
    pub base64_png: String,
}

/// Encode a rasterised page as base64 PNG.
pub fn encode_page(page_index: usize, img: &DynamicImage) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let base64_png = STANDARD.encode(&buf);
    debug!(
        "Encoded page {} -> {} bytes base64",
        page_index + 1,
        base64_png.len()
    );

    Ok(PageImage {
        page_index,
        base64_png,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let page = encode_page(0, &img).expect("encode should succeed");
        assert_eq!(page.page_index, 0);
        assert!(!page.base64_png.is_empty());
        // Verify it's valid base64
        let decoded = STANDARD.decode(&page.base64_png).expect("valid base64");
        assert!(!decoded.is_empty());
    }
}

//! PDF rasterisation: render every page of the uploaded bytes to a
//! `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so Tokio workers are not stalled by CPU-heavy rendering.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly; capping the longest rendered edge keeps memory
//! bounded regardless of physical page size, and the resulting 1–2k px
//! images sit in the sweet spot for vision-model input anyway.

use crate::error::{AnalysisError, Stage};
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Rasterise all pages of a PDF held in memory.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound.
///
/// # Returns
/// `(page_index_0based, image)` tuples in page order, plus the total page
/// count.
pub async fn render_pages(
    pdf_bytes: Vec<u8>,
    max_pixels: u32,
) -> Result<(Vec<(usize, DynamicImage)>, usize), AnalysisError> {
    let result =
        tokio::task::spawn_blocking(move || render_pages_blocking(&pdf_bytes, max_pixels))
            .await
            .map_err(|e| AnalysisError::Internal {
                stage: Stage::Scan,
                detail: format!("Render task panicked: {e}"),
            })?;

    result
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_bytes: &[u8],
    max_pixels: u32,
) -> Result<(Vec<(usize, DynamicImage)>, usize), AnalysisError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| AnalysisError::UnsupportedDocument {
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(AnalysisError::UnsupportedDocument {
            detail: "document has zero pages".into(),
        });
    }
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| AnalysisError::UnsupportedDocument {
                    detail: format!("rasterisation failed on page {}: {e:?}", idx + 1),
                })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} -> {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push((idx, image));
    }

    Ok((results, total_pages))
}

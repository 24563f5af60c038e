//! Pipeline stages for PDF analysis.
//!
//! Each submodule implements exactly one transformation step, keeping
//! stages independently testable and swappable.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ scan ──▶ cleanup ──▶ analyze
//! (pdfium)  (base64)   (vision)  (text fixes) (language model)
//! ```
//!
//! 1. [`render`]  — rasterise every page from the uploaded bytes; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`encode`]  — PNG-encode and base64-wrap each page image for the
//!    multimodal request body
//! 3. [`scan`]    — drive the vision model per page with retry/backoff and
//!    bounded concurrency, then reassemble strictly by page index
//! 4. [`cleanup`] — deterministic fixes for model output quirks
//! 5. [`analyze`] — one language-model call over the assembled text, with
//!    the deterministic truncation policy for oversized documents

pub mod analyze;
pub mod cleanup;
pub mod encode;
pub mod render;
pub mod scan;

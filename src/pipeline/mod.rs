//! Stages of the PDF-to-Markdown transcription.
//!
//! ```text
//! input ──▶ pdfium ──▶ render ──▶ encode ──▶ vlm ──▶ postprocess
//! (URL/path) (bind)    (pages)    (base64)   (LLM)   (cleanup)
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`pdfium`]: locate and bind the pdfium shared library
//! 3. [`render`]: rasterise selected pages in `spawn_blocking`
//! 4. [`encode`]: PNG-encode and base64-wrap each page image
//! 5. [`vlm`]: one vision call per page, bounded by a timeout
//! 6. [`postprocess`]: deterministic cleanup of model quirks

pub mod encode;
pub mod input;
pub mod pdfium;
pub mod postprocess;
pub mod render;
pub mod vlm;

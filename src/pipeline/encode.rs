//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG keeps glyph edges crisp, which matters more than payload size when a
//! model has to read subscripts. `detail: "high"` asks OpenAI-style models
//! for the full tile budget so small print is not downsampled away.

use crate::error::PageError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page (1-indexed `page_num`) as a base64 PNG.
pub fn encode_page(page_num: usize, img: &DynamicImage) -> Result<ImageData, PageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PageError::EncodeFailed {
            page: page_num,
            detail: e.to_string(),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("Page {}: {} bytes PNG → {} bytes base64", page_num, buf.len(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

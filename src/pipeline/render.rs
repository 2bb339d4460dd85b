//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! pdfium is a blocking C++ library with thread-local state, so all calls
//! run inside `tokio::task::spawn_blocking`. The longest rendered edge is
//! capped by `max_rendered_pixels` so that poster-sized pages stay within
//! VLM upload limits.

use crate::config::ConversionConfig;
use crate::error::Pdf2AnkiError;
use crate::output::DocumentMetadata;
use crate::pipeline::pdfium::bind_pdfium;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rasterise selected pages of a PDF.
///
/// Returns `(page_index_0based, image)` pairs in page order. Indices past the
/// end of the document are skipped with a warning.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ConversionConfig,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Pdf2AnkiError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, dpi, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| Pdf2AnkiError::Internal(format!("Render task panicked: {}", e)))?
}

/// Map a pdfium load error to the matching fatal error.
fn load_error(path: &Path, password: Option<&str>, err: PdfiumError) -> Pdf2AnkiError {
    let detail = format!("{:?}", err);
    let path = path.to_path_buf();
    if detail.to_lowercase().contains("password") {
        if password.is_some() {
            Pdf2AnkiError::WrongPassword { path }
        } else {
            Pdf2AnkiError::PasswordRequired { path }
        }
    } else {
        Pdf2AnkiError::CorruptPdf { path, detail }
    }
}

/// Pixel size of a page rendered at `dpi`, with the longest edge capped at `max_pixels`.
///
/// Page dimensions are in PDF points (1/72 inch).
fn target_size(width_pt: f32, height_pt: f32, dpi: u32, max_pixels: u32) -> (i32, i32) {
    let scale = dpi as f32 / 72.0;
    let mut w = (width_pt * scale).round().max(1.0);
    let mut h = (height_pt * scale).round().max(1.0);
    let longest = w.max(h);
    if longest > max_pixels as f32 {
        let shrink = max_pixels as f32 / longest;
        w = (w * shrink).round().max(1.0);
        h = (h * shrink).round().max(1.0);
    }
    (w as i32, h as i32)
}

fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Pdf2AnkiError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                idx + 1,
                total_pages
            );
            continue;
        }

        let rasterisation_failed = |e: PdfiumError| Pdf2AnkiError::RasterisationFailed {
            page: idx + 1,
            detail: format!("{:?}", e),
        };

        let page = pages.get(idx as u16).map_err(rasterisation_failed)?;

        let (width, height) = target_size(
            page.width().value,
            page.height().value,
            dpi,
            max_pixels,
        );
        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_maximum_height(height);

        let image = page
            .render_with_config(&render_config)
            .map_err(rasterisation_failed)?
            .as_image();

        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push((idx, image));
    }

    Ok(results)
}

/// Extract document metadata from a PDF without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2AnkiError> {
    let path: PathBuf = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Pdf2AnkiError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2AnkiError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

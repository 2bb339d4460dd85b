//! The whole run: PDF → Markdown → flashcard CSV on disk.

use crate::config::FlashcardConfig;
use crate::convert::convert_pdf_to_markdown;
use crate::error::Pdf2AnkiError;
use crate::generate::generate_qa_csv;
use crate::output::FlashcardOutput;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Output path used when the caller gives none.
pub const DEFAULT_OUTPUT_PATH: &str = "output.csv";

/// Convert `input` and write the generated flashcards to `output_csv_path`.
///
/// The CSV file holds the model's reply byte-for-byte.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2anki::{process, FlashcardConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let out = process("lecture3.pdf", "lecture3.csv", &FlashcardConfig::default()).await?;
/// eprintln!("{} cards", out.generated.rows);
/// # Ok(())
/// # }
/// ```
pub async fn process(
    input: impl AsRef<str>,
    output_csv_path: impl AsRef<Path>,
    config: &FlashcardConfig,
) -> Result<FlashcardOutput, Pdf2AnkiError> {
    let markdown = convert_pdf_to_markdown(input, &config.conversion).await?;
    let generated = generate_qa_csv(&markdown.markdown, config).await?;

    let csv_path = output_csv_path.as_ref().to_path_buf();
    write_output(&csv_path, &generated.csv).await?;
    info!("CSV file saved to {}", csv_path.display());

    Ok(FlashcardOutput {
        csv_path,
        markdown,
        generated,
    })
}

/// Blocking wrapper around [`process`].
///
/// Creates a tokio runtime internally; do not call from async code.
pub fn process_sync(
    input: impl AsRef<str>,
    output_csv_path: impl AsRef<Path>,
    config: &FlashcardConfig,
) -> Result<FlashcardOutput, Pdf2AnkiError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2AnkiError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(input, output_csv_path, config))
}

/// Write `contents` to `path` atomically: temp file in the same directory,
/// then rename. Missing parent directories are created.
///
/// Used for the CSV and for the optional Markdown dump.
pub async fn write_output(path: &Path, contents: &str) -> Result<(), Pdf2AnkiError> {
    let write_failed = |source: std::io::Error| Pdf2AnkiError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = temp_path_for(path);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    Ok(())
}

/// `deck.csv` → `deck.csv.tmp`, next to the target.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}

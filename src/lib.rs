//! # edgequake-pdf2anki
//!
//! Turn PDF lecture notes and slides into Anki flashcards.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Render    rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Encode    PNG → base64 ImageData
//!  ├─ 4. VLM       one vision call per page, bounded concurrency
//!  ├─ 5. Polish    deterministic Markdown cleanup
//!  ├─ 6. Generate  one LLM call: study prompt + Markdown → CSV text
//!  └─ 7. Write     CSV (semicolon separated, no header) to disk
//! ```
//!
//! Transcribing page images with a vision model keeps equations, subscripts
//! and tables intact, which plain text extraction garbles. The generation
//! prompt then asks for LaTeX in Anki's `\( … \)` / `\[ … \]` delimiters.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2anki::{process, ConversionConfig, FlashcardConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conversion = ConversionConfig::builder()
//!         .provider_name("gemini")
//!         .model("gemini-2.5-pro")
//!         .build()?;
//!     let config = FlashcardConfig::builder().conversion(conversion).build()?;
//!
//!     let out = process("lecture.pdf", "lecture.csv", &config).await?;
//!     eprintln!("{} rows written to {}", out.generated.rows, out.csv_path.display());
//!     Ok(())
//! }
//! ```
//!
//! The two stages are also usable on their own:
//! [`convert_pdf_to_markdown`] and [`generate_qa_csv`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2anki` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod provider;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, FidelityTier, FlashcardConfig,
    FlashcardConfigBuilder, PageSelection, PageSeparator,
};
pub use convert::{convert_pdf_to_markdown, inspect};
pub use error::{PageError, Pdf2AnkiError};
pub use generate::{generate_qa_csv, generate_with_provider};
pub use output::{
    ConversionStats, DocumentMetadata, FlashcardOutput, GeneratedCsv, MarkdownOutput, PageResult,
};
pub use process::{process, process_sync, write_output, DEFAULT_OUTPUT_PATH};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use prompts::{build_flashcard_prompt, DEFAULT_FLASHCARD_PROMPT};

//! Result types produced by the pipeline.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of transcribing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Cleaned Markdown for the page. Empty when `error` is set.
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Set when the page could not be transcribed.
    pub error: Option<PageError>,
}

impl PageResult {
    /// A failed page with no content.
    pub fn failed(page_num: usize, error: PageError, duration_ms: u64) -> Self {
        Self {
            page_num,
            markdown: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Metadata read from the PDF document information dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Counters for the transcription stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages transcribed successfully.
    pub processed_pages: usize,
    /// Pages that failed.
    pub failed_pages: usize,
    /// Selected pages that never reached the VLM (render skipped them).
    pub skipped_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// The assembled Markdown document and everything learned along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownOutput {
    pub markdown: String,
    /// Per-page results, sorted by page number.
    pub pages: Vec<PageResult>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

/// The generation model's reply, exactly as received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCsv {
    /// Reply text. Written to disk unchanged.
    pub csv: String,
    /// Non-blank lines in `csv`; an estimate of the card count.
    pub rows: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Everything a [`crate::process::process`] run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardOutput {
    /// Where the CSV was written.
    pub csv_path: PathBuf,
    pub markdown: MarkdownOutput,
    pub generated: GeneratedCsv,
}

impl FlashcardOutput {
    /// Tokens spent across both stages, as (input, output).
    pub fn total_tokens(&self) -> (u64, u64) {
        (
            self.markdown.stats.total_input_tokens + self.generated.input_tokens,
            self.markdown.stats.total_output_tokens + self.generated.output_tokens,
        )
    }
}

/// Count the non-blank lines of a reply.
///
/// This is not CSV parsing: quoted fields spanning lines count once per
/// line. It is only used for progress and summary output.
pub fn count_rows(csv: &str) -> usize {
    csv.lines().filter(|l| !l.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_rows_skips_blank_lines() {
        let csv = "What is GDP?;Gross domestic product\n\n  \nDefine \\( r \\);Interest rate\n";
        assert_eq!(count_rows(csv), 2);
        assert_eq!(count_rows(""), 0);
    }

    #[test]
    fn failed_page_has_no_content() {
        let p = PageResult::failed(
            3,
            PageError::Timeout { page: 3, secs: 60 },
            60_000,
        );
        assert!(!p.is_ok());
        assert!(p.markdown.is_empty());
        assert_eq!(p.page_num, 3);
    }

    #[test]
    fn total_tokens_sums_both_stages() {
        let out = FlashcardOutput {
            csv_path: PathBuf::from("output.csv"),
            markdown: MarkdownOutput {
                markdown: "# Notes\n".into(),
                pages: vec![],
                metadata: DocumentMetadata::default(),
                stats: ConversionStats {
                    total_input_tokens: 1000,
                    total_output_tokens: 400,
                    ..Default::default()
                },
            },
            generated: GeneratedCsv {
                csv: "a;b\n".into(),
                rows: 1,
                input_tokens: 500,
                output_tokens: 50,
                duration_ms: 10,
            },
        };
        assert_eq!(out.total_tokens(), (1500, 450));
    }
}

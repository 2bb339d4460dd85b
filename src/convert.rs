//! PDF → Markdown: the transcription stage.
//!
//! Pages are collected in memory and assembled once every page has been
//! attempted. A page failure is tolerated; a document where every page
//! failed is not.

use crate::config::ConversionConfig;
use crate::error::{PageError, Pdf2AnkiError};
use crate::output::{ConversionStats, DocumentMetadata, MarkdownOutput, PageResult};
use crate::pipeline::{encode, input, postprocess, render, vlm};
use crate::provider::{resolve_provider, ProviderRequest};
use edgequake_llm::{ImageData, LLMProvider};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL to Markdown.
///
/// # Returns
/// `Ok(MarkdownOutput)` even if some pages failed
/// (check `output.stats.failed_pages`).
///
/// # Errors
/// - File not found / permission denied / not a PDF
/// - Selection matched no page
/// - Provider could not be created
/// - Every page failed
pub async fn convert_pdf_to_markdown(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<MarkdownOutput, Pdf2AnkiError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Step 2: Provider ─────────────────────────────────────────────────
    let provider = resolve_provider(ProviderRequest {
        provider: config.provider.as_ref(),
        provider_name: config.provider_name.as_deref(),
        model: config.model.as_deref(),
        api_key: config.api_key.as_deref(),
    })?;

    // ── Step 3: Metadata and page selection ──────────────────────────────
    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!("PDF has {} pages", total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(Pdf2AnkiError::NoPagesSelected { total: total_pages });
    }
    debug!("Selected {} pages for conversion", page_indices.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(page_indices.len());
    }

    // ── Step 4: Rasterise ────────────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = render::render_pages(&pdf_path, config, &page_indices).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", rendered.len(), render_duration_ms);

    // ── Step 5: Encode ───────────────────────────────────────────────────
    let mut encoded = Vec::with_capacity(rendered.len());
    let mut encode_failures: Vec<PageResult> = Vec::new();
    for (idx, img) in &rendered {
        match encode::encode_page(idx + 1, img) {
            Ok(data) => encoded.push((*idx, data)),
            Err(e) => {
                warn!("{}", e);
                encode_failures.push(PageResult::failed(idx + 1, e, 0));
            }
        }
    }
    drop(rendered);

    // ── Step 6: Transcribe ───────────────────────────────────────────────
    let llm_start = Instant::now();
    let transcribed = if config.maintain_format {
        process_sequential(&provider, &encoded, config).await
    } else {
        process_concurrent(&provider, &encoded, config).await
    };
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 7: Clean up and order ───────────────────────────────────────
    let pages = merge_pages(encode_failures, transcribed);

    // ── Step 8: Stats ────────────────────────────────────────────────────
    let processed = pages.iter().filter(|p| p.is_ok()).count();
    let failed = pages.len() - processed;
    let skipped = page_indices.len().saturating_sub(pages.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(page_indices.len(), processed);
    }

    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(PageError::to_string)
            .unwrap_or_else(|| "No page could be rendered".to_string());

        return Err(Pdf2AnkiError::AllPagesFailed {
            total: page_indices.len(),
            first_error,
        });
    }

    // ── Step 9: Assemble ─────────────────────────────────────────────────
    let markdown = assemble_document(&pages, config, &metadata);

    let stats = ConversionStats {
        total_pages,
        processed_pages: processed,
        failed_pages: failed,
        skipped_pages: skipped,
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        llm_duration_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {}ms total",
        processed,
        page_indices.len(),
        stats.total_duration_ms
    );

    Ok(MarkdownOutput {
        markdown,
        pages,
        metadata,
        stats,
    })
}

/// Extract PDF metadata without converting content.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Pdf2AnkiError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), None).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn report(config: &ConversionConfig, result: &PageResult, total_pages: usize) {
    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_page_complete(result.page_num, total_pages, result.markdown.len()),
            Some(e) => cb.on_page_error(result.page_num, total_pages, &e.to_string()),
        }
    }
}

/// Transcribe pages concurrently, at most `config.concurrency` in flight.
async fn process_concurrent(
    provider: &Arc<dyn LLMProvider>,
    pages: &[(usize, ImageData)],
    config: &ConversionConfig,
) -> Vec<PageResult> {
    let total_pages = pages.len();
    stream::iter(pages.iter().map(|(idx, img_data)| {
        let page_num = idx + 1;
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(page_num, total_pages);
            }
            let result = vlm::process_page(provider, page_num, img_data.clone(), None, config).await;
            report(config, &result, total_pages);
            result
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

/// Transcribe pages one by one, passing each page's Markdown as context
/// for the next.
async fn process_sequential(
    provider: &Arc<dyn LLMProvider>,
    pages: &[(usize, ImageData)],
    config: &ConversionConfig,
) -> Vec<PageResult> {
    let mut results = Vec::with_capacity(pages.len());
    let mut prior_markdown: Option<String> = None;
    let total_pages = pages.len();

    for (idx, img_data) in pages {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }
        let result = vlm::process_page(
            provider,
            page_num,
            img_data.clone(),
            prior_markdown.as_deref(),
            config,
        )
        .await;
        report(config, &result, total_pages);

        if result.is_ok() {
            prior_markdown = Some(result.markdown.clone());
        }
        results.push(result);
    }

    results
}

/// Clean transcribed Markdown and merge it with pages that never reached
/// the model, in page order.
fn merge_pages(mut pages: Vec<PageResult>, transcribed: Vec<PageResult>) -> Vec<PageResult> {
    pages.extend(transcribed.into_iter().map(|mut pr| {
        if pr.is_ok() {
            pr.markdown = postprocess::clean_markdown(&pr.markdown);
        }
        pr
    }));
    pages.sort_by_key(|p| p.page_num);
    pages
}

/// Join successful pages (already sorted) with the configured separator.
pub(crate) fn assemble_document(
    pages: &[PageResult],
    config: &ConversionConfig,
    metadata: &DocumentMetadata,
) -> String {
    let mut out = String::new();
    let has_content = pages
        .iter()
        .any(|p| p.is_ok() && !p.markdown.trim().is_empty());

    // No front matter without page content.
    if config.include_metadata && has_content {
        out.push_str(&format_yaml_front_matter(metadata));
    }

    for (i, page) in pages.iter().filter(|p| p.is_ok()).enumerate() {
        if i > 0 {
            // Pages already end with one newline.
            out.truncate(out.trim_end_matches('\n').len());
            out.push_str(&config.page_separator.render(page.page_num));
        }
        out.push_str(&page.markdown);
    }

    out
}

/// Format document metadata as YAML front matter.
fn format_yaml_front_matter(meta: &DocumentMetadata) -> String {
    let quote = |s: &str| s.replace('\\', "\\\\").replace('"', "\\\"");
    let mut yaml = String::from("---\n");

    let fields = [
        ("title", &meta.title),
        ("author", &meta.author),
        ("subject", &meta.subject),
        ("creator", &meta.creator),
        ("producer", &meta.producer),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            yaml.push_str(&format!("{}: \"{}\"\n", key, quote(v)));
        }
    }
    yaml.push_str(&format!("pages: {}\n", meta.page_count));
    if !meta.pdf_version.is_empty() {
        yaml.push_str(&format!("pdf_version: \"{}\"\n", quote(&meta.pdf_version)));
    }

    yaml.push_str("---\n\n");
    yaml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSeparator;
    use crate::progress::PipelineProgressCallback;
    use crate::test_support::ScriptedProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn images(indices: &[usize]) -> Vec<(usize, ImageData)> {
        indices
            .iter()
            .map(|&i| (i, ImageData::new("aGVsbG8=", "image/png")))
            .collect()
    }

    #[derive(Default)]
    struct PageCounter {
        ok: AtomicUsize,
        failed: AtomicUsize,
    }

    impl PipelineProgressCallback for PageCounter {
        fn on_page_complete(&self, _page: usize, _total: usize, _len: usize) {
            self.ok.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _page: usize, _total: usize, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn page(n: usize, md: &str) -> PageResult {
        PageResult {
            page_num: n,
            markdown: md.to_string(),
            input_tokens: 10,
            output_tokens: 5,
            duration_ms: 1,
            error: None,
        }
    }

    #[test]
    fn assemble_skips_failed_pages() {
        let pages = vec![
            page(1, "# Intro\n"),
            PageResult::failed(2, PageError::Timeout { page: 2, secs: 60 }, 0),
            page(3, "## Utility\n"),
        ];
        let config = ConversionConfig::builder()
            .page_separator(PageSeparator::Comment)
            .build()
            .unwrap();
        let md = assemble_document(&pages, &config, &DocumentMetadata::default());
        assert_eq!(md, "# Intro\n\n<!-- page 3 -->\n\n## Utility\n");
    }

    #[test]
    fn assemble_default_separator_is_blank_line() {
        let pages = vec![page(1, "one\n"), page(2, "two\n")];
        let md = assemble_document(&pages, &ConversionConfig::default(), &DocumentMetadata::default());
        assert_eq!(md, "one\n\ntwo\n");
    }

    #[test]
    fn front_matter_escapes_quotes() {
        let meta = DocumentMetadata {
            title: Some("The \"Good\" Lecture".into()),
            page_count: 12,
            pdf_version: "Pdf1_7".into(),
            ..Default::default()
        };
        let yaml = format_yaml_front_matter(&meta);
        assert!(yaml.starts_with("---\ntitle: \"The \\\"Good\\\" Lecture\"\n"));
        assert!(yaml.contains("pages: 12\n"));
        assert!(yaml.ends_with("---\n\n"));
        assert!(!yaml.contains("author"));
    }

    #[test]
    fn assemble_with_metadata_prepends_front_matter() {
        let config = ConversionConfig::builder()
            .include_metadata(true)
            .build()
            .unwrap();
        let meta = DocumentMetadata {
            page_count: 1,
            ..Default::default()
        };
        let md = assemble_document(&[page(1, "body\n")], &config, &meta);
        assert_eq!(md, "---\npages: 1\n---\n\nbody\n");
    }

    #[test]
    fn blank_pages_get_no_front_matter() {
        let config = ConversionConfig::builder()
            .include_metadata(true)
            .build()
            .unwrap();
        let meta = DocumentMetadata {
            title: Some("Week 4".into()),
            page_count: 2,
            ..Default::default()
        };
        let md = assemble_document(&[page(1, "\n"), page(2, "  \n")], &config, &meta);
        assert!(md.trim().is_empty(), "got {md:?}");
    }

    #[tokio::test]
    async fn failed_page_is_skipped_and_order_kept() {
        let scripted = Arc::new(
            ScriptedProvider::new()
                .reply("```markdown\n# Supply\n```", 100, 10)
                .fail("upstream 503")
                .reply("# Demand  \n", 120, 12),
        );
        let provider: Arc<dyn LLMProvider> = scripted.clone();
        let counter = Arc::new(PageCounter::default());
        let config = ConversionConfig::builder()
            .concurrency(1)
            .page_separator(PageSeparator::Comment)
            .progress_callback(counter.clone())
            .build()
            .unwrap();

        let transcribed = process_concurrent(&provider, &images(&[0, 1, 2]), &config).await;
        let pages = merge_pages(Vec::new(), transcribed);

        assert_eq!(scripted.call_count(), 3);
        assert_eq!(pages.iter().map(|p| p.page_num).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(matches!(pages[1].error, Some(PageError::LlmFailed { page: 2, .. })));
        assert_eq!(counter.ok.load(Ordering::SeqCst), 2);
        assert_eq!(counter.failed.load(Ordering::SeqCst), 1);

        let md = assemble_document(&pages, &config, &DocumentMetadata::default());
        assert_eq!(md, "# Supply\n\n<!-- page 3 -->\n\n# Demand\n");
    }

    #[tokio::test]
    async fn encode_failures_merge_in_page_order() {
        let provider: Arc<dyn LLMProvider> = Arc::new(
            ScriptedProvider::new().reply("page one", 1, 1).reply("page three", 1, 1),
        );
        let config = ConversionConfig::builder().concurrency(1).build().unwrap();

        let transcribed = process_concurrent(&provider, &images(&[0, 2]), &config).await;
        let encode_failed = vec![PageResult::failed(
            2,
            PageError::EncodeFailed { page: 2, detail: "bad image".into() },
            0,
        )];
        let pages = merge_pages(encode_failed, transcribed);

        assert_eq!(pages.iter().map(|p| p.page_num).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(pages[0].markdown, "page one\n");
        assert!(!pages[1].is_ok());
    }

    #[tokio::test]
    async fn sequential_mode_passes_last_good_page_as_context() {
        let scripted = Arc::new(
            ScriptedProvider::new()
                .reply("# Lemma 1", 1, 1)
                .fail("timeout upstream")
                .reply("continued proof", 1, 1),
        );
        let provider: Arc<dyn LLMProvider> = scripted.clone();
        let config = ConversionConfig::builder()
            .maintain_format(true)
            .build()
            .unwrap();

        let results = process_sequential(&provider, &images(&[0, 1, 2]), &config).await;

        assert_eq!(results.len(), 3);
        let calls = scripted.calls.lock().unwrap();
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[1].len(), 3);
        assert!(calls[1][1].content.contains("# Lemma 1"));
        assert!(calls[2][1].content.contains("# Lemma 1"));
    }
}

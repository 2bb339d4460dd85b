//! CLI binary for edgequake-pdf2anki.
//!
//! Maps CLI flags to `FlashcardConfig`, runs the two stages and writes
//! the flashcard CSV.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2anki::{
    convert_pdf_to_markdown, generate_qa_csv, inspect, write_output, ConversionConfig,
    FidelityTier, FlashcardConfig, FlashcardOutput, PageSelection, PageSeparator,
    PipelineProgressCallback, ProgressCallback, DEFAULT_OUTPUT_PATH,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a page bar while transcribing, then a spinner while
/// the flashcards are generated.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&page_num))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
    }

    fn on_page_complete(&self, page_num: usize, total: usize, markdown_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        let line = if failed == 0 {
            format!("{} {} pages transcribed", green("✔"), bold(&success_count.to_string()))
        } else {
            format!(
                "{} {}/{} pages transcribed  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            )
        };
        self.bar.println(line);
    }

    fn on_generation_start(&self, markdown_len: usize) {
        self.bar.set_style(spinner_style());
        self.bar.set_prefix("Generating");
        self.bar.set_message(format!("flashcards from {markdown_len} chars of notes…"));
        self.bar.reset_elapsed();
    }

    fn on_generation_complete(&self, rows: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} flashcard rows generated", green("✔"), bold(&rows.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Flashcards from lecture notes (writes output.csv)
  pdf2anki lecture.pdf

  # Choose the output file
  pdf2anki lecture.pdf -o decks/lecture-03.csv

  # Gemini for both stages, key on the command line
  pdf2anki --provider gemini --api-key $KEY slides.pdf

  # Cheap vision model for transcription, stronger model for the cards
  pdf2anki --provider openai --model gpt-4.1-nano --qa-model gpt-4.1 notes.pdf

  # Only some slides, keep the transcription for review
  pdf2anki --pages 5-40 --save-markdown notes.md slides.pdf

  # Your own instructions instead of the built-in study prompt
  pdf2anki --prompt-file cloze-prompt.txt notes.pdf

  # Inspect PDF metadata (no API key needed)
  pdf2anki --inspect-only lecture.pdf

IMPORTING INTO ANKI:
  File → Import → choose the CSV → Field separator: Semicolon.
  Maths renders through Anki's MathJax: \( … \) inline, \[ … \] display.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  EDGEQUAKE_MODEL         Model used when --model is not given
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. edgequake_pdf2anki=debug
"#;

/// Turn PDF lecture notes into Anki flashcards.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2anki",
    version,
    about = "Turn PDF lecture notes into Anki flashcards (semicolon-separated CSV)",
    long_about = "Transcribe a PDF (local file or URL) to Markdown with a vision LLM, then \
ask an LLM for question/answer pairs covering every definition, theorem, derivation and \
formula, and write them as a semicolon-separated CSV ready for Anki import.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the flashcard CSV to this file.
    #[arg(short, long, env = "PDF2ANKI_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Text file with a custom generation prompt; the Markdown is appended after it.
    #[arg(long, env = "PDF2ANKI_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Also write the intermediate Markdown to this file.
    #[arg(long, env = "PDF2ANKI_SAVE_MARKDOWN")]
    save_markdown: Option<PathBuf>,

    /// LLM model ID for transcription (and generation unless --qa-model is set).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, mistral, ollama, …
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// API key for the provider. Without --provider, selects gemini.
    #[arg(long, env = "PDF2ANKI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model for flashcard generation.
    #[arg(long, env = "PDF2ANKI_QA_MODEL")]
    qa_model: Option<String>,

    /// Provider for flashcard generation.
    #[arg(long, env = "PDF2ANKI_QA_PROVIDER")]
    qa_provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2ANKI_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Number of concurrent page transcriptions.
    #[arg(short, long, env = "PDF2ANKI_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Sequential mode: pass previous page as context for continuity.
    #[arg(long, env = "PDF2ANKI_MAINTAIN_FORMAT")]
    maintain_format: bool,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2ANKI_PAGES", default_value = "all")]
    pages: String,

    /// Transcription detail: tier1 (text), tier2 (+tables), tier3 (+LaTeX maths).
    #[arg(long, env = "PDF2ANKI_FIDELITY", value_enum, default_value = "tier3")]
    fidelity: FidelityArg,

    /// Page separator in the Markdown: none, hr, comment, or custom string.
    #[arg(long, env = "PDF2ANKI_SEPARATOR", default_value = "none")]
    separator: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2ANKI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDF2ANKI_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Max LLM output tokens for the flashcard CSV.
    #[arg(long, env = "PDF2ANKI_QA_MAX_TOKENS", default_value_t = 16384)]
    qa_max_tokens: usize,

    /// Transcription temperature (0.0–2.0).
    #[arg(long, env = "PDF2ANKI_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Generation temperature (0.0–2.0).
    #[arg(long, env = "PDF2ANKI_QA_TEMPERATURE", default_value_t = 0.2)]
    qa_temperature: f32,

    /// Prepend YAML front-matter with document metadata to the Markdown.
    #[arg(long, env = "PDF2ANKI_METADATA")]
    metadata: bool,

    /// Print a JSON run report to stdout.
    #[arg(long, env = "PDF2ANKI_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2ANKI_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long, env = "PDF2ANKI_INSPECT_ONLY")]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2ANKI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2ANKI_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2ANKI_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-page transcription timeout in seconds.
    #[arg(long, env = "PDF2ANKI_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Flashcard generation timeout in seconds.
    #[arg(long, env = "PDF2ANKI_QA_TIMEOUT", default_value_t = 300)]
    qa_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FidelityArg {
    Tier1,
    Tier2,
    Tier3,
}

impl From<FidelityArg> for FidelityTier {
    fn from(v: FidelityArg) -> Self {
        match v {
            FidelityArg::Tier1 => FidelityTier::Tier1,
            FidelityArg::Tier2 => FidelityTier::Tier2,
            FidelityArg::Tier3 => FidelityTier::Tier3,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; INFO logs
    // would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            let optional = [
                ("Title", &meta.title),
                ("Author", &meta.author),
                ("Subject", &meta.subject),
                ("Producer", &meta.producer),
                ("Creator", &meta.creator),
            ];
            for (label, value) in optional {
                if let Some(v) = value {
                    println!("{:<13} {}", format!("{label}:"), v);
                }
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Stage 1: PDF → Markdown ──────────────────────────────────────────
    let markdown = convert_pdf_to_markdown(&cli.input, &config.conversion)
        .await
        .context("Conversion failed")?;

    if let Some(ref md_path) = cli.save_markdown {
        write_output(md_path, &markdown.markdown)
            .await
            .context("Failed to save Markdown")?;
        if !cli.quiet {
            eprintln!("   Markdown saved to {}", bold(&md_path.display().to_string()));
        }
    }

    // ── Stage 2: Markdown → CSV ──────────────────────────────────────────
    let generated = generate_qa_csv(&markdown.markdown, &config)
        .await
        .context("Flashcard generation failed")?;

    write_output(&cli.output, &generated.csv)
        .await
        .context("Failed to write CSV")?;

    let output = FlashcardOutput {
        csv_path: cli.output.clone(),
        markdown,
        generated,
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        let stats = &output.markdown.stats;
        let (tokens_in, tokens_out) = output.total_tokens();
        eprintln!(
            "{}  CSV file saved to {}  ({} rows, {}/{} pages)",
            if stats.failed_pages == 0 { green("✔") } else { cyan("⚠") },
            bold(&output.csv_path.display().to_string()),
            output.generated.rows,
            stats.processed_pages,
            stats.processed_pages + stats.failed_pages + stats.skipped_pages,
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms",
            dim(&tokens_in.to_string()),
            dim(&tokens_out.to_string()),
            stats.total_duration_ms + output.generated.duration_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `FlashcardConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<FlashcardConfig> {
    let pages = parse_pages(&cli.pages)?;
    let separator = parse_separator(&cli.separator);

    let mut conversion = ConversionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .maintain_format(cli.maintain_format)
        .pages(pages)
        .fidelity(cli.fidelity.clone().into())
        .page_separator(separator)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .include_metadata(cli.metadata)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(cb) = progress {
        conversion = conversion.progress_callback(cb);
    }
    if let Some(ref model) = cli.model {
        conversion = conversion.model(model);
    }
    if let Some(ref provider) = cli.provider {
        conversion = conversion.provider_name(provider);
    }
    if let Some(ref key) = cli.api_key {
        conversion = conversion.api_key(key);
    }
    if let Some(ref pwd) = cli.password {
        conversion = conversion.password(pwd);
    }

    let conversion = conversion.build().context("Invalid configuration")?;

    let mut builder = FlashcardConfig::builder()
        .conversion(conversion)
        .temperature(cli.qa_temperature)
        .max_tokens(cli.qa_max_tokens)
        .api_timeout_secs(cli.qa_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.qa_model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.qa_provider {
        builder = builder.provider_name(provider);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    let page_number = |p: &str| -> Result<usize> {
        let n: usize = p
            .trim()
            .parse()
            .with_context(|| format!("Invalid page number: '{}'", p.trim()))?;
        if n < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", n);
        }
        Ok(n)
    };

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start = page_number(start)?;
        let end = page_number(end)?;
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages = s
            .split(',')
            .map(page_number)
            .collect::<Result<Vec<_>>>()?;
        return Ok(PageSelection::Set(pages));
    }

    Ok(PageSelection::Single(page_number(&s)?))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}

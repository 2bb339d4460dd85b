//! Prompts for both pipeline stages.
//!
//! Every prompt lives here so the wording can change without touching the
//! request or error-handling code, and so tests can inspect it directly.

use crate::config::FidelityTier;

/// Transcription rules shared by every fidelity tier.
const TRANSCRIBE_BASE: &str = r#"You are an expert document converter. Your task is to convert a PDF page image to clean, well-structured Markdown.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL text content completely and accurately
   - Maintain the reading order as a human would read the page
   - Correct obvious OCR-like errors only if you are completely certain

2. STRUCTURE
   - Use # for the main page title (at most one per page)
   - Use ## for major sections, ### for subsections
   - Use - for unordered lists and 1. 2. 3. for ordered lists
   - Use **bold** and *italic* to match the visual emphasis"#;

const TRANSCRIBE_TABLES: &str = r#"

3. TABLES AND CODE
   - Convert tables to GFM pipe format
   - If a table is too complex for pipe format, use HTML table markup
   - Wrap code blocks in triple backticks with a language identifier
   - Keep footnotes as [^n] references"#;

const TRANSCRIBE_MATH: &str = r#"

4. MATHEMATICS
   - Transcribe EVERY formula, variable and symbol as LaTeX
   - Use $...$ for inline math and $$...$$ for display equations
   - Keep subscripts, superscripts, Greek letters, fractions, sums and integrals exact
   - Keep each step of a derivation on its own line
   - Describe figures and charts in one italic sentence: *Figure: ...*"#;

const TRANSCRIBE_OUTPUT: &str = r#"

WHAT TO IGNORE
   - Page numbers, repeated headers and footers
   - Decorative borders and lines that carry no content meaning

OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap in ```markdown fences
   - Do NOT add commentary or explanations
   - Start directly with the page content"#;

/// Build the transcription system prompt for a fidelity tier.
pub fn transcription_prompt(tier: FidelityTier) -> String {
    let mut prompt = String::from(TRANSCRIBE_BASE);
    if matches!(tier, FidelityTier::Tier2 | FidelityTier::Tier3) {
        prompt.push_str(TRANSCRIBE_TABLES);
    }
    if tier == FidelityTier::Tier3 {
        prompt.push_str(TRANSCRIBE_MATH);
    }
    prompt.push_str(TRANSCRIBE_OUTPUT);
    prompt
}

/// Build the context message for maintain_format mode.
///
/// Sent as a separate system message containing the prior page's content.
pub fn maintain_format_context(prior_page: &str) -> String {
    format!(
        "The previous page is given below. Continue its numbered lists, derivations and \
heading levels consistently:\n\n\"\"\"{}\"\"\"",
        prior_page
    )
}

/// Built-in flashcard prompt. `{markdown_text}` is replaced by the document.
pub const DEFAULT_FLASHCARD_PROMPT: &str = r#"You are an expert AI assistant specializing in creating study materials for advanced university students. The following text was extracted from PDF lecture notes or slides for an advanced university course. The student is aiming for a top first-class mark.

Your task is to generate high-quality question-and-answer pairs suitable for flashcards (like Anki) covering ALL essential concepts, definitions, theorems, proofs, mathematical derivations, formulas, and key examples from the provided text.

Instructions:
1.  **Comprehensiveness:** Cover all core academic content thoroughly.
2.  **Conciseness:** Omit redundant information, introductory/concluding remarks, bibliographies/references (unless critical to understanding a concept, e.g., citing a specific theorem name), and trivial statements. Focus on the substantive material.
3.  **Format:** Generate the output STRICTLY as semi-colon-separated values (CSV) data with ONLY two columns: "questions" and "answers". Do NOT include a header row. Each row should represent one Q&A pair.
4.  **Math Formatting (CRITICAL):** Ensure ALL mathematical formulas, variables, and symbols are correctly enclosed in LaTeX delimiters suitable for Anki:
    * Use \( ... \) for INLINE math (e.g., \( E[X] = \mu \))
    * Use \[ ... \] for DISPLAY/BLOCK equations (e.g., \[ f(x) = \sum_i a_i x^i \])
    * Pay close attention to subscripts, superscripts, Greek letters, fractions, integrals, sums, etc., and ensure they are correctly represented in LaTeX within the delimiters.
5.  **Quoting:** If a question or answer contains a comma, enclose the entire field in double quotes. If a field contains double quotes, escape them with another double quote (e.g., "He said ""hello"""). Standard CSV quoting rules apply.
6.  **Question Style:** Questions should prompt recall or understanding of specific concepts, definitions, formulas, or steps in a derivation. They should be clear and unambiguous.
7.  **Answer Style:** Answers should be accurate, concise, and directly address the question. For derivations or proofs, outline the key steps or the final result as appropriate.
8.  **Prohibited Symbols:** Since this will be a semi-colon separated CSV, DO NOT USE the ";" symbol anywhere inside a question or answer.

**Input Text:**
```markdown
{markdown_text}
```
**Output (CSV format, no header):**
"#;

const MARKDOWN_PLACEHOLDER: &str = "{markdown_text}";

/// Build the flashcard generation prompt.
///
/// Without a custom prompt the document is embedded in
/// [`DEFAULT_FLASHCARD_PROMPT`]. A custom prompt is used as-is, followed by
/// a blank line and the document.
pub fn build_flashcard_prompt(markdown: &str, custom_prompt: Option<&str>) -> String {
    match custom_prompt {
        None => DEFAULT_FLASHCARD_PROMPT.replacen(MARKDOWN_PLACEHOLDER, markdown.trim_end(), 1),
        Some(prompt) => format!("{}\n\n{}", prompt.trim_end(), markdown.trim_end()),
    }
}

//! Post-processing: deterministic cleanup of VLM-generated Markdown.
//!
//! The transcription is an intermediate product read by another model, not
//! rendered for humans, so the rules here only remove noise that would end
//! up in flashcards: wrapper fences, invented image links, invisible
//! characters and runs of blank lines.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page of raw VLM output.
///
/// Rules (in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip an outer ```` ```markdown ```` fence
/// 3. Trim trailing whitespace per line
/// 4. Replace placeholder image links with their alt text
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Collapse 3+ consecutive blank lines down to 2
/// 7. End with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = trim_trailing_whitespace(&s);
    let s = replace_placeholder_images(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*?)\n?```$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

/// Domains models invent when they cannot reproduce a figure.
const PLACEHOLDER_DOMAINS: [&str; 5] = [
    "example.com",
    "placeholder.com",
    "dummyimage.com",
    "placehold.it",
    "picsum.photos",
];

fn is_placeholder_url(url: &str) -> bool {
    let u = url.trim();
    if !(u.starts_with("http://") || u.starts_with("https://")) {
        return true;
    }
    PLACEHOLDER_DOMAINS.iter().any(|d| u.contains(d))
}

/// A page image has no URL of its own, so any image link is invented.
/// Keep the description as an italic caption.
fn replace_placeholder_images(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if !is_placeholder_url(&caps[2]) {
                caps[0].to_string()
            } else if alt.is_empty() {
                String::new()
            } else {
                format!("*{}*", alt)
            }
        })
        .into_owned()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(strip_markdown_fences("```markdown\n# Hello\nWorld\n```"), "# Hello\nWorld");
        assert_eq!(strip_markdown_fences("```\n# Hello\n```"), "# Hello");
    }

    #[test]
    fn inner_code_block_is_kept() {
        let input = "Intro\n```python\nprint(1)\n```";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn normalises_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn collapses_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn final_newline() {
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn placeholder_image_becomes_caption() {
        let out = replace_placeholder_images("![Supply and demand curves](figure1.png)");
        assert_eq!(out, "*Supply and demand curves*");

        let out = replace_placeholder_images("![](https://example.com/img.png)");
        assert_eq!(out, "");
    }

    #[test]
    fn real_image_link_is_kept() {
        let input = "![Figure](https://arxiv.org/figures/fig1.png)";
        assert_eq!(replace_placeholder_images(input), input);
    }

    #[test]
    fn removes_invisible_chars() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}d"), "abcd");
    }

    #[test]
    fn latex_survives_cleanup() {
        let input = "```markdown\r\n## Euler equation\r\n\r\n$$u'(c_t) = \\beta (1+r) u'(c_{t+1})$$   \r\n```";
        let out = clean_markdown(input);
        assert_eq!(
            out,
            "## Euler equation\n\n$$u'(c_t) = \\beta (1+r) u'(c_{t+1})$$\n"
        );
    }
}

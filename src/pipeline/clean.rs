//! Page text normalisation applied before a page joins the corpus.
//!
//! PDF text layers come out with Windows line endings, trailing spaces from
//! justified layouts, zero-width characters and long runs of blank lines
//! where the page had whitespace. None of that carries meaning, and all of it
//! eats into the 1000-character chunk budget, so these rules strip it.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the per-line and blank-line rules
//! only ever see `\n`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every normalisation rule to one page's extracted text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Trim leading and trailing blank lines of the page
pub fn clean_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    trim_blank_edges(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace ─────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Trim blank edges ─────────────────────────────────────────────────

fn trim_blank_edges(input: &str) -> String {
    input.trim_matches('\n').to_string()
}

//! Token sequence rendering
//!
//! Turns a token sequence into inline HTML: one bordered cell per token, the
//! last token highlighted as the predicted one. Sequences that contain a
//! closing-tag opener anywhere are never rendered.

use std::fmt::Write;

/// Default number of trailing tokens kept in view
pub const DEFAULT_MAX_LEN: usize = 150;

/// Returned in place of markup when a sequence contains tag-like content
pub const WITHHELD_NOTICE: &str = "CONTEXT WITHHELD FOR SECURITY REASONS: it contains tag-like HTML content (could contain JavaScript).";

/// Marker emitted before a truncated sequence
pub const ELLIPSIS: &str = "<span>...</span>";

const LINE_BREAK_GLYPH: char = '⏎';
const HIGHLIGHT_BACKGROUND: &str = "#FF9999";
const PLAIN_BACKGROUND: &str = "white";

/// Outcome of rendering a token sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendering {
    /// Safe markup for the (possibly truncated) sequence
    Markup(String),
    /// The sequence contained tag-like content and was not rendered
    Withheld,
}

impl Rendering {
    pub fn is_withheld(&self) -> bool {
        matches!(self, Rendering::Withheld)
    }

    /// The markup, or the withheld notice
    pub fn into_html(self) -> String {
        match self {
            Rendering::Markup(html) => html,
            Rendering::Withheld => WITHHELD_NOTICE.to_string(),
        }
    }
}

/// Render tokens to HTML, keeping only the last `max_len` of them.
pub fn render<S: AsRef<str>>(tokens: &[S], max_len: usize) -> String {
    render_sequence(tokens, max_len).into_html()
}

/// Render tokens, reporting whether the sequence was withheld.
///
/// The safety check runs over every input token, including those that fall
/// outside the truncation window. A `max_len` of 0 is treated as 1.
pub fn render_sequence<S: AsRef<str>>(tokens: &[S], max_len: usize) -> Rendering {
    if contains_closing_tag(tokens) {
        return Rendering::Withheld;
    }

    let max_len = max_len.max(1);
    let mut html = String::new();

    let window = if tokens.len() > max_len {
        html.push_str(ELLIPSIS);
        &tokens[tokens.len() - max_len..]
    } else {
        tokens
    };

    let last = window.len().saturating_sub(1);
    for (i, token) in window.iter().enumerate() {
        let token = token.as_ref();
        let background = if i == last {
            HIGHLIGHT_BACKGROUND
        } else {
            PLAIN_BACKGROUND
        };

        if is_line_break_token(token) {
            let breaks = token.chars().count();
            let glyphs: String = std::iter::repeat_n(LINE_BREAK_GLYPH, breaks).collect();
            push_cell(&mut html, background, &glyphs);
            html.push_str(&"<br>".repeat(breaks));
        } else {
            push_cell(&mut html, background, &escape_token(token));
        }
    }

    Rendering::Markup(html)
}

/// True if the raw concatenation of the tokens contains `</`.
///
/// The opener may straddle two tokens (`"<"` followed by `"/x"`).
pub fn contains_closing_tag<S: AsRef<str>>(tokens: &[S]) -> bool {
    let mut after_open = false;
    for token in tokens {
        for c in token.as_ref().chars() {
            if after_open && c == '/' {
                return true;
            }
            after_open = c == '<';
        }
    }
    false
}

/// A token made only of line-break characters (`\n`, `\r`, VT, FF)
fn is_line_break_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| matches!(c, '\n' | '\r' | '\u{0B}' | '\u{0C}'))
}

/// Replace characters that a markdown-aware or HTML consumer would treat as
/// syntax with character references. Angle brackets are included so no
/// token can open a tag of its own.
fn escape_token(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        match c {
            '$' => escaped.push_str("&#36;"),
            '&' => escaped.push_str("&amp;"),
            '_' => escaped.push_str("&#95;"),
            '*' => escaped.push_str("&#42;"),
            '`' => escaped.push_str("&#96;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn push_cell(html: &mut String, background: &str, content: &str) {
    let _ = write!(
        html,
        "<span style=\"border: 1px solid #DDD; background-color: {}; white-space: pre-wrap;\">{}</span>",
        background, content
    );
}

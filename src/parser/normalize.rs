use std::sync::LazyLock;

use regex::Regex;

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

const TITLE_PREFIX: &str = "# ";

/// Strip the leading `# Title` line, collapse 3+ newlines to a paragraph
/// break and trim the result.
pub fn normalize(body: &str) -> String {
    let unified = body.replace("\r\n", "\n");
    let stripped = strip_title(&unified);
    BLANK_RUN_RE.replace_all(stripped, "\n\n").trim().to_string()
}

/// Drop a single leading top-level heading and the blank lines right after it.
/// Later `# ` lines are left alone.
pub fn strip_title(text: &str) -> &str {
    if !text.starts_with(TITLE_PREFIX) {
        return text;
    }
    match text.find('\n') {
        Some(end) => text[end..].trim_start_matches('\n'),
        None => "",
    }
}

// ── Tests ──

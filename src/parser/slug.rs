use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s-]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HYPHEN_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());

const FALLBACK_SLUG: &str = "section";

/// Anchor slug for a heading: lowercase, punctuation dropped, whitespace
/// runs turned into single hyphens.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let kept = DISALLOWED_RE.replace_all(&lower, "");
    let hyphenated = WHITESPACE_RE.replace_all(&kept, "-");
    let slug = HYPHEN_RUN_RE.replace_all(&hyphenated, "-");
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.into_owned()
    }
}

/// Hands out anchor ids that are unique within one article.
///
/// The first use of a base id is returned bare, later uses get `-2`, `-3`, ...
/// A suffixed candidate that was already issued verbatim (a heading literally
/// named "Setup 2", say) is skipped, so ids never repeat.
#[derive(Debug, Default)]
pub struct AnchorAllocator {
    counts: HashMap<String, u32>,
    issued: HashSet<String>,
}

impl AnchorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for a heading title.
    pub fn allocate(&mut self, title: &str) -> String {
        self.claim(&slugify(title))
    }

    /// Id for a fixed base such as `overview`, bypassing slug derivation.
    pub fn claim(&mut self, base: &str) -> String {
        loop {
            let count = self.counts.entry(base.to_string()).or_insert(0);
            *count += 1;
            let candidate = if *count == 1 {
                base.to_string()
            } else {
                format!("{}-{}", base, count)
            };
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

// ── Tests ──

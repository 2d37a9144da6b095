use serde::Serialize;

use super::slug::AnchorAllocator;

pub const OVERVIEW_ID: &str = "overview";
pub const OVERVIEW_TITLE: &str = "Overview";

const HEADING_PREFIX: &str = "## ";
const UNTITLED: &str = "Section";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub body: String,
}

impl Section {
    fn overview(id: String, body: &str) -> Self {
        Section {
            id,
            title: OVERVIEW_TITLE.to_string(),
            body: body.trim().to_string(),
        }
    }
}

/// Split normalized article text into anchored sections at each `## ` line.
///
/// Always returns at least one section. Text before the first heading (or
/// the whole text when there are no headings) becomes the `overview` section.
pub fn split_sections(text: &str) -> Vec<Section> {
    let chunks = split_chunks(text);
    if chunks.is_empty() {
        return vec![Section::overview(OVERVIEW_ID.to_string(), text)];
    }

    let mut ids = AnchorAllocator::new();
    let mut sections = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let section = match chunk.strip_prefix(HEADING_PREFIX) {
            Some(rest) => {
                let (heading, body) = rest.split_once('\n').unwrap_or((rest, ""));
                let title = match heading.trim() {
                    "" => UNTITLED,
                    t => t,
                };
                Section {
                    id: ids.allocate(title),
                    title: title.to_string(),
                    body: body.trim().to_string(),
                }
            }
            // Only the lead-in chunk can lack a heading.
            None => Section::overview(ids.claim(OVERVIEW_ID), chunk),
        };
        sections.push(section);
    }

    sections
}

/// Cut `text` in front of every line that opens with `## `, keeping the
/// heading line at the start of its chunk. Blank chunks are dropped.
fn split_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.starts_with(HEADING_PREFIX) && offset > start {
            chunks.push(&text[start..offset]);
            start = offset;
        }
        offset += line.len();
    }
    chunks.push(&text[start..]);

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

// ── Tests ──

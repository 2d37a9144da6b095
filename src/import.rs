use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::db::ArticleRecord;

/// Read a JSON content export and return the records that carry a full
/// layer/chapter/topic key.
pub fn load_records(path: &Path) -> Result<Vec<ArticleRecord>> {
    info!("Reading content export: {}", path.display());
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records = parse_records(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    info!("Records in export: {}", records.len());

    let usable: Vec<ArticleRecord> = records
        .into_iter()
        .filter(|r| {
            let complete = [&r.layer, &r.chapter, &r.topic]
                .iter()
                .all(|part| !part.trim().is_empty());
            if !complete {
                warn!("Skipping record with incomplete key: {}", r.key());
            }
            complete
        })
        .collect();

    info!("Records after filtering: {}", usable.len());
    Ok(usable)
}

fn parse_records(raw: &str) -> Result<Vec<ArticleRecord>> {
    Ok(serde_json::from_str(raw)?)
}

// ── Tests ──

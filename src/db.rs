use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use tracing::{debug, info};

use crate::parser::Section;

pub const DEFAULT_DB_PATH: &str = "data/topics.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open catalog {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS topics (
            id               INTEGER PRIMARY KEY,
            layer            TEXT NOT NULL,
            chapter          TEXT NOT NULL,
            topic            TEXT NOT NULL,
            title            TEXT NOT NULL,
            body             TEXT NOT NULL,
            illustration_key TEXT,
            imported_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(layer, chapter, topic)
        );
        CREATE INDEX IF NOT EXISTS idx_topics_layer ON topics(layer);

        CREATE TABLE IF NOT EXISTS topic_sections (
            id           INTEGER PRIMARY KEY,
            topic_id     INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
            position     INTEGER NOT NULL,
            anchor       TEXT NOT NULL,
            title        TEXT NOT NULL,
            body         TEXT NOT NULL,
            processed_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(topic_id, position),
            UNIQUE(topic_id, anchor)
        );
        CREATE INDEX IF NOT EXISTS idx_sections_topic ON topic_sections(topic_id);
        ",
    )?;
    Ok(())
}

// ── Catalog ──

/// Composite catalog key: layer → chapter → topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicKey {
    pub layer: String,
    pub chapter: String,
    pub topic: String,
}

impl TopicKey {
    pub fn new(layer: &str, chapter: &str, topic: &str) -> Self {
        TopicKey {
            layer: layer.to_string(),
            chapter: chapter.to_string(),
            topic: topic.to_string(),
        }
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.layer, self.chapter, self.topic)
    }
}

/// Raw content for one topic, as the catalog hands it to the partitioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSource {
    pub title: String,
    pub body: String,
    pub illustration_key: Option<String>,
}

/// One entry of a JSON content export.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleRecord {
    pub layer: String,
    pub chapter: String,
    pub topic: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub illustration_key: Option<String>,
}

impl ArticleRecord {
    pub fn key(&self) -> TopicKey {
        TopicKey::new(&self.layer, &self.chapter, &self.topic)
    }
}

/// Insert new topics and update changed ones. Section rows of a changed topic
/// are dropped so `process` picks it up again. Returns rows inserted or changed.
pub fn upsert_topics(conn: &Connection, records: &[ArticleRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut upsert = tx.prepare(
            "INSERT INTO topics (layer, chapter, topic, title, body, illustration_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(layer, chapter, topic) DO UPDATE SET
                 title = excluded.title,
                 body = excluded.body,
                 illustration_key = excluded.illustration_key,
                 imported_at = datetime('now')
             WHERE topics.title IS NOT excluded.title
                OR topics.body IS NOT excluded.body
                OR topics.illustration_key IS NOT excluded.illustration_key",
        )?;
        let mut invalidate = tx.prepare(
            "DELETE FROM topic_sections WHERE topic_id =
                 (SELECT id FROM topics WHERE layer = ?1 AND chapter = ?2 AND topic = ?3)",
        )?;
        for r in records {
            let changed = upsert.execute(rusqlite::params![
                r.layer, r.chapter, r.topic, r.title, r.body, r.illustration_key,
            ])?;
            if changed > 0 {
                let dropped = invalidate.execute(rusqlite::params![r.layer, r.chapter, r.topic])?;
                debug!("Topic {} changed, dropped {} stale sections", r.key(), dropped);
            }
            count += changed;
        }
    }
    tx.commit()?;
    info!("Upserted {} topics ({} new or changed)", records.len(), count);
    Ok(count)
}

pub fn fetch_topic(conn: &Connection, key: &TopicKey) -> Result<Option<ArticleSource>> {
    let article = conn
        .query_row(
            "SELECT title, body, illustration_key FROM topics
             WHERE layer = ?1 AND chapter = ?2 AND topic = ?3",
            rusqlite::params![key.layer, key.chapter, key.topic],
            |row| {
                Ok(ArticleSource {
                    title: row.get(0)?,
                    body: row.get(1)?,
                    illustration_key: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(article)
}

// ── Processing ──

pub struct StoredTopic {
    pub topic_id: i64,
    pub key: TopicKey,
    pub source: ArticleSource,
}

/// Topics that have no section rows yet.
pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredTopic>> {
    let sql = format!(
        "SELECT t.id, t.layer, t.chapter, t.topic, t.title, t.body, t.illustration_key
         FROM topics t
         WHERE NOT EXISTS (SELECT 1 FROM topic_sections s WHERE s.topic_id = t.id)
         ORDER BY t.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredTopic {
                topic_id: row.get(0)?,
                key: TopicKey {
                    layer: row.get(1)?,
                    chapter: row.get(2)?,
                    topic: row.get(3)?,
                },
                source: ArticleSource {
                    title: row.get(4)?,
                    body: row.get(5)?,
                    illustration_key: row.get(6)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct ProcessedTopic {
    pub topic_id: i64,
    pub sections: Vec<Section>,
}

/// Replace the section rows of each topic in one transaction.
pub fn save_sections(conn: &Connection, processed: &[ProcessedTopic]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut clear = tx.prepare("DELETE FROM topic_sections WHERE topic_id = ?1")?;
        let mut insert = tx.prepare(
            "INSERT INTO topic_sections (topic_id, position, anchor, title, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for p in processed {
            clear.execute(rusqlite::params![p.topic_id])?;
            for (position, s) in p.sections.iter().enumerate() {
                count += insert.execute(rusqlite::params![
                    p.topic_id, position as i64, s.id, s.title, s.body,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_sections(conn: &Connection, key: &TopicKey) -> Result<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT s.anchor, s.title, s.body
         FROM topic_sections s
         JOIN topics t ON t.id = s.topic_id
         WHERE t.layer = ?1 AND t.chapter = ?2 AND t.topic = ?3
         ORDER BY s.position",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![key.layer, key.chapter, key.topic], |row| {
            Ok(Section {
                id: row.get(0)?,
                title: row.get(1)?,
                body: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Overview ──

pub struct OverviewRow {
    pub key: TopicKey,
    pub title: String,
    pub illustration_key: String,
    pub section_count: i64,
}

pub fn fetch_overview(
    conn: &Connection,
    layer: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let where_clause = match layer {
        Some(l) => {
            params.push(Box::new(l.to_string()));
            " WHERE t.layer = ?1"
        }
        None => "",
    };

    let sql = format!(
        "SELECT t.layer, t.chapter, t.topic, t.title, COALESCE(t.illustration_key, ''),
                (SELECT COUNT(*) FROM topic_sections s WHERE s.topic_id = t.id)
         FROM topics t{}
         ORDER BY t.layer, t.chapter, t.topic
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                key: TopicKey {
                    layer: row.get(0)?,
                    chapter: row.get(1)?,
                    topic: row.get(2)?,
                },
                title: row.get(3)?,
                illustration_key: row.get(4)?,
                section_count: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub layers: usize,
    pub chapters: usize,
    pub topics: usize,
    pub processed: usize,
    pub sections: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let layers: usize =
        conn.query_row("SELECT COUNT(DISTINCT layer) FROM topics", [], |r| r.get(0))?;
    let chapters: usize = conn.query_row(
        "SELECT COUNT(*) FROM (SELECT DISTINCT layer, chapter FROM topics)",
        [],
        |r| r.get(0),
    )?;
    let topics: usize = conn.query_row("SELECT COUNT(*) FROM topics", [], |r| r.get(0))?;
    let processed: usize = conn.query_row(
        "SELECT COUNT(DISTINCT topic_id) FROM topic_sections",
        [],
        |r| r.get(0),
    )?;
    let sections: usize =
        conn.query_row("SELECT COUNT(*) FROM topic_sections", [], |r| r.get(0))?;
    Ok(Stats {
        layers,
        chapters,
        topics,
        processed,
        sections,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::partition_article;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(topic: &str, body: &str) -> ArticleRecord {
        ArticleRecord {
            layer: "hardware".into(),
            chapter: "memory".into(),
            topic: topic.into(),
            title: topic.to_uppercase(),
            body: body.into(),
            illustration_key: Some("memory-hierarchy".into()),
        }
    }

    fn process_all(conn: &Connection) -> usize {
        let pending = fetch_unprocessed(conn, None).unwrap();
        let processed: Vec<_> = pending
            .iter()
            .map(|t| ProcessedTopic {
                topic_id: t.topic_id,
                sections: partition_article(&t.source).sections,
            })
            .collect();
        save_sections(conn, &processed).unwrap()
    }

    #[test]
    fn fetch_missing_topic() {
        let conn = memory_db();
        let key = TopicKey::new("nope", "nope", "nope");
        assert!(fetch_topic(&conn, &key).unwrap().is_none());
    }

    #[test]
    fn upsert_and_fetch() {
        let conn = memory_db();
        let n = upsert_topics(&conn, &[record("caches", "## A\nx")]).unwrap();
        assert_eq!(n, 1);

        let key = TopicKey::new("hardware", "memory", "caches");
        let article = fetch_topic(&conn, &key).unwrap().unwrap();
        assert_eq!(article.title, "CACHES");
        assert_eq!(article.illustration_key.as_deref(), Some("memory-hierarchy"));
    }

    #[test]
    fn unchanged_reimport_is_a_no_op() {
        let conn = memory_db();
        upsert_topics(&conn, &[record("caches", "## A\nx")]).unwrap();
        process_all(&conn);
        assert_eq!(upsert_topics(&conn, &[record("caches", "## A\nx")]).unwrap(), 0);
        assert!(fetch_unprocessed(&conn, None).unwrap().is_empty());
    }

    #[test]
    fn changed_body_invalidates_sections() {
        let conn = memory_db();
        upsert_topics(&conn, &[record("caches", "## A\nx")]).unwrap();
        process_all(&conn);

        assert_eq!(upsert_topics(&conn, &[record("caches", "## B\ny")]).unwrap(), 1);
        let key = TopicKey::new("hardware", "memory", "caches");
        assert!(fetch_sections(&conn, &key).unwrap().is_empty());

        process_all(&conn);
        let sections = fetch_sections(&conn, &key).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, "b");
    }

    #[test]
    fn sections_round_trip_in_order() {
        let conn = memory_db();
        upsert_topics(
            &conn,
            &[record("tlb", "Intro\n\n## Setup\na\n\n## Setup\nb\n\n## Summary\nc")],
        )
        .unwrap();
        assert_eq!(process_all(&conn), 4);

        let key = TopicKey::new("hardware", "memory", "tlb");
        let ids: Vec<_> = fetch_sections(&conn, &key)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["overview", "setup", "setup-2", "summary"]);
    }

    #[test]
    fn unprocessed_respects_limit() {
        let conn = memory_db();
        upsert_topics(
            &conn,
            &[record("a", "x"), record("b", "y"), record("c", "z")],
        )
        .unwrap();
        assert_eq!(fetch_unprocessed(&conn, Some(2)).unwrap().len(), 2);
        assert_eq!(fetch_unprocessed(&conn, None).unwrap().len(), 3);
    }

    #[test]
    fn overview_and_stats() {
        let conn = memory_db();
        let mut other = record("tcp", "## Handshake\nSYN");
        other.layer = "software".into();
        other.chapter = "networking".into();
        other.illustration_key = None;
        upsert_topics(&conn, &[record("caches", "Intro\n## A\nx"), other]).unwrap();
        process_all(&conn);

        let all = fetch_overview(&conn, None, 50).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].key.to_string(), "hardware/memory/caches");
        assert_eq!(all[0].section_count, 2);
        assert_eq!(all[1].illustration_key, "");

        let software = fetch_overview(&conn, Some("software"), 50).unwrap();
        assert_eq!(software.len(), 1);
        assert_eq!(software[0].key.topic, "tcp");

        let s = get_stats(&conn).unwrap();
        assert_eq!(s.layers, 2);
        assert_eq!(s.chapters, 2);
        assert_eq!(s.topics, 2);
        assert_eq!(s.processed, 2);
        assert_eq!(s.sections, 3);
    }
}

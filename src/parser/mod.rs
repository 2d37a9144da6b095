pub mod normalize;
pub mod sections;
pub mod slug;

use serde::Serialize;

use crate::db::ArticleSource;
use crate::illustrations::{self, IllustrationBundle};

pub use sections::Section;

/// Anchored sections of one article plus the illustrations that go with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub sections: Vec<Section>,
    pub illustrations: IllustrationBundle,
}

/// Pipeline: raw body → normalized text → anchored sections, with the
/// illustration bundle resolved alongside. Pure; never fails.
pub fn partition(body: &str, illustration_key: Option<&str>) -> Partition {
    let text = normalize::normalize(body);
    let sections = sections::split_sections(&text);
    Partition {
        sections,
        illustrations: illustrations::resolve(illustration_key),
    }
}

pub fn partition_article(article: &ArticleSource) -> Partition {
    partition(&article.body, article.illustration_key.as_deref())
}

// ── Tests ──

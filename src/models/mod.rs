use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod preferences;

pub use preferences::{normalize_tags, PreferenceSet, UserId};

/// A summarized news article as served to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    #[serde(rename = "article_id")]
    pub id: String,
    pub title: String,
    /// Generated summary of the article body
    #[serde(rename = "content")]
    pub summary: String,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub author: Option<String>,
    /// Publish time in epoch milliseconds
    pub published_date: i64,
    pub url: String,
}

impl Article {
    /// Number of this article's tags present in `preferred`
    pub fn relevance(&self, preferred: &std::collections::BTreeSet<String>) -> usize {
        self.tags.iter().filter(|tag| preferred.contains(*tag)).count()
    }
}

/// Opaque continuation token handed out by the backing store
///
/// Only the store that minted a cursor knows how to read it; everything else
/// passes it along untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One page of recommendations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationPage {
    pub articles: Vec<Article>,
    #[serde(rename = "lastKey")]
    pub last_key: Option<Cursor>,
}

impl RecommendationPage {
    pub fn empty() -> Self {
        Self {
            articles: Vec::new(),
            last_key: None,
        }
    }
}

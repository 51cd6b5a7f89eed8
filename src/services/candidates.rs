//! Candidate retrieval
//!
//! Issues one bounded scan against the backing store and turns whatever the
//! store returned into strongly typed articles. Stored records have gone
//! through several ingestion versions, so tags and publish dates arrive in more
//! than one shape; everything is normalized here and nothing encoding-specific
//! travels further.

use std::collections::HashSet;

use chrono::DateTime;
use serde_json::Value;

use crate::{
    db::{ArticleStore, RawItem, ScanRequest, StoreError},
    models::{Article, Cursor},
    services::predicate::Predicate,
};

/// Articles from one scan plus the store's continuation cursor, untouched
#[derive(Debug, Clone)]
pub struct CandidateBatch {
    pub articles: Vec<Article>,
    pub next_cursor: Option<Cursor>,
}

/// Items to request for a page of `limit`: twice the page, capped at `max_fetch`
pub fn fetch_size(limit: usize, max_fetch: usize) -> usize {
    limit.saturating_mul(2).min(max_fetch).max(1)
}

/// Runs a single scan of up to `requested` items and converts the raw records
///
/// No retries: throughput and transport failures go straight back to the caller.
pub async fn fetch_candidates(
    store: &dyn ArticleStore,
    predicate: Option<Predicate>,
    cursor: Option<Cursor>,
    requested: usize,
) -> Result<CandidateBatch, StoreError> {
    let page = store
        .scan(ScanRequest {
            predicate,
            cursor,
            limit: requested,
        })
        .await?;

    let returned = page.items.len();
    let articles = page
        .items
        .into_iter()
        .map(article_from_raw)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        store = store.name(),
        requested,
        returned,
        has_more = page.next_cursor.is_some(),
        "Fetched candidates"
    );

    Ok(CandidateBatch {
        articles,
        next_cursor: page.next_cursor,
    })
}

/// Validates a raw store record into an [`Article`]
pub fn article_from_raw(item: RawItem) -> Result<Article, StoreError> {
    let id = required_string(&item, &["id", "article_id"])?;

    let tags = normalize_tags_field(field(&item, &["tags"]))
        .map_err(|e| StoreError::MalformedRecord(format!("article {}: {}", id, e)))?;
    let published_date = field(&item, &["publishDate", "published_date"])
        .map(published_millis)
        .transpose()
        .map_err(|e| StoreError::MalformedRecord(format!("article {}: {}", id, e)))?
        .ok_or_else(|| {
            StoreError::MalformedRecord(format!("article {}: missing publishDate", id))
        })?;

    Ok(Article {
        title: required_string(&item, &["title"])?,
        summary: required_string(&item, &["summary", "content"])?,
        url: required_string(&item, &["url"])?,
        image_url: optional_string(&item, &["imageUrl", "image_url"]),
        author: optional_string(&item, &["author"]),
        tags,
        published_date,
        id,
    })
}

/// Reads a tag collection in any of its stored encodings into an ordered, duplicate-free list
///
/// Accepted: a JSON array of strings, a string holding a JSON array, a
/// comma-separated string, a typed string set `{"SS": [...]}` and a typed list
/// `{"L": [{"S": ...}]}`.
pub fn normalize_tags_field(value: Option<&Value>) -> Result<Vec<String>, StoreError> {
    let raw: Vec<String> = match value {
        None | Some(Value::Null) => {
            return Err(StoreError::MalformedRecord("missing tags".to_string()))
        }
        Some(Value::Array(values)) => values.iter().map(tag_string).collect::<Result<_, _>>()?,
        Some(Value::String(s)) if s.trim_start().starts_with('[') => {
            serde_json::from_str::<Vec<String>>(s).map_err(|e| {
                StoreError::MalformedRecord(format!("tags string is not a JSON list: {}", e))
            })?
        }
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(Value::Object(map)) => match (map.get("SS"), map.get("L")) {
            (Some(Value::Array(values)), _) | (None, Some(Value::Array(values))) => {
                values.iter().map(tag_string).collect::<Result<_, _>>()?
            }
            _ => {
                return Err(StoreError::MalformedRecord(
                    "unrecognized typed tag collection".to_string(),
                ))
            }
        },
        Some(_) => {
            return Err(StoreError::MalformedRecord(
                "tags must be a list or string".to_string(),
            ))
        }
    };

    let mut seen = HashSet::new();
    Ok(raw
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect())
}

fn tag_string(value: &Value) -> Result<String, StoreError> {
    match unwrap_typed(value) {
        Value::String(s) => Ok(s.clone()),
        _ => Err(StoreError::MalformedRecord(
            "tag entries must be strings".to_string(),
        )),
    }
}

/// Converts any stored publish time into epoch milliseconds
fn published_millis(value: &Value) -> Result<i64, StoreError> {
    match unwrap_typed(value) {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| StoreError::MalformedRecord("publishDate out of range".to_string())),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Ok(ms);
            }
            if let Ok(ms) = s.parse::<f64>() {
                return Ok(ms.round() as i64);
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.timestamp_millis())
                .map_err(|_| {
                    StoreError::MalformedRecord(format!("unparseable publishDate {:?}", s))
                })
        }
        _ => Err(StoreError::MalformedRecord(
            "publishDate must be a number or string".to_string(),
        )),
    }
}

/// Strips a typed scalar wrapper such as `{"S": "..."}` or `{"N": "..."}`
fn unwrap_typed(value: &Value) -> &Value {
    match value {
        Value::Object(map) if map.len() == 1 => map
            .get("S")
            .or_else(|| map.get("N"))
            .unwrap_or(value),
        _ => value,
    }
}

/// First present, non-null field among `names`
fn field<'a>(item: &'a RawItem, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| item.get(*name))
        .find(|value| !value.is_null())
}

fn required_string(item: &RawItem, names: &[&str]) -> Result<String, StoreError> {
    match field(item, names).map(unwrap_typed) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::MalformedRecord(format!(
            "missing required field {}",
            names[0]
        ))),
    }
}

fn optional_string(item: &RawItem, names: &[&str]) -> Option<String> {
    match field(item, names).map(unwrap_typed) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

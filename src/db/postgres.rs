use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder, Row};

use super::{cursor, ArticleStore, PreferenceStore, ScanPage, ScanRequest, StoreError};
use crate::{models::UserId, services::predicate::Predicate};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// Exhausting the pool surfaces as a throughput error rather than queueing forever.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => StoreError::Throughput(err.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                classify_sqlstate(&code, err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                StoreError::MalformedRecord(err.to_string())
            }
            _ => StoreError::Transport(err.to_string()),
        }
    }
}

/// Maps a SQLSTATE code onto the store error taxonomy
fn classify_sqlstate(code: &str, message: String) -> StoreError {
    match code {
        // too_many_connections, configuration_limit_exceeded
        "53300" | "53400" => StoreError::Throughput(message),
        // data exceptions and syntax/access rule violations
        c if c.starts_with("22") || c.starts_with("42") => StoreError::Validation(message),
        _ => StoreError::Transport(message),
    }
}

/// Resume key for keyset pagination over `article_summaries.id`
#[derive(Debug, Serialize, Deserialize)]
struct IdKey {
    id: String,
}

/// Article summaries stored as JSONB documents keyed by article id
#[derive(Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Renders the scan for an optional predicate
///
/// Each tag is matched against the canonical JSON array as well as the legacy
/// encodings still present in older rows: a string set (`{"SS": [...]}`), a
/// typed list (`{"L": [{"S": ...}]}`), a JSON-encoded list stored as a string
/// and a plain comma-separated string.
fn build_scan_query(
    predicate: Option<&Predicate>,
    after: Option<String>,
    limit: usize,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("SELECT id, item FROM article_summaries");

    if let Some(predicate) = predicate {
        query.push(" WHERE (");
        for (idx, clause) in predicate.clauses().iter().enumerate() {
            if idx > 0 {
                query.push(" OR ");
            }
            push_tag_clause(&mut query, clause.attribute, &clause.value);
        }
        query.push(")");
    }

    if let Some(id) = after {
        query
            .push(if predicate.is_some() { " AND " } else { " WHERE " })
            .push("id > ")
            .push_bind(id);
    }

    query
        .push(" ORDER BY id LIMIT ")
        .push_bind(limit as i64);

    query
}

fn push_tag_clause(query: &mut QueryBuilder<'static, Postgres>, attribute: &str, tag: &str) {
    let field = format!("item->'{}'", attribute);
    let text = format!("item->>'{}'", attribute);
    let quoted = serde_json::Value::String(tag.to_string()).to_string();
    let delimited = format!(",{},", tag);

    query
        .push(format!("(jsonb_exists({}, ", field))
        .push_bind(tag.to_string())
        .push(format!(") OR jsonb_exists({}->'SS', ", field))
        .push_bind(tag.to_string())
        .push(format!(
            ") OR coalesce({}->'L' @> jsonb_build_array(jsonb_build_object('S', ",
            field
        ))
        .push_bind(tag.to_string())
        .push(format!(
            "::text)), false) OR (jsonb_typeof({}) = 'string' AND (strpos({}, ",
            field, text
        ))
        .push_bind(quoted)
        .push(format!(
            ") > 0 OR strpos(',' || regexp_replace(btrim({}), '\\s*,\\s*', ',', 'g') || ',', ",
            text
        ))
        .push_bind(delimited)
        .push(") > 0)))");
}

#[async_trait::async_trait]
impl ArticleStore for PgArticleStore {
    async fn scan(&self, request: ScanRequest) -> Result<ScanPage, StoreError> {
        let after = request
            .cursor
            .as_ref()
            .map(cursor::decode::<IdKey>)
            .transpose()?
            .map(|key| key.id);

        let mut query = build_scan_query(request.predicate.as_ref(), after, request.limit);
        let rows = query.build().fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut last_id = None;
        for row in rows {
            let id: String = row.try_get("id")?;
            match row.try_get::<serde_json::Value, _>("item")? {
                serde_json::Value::Object(map) => items.push(map),
                other => {
                    return Err(StoreError::MalformedRecord(format!(
                        "item {} is a JSON {} rather than an object",
                        id,
                        json_kind(&other)
                    )))
                }
            }
            last_id = Some(id);
        }

        // A short page means the scan reached the end of the table
        let next_cursor = match last_id {
            Some(id) if items.len() == request.limit => Some(cursor::encode(&IdKey { id })?),
            _ => None,
        };

        tracing::debug!(
            store = self.name(),
            returned = items.len(),
            exhausted = next_cursor.is_none(),
            "Scanned article summaries"
        );

        Ok(ScanPage { items, next_cursor })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// User tag preferences in the `preferences` table
#[derive(Clone)]
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn get(&self, user: &UserId) -> Result<BTreeSet<String>, StoreError> {
        let tags: Option<Vec<String>> =
            sqlx::query_scalar("SELECT tags FROM preferences WHERE user_id = $1")
                .bind(user.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(tags.unwrap_or_default().into_iter().collect())
    }

    async fn put(&self, user: &UserId, tags: BTreeSet<String>) -> Result<(), StoreError> {
        let tags: Vec<String> = tags.into_iter().collect();

        sqlx::query(
            r#"
            INSERT INTO preferences (user_id, tags, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (user_id) DO UPDATE
            SET tags = EXCLUDED.tags, updated_at = now()
            "#,
        )
        .bind(user.as_str())
        .bind(tags)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %user, "Saved preferences");
        Ok(())
    }
}

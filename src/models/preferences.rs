use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Identity of an authenticated caller (the session subject)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The tags a user wants to read about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceSet {
    pub user_id: UserId,
    pub tags: BTreeSet<String>,
}

impl PreferenceSet {
    pub fn new(user_id: UserId, tags: BTreeSet<String>) -> Self {
        Self { user_id, tags }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Trims tags and collapses duplicates. Blank tags are rejected.
pub fn normalize_tags<I, S>(tags: I) -> AppResult<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| {
            let tag = tag.as_ref().trim();
            if tag.is_empty() {
                Err(AppError::InvalidInput("Tags must not be blank".to_string()))
            } else {
                Ok(tag.to_string())
            }
        })
        .collect()
}

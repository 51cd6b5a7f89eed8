use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::time::Instant;

use crate::{
    cached,
    config::Config,
    db::{ArticleStore, Fingerprint, ResponseCache},
    error::{AppError, AppResult},
    models::{Cursor, RecommendationPage, UserId},
    services::{
        candidates::{fetch_candidates, fetch_size, CandidateBatch},
        predicate::Predicate,
        ranking::{distinct, Ranker},
    },
};

/// Page-size policy for recommendation requests
#[derive(Debug, Clone, Copy)]
pub struct RecommendationSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    pub max_fetch: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 20,
            max_fetch: 20,
        }
    }
}

impl RecommendationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_limit: config.default_page_size,
            max_limit: config.max_page_size,
            max_fetch: config.max_fetch,
        }
    }

    /// Applies the default and the ceiling; zero is rejected
    pub fn resolve_limit(&self, requested: Option<usize>) -> AppResult<usize> {
        match requested {
            None => Ok(self.default_limit),
            Some(0) => Err(AppError::InvalidInput(
                "limit must be a positive integer".to_string(),
            )),
            Some(n) => Ok(n.min(self.max_limit)),
        }
    }
}

/// One recommendation request, already authenticated and parsed
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    pub tags: BTreeSet<String>,
    pub cursor: Option<Cursor>,
    pub limit: Option<usize>,
    /// Point after which the store call is abandoned
    pub deadline: Option<Instant>,
}

/// Unfiltered article listing for callers without preferences
#[derive(Debug, Clone)]
pub struct BrowseRequest {
    pub cursor: Option<Cursor>,
    pub limit: Option<usize>,
    /// Return a random pick from the first `max_fetch` articles instead of a page
    pub sample: bool,
    pub deadline: Option<Instant>,
}

/// Orchestrates cache, predicate, store and ranker for a single request
///
/// Holds no per-request state; the response cache is the only thing shared
/// between concurrent requests.
pub struct RecommendationService {
    store: Arc<dyn ArticleStore>,
    cache: Arc<ResponseCache>,
    ranker: Ranker,
    settings: RecommendationSettings,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        cache: Arc<ResponseCache>,
        ranker: Ranker,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            store,
            cache,
            ranker,
            settings,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Produces one page of recommendations
    ///
    /// First pages are served from the response cache when a fresh entry
    /// exists. Later pages always go to the store. Any failure aborts the
    /// whole request.
    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> AppResult<Arc<RecommendationPage>> {
        let limit = self.settings.resolve_limit(request.limit)?;

        if request.tags.is_empty() {
            return Ok(Arc::new(RecommendationPage::empty()));
        }

        match request.cursor {
            None => {
                let fingerprint = Fingerprint::new(&request.user_id, &request.tags, limit);
                cached!(
                    self.cache,
                    fingerprint,
                    self.compute_page(&request.tags, None, limit, request.deadline)
                )
            }
            Some(cursor) => {
                let page = self
                    .compute_page(&request.tags, Some(cursor), limit, request.deadline)
                    .await?;
                Ok(Arc::new(page))
            }
        }
    }

    async fn compute_page(
        &self,
        tags: &BTreeSet<String>,
        cursor: Option<Cursor>,
        limit: usize,
        deadline: Option<Instant>,
    ) -> AppResult<RecommendationPage> {
        let predicate = Predicate::any_tag(tags)
            .ok_or_else(|| AppError::InvalidInput("At least one tag is required".to_string()))?;

        let batch = self
            .fetch(
                Some(predicate),
                cursor,
                fetch_size(limit, self.settings.max_fetch),
                deadline,
            )
            .await?;

        let candidates = batch.articles.len();
        let articles = self.ranker.rank(batch.articles, tags, limit);

        tracing::info!(
            candidates,
            returned = articles.len(),
            has_more = batch.next_cursor.is_some(),
            "Ranked recommendations"
        );

        Ok(RecommendationPage {
            articles,
            last_key: batch.next_cursor,
        })
    }

    /// Lists articles without any tag filter
    ///
    /// A plain browse returns the next `limit` articles in store order and
    /// the store's cursor. A sample ignores the cursor, draws `limit` articles
    /// from the first `max_fetch` and never continues.
    pub async fn browse(&self, request: BrowseRequest) -> AppResult<RecommendationPage> {
        let limit = self.settings.resolve_limit(request.limit)?;

        if request.sample {
            let batch = self
                .fetch(None, None, self.settings.max_fetch, request.deadline)
                .await?;
            let articles = self.ranker.sample(batch.articles, limit);

            tracing::info!(returned = articles.len(), "Sampled articles");
            return Ok(RecommendationPage {
                articles,
                last_key: None,
            });
        }

        let batch = self
            .fetch(None, request.cursor, limit, request.deadline)
            .await?;
        let mut articles = distinct(batch.articles);
        articles.truncate(limit);

        tracing::info!(
            returned = articles.len(),
            has_more = batch.next_cursor.is_some(),
            "Listed articles"
        );

        Ok(RecommendationPage {
            articles,
            last_key: batch.next_cursor,
        })
    }

    async fn fetch(
        &self,
        predicate: Option<Predicate>,
        cursor: Option<Cursor>,
        requested: usize,
        deadline: Option<Instant>,
    ) -> AppResult<CandidateBatch> {
        let fetch = fetch_candidates(self.store.as_ref(), predicate, cursor, requested);

        let batch = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fetch)
                .await
                .map_err(|_| {
                    AppError::StoreFailure("Timed out waiting for the article store".to_string())
                })??,
            None => fetch.await?,
        };

        Ok(batch)
    }
}

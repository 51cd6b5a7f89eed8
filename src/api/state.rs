use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::{Config, StoreBackend},
    db::{
        create_pool, run_migrations, ArticleStore, InMemoryArticleStore, InMemoryPreferenceStore,
        PgArticleStore, PgPreferenceStore, PreferenceStore, ResponseCache,
    },
    services::{
        Ranker, RecommendationService, RecommendationSettings, SessionResolver,
        TrustedHeaderResolver, UserInfoResolver,
    },
};

/// Shared application state
pub struct AppState {
    pub recommendations: RecommendationService,
    pub articles: Arc<dyn ArticleStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub sessions: Arc<dyn SessionResolver>,
    /// Budget for each request's store call
    pub request_timeout: Duration,
}

impl AppState {
    /// Wires the recommendation pipeline around already constructed collaborators
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        preferences: Arc<dyn PreferenceStore>,
        sessions: Arc<dyn SessionResolver>,
        config: &Config,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache_ttl(), config.cache_capacity));
        let ranker = Ranker::from_mode(config.tie_break, config.tie_break_seed);

        let recommendations = RecommendationService::new(
            articles.clone(),
            cache,
            ranker,
            RecommendationSettings::from_config(config),
        );

        Self {
            recommendations,
            articles,
            preferences,
            sessions,
            request_timeout: config.request_timeout(),
        }
    }

    /// Builds the stores and session resolver named by configuration
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (articles, preferences): (Arc<dyn ArticleStore>, Arc<dyn PreferenceStore>) =
            match config.store_backend {
                StoreBackend::Postgres => {
                    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
                    if config.run_migrations {
                        run_migrations(&pool).await?;
                    }
                    (
                        Arc::new(PgArticleStore::new(pool.clone())),
                        Arc::new(PgPreferenceStore::new(pool)),
                    )
                }
                StoreBackend::Memory => {
                    let articles = match &config.articles_seed_path {
                        Some(path) => InMemoryArticleStore::from_json_file(path)?,
                        None => InMemoryArticleStore::default(),
                    };
                    (Arc::new(articles), Arc::new(InMemoryPreferenceStore::new()))
                }
            };

        let sessions: Arc<dyn SessionResolver> = match &config.auth_userinfo_url {
            Some(url) => Arc::new(UserInfoResolver::new(url.clone(), config.request_timeout())?),
            None => {
                tracing::warn!(
                    "AUTH_USERINFO_URL is not set; trusting the x-user-id header for identity"
                );
                Arc::new(TrustedHeaderResolver)
            }
        };

        tracing::info!(
            store = articles.name(),
            tie_break = ?config.tie_break,
            cache_ttl_secs = config.cache_ttl_secs,
            "Application state initialized"
        );

        Ok(Self::new(articles, preferences, sessions, config))
    }
}

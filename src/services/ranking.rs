use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{config::TieBreakMode, models::Article};

/// An article with its relevance to the caller's tags. Never leaves the ranker.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub article: Article,
    pub relevance: usize,
}

/// Decides the order of candidates that share a relevance score
///
/// `arrange` runs before a stable sort on relevance, so whatever order it
/// leaves equal-relevance candidates in is the order they are served in.
pub trait TieBreaker: Send + Sync {
    fn arrange(&self, candidates: &mut [ScoredCandidate]);
}

/// Shuffles candidates on every call
///
/// Intentionally non-deterministic unless constructed with a fixed seed.
pub struct RandomTieBreak {
    rng: Mutex<StdRng>,
}

impl RandomTieBreak {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl TieBreaker for RandomTieBreak {
    fn arrange(&self, candidates: &mut [ScoredCandidate]) {
        // A poisoned RNG is still a perfectly good RNG
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        candidates.shuffle(&mut *rng);
    }
}

/// Orders ties by article id
pub struct ByArticleId;

impl TieBreaker for ByArticleId {
    fn arrange(&self, candidates: &mut [ScoredCandidate]) {
        candidates.sort_by(|a, b| a.article.id.cmp(&b.article.id));
    }
}

/// Turns raw candidates into a deduplicated, ranked, capped page
#[derive(Clone)]
pub struct Ranker {
    tie_break: Arc<dyn TieBreaker>,
}

impl Ranker {
    pub fn new(tie_break: Arc<dyn TieBreaker>) -> Self {
        Self { tie_break }
    }

    /// Builds the ranker selected by configuration
    pub fn from_mode(mode: TieBreakMode, seed: Option<u64>) -> Self {
        let tie_break: Arc<dyn TieBreaker> = match (mode, seed) {
            (TieBreakMode::ArticleId, _) => Arc::new(ByArticleId),
            (TieBreakMode::Random, Some(seed)) => Arc::new(RandomTieBreak::seeded(seed)),
            (TieBreakMode::Random, None) => Arc::new(RandomTieBreak::from_entropy()),
        };
        Self::new(tie_break)
    }

    /// Ranks `candidates` against `preferred` and keeps the best `limit`
    ///
    /// Duplicates keep their first occurrence. Returned articles carry only
    /// the tags the caller asked for.
    pub fn rank(
        &self,
        candidates: Vec<Article>,
        preferred: &BTreeSet<String>,
        limit: usize,
    ) -> Vec<Article> {
        let mut scored: Vec<ScoredCandidate> = Vec::with_capacity(candidates.len());

        for article in distinct(candidates) {
            let relevance = article.relevance(preferred);
            if relevance == 0 {
                // The store's predicate should have excluded this one
                tracing::warn!(article_id = %article.id, "Candidate shares no preferred tags");
                continue;
            }

            scored.push(ScoredCandidate { article, relevance });
        }

        self.tie_break.arrange(&mut scored);
        scored.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|candidate| {
                let mut article = candidate.article;
                article.tags.retain(|tag| preferred.contains(tag));
                article
            })
            .collect()
    }

    /// Picks up to `limit` distinct articles in tie-break order, tags untouched
    ///
    /// With the random tie-break this is a uniform sample of the candidates.
    pub fn sample(&self, candidates: Vec<Article>, limit: usize) -> Vec<Article> {
        let mut pool: Vec<ScoredCandidate> = distinct(candidates)
            .into_iter()
            .map(|article| ScoredCandidate {
                article,
                relevance: 0,
            })
            .collect();

        self.tie_break.arrange(&mut pool);
        pool.truncate(limit);
        pool.into_iter().map(|candidate| candidate.article).collect()
    }
}

/// Drops repeated article ids, keeping each id's first occurrence in order
pub fn distinct(candidates: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|article| seen.insert(article.id.clone()))
        .collect()
}

//! Content prioritizer. Ranks external articles against a user's skill gaps.
//!
//! Per-skill article lists are cached for 6h and shared by every user with
//! that skill; the user's merged ranking is cached separately as
//! recommendations and is dropped whenever a new analysis lands.

pub mod sources;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheLayer, Namespace};
use crate::errors::AppError;
use crate::models::article::{Article, RankedArticle};
use crate::models::skill::SkillRecord;

pub use sources::{ArticleSource, DevToSource, HashnodeSource};

const TOP_SKILLS: usize = 5;
const TOP_ARTICLES: usize = 6;
const RECENT_DAYS: i64 = 7;

#[derive(Clone)]
pub struct ContentPrioritizer {
    cache: CacheLayer,
    sources: Vec<Arc<dyn ArticleSource>>,
}

impl ContentPrioritizer {
    pub fn new(cache: CacheLayer, sources: Vec<Arc<dyn ArticleSource>>) -> Self {
        Self { cache, sources }
    }

    /// Top six articles for the user's largest skill gaps.
    pub async fn rank(&self, user_id: Uuid, skills: &[SkillRecord]) -> Vec<RankedArticle> {
        let subject = user_id.to_string();
        if let Some(cached) = self
            .cache
            .get::<Vec<RankedArticle>>(Namespace::Recommendations, &subject, None)
            .await
        {
            return cached;
        }

        let targets = top_gaps(skills, TOP_SKILLS);
        let per_skill = join_all(targets.iter().map(|skill| async move {
            let articles = self.articles_for_skill(&skill.name).await;
            (*skill, articles)
        }))
        .await;

        // The same article can surface for two skills; keep its best score.
        let mut best: HashMap<String, RankedArticle> = HashMap::new();
        for (skill, articles) in per_skill {
            for article in articles {
                let ranked = RankedArticle {
                    relevance: relevance(skill, &article),
                    skill: skill.name.clone(),
                    article,
                };
                match best.get(&ranked.article.url) {
                    Some(existing) if existing.relevance >= ranked.relevance => {}
                    _ => {
                        best.insert(ranked.article.url.clone(), ranked);
                    }
                }
            }
        }

        let mut candidates: Vec<RankedArticle> = best.into_values().collect();
        candidates.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then(b.article.published_at.cmp(&a.article.published_at))
        });

        if let Err(e) = self
            .cache
            .set(Namespace::Articles, &subject, &candidates, None)
            .await
        {
            warn!(user_id = %user_id, "Failed to cache article candidates: {e}");
        }
        candidates.truncate(TOP_ARTICLES);
        if let Err(e) = self
            .cache
            .set(Namespace::Recommendations, &subject, &candidates, None)
            .await
        {
            warn!(user_id = %user_id, "Failed to cache recommendations: {e}");
        }

        debug!(user_id = %user_id, count = candidates.len(), "Recommendations ranked");
        candidates
    }

    /// Drops the user's rankings and the per-skill lists behind them, then re-ranks.
    pub async fn refresh(&self, user_id: Uuid, skills: &[SkillRecord]) -> Result<usize, AppError> {
        let subject = user_id.to_string();
        self.cache.invalidate(Namespace::Articles, &subject).await?;
        self.cache
            .invalidate(Namespace::Recommendations, &subject)
            .await?;
        for skill in top_gaps(skills, TOP_SKILLS) {
            self.cache
                .invalidate(Namespace::SkillArticles, &skill_subject(&skill.name))
                .await?;
        }
        let ranked = self.rank(user_id, skills).await;
        info!(user_id = %user_id, count = ranked.len(), "Content refreshed");
        Ok(ranked.len())
    }

    /// Filtered, URL-deduplicated articles for one skill across all sources.
    async fn articles_for_skill(&self, skill: &str) -> Vec<Article> {
        let subject = skill_subject(skill);
        if let Some(cached) = self
            .cache
            .get::<Vec<Article>>(Namespace::SkillArticles, &subject, None)
            .await
        {
            return cached;
        }

        let fetches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let tag = subject.clone();
            async move {
                let raw = source.fetch(&tag).await;
                (source, tag, raw)
            }
        });

        let mut seen: HashSet<String> = HashSet::new();
        let mut articles = Vec::new();
        let mut any_succeeded = false;
        for (source, tag, raw) in join_all(fetches).await {
            let items = match raw {
                Ok(items) => items,
                Err(e) => {
                    warn!(source = source.name(), skill = %tag, "Article fetch failed: {e}");
                    continue;
                }
            };
            any_succeeded = true;
            for item in items {
                let Some(article) = source.transform(&tag, item) else {
                    continue;
                };
                if source.filter(&article) && seen.insert(article.url.clone()) {
                    articles.push(article);
                }
            }
        }

        // An outage should not pin an empty list for six hours.
        if any_succeeded {
            if let Err(e) = self
                .cache
                .set(Namespace::SkillArticles, &subject, &articles, None)
                .await
            {
                warn!(skill = %subject, "Failed to cache skill articles: {e}");
            }
        }
        articles
    }
}

fn skill_subject(skill: &str) -> String {
    skill.trim().to_lowercase()
}

/// Skills with a positive gap, largest first.
pub fn top_gaps(skills: &[SkillRecord], limit: usize) -> Vec<&SkillRecord> {
    let mut gaps: Vec<&SkillRecord> = skills.iter().filter(|s| s.gap() > 0).collect();
    gaps.sort_by(|a, b| b.gap().cmp(&a.gap()));
    gaps.truncate(limit);
    gaps
}

/// gap/100, +0.3 exact tag match, +0.2 published within 7 days,
/// +0.1 for a 5–15 minute read, capped at 1.0.
pub fn relevance(skill: &SkillRecord, article: &Article) -> f64 {
    let mut score = f64::from(skill.gap()) / 100.0;
    if article.tag.eq_ignore_ascii_case(&skill.name) {
        score += 0.3;
    }
    if article
        .published_at
        .is_some_and(|p| Utc::now() - p <= Duration::days(RECENT_DAYS))
    {
        score += 0.2;
    }
    if (5..=15).contains(&article.reading_time_minutes) {
        score += 0.1;
    }
    score.min(1.0)
}

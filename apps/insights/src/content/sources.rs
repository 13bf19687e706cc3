//! External article sources: one REST API (dev.to) and one GraphQL API (Hashnode).
//!
//! Each source fetches its own raw shape and transforms it into `Article`.
//! Wire shapes stay private to this module.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::AppError;
use crate::models::article::Article;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_SIZE: u32 = 20;

pub const MIN_READING_MINUTES: u32 = 3;
pub const MAX_READING_MINUTES: u32 = 30;

const PROMOTIONAL_MARKERS: &[&str] = &["sponsored", "promo", "discount", "giveaway", "[ad]"];

#[async_trait]
pub trait ArticleSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw items for one tag, in the source's own shape.
    async fn fetch(&self, tag: &str) -> Result<Vec<Value>, AppError>;

    /// Normalizes one raw item. `None` drops items missing required fields.
    fn transform(&self, tag: &str, raw: Value) -> Option<Article>;

    fn filter(&self, article: &Article) -> bool {
        is_acceptable(article)
    }
}

/// Title and URL present, not promotional, reading time within 3–30 minutes.
pub fn is_acceptable(article: &Article) -> bool {
    if article.title.trim().is_empty() || article.url.trim().is_empty() {
        return false;
    }
    let text = format!("{} {}", article.title, article.description).to_lowercase();
    if PROMOTIONAL_MARKERS.iter().any(|m| text.contains(m)) {
        return false;
    }
    (MIN_READING_MINUTES..=MAX_READING_MINUTES).contains(&article.reading_time_minutes)
}

fn http_client() -> Result<Client, AppError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AppError::ContentSource(format!("Failed to build HTTP client: {e}")))
}

/// The item's own tag equal to `requested`, else its first tag, else `requested`. Lowercased.
fn matching_tag<'a>(mut tags: impl Iterator<Item = &'a str> + Clone, requested: &str) -> String {
    tags.clone()
        .find(|t| t.eq_ignore_ascii_case(requested))
        .or_else(|| tags.next())
        .map_or_else(|| requested.to_lowercase(), str::to_lowercase)
}

fn source_error(source: &str, e: impl std::fmt::Display) -> AppError {
    AppError::ContentSource(format!("{source}: {e}"))
}

// ────────────────────────────────────────────────────────────────────────────
// dev.to (REST)
// ────────────────────────────────────────────────────────────────────────────

pub struct DevToSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DevToArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    reading_time_minutes: Option<u32>,
    #[serde(default)]
    tag_list: DevToTags,
}

/// Listings send `tag_list` as an array, single-article payloads as a comma-joined string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DevToTags {
    List(Vec<String>),
    Joined(String),
}

impl Default for DevToTags {
    fn default() -> Self {
        DevToTags::List(Vec::new())
    }
}

impl DevToTags {
    fn into_vec(self) -> Vec<String> {
        match self {
            DevToTags::List(tags) => tags,
            DevToTags::Joined(joined) => joined
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

impl DevToSource {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ArticleSource for DevToSource {
    fn name(&self) -> &'static str {
        "devto"
    }

    async fn fetch(&self, tag: &str) -> Result<Vec<Value>, AppError> {
        let url = format!("{}/articles", self.base_url);
        let per_page = PAGE_SIZE.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("tag", tag), ("per_page", per_page.as_str()), ("top", "30")])
            .send()
            .await
            .map_err(|e| source_error(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(source_error(self.name(), format!("status {status}")));
        }
        let items: Vec<Value> = response
            .json()
            .await
            .map_err(|e| source_error(self.name(), e))?;
        debug!(tag, count = items.len(), "Fetched dev.to articles");
        Ok(items)
    }

    fn transform(&self, tag: &str, raw: Value) -> Option<Article> {
        let item: DevToArticle = serde_json::from_value(raw).ok()?;
        let tags = item.tag_list.into_vec();
        Some(Article {
            title: item.title?,
            url: item.url?,
            description: item.description.unwrap_or_default(),
            tag: matching_tag(tags.iter().map(String::as_str), tag),
            published_at: item.published_at,
            reading_time_minutes: item.reading_time_minutes.unwrap_or_default(),
            source: self.name().to_string(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Hashnode (GraphQL)
// ────────────────────────────────────────────────────────────────────────────

const HASHNODE_QUERY: &str = r#"
query TagFeed($slug: String!, $first: Int!) {
  tag(slug: $slug) {
    posts(first: $first, filter: { sortBy: popular }) {
      edges { node { title url brief publishedAt readTimeInMinutes tags { slug } } }
    }
  }
}"#;

pub struct HashnodeSource {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashnodePost {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    brief: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    read_time_in_minutes: Option<u32>,
    #[serde(default)]
    tags: Vec<HashnodeTag>,
}

#[derive(Debug, Deserialize)]
struct HashnodeTag {
    slug: String,
}

impl HashnodeSource {
    pub fn new(endpoint: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.to_string(),
        })
    }
}

/// Pulls `data.tag.posts.edges[].node` out of a GraphQL response.
fn hashnode_nodes(body: Value) -> Result<Vec<Value>, AppError> {
    if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
        return Err(source_error("hashnode", errors));
    }
    let edges = body
        .pointer("/data/tag/posts/edges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Ok(edges
        .into_iter()
        .filter_map(|mut edge| edge.get_mut("node").map(Value::take))
        .collect())
}

#[async_trait]
impl ArticleSource for HashnodeSource {
    fn name(&self) -> &'static str {
        "hashnode"
    }

    async fn fetch(&self, tag: &str) -> Result<Vec<Value>, AppError> {
        let body = json!({
            "query": HASHNODE_QUERY,
            "variables": { "slug": tag, "first": PAGE_SIZE },
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| source_error(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(source_error(self.name(), format!("status {status}")));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| source_error(self.name(), e))?;
        let nodes = hashnode_nodes(body)?;
        debug!(tag, count = nodes.len(), "Fetched Hashnode posts");
        Ok(nodes)
    }

    fn transform(&self, tag: &str, raw: Value) -> Option<Article> {
        let post: HashnodePost = serde_json::from_value(raw).ok()?;
        let tag = matching_tag(post.tags.iter().map(|t| t.slug.as_str()), tag);
        Some(Article {
            title: post.title?,
            url: post.url?,
            description: post.brief.unwrap_or_default(),
            tag,
            published_at: post.published_at,
            reading_time_minutes: post.read_time_in_minutes.unwrap_or_default(),
            source: self.name().to_string(),
        })
    }
}

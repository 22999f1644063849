//! COVID-19 headline aggregation via the News API

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::NewsConfig;
use crate::error::Result;

/// Categories the News API accepts; anything else falls back to general.
pub const CATEGORIES: &[&str] = &[
    "business",
    "entertainment",
    "general",
    "health",
    "science",
    "sports",
    "technology",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: String,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Clone)]
pub struct NewsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NewsClient {
    pub fn new(config: &NewsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    pub fn normalize_category(category: &str) -> &str {
        if CATEGORIES.contains(&category) {
            category
        } else {
            "general"
        }
    }

    /// Fetch top coronavirus headlines for a category, deduplicated by URL.
    /// The same story syndicated across feeds shows up once.
    pub async fn top_headlines(&self, category: &str) -> Result<Vec<Article>> {
        let response = self
            .http
            .get(format!("{}/v2/top-headlines", self.base_url))
            .query(&[
                ("q", "coronavirus"),
                ("language", "en"),
                ("country", "us"),
                ("category", category),
            ])
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<HeadlinesResponse>()
            .await?;

        Ok(dedup_by_url(response.articles))
    }
}

fn dedup_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| seen.insert(article.url.clone()))
        .collect()
}

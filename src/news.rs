//! News collaborator: trait, CryptoCompare client, static fallback articles.

use crate::error::{AssistantError, Result};
use crate::logging;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn get_latest(&self, topic: &str, limit: usize) -> Result<Vec<NewsArticle>>;
}

// ============ CryptoCompare Client ============

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(rename = "Data", default)]
    data: Vec<NewsRow>,
}

#[derive(Debug, Deserialize)]
struct NewsRow {
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    url: String,
    published_on: Option<i64>,
    #[serde(default)]
    source: String,
}

pub struct CryptoCompareNews {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CryptoCompareNews {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("coinpal/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl NewsSource for CryptoCompareNews {
    async fn get_latest(&self, topic: &str, limit: usize) -> Result<Vec<NewsArticle>> {
        let mut request = self.client
            .get(format!("{}/news/", self.base_url))
            .query(&[("lang", "EN")]);
        if let Some(asset) = crate::market::resolve_asset(topic) {
            request = request.query(&[("categories", asset.symbol)]);
        }
        if let Some(key) = &self.api_key {
            request = request.header("authorization", format!("Apikey {}", key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AssistantError::payload(
                "cryptocompare",
                format!("status {}", response.status()),
            ));
        }
        let raw = response.text().await?;
        let parsed: NewsResponse = serde_json::from_str(&raw)
            .map_err(|e| AssistantError::payload("cryptocompare", e.to_string()))?;

        Ok(parsed
            .data
            .into_iter()
            .take(limit)
            .map(|row| NewsArticle {
                description: summarize(&row.body, 240),
                published_at: row.published_on.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
                title: row.title,
                url: row.url,
                source: row.source,
            })
            .collect())
    }
}

/// Trim to roughly `max` characters on a word boundary.
fn summarize(body: &str, max: usize) -> String {
    if body.chars().count() <= max {
        return body.trim().to_string();
    }
    let cut: String = body.chars().take(max).collect();
    let trimmed = cut.rsplit_once(' ').map(|(head, _)| head).unwrap_or(&cut);
    format!("{}...", trimmed.trim_end())
}

// ============ Static Fallback ============

const FALLBACK_ARTICLES: &[(&str, &str)] = &[
    ("Bitcoin holds steady as traders await macro data",
     "Bitcoin traded in a narrow range while markets waited for the next inflation print."),
    ("Ethereum developers schedule next network upgrade",
     "Core developers agreed on a tentative mainnet date for the upcoming protocol upgrade."),
    ("Institutional interest in crypto ETFs continues",
     "Fund flows into spot crypto ETFs remained positive over the past week."),
    ("Regulators publish new guidance on stablecoins",
     "The guidance focuses on reserve transparency and redemption rights for holders."),
    ("DeFi lending volumes recover after quiet month",
     "Decentralized lending protocols reported rising deposits and steady yields."),
];

pub fn fallback_articles(topic: &str, limit: usize) -> Vec<NewsArticle> {
    let topic_lower = topic.to_lowercase();
    let mut articles: Vec<NewsArticle> = FALLBACK_ARTICLES
        .iter()
        .map(|(title, description)| NewsArticle {
            title: title.to_string(),
            description: description.to_string(),
            url: String::new(),
            published_at: None,
            source: "coinpal (offline sample)".to_string(),
        })
        .collect();
    // Topic matches first, the rest keep their order.
    articles.sort_by_key(|a| !a.title.to_lowercase().contains(&topic_lower));
    articles.truncate(limit);
    articles
}

/// Timeout-bounded news access with static fallback.
#[derive(Clone)]
pub struct NewsGateway {
    provider: Option<Arc<dyn NewsSource>>,
    timeout: Duration,
}

impl NewsGateway {
    pub fn new(provider: Option<Arc<dyn NewsSource>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(1))
    }

    /// Latest articles; the flag is false when static samples were used.
    pub async fn latest(&self, topic: &str, limit: usize) -> (Vec<NewsArticle>, bool) {
        if let Some(provider) = &self.provider {
            let call = provider.get_latest(topic, limit);
            let failure = match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(articles)) if !articles.is_empty() => return (articles, true),
                Ok(Ok(_)) => {
                    AssistantError::payload("news", format!("no articles for '{}'", topic))
                }
                Ok(Err(e)) => e,
                Err(_) => AssistantError::Timeout(self.timeout),
            };
            logging::log_collaborator_failure("News lookup", &failure);
        }
        (fallback_articles(topic, limit), false)
    }
}

//! Market data collaborator: trait, CoinGecko client, and a resilient gateway
//! that falls back to a static table when the provider is slow or down.

use crate::error::{AssistantError, Result};
use crate::logging;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// ============ Asset Table ============

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetInfo {
    pub id: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    aliases: &'static [&'static str],
    /// Illustrative reference price used when live data is unavailable.
    pub reference_price: f64,
}

#[rustfmt::skip]
pub const KNOWN_ASSETS: &[AssetInfo] = &[
    AssetInfo { id: "bitcoin", symbol: "BTC", name: "Bitcoin", aliases: &["bitcoin", "btc", "xbt"], reference_price: 65000.0 },
    AssetInfo { id: "ethereum", symbol: "ETH", name: "Ethereum", aliases: &["ethereum", "eth", "ether"], reference_price: 3200.0 },
    AssetInfo { id: "solana", symbol: "SOL", name: "Solana", aliases: &["solana", "sol"], reference_price: 150.0 },
    AssetInfo { id: "binancecoin", symbol: "BNB", name: "BNB", aliases: &["bnb", "binance"], reference_price: 580.0 },
    AssetInfo { id: "ripple", symbol: "XRP", name: "XRP", aliases: &["xrp", "ripple"], reference_price: 0.55 },
    AssetInfo { id: "cardano", symbol: "ADA", name: "Cardano", aliases: &["cardano", "ada"], reference_price: 0.45 },
    AssetInfo { id: "dogecoin", symbol: "DOGE", name: "Dogecoin", aliases: &["dogecoin", "doge"], reference_price: 0.12 },
    AssetInfo { id: "polkadot", symbol: "DOT", name: "Polkadot", aliases: &["polkadot"], reference_price: 6.5 },
    AssetInfo { id: "litecoin", symbol: "LTC", name: "Litecoin", aliases: &["litecoin", "ltc"], reference_price: 80.0 },
    AssetInfo { id: "tether", symbol: "USDT", name: "Tether", aliases: &["tether", "usdt"], reference_price: 1.0 },
];

pub fn resolve_asset(word: &str) -> Option<&'static AssetInfo> {
    let lower = word.trim().to_lowercase();
    KNOWN_ASSETS
        .iter()
        .find(|a| a.id == lower || a.aliases.contains(&lower.as_str()))
}

/// First known asset mentioned anywhere in `text`.
pub fn find_asset_mention(text: &str) -> Option<&'static AssetInfo> {
    crate::normalizer::normalize(text)
        .split(' ')
        .find_map(resolve_asset)
}

/// `$67,500.00` style formatting; sub-dollar prices keep more precision.
pub fn format_usd(value: f64) -> String {
    if value.abs() < 1.0 {
        return format!("${:.4}", value);
    }
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) if c >= 0.0 => format!("📈 +{:.2}% (24h)", c),
        Some(c) => format!("📉 {:.2}% (24h)", c),
        None => "24h change unavailable".to_string(),
    }
}

// ============ Collaborator Contract ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingAsset {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume: Option<f64>,
}

#[async_trait]
pub trait MarketData: Send + Sync {
    async fn get_trending(&self) -> Result<Vec<TrendingAsset>>;
    async fn get_markets(&self, limit: usize) -> Result<Vec<MarketSnapshot>>;
    async fn get_price(&self, asset_id: &str) -> Result<Option<f64>>;
}

// ============ CoinGecko Client ============

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    coins: Vec<TrendingCoin>,
}

#[derive(Debug, Deserialize)]
struct TrendingCoin {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    id: String,
    name: String,
    symbol: String,
    market_cap_rank: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
}

pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("coinpal/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::payload(
                "coingecko",
                format!("status {}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }

        let raw = response.text().await?;
        serde_json::from_str(&raw).map_err(|e| AssistantError::payload("coingecko", e.to_string()))
    }
}

#[async_trait]
impl MarketData for CoinGeckoClient {
    async fn get_trending(&self) -> Result<Vec<TrendingAsset>> {
        let trending: TrendingResponse = self.get_json("/search/trending", &[]).await?;
        Ok(trending
            .coins
            .into_iter()
            .map(|c| TrendingAsset {
                id: c.item.id,
                name: c.item.name,
                symbol: c.item.symbol.to_uppercase(),
                market_cap_rank: c.item.market_cap_rank,
            })
            .collect())
    }

    async fn get_markets(&self, limit: usize) -> Result<Vec<MarketSnapshot>> {
        let rows: Vec<MarketRow> = self
            .get_json(
                "/coins/markets",
                &[
                    ("vs_currency", "usd".to_string()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", limit.clamp(1, 250).to_string()),
                    ("page", "1".to_string()),
                    ("price_change_percentage", "24h".to_string()),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                Some(MarketSnapshot {
                    price: r.current_price?,
                    id: r.id,
                    symbol: r.symbol.to_uppercase(),
                    name: r.name,
                    change_24h: r.price_change_percentage_24h,
                    market_cap: r.market_cap,
                    volume: r.total_volume,
                })
            })
            .collect())
    }

    async fn get_price(&self, asset_id: &str) -> Result<Option<f64>> {
        let prices: serde_json::Value = self
            .get_json(
                "/simple/price",
                &[("ids", asset_id.to_string()), ("vs_currencies", "usd".to_string())],
            )
            .await?;
        Ok(prices.get(asset_id).and_then(|p| p.get("usd")).and_then(|v| v.as_f64()))
    }
}

// ============ Static Fallback ============

pub fn static_markets(limit: usize) -> Vec<MarketSnapshot> {
    KNOWN_ASSETS
        .iter()
        .take(limit)
        .map(|a| MarketSnapshot {
            id: a.id.to_string(),
            symbol: a.symbol.to_string(),
            name: a.name.to_string(),
            price: a.reference_price,
            change_24h: None,
            market_cap: None,
            volume: None,
        })
        .collect()
}

pub fn static_trending() -> Vec<TrendingAsset> {
    KNOWN_ASSETS
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, a)| TrendingAsset {
            id: a.id.to_string(),
            name: a.name.to_string(),
            symbol: a.symbol.to_string(),
            market_cap_rank: Some(i as u32 + 1),
        })
        .collect()
}

// ============ Resilient Gateway ============

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_24h: Option<f64>,
    pub live: bool,
}

impl Quote {
    pub fn describe(&self) -> String {
        let mut line = format!(
            "{} ({}) is trading at {} {}",
            self.name,
            self.symbol,
            format_usd(self.price),
            format_change(self.change_24h)
        );
        if !self.live {
            line.push_str(". Live price unavailable, showing a reference value");
        }
        line.push('.');
        line
    }
}

/// Wraps an optional live provider with a bounded timeout and static data.
#[derive(Clone)]
pub struct MarketGateway {
    provider: Option<Arc<dyn MarketData>>,
    timeout: Duration,
}

impl MarketGateway {
    pub fn new(provider: Option<Arc<dyn MarketData>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(1))
    }

    async fn bounded<T, F>(&self, what: &str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                logging::log_collaborator_failure(&format!("Market data ({})", what), &e);
                None
            }
            Err(_) => {
                let e = AssistantError::Timeout(self.timeout);
                logging::log_collaborator_failure(&format!("Market data ({})", what), &e);
                None
            }
        }
    }

    pub async fn quote(&self, asset: &AssetInfo) -> Quote {
        if let Some(provider) = &self.provider {
            if let Some(Some(price)) = self.bounded("price", provider.get_price(asset.id)).await {
                let change_24h = self
                    .bounded("markets", provider.get_markets(50))
                    .await
                    .and_then(|rows| rows.into_iter().find(|r| r.id == asset.id))
                    .and_then(|r| r.change_24h);
                return Quote {
                    id: asset.id.to_string(),
                    symbol: asset.symbol.to_string(),
                    name: asset.name.to_string(),
                    price,
                    change_24h,
                    live: true,
                };
            }
        }

        Quote {
            id: asset.id.to_string(),
            symbol: asset.symbol.to_string(),
            name: asset.name.to_string(),
            price: asset.reference_price,
            change_24h: None,
            live: false,
        }
    }

    /// Top markets by capitalisation; the flag is false when static data was used.
    pub async fn markets(&self, limit: usize) -> (Vec<MarketSnapshot>, bool) {
        if let Some(provider) = &self.provider {
            if let Some(rows) = self.bounded("markets", provider.get_markets(limit)).await {
                if !rows.is_empty() {
                    return (rows, true);
                }
            }
        }
        (static_markets(limit), false)
    }

    pub async fn trending(&self) -> (Vec<TrendingAsset>, bool) {
        if let Some(provider) = &self.provider {
            if let Some(rows) = self.bounded("trending", provider.get_trending()).await {
                if !rows.is_empty() {
                    return (rows, true);
                }
            }
        }
        (static_trending(), false)
    }
}

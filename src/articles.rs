//! Document/article search: a small in-memory library of explainers scored by
//! title, tag and body matches.

use crate::error::{AssistantError, Result};
use crate::logging;
use crate::normalizer;
use crate::sentiment::{SentimentAnalyzer, SentimentReading};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

const TITLE_WEIGHT: u32 = 3;
const TAG_WEIGHT: u32 = 2;
const BODY_WEIGHT: u32 = 1;
pub const MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredArticle {
    pub article: Article,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleInsights {
    pub found: bool,
    pub articles: Vec<ScoredArticle>,
    pub themes: BTreeSet<String>,
    pub sentiment: SentimentReading,
}

impl ArticleInsights {
    pub fn describe(&self) -> String {
        if !self.found {
            return "I couldn't find any articles on that topic yet.".to_string();
        }
        let titles: Vec<String> = self
            .articles
            .iter()
            .map(|a| format!("\"{}\"", a.article.title))
            .collect();
        let mut text = format!(
            "I found {} article{}: {}.",
            self.articles.len(),
            if self.articles.len() == 1 { "" } else { "s" },
            titles.join(", ")
        );
        if let Some(top) = self.articles.first() {
            text.push_str(&format!(" {}", first_sentence(&top.article.body)));
        }
        if !self.themes.is_empty() {
            let themes: Vec<&str> = self.themes.iter().map(String::as_str).collect();
            text.push_str(&format!(" Themes: {}.", themes.join(", ")));
        }
        text.push(' ');
        text.push_str(&self.sentiment.summary());
        text
    }
}

fn first_sentence(body: &str) -> &str {
    match body.find(". ") {
        Some(end) => &body[..=end],
        None => body,
    }
}

pub struct ArticleStore {
    articles: Vec<Article>,
    analyzer: SentimentAnalyzer,
}

impl ArticleStore {
    pub fn new(articles: Vec<Article>, analyzer: SentimentAnalyzer) -> Self {
        Self { articles, analyzer }
    }

    pub fn builtin(analyzer: SentimentAnalyzer) -> Self {
        Self::new(builtin_articles(), analyzer)
    }

    /// Load from `path` if given, otherwise (or on failure) the built-in set.
    pub fn load_or_builtin(path: Option<&Path>, analyzer: SentimentAnalyzer) -> Self {
        let Some(path) = path else {
            return Self::builtin(analyzer);
        };
        match read_articles(path) {
            Ok(articles) => Self::new(articles, analyzer),
            Err(e) => {
                logging::log_error(
                    None,
                    &format!("Articles unavailable ({}), using built-in set", e),
                );
                Self::builtin(analyzer)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn search(&self, query: &str, category: Option<&str>) -> Vec<ScoredArticle> {
        let terms = normalizer::tokens(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredArticle> = self
            .articles
            .iter()
            .filter(|a| category.map_or(true, |c| a.category.eq_ignore_ascii_case(c)))
            .filter_map(|a| {
                let score = score_article(a, &terms);
                (score > 0).then(|| ScoredArticle { article: a.clone(), score })
            })
            .collect();

        scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.article.id.cmp(&b.article.id)));
        scored.truncate(MAX_RESULTS);
        scored
    }

    pub fn insights(&self, query: &str) -> ArticleInsights {
        let articles = self.search(query, None);
        let texts: Vec<String> = articles
            .iter()
            .map(|a| format!("{} {}", a.article.title, a.article.body))
            .collect();
        let sentiment = self.analyzer.analyze(&texts);

        let mut themes: BTreeSet<String> = articles
            .iter()
            .flat_map(|a| a.article.tags.iter().cloned())
            .collect();
        themes.extend(sentiment.factors.iter().cloned());

        ArticleInsights {
            found: !articles.is_empty(),
            articles,
            themes,
            sentiment,
        }
    }
}

fn read_articles(path: &Path) -> Result<Vec<Article>> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| AssistantError::payload("articles", format!("{}: {}", path.display(), e)))
}

fn score_article(article: &Article, terms: &[String]) -> u32 {
    let title = normalizer::tokens(&article.title).join(" ");
    let body = normalizer::tokens(&article.body).join(" ");
    let tags: Vec<String> = article.tags.iter().map(|t| normalizer::canonical(t)).collect();

    terms
        .iter()
        .map(|term| {
            let mut score = 0;
            if title.contains(term.as_str()) {
                score += TITLE_WEIGHT;
            }
            if tags.iter().any(|t| t.contains(term.as_str())) {
                score += TAG_WEIGHT;
            }
            if body.contains(term.as_str()) {
                score += BODY_WEIGHT;
            }
            score
        })
        .sum()
}

fn builtin_articles() -> Vec<Article> {
    #[rustfmt::skip]
    const SEED: &[(&str, &str, &str, &[&str], &str)] = &[
        ("btc-halving", "Understanding the Bitcoin Halving",
         "Every 210,000 blocks the bitcoin block subsidy is cut in half. Past halvings tightened new supply and were followed by strong rallies, although miners face pressure on revenue.",
         &["bitcoin", "mining", "halving"], "education"),
        ("eth-staking", "Ethereum Staking Explained",
         "Ethereum validators lock 32 ETH to propose and attest to blocks. Staking rewards depend on total stake, and liquid staking protocols let smaller holders participate.",
         &["ethereum", "staking"], "education"),
        ("defi-risks", "The Risks of Decentralized Finance",
         "DeFi lending and liquidity pools offer yield without intermediaries. Smart contract exploits and hacks remain the main risk, so audits and position sizing matter.",
         &["defi", "security", "lending"], "education"),
        ("stablecoin-regulation", "Stablecoins Under Regulatory Scrutiny",
         "Regulators are drafting rules on stablecoin reserves and redemption. Clear legislation could support adoption, while a crackdown on issuers would weigh on liquidity.",
         &["stablecoin", "regulation"], "analysis"),
        ("etf-flows", "What Spot ETF Flows Mean for Crypto",
         "Spot bitcoin ETFs give institutions regulated exposure. Sustained inflows signal institutional demand, while outflows often coincide with price declines.",
         &["bitcoin", "etf", "institutional"], "analysis"),
        ("wallet-security", "Keeping Your Crypto Wallet Safe",
         "Hardware wallets keep private keys offline. Never share a seed phrase, watch for phishing sites and test recovery before storing large amounts.",
         &["wallet", "security"], "guide"),
        ("solana-overview", "Solana: Speed and Trade-offs",
         "Solana targets high throughput with proof of history and parallel execution. The network has grown fast in adoption but has suffered outages during peak load.",
         &["solana", "layer1"], "education"),
        ("market-cycles", "Bull and Bear Market Cycles",
         "Crypto markets move in cycles of euphoria and capitulation. Dollar cost averaging reduces timing risk across both bull and bear phases.",
         &["market", "bull", "bear", "investing"], "guide"),
    ];

    SEED.iter()
        .map(|(id, title, body, tags, category)| Article {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category: category.to_string(),
        })
        .collect()
}

//! Intent router (dialogue manager).
//!
//! Every input is classified in a fixed priority order and the first branch
//! that claims it produces the reply:
//!
//! 1. persona switch commands
//! 2. article/document requests
//! 3. market insight and trending requests
//! 4. price queries naming a known asset
//! 5. news queries naming a known asset
//! 6. exact greetings and farewells
//! 7. crypto questions (similarity retrieval)
//! 8. everything else (similarity retrieval)
//!
//! Handler errors never escape: they become an apology with intent `error`.

use crate::articles::ArticleStore;
use crate::conversation::{ConversationLog, ConversationTurn};
use crate::error::{AssistantError, Result};
use crate::logging;
use crate::market::{self, AssetInfo, MarketGateway, MarketSnapshot};
use crate::news::NewsGateway;
use crate::normalizer;
use crate::patterns::{OverrideMatch, PatternOverrides, SwitchTarget};
use crate::persona::{self, Mode, PersonalityState};
use crate::sentiment::SentimentAnalyzer;
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PersonalitySwitch,
    ArticleInsight,
    MarketInsight,
    PriceQuery,
    NewsQuery,
    Greeting,
    Farewell,
    Crypto,
    General,
    Error,
    Fallback,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::PersonalitySwitch => "personality_switch",
            Intent::ArticleInsight => "article_insight",
            Intent::MarketInsight => "market_insight",
            Intent::PriceQuery => "price_query",
            Intent::NewsQuery => "news_query",
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::Crypto => "crypto",
            Intent::General => "general",
            Intent::Error => "error",
            Intent::Fallback => "fallback",
        }
    }
}

/// The single reply shape used at every layer boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotResponse {
    pub message: String,
    pub mode: Mode,
    pub intent: Intent,
    pub confidence: f64,
}

const FIXED_CONFIDENCE: f64 = 1.0;
const LIVE_CONFIDENCE: f64 = 0.9;
const STATIC_CONFIDENCE: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.2;
const STATIC_NOTICE: &str = " (Live data unavailable, showing reference values.)";

static ARTICLE_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(articles?|guides?|explainers?|docs|documents?|reading list|deep dive|learn more)\b")
        .expect("article pattern must compile")
});

static INSIGHT_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(market (insights?|sentiment|overview|update|mood|analysis)|sentiment|insights?|how(?:'s| is) the market|market doing|top movers|trending|what(?:'s| is) hot)\b")
        .expect("insight pattern must compile")
});

static TRENDING_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(trending|what(?:'s| is) hot|hot coins)\b").expect("trending pattern must compile")
});

static PRICE_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(price|prices|worth|cost|trading at|how much|value of)\b").expect("price pattern must compile")
});

static NEWS_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(news|headlines?|latest on|happening with|updates? on)\b").expect("news pattern must compile")
});

pub struct DialogueManager {
    personas: Arc<PersonalityState>,
    market: MarketGateway,
    news: NewsGateway,
    articles: Arc<ArticleStore>,
    analyzer: Arc<SentimentAnalyzer>,
    log: Arc<ConversationLog>,
}

impl DialogueManager {
    pub fn new(
        personas: Arc<PersonalityState>,
        market: MarketGateway,
        news: NewsGateway,
        articles: Arc<ArticleStore>,
        analyzer: Arc<SentimentAnalyzer>,
        log: Arc<ConversationLog>,
    ) -> Self {
        Self { personas, market, news, articles, analyzer, log }
    }

    pub fn personas(&self) -> &Arc<PersonalityState> {
        &self.personas
    }

    pub fn market(&self) -> &MarketGateway {
        &self.market
    }

    pub fn news(&self) -> &NewsGateway {
        &self.news
    }

    pub fn analyzer(&self) -> &Arc<SentimentAnalyzer> {
        &self.analyzer
    }

    pub fn log(&self) -> &Arc<ConversationLog> {
        &self.log
    }

    /// Answer a user message and record the exchange.
    pub async fn route(&self, raw: &str) -> BotResponse {
        let response = self.respond(raw).await;
        self.log.append(ConversationTurn::new(
            raw,
            &response.message,
            response.mode,
            response.intent.as_str(),
        ));
        response
    }

    /// Answer without recording; used for training probes.
    pub async fn respond(&self, raw: &str) -> BotResponse {
        let mode = self.personas.active();
        match self.dispatch(raw, mode).await {
            Ok(response) => {
                logging::log_routing(
                    None,
                    &format!(
                        "[{}] {} (confidence {:.2})",
                        response.mode.as_str(),
                        response.intent.as_str(),
                        response.confidence
                    ),
                );
                response
            }
            Err(e) => {
                logging::log_error(None, &format!("Router fault on input {:?}: {}", raw, e));
                BotResponse {
                    message: persona::apology(mode).to_string(),
                    mode,
                    intent: Intent::Error,
                    confidence: 0.0,
                }
            }
        }
    }

    async fn dispatch(&self, raw: &str, mode: Mode) -> Result<BotResponse> {
        if normalizer::normalize(raw).is_empty() {
            let line = pick(persona::greetings(mode));
            return Ok(reply(mode, Intent::Greeting, line, FIXED_CONFIDENCE));
        }
        let text = normalizer::lowercase_for_patterns(raw);

        if let Some(target) = PatternOverrides::switch_command(raw) {
            return Ok(self.handle_switch(target));
        }

        if ARTICLE_PHRASES.is_match(&text) {
            return Ok(self.handle_articles(&text, mode));
        }

        if INSIGHT_PHRASES.is_match(&text) {
            return Ok(self.handle_market_insight(&text, mode).await);
        }

        if let Some(word) = PatternOverrides::price_request(raw) {
            return match market::resolve_asset(&word) {
                Some(asset) => self.handle_price(asset, mode).await,
                None => Ok(unknown_asset(&word, mode)),
            };
        }
        if PRICE_PHRASES.is_match(&text) {
            if let Some(asset) = market::find_asset_mention(raw) {
                return self.handle_price(asset, mode).await;
            }
        }

        if NEWS_PHRASES.is_match(&text) {
            if let Some(asset) = market::find_asset_mention(raw) {
                return Ok(self.handle_news(asset, mode).await);
            }
        }

        match PatternOverrides::match_input(raw, mode) {
            Some(OverrideMatch::Greeting(line)) => {
                return Ok(reply(mode, Intent::Greeting, line, FIXED_CONFIDENCE));
            }
            Some(OverrideMatch::Farewell(line)) => {
                return Ok(reply(mode, Intent::Farewell, line, FIXED_CONFIDENCE));
            }
            _ => {}
        }

        let intent = if persona::is_crypto_related(raw) {
            Intent::Crypto
        } else {
            Intent::General
        };
        Ok(self.handle_retrieval(raw, mode, intent))
    }

    fn handle_switch(&self, target: SwitchTarget) -> BotResponse {
        let mode = target.resolve(self.personas.active());
        let previous = self.personas.switch(mode);
        reply(
            mode,
            Intent::PersonalitySwitch,
            persona::switch_confirmation(mode, previous == mode),
            FIXED_CONFIDENCE,
        )
    }

    fn handle_articles(&self, text: &str, mode: Mode) -> BotResponse {
        // Drop the trigger words so they don't score against article bodies.
        let query = ARTICLE_PHRASES.replace_all(text, " ");
        let insights = self.articles.insights(&query);
        let confidence = if insights.found { 0.8 } else { 0.3 };
        let message = persona::decorate(mode, &insights.describe());
        reply(mode, Intent::ArticleInsight, message, confidence)
    }

    async fn handle_market_insight(&self, text: &str, mode: Mode) -> BotResponse {
        if TRENDING_PHRASES.is_match(text) {
            let (trending, live) = self.market.trending().await;
            let names: Vec<String> = trending
                .iter()
                .take(7)
                .map(|t| format!("{} ({})", t.name, t.symbol))
                .collect();
            let mut message = format!("Trending right now: {}.", names.join(", "));
            if !live {
                message.push_str(STATIC_NOTICE);
            }
            let message = persona::decorate(mode, &message);
            return reply(mode, Intent::MarketInsight, message, live_confidence(live));
        }

        let ((articles, news_live), (markets, market_live)) =
            tokio::join!(self.news.latest("crypto", 5), self.market.markets(10));

        let headlines: Vec<String> = articles
            .iter()
            .map(|a| format!("{}. {}", a.title, a.description))
            .collect();
        let reading = self.analyzer.analyze(&headlines);

        let mut message = reading.summary();
        let movers = top_movers(&markets, 3);
        if movers.is_empty() {
            let leaders: Vec<String> = markets
                .iter()
                .take(3)
                .map(|m| format!("{} {}", m.symbol, market::format_usd(m.price)))
                .collect();
            message.push_str(&format!(" Largest assets: {}.", leaders.join(", ")));
        } else {
            let lines: Vec<String> = movers
                .iter()
                .map(|m| format!("{} {}", m.symbol, market::format_change(m.change_24h)))
                .collect();
            message.push_str(&format!(" Top movers: {}.", lines.join(", ")));
        }
        if !(news_live && market_live) {
            message.push_str(STATIC_NOTICE);
        }

        reply(
            mode,
            Intent::MarketInsight,
            persona::decorate(mode, &message),
            live_confidence(news_live && market_live),
        )
    }

    async fn handle_price(&self, asset: &AssetInfo, mode: Mode) -> Result<BotResponse> {
        let quote = self.market.quote(asset).await;
        if !quote.price.is_finite() || quote.price < 0.0 {
            return Err(AssistantError::Handler(format!(
                "unusable price {} for {}", quote.price, asset.id
            )));
        }
        Ok(reply(
            mode,
            Intent::PriceQuery,
            persona::decorate(mode, &quote.describe()),
            live_confidence(quote.live),
        ))
    }

    async fn handle_news(&self, asset: &AssetInfo, mode: Mode) -> BotResponse {
        let (articles, live) = self.news.latest(asset.id, 3).await;
        let mut message = format!("Latest {} news:", asset.name);
        for (i, article) in articles.iter().enumerate() {
            message.push_str(&format!("\n{}. {}", i + 1, article.title));
            if !article.description.is_empty() {
                message.push_str(&format!(" - {}", article.description));
            }
        }
        if !live {
            message.push_str("\n(Live news unavailable, showing sample headlines.)");
        }
        reply(mode, Intent::NewsQuery, persona::decorate(mode, &message), live_confidence(live))
    }

    fn handle_retrieval(&self, raw: &str, mode: Mode, intent: Intent) -> BotResponse {
        let retrieval = self.personas.engine(mode).retrieve(raw);
        // Zero similarity means the persona fallback line was served.
        if retrieval.similarity <= 0.0 {
            return reply(mode, Intent::Fallback, retrieval.response, FALLBACK_CONFIDENCE);
        }
        let confidence = (0.5 + 0.5 * retrieval.similarity).min(1.0);
        reply(mode, intent, retrieval.response, confidence)
    }
}

fn reply(mode: Mode, intent: Intent, message: String, confidence: f64) -> BotResponse {
    BotResponse { message, mode, intent, confidence }
}

fn live_confidence(live: bool) -> f64 {
    if live { LIVE_CONFIDENCE } else { STATIC_CONFIDENCE }
}

fn unknown_asset(word: &str, mode: Mode) -> BotResponse {
    let known: Vec<&str> = market::KNOWN_ASSETS.iter().map(|a| a.symbol).collect();
    let message = format!(
        "I don't have price data for \"{}\". I can quote {}.",
        word,
        known.join(", ")
    );
    reply(mode, Intent::PriceQuery, persona::decorate(mode, &message), STATIC_CONFIDENCE)
}

fn top_movers(markets: &[MarketSnapshot], n: usize) -> Vec<&MarketSnapshot> {
    let mut movers: Vec<&MarketSnapshot> =
        markets.iter().filter(|m| m.change_24h.is_some()).collect();
    movers.sort_by(|a, b| {
        let a = a.change_24h.unwrap_or(0.0).abs();
        let b = b.change_24h.unwrap_or(0.0).abs();
        b.total_cmp(&a)
    });
    movers.truncate(n);
    movers
}

fn pick(lines: &[&str]) -> String {
    lines.choose(&mut rand::rng()).copied().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::corpus::{self, CorpusEntry};
    use crate::market::tests::FixedMarket;
    use std::time::Duration;

    fn manager_with(market: MarketGateway, primary: Vec<CorpusEntry>) -> DialogueManager {
        let config = RetrievalConfig { seed: Some(11), ..RetrievalConfig::default() };
        let stylized = corpus::builtin(Mode::Stylized);
        let personas = Arc::new(PersonalityState::new(primary, stylized, &config));
        DialogueManager::new(
            personas,
            market,
            NewsGateway::offline(),
            Arc::new(ArticleStore::builtin(SentimentAnalyzer::default())),
            Arc::new(SentimentAnalyzer::default()),
            Arc::new(ConversationLog::new()),
        )
    }

    fn manager() -> DialogueManager {
        manager_with(MarketGateway::offline(), corpus::builtin(Mode::Primary))
    }

    fn fixed_market(price: f64) -> MarketGateway {
        MarketGateway::new(Some(Arc::new(FixedMarket::price(price, 2.5))), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_hello_is_a_greeting() {
        let router = manager();
        let response = router.route("hello").await;
        assert_eq!(response.intent, Intent::Greeting);
        assert_eq!(response.mode, Mode::Primary);
        assert!(!response.message.is_empty());
        assert_eq!(router.personas().active(), Mode::Primary);
    }

    #[tokio::test]
    async fn test_switch_command() {
        let router = manager();
        let response = router.route("switch to stylized mode").await;
        assert_eq!(response.intent, Intent::PersonalitySwitch);
        assert_eq!(response.mode, Mode::Stylized);
        assert_eq!(router.personas().active(), Mode::Stylized);
        assert_eq!(response.message, persona::switch_confirmation(Mode::Stylized, false));

        let again = router.route("switch to stylized mode").await;
        assert_eq!(again.message, persona::switch_confirmation(Mode::Stylized, true));
    }

    #[tokio::test]
    async fn test_questions_never_change_persona() {
        let router = manager();
        router.personas().switch(Mode::Stylized);
        for question in [
            "will bitcoin prices go back to normal soon?",
            "did the ethereum fees get back to normal",
            "how do exchanges switch modes during outages",
        ] {
            let response = router.route(question).await;
            assert_ne!(response.intent, Intent::PersonalitySwitch, "{}", question);
            assert_eq!(response.mode, Mode::Stylized);
        }
        assert_eq!(router.personas().active(), Mode::Stylized);
    }

    #[tokio::test]
    async fn test_price_of_pronoun_is_not_an_unknown_asset() {
        let router = manager();
        let response = router.route("what is the price of it?").await;
        assert_ne!(response.intent, Intent::PriceQuery);
        assert!(!response.message.contains("\"it\""));
    }

    #[tokio::test]
    async fn test_price_of_bitcoin() {
        let router = manager_with(fixed_market(67500.0), corpus::builtin(Mode::Primary));
        let response = router.route("price of bitcoin").await;
        assert_eq!(response.intent, Intent::PriceQuery);
        assert!(response.message.contains("$67,500.00"));
        assert!(response.message.contains("(24h)"));
        assert_eq!(response.confidence, LIVE_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_price_phrase_with_asset_mention() {
        let router = manager_with(fixed_market(67500.0), corpus::builtin(Mode::Primary));
        let response = router.route("how much is btc worth right now?").await;
        assert_eq!(response.intent, Intent::PriceQuery);
        assert!(response.message.contains("$67,500.00"));
    }

    #[tokio::test]
    async fn test_unknown_asset_is_not_retrieved() {
        let router = manager();
        let response = router.route("price of foocoin").await;
        assert_eq!(response.intent, Intent::PriceQuery);
        assert!(response.message.contains("foocoin"));
        assert_eq!(router.personas().engine(Mode::Primary).stats().cache_misses, 0);
    }

    #[tokio::test]
    async fn test_empty_input_is_greeting_class() {
        let router = manager();
        for input in ["", "   ", "?!"] {
            let response = router.route(input).await;
            assert_eq!(response.intent, Intent::Greeting);
            assert!(!response.message.is_empty());
        }
    }

    #[tokio::test]
    async fn test_override_never_reaches_retrieval() {
        let corpus = vec![CorpusEntry::new("hello", "corpus hello answer")];
        let router = manager_with(MarketGateway::offline(), corpus);
        let response = router.route("hello").await;
        assert_eq!(response.intent, Intent::Greeting);
        assert_ne!(response.message, "corpus hello answer");
        let stats = router.personas().engine(Mode::Primary).stats();
        assert_eq!(stats.cache_misses + stats.cache_hits, 0);
    }

    #[tokio::test]
    async fn test_handler_fault_becomes_apology() {
        let router = manager_with(fixed_market(f64::NAN), corpus::builtin(Mode::Primary));
        let response = router.route("price of btc").await;
        assert_eq!(response.intent, Intent::Error);
        assert_eq!(response.message, persona::apology(Mode::Primary));
        assert_eq!(router.log().stats().by_intent.get("error"), Some(&1));
    }

    #[tokio::test]
    async fn test_stylized_external_reply_is_decorated() {
        let router = manager_with(fixed_market(67500.0), corpus::builtin(Mode::Primary));
        router.personas().switch(Mode::Stylized);
        let response = router.route("btc price").await;
        assert_eq!(response.mode, Mode::Stylized);
        assert!(response.message.contains("$67,500.00"));
        assert!(response.message.starts_with("Alright anon") || response.message.starts_with("Ser") || response.message.starts_with("Fresh"));
    }

    #[tokio::test]
    async fn test_news_query_uses_samples_offline() {
        let router = manager();
        let response = router.route("latest news on ethereum").await;
        assert_eq!(response.intent, Intent::NewsQuery);
        assert!(response.message.starts_with("Latest Ethereum news:"));
        assert!(response.message.contains("sample headlines"));
    }

    #[tokio::test]
    async fn test_article_and_market_insight() {
        let router = manager();
        let articles = router.route("any articles about staking?").await;
        assert_eq!(articles.intent, Intent::ArticleInsight);
        assert!(articles.message.contains("Ethereum Staking Explained"));

        let insight = router.route("how is the market doing?").await;
        assert_eq!(insight.intent, Intent::MarketInsight);
        assert!(insight.message.contains("Market sentiment"));

        let trending = router.route("what's trending?").await;
        assert_eq!(trending.intent, Intent::MarketInsight);
        assert!(trending.message.starts_with("Trending right now"));
    }

    #[tokio::test]
    async fn test_crypto_and_general_buckets() {
        let router = manager();
        let crypto = router.route("what is a blockchain").await;
        assert_eq!(crypto.intent, Intent::Crypto);
        assert!(crypto.confidence > 0.5);

        let general = router.route("recommend a pasta recipe").await;
        assert_eq!(general.intent, Intent::Fallback);
    }

    #[tokio::test]
    async fn test_respond_does_not_log() {
        let router = manager();
        router.respond("what is bitcoin").await;
        assert!(router.log().is_empty());
        router.route("what is bitcoin").await;
        assert_eq!(router.log().len(), 1);
    }

    #[test]
    fn test_intent_labels_match_serde() {
        for intent in [Intent::PersonalitySwitch, Intent::NewsQuery, Intent::Fallback] {
            let json = serde_json::to_string(&intent).unwrap();
            assert_eq!(json, format!("\"{}\"", intent.as_str()));
        }
    }
}

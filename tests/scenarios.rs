use async_trait::async_trait;
use coinpal_lib::config::{Config, RetrievalConfig, TrainingConfig};
use coinpal_lib::corpus::{self, CorpusEntry};
use coinpal_lib::error::Result;
use coinpal_lib::market::{MarketData, MarketSnapshot, TrendingAsset};
use coinpal_lib::persona::{Mode, PersonalityState};
use coinpal_lib::retrieval::{RetrievalEngine, RetrievalSource};
use coinpal_lib::router::Intent;
use coinpal_lib::training::TrainingSnapshot;
use coinpal_lib::vectorizer::Vocabulary;
use coinpal_lib::Assistant;
use std::sync::Arc;

struct MockMarket {
    price: f64,
    change: f64,
}

#[async_trait]
impl MarketData for MockMarket {
    async fn get_trending(&self) -> Result<Vec<TrendingAsset>> {
        Ok(Vec::new())
    }

    async fn get_markets(&self, _limit: usize) -> Result<Vec<MarketSnapshot>> {
        Ok(vec![MarketSnapshot {
            id: "bitcoin".to_string(),
            symbol: "BTC".to_string(),
            name: "Bitcoin".to_string(),
            price: self.price,
            change_24h: Some(self.change),
            market_cap: None,
            volume: None,
        }])
    }

    async fn get_price(&self, asset_id: &str) -> Result<Option<f64>> {
        Ok((asset_id == "bitcoin").then_some(self.price))
    }
}

fn offline_config() -> Config {
    let mut config = Config::default();
    config.external.enabled = false;
    config.retrieval.seed = Some(2024);
    config.data.export_dir = std::env::temp_dir().join("coinpal-scenario-exports");
    config
}

fn seeded() -> RetrievalConfig {
    RetrievalConfig { seed: Some(1), ..RetrievalConfig::default() }
}

#[tokio::test]
async fn hello_in_primary_mode_is_a_greeting() {
    let assistant = Assistant::new(offline_config()).unwrap();
    let reply = assistant.send_message("hello").await;
    assert_eq!(reply.intent, Intent::Greeting);
    assert!(!reply.message.is_empty());
    assert_eq!(reply.mode, Mode::Primary);
    assert_eq!(assistant.active_mode(), Mode::Primary);
}

#[tokio::test]
async fn switch_command_changes_persona() {
    let assistant = Assistant::new(offline_config()).unwrap();
    let reply = assistant.send_message("switch to stylized mode").await;
    assert_eq!(reply.intent, Intent::PersonalitySwitch);
    assert_eq!(assistant.active_mode(), Mode::Stylized);
    assert!(reply.message.to_lowercase().contains("stylized"));
}

#[tokio::test]
async fn price_of_bitcoin_uses_the_market_collaborator() {
    let market: Arc<dyn MarketData> = Arc::new(MockMarket { price: 67500.00, change: -1.25 });
    let assistant = Assistant::with_collaborators(offline_config(), Some(market), None).unwrap();
    let reply = assistant.send_message("price of bitcoin").await;
    assert_eq!(reply.intent, Intent::PriceQuery);
    assert!(reply.message.contains("$67,500.00"), "{}", reply.message);
    assert!(reply.message.contains("-1.25% (24h)"), "{}", reply.message);
}

#[tokio::test]
async fn empty_input_never_fails() {
    let assistant = Assistant::new(offline_config()).unwrap();
    let reply = assistant.send_message("").await;
    assert!(matches!(reply.intent, Intent::Greeting | Intent::Fallback));
    assert!(!reply.message.is_empty());
}

#[tokio::test]
async fn one_cycle_after_improving_history_slows_training() {
    let assistant = Assistant::new(offline_config()).unwrap();
    assistant.training().restore(TrainingSnapshot {
        cycle_index: 2,
        quality_history: vec![0.05, 0.10],
        interval_seconds: 60.0,
        weak_probes: Vec::new(),
    });

    let session = assistant.run_training_cycle().await.unwrap();
    assert!(session.learning_velocity > 0.0);
    assert!(session.interval_seconds > 60.0);
    assert!(session.interval_seconds <= TrainingConfig::default().max_interval_secs);
    assert_eq!(assistant.get_status().training.cycle_index, 3);
}

#[test]
fn vocabulary_is_deterministic() {
    let entries = corpus::builtin(Mode::Primary);
    let first = Vocabulary::build(entries.iter().map(|e| e.prompt.as_str()));
    let second = Vocabulary::build(entries.iter().rev().map(|e| e.prompt.as_str()));
    assert_eq!(first.terms(), second.terms());
    assert_eq!(first.len(), second.len());
}

#[test]
fn similarity_stays_in_unit_range() {
    let entries = corpus::builtin(Mode::Primary);
    let vocabulary = Vocabulary::build(entries.iter().map(|e| e.prompt.as_str()));
    let vectors: Vec<_> = entries.iter().map(|e| vocabulary.vectorize(&e.prompt)).collect();
    for a in &vectors {
        for b in &vectors {
            let s = a.cosine(b);
            assert!((0.0..=1.0).contains(&s));
        }
        if !a.is_zero() {
            assert!((a.cosine(a) - 1.0).abs() < 1e-9);
        }
    }
    let empty = vocabulary.vectorize("");
    assert_eq!(empty.cosine(&empty), 0.0);
}

#[test]
fn repeated_query_is_served_from_cache() {
    let engine = RetrievalEngine::new(Mode::Primary, corpus::builtin(Mode::Primary), &seeded());
    let first = engine.retrieve("what is a stablecoin");
    let computations = engine.stats().similarity_computations;
    let second = engine.retrieve("What is a STABLECOIN?");
    assert_eq!(second.source, RetrievalSource::Cache);
    assert_eq!(first.response, second.response);
    assert_eq!(engine.stats().similarity_computations, computations);
}

#[tokio::test]
async fn override_inputs_skip_retrieval() {
    let mut config = offline_config();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("primary.json");
    std::fs::write(
        &path,
        r#"[{"user": "switch to stylized mode please", "bot": "corpus answer"},
            {"user": "what is bitcoin", "bot": "bitcoin answer"}]"#,
    )
    .unwrap();
    config.data.primary_corpus = Some(path);

    let assistant = Assistant::new(config).unwrap();
    let reply = assistant.send_message("switch to stylized mode please").await;
    assert_eq!(reply.intent, Intent::PersonalitySwitch);
    assert_ne!(reply.message, "corpus answer");
    let primary = assistant.get_status().personas.primary;
    assert_eq!(primary.cache_hits + primary.cache_misses, 0);
}

#[test]
fn switching_leaves_the_other_persona_alone() {
    let state = PersonalityState::new(
        corpus::builtin(Mode::Primary),
        corpus::builtin(Mode::Stylized),
        &seeded(),
    );
    let primary_terms = state.engine(Mode::Primary).vocabulary().terms().to_vec();
    let primary_entries = state.engine(Mode::Primary).entries().to_vec();

    state.switch(Mode::Stylized);
    state.engine(state.active()).retrieve("what are gas fees");
    state.switch(Mode::Primary);
    state.switch(Mode::Stylized);

    assert_eq!(state.engine(Mode::Primary).vocabulary().terms(), primary_terms.as_slice());
    assert_eq!(state.engine(Mode::Primary).entries(), primary_entries.as_slice());
    assert_eq!(state.engine(Mode::Primary).stats().cached, 0);
    assert_eq!(state.engine(Mode::Stylized).stats().cached, 1);
}

fn is_retrieval(intent: &str) -> bool {
    matches!(intent, "crypto" | "general" | "fallback")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chat_switches_and_training_interleave_safely() {
    let assistant = Arc::new(Assistant::new(offline_config()).unwrap());
    let before = assistant.get_status().personas;
    let questions = [
        "what is a blockchain",
        "explain staking",
        "what is a wallet",
        "tell me about mining",
        "what is a stablecoin",
    ];

    let mut chats = Vec::new();
    for worker in 0..4usize {
        let assistant = Arc::clone(&assistant);
        chats.push(tokio::spawn(async move {
            let mut replies = Vec::new();
            for i in 0..25usize {
                if i % 5 == worker {
                    assistant.switch(if i % 2 == 0 { Mode::Stylized } else { Mode::Primary });
                }
                let question = questions[(i + worker) % questions.len()];
                replies.push(assistant.send_message(question).await);
            }
            replies
        }));
    }
    let trainer = {
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move {
            let mut sessions = Vec::new();
            for _ in 0..3 {
                sessions.push(assistant.run_training_cycle().await.unwrap());
            }
            sessions
        })
    };

    let mut replies = Vec::new();
    for chat in chats {
        replies.extend(chat.await.unwrap());
    }
    let sessions = trainer.await.unwrap();

    let status = assistant.get_status();
    assert_eq!(replies.len(), 100);
    assert_eq!(status.conversation.total_turns, 100);
    assert_eq!(status.training.cycle_index, 3);

    for (mode, stats, earlier) in [
        (Mode::Primary, &status.personas.primary, &before.primary),
        (Mode::Stylized, &status.personas.stylized, &before.stylized),
    ] {
        // Every retrieval lands in the engine of the mode that answered it.
        let foreground = replies
            .iter()
            .filter(|r| r.mode == mode && is_retrieval(r.intent.as_str()))
            .count();
        let probes = sessions
            .iter()
            .flat_map(|s| &s.probe_results)
            .filter(|t| t.mode == mode && is_retrieval(&t.intent))
            .count();
        let lookups = (stats.cache_hits + stats.cache_misses) as usize;
        assert_eq!(lookups, foreground + probes, "{:?}", mode);
        assert_eq!(stats.similarity_computations, stats.cache_misses * stats.entries as u64);
        assert!(stats.cached as u64 <= stats.cache_misses);
        assert_eq!(stats.entries, earlier.entries);
        assert_eq!(stats.vocabulary, earlier.vocabulary);
    }
}

#[test]
fn cascade_tries_every_threshold_in_order() {
    let engine = RetrievalEngine::new(
        Mode::Primary,
        vec![CorpusEntry::new("what is bitcoin", "bitcoin answer")],
        &seeded(),
    );
    let r = engine.retrieve("explain validators and slashing");
    assert_eq!(r.source, RetrievalSource::Fallback);
    assert_eq!(r.thresholds_tried, vec![0.10, 0.05, 0.02, 0.01]);
}

pub mod articles;
pub mod config;
pub mod conversation;
pub mod corpus;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod market;
pub mod news;
pub mod normalizer;
pub mod patterns;
pub mod persona;
pub mod retrieval;
pub mod router;
pub mod sentiment;
pub mod training;
pub mod vectorizer;

use articles::ArticleStore;
use config::Config;
use conversation::{ConversationLog, ConversationStats};
use db::Store;
use error::{AssistantError, Result};
use export::SessionExport;
use market::{CoinGeckoClient, MarketData, MarketGateway};
use news::{CryptoCompareNews, NewsGateway, NewsSource};
use persona::{Mode, PersonaStats, PersonalityState};
use router::{BotResponse, DialogueManager};
use sentiment::SentimentAnalyzer;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use training::{TrainingLoop, TrainingSession, TrainingStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantStatus {
    pub active_mode: Mode,
    pub external_enabled: bool,
    pub personas: PersonaStats,
    pub conversation: ConversationStats,
    pub training: TrainingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    pub path: PathBuf,
    pub store_key: Option<String>,
    pub turns: usize,
}

// ============ Assistant ============

/// The control surface: chat, persona switching, training control, status
/// and export. Owns every component and wires them together once.
pub struct Assistant {
    config: Config,
    personas: Arc<PersonalityState>,
    router: Arc<DialogueManager>,
    training: Arc<TrainingLoop>,
    log: Arc<ConversationLog>,
    store: Option<Arc<Store>>,
}

impl Assistant {
    /// Build with the HTTP collaborators named in the config (none when
    /// external calls are disabled).
    pub fn new(config: Config) -> Result<Self> {
        let (market, news) = if config.external.enabled {
            (live_market(&config), live_news(&config))
        } else {
            logging::log_conversation(
                None,
                "External data disabled, using static market and news data",
            );
            (None, None)
        };
        Self::with_collaborators(config, market, news)
    }

    /// Build with explicit collaborators. Fails only when a persona ends up
    /// with an empty vocabulary.
    pub fn with_collaborators(
        config: Config,
        market: Option<Arc<dyn MarketData>>,
        news: Option<Arc<dyn NewsSource>>,
    ) -> Result<Self> {
        config.validate()?;

        let data = &config.data;
        let primary = corpus::load_or_builtin(Mode::Primary, data.primary_corpus.as_deref());
        let stylized = corpus::load_or_builtin(Mode::Stylized, data.stylized_corpus.as_deref());
        let personas = Arc::new(PersonalityState::new(primary, stylized, &config.retrieval));
        for mode in [Mode::Primary, Mode::Stylized] {
            if personas.engine(mode).vocabulary().is_empty() {
                return Err(AssistantError::Corpus(format!(
                    "{} corpus produced an empty vocabulary", mode.as_str()
                )));
            }
        }

        let timeout = config.external.timeout();
        let articles = ArticleStore::load_or_builtin(
            config.data.articles.as_deref(),
            SentimentAnalyzer::new(config.sentiment.clone()),
        );
        let log = Arc::new(ConversationLog::new());
        let router = Arc::new(DialogueManager::new(
            Arc::clone(&personas),
            MarketGateway::new(market, timeout),
            NewsGateway::new(news, timeout),
            Arc::new(articles),
            Arc::new(SentimentAnalyzer::new(config.sentiment.clone())),
            Arc::clone(&log),
        ));

        let store = config.data.database.as_deref().and_then(|path| match Store::open(path) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                logging::log_error(
                    None,
                    &format!(
                        "Database at {} unavailable, continuing without persistence: {}",
                        path.display(),
                        e
                    ),
                );
                None
            }
        });

        let training = Arc::new(TrainingLoop::new(
            Arc::clone(&router),
            config.training.clone(),
            store.clone(),
            config.retrieval.seed,
        ));

        logging::log_conversation(None, "Assistant ready");

        Ok(Self { config, personas, router, training, log, store })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn send_message(&self, text: &str) -> BotResponse {
        self.router.route(text).await
    }

    /// Switch persona; returns the previous mode.
    pub fn switch(&self, mode: Mode) -> Mode {
        self.personas.switch(mode)
    }

    pub fn active_mode(&self) -> Mode {
        self.personas.active()
    }

    pub fn get_status(&self) -> AssistantStatus {
        AssistantStatus {
            active_mode: self.personas.active(),
            external_enabled: self.config.external.enabled,
            personas: self.personas.stats(),
            conversation: self.log.stats(),
            training: self.training.status(),
        }
    }

    /// Returns false if the loop was already running.
    pub fn start_training(&self) -> bool {
        self.training.start()
    }

    /// Returns false if the loop was not running.
    pub async fn stop_training(&self) -> bool {
        self.training.stop().await
    }

    pub async fn run_training_cycle(&self) -> Result<TrainingSession> {
        self.training.run_cycle().await
    }

    pub fn training(&self) -> &Arc<TrainingLoop> {
        &self.training
    }

    pub fn build_export(&self) -> SessionExport {
        SessionExport::new(
            self.config.clone(),
            self.personas.stats(),
            self.log.stats(),
            self.training.status(),
            self.training.sessions(),
            self.training.weak_probes(),
            self.log.recent(self.config.data.export_turns),
        )
    }

    /// Write an export to the export directory, and to the store when one is
    /// configured.
    pub fn export(&self) -> Result<ExportResult> {
        let export = self.build_export();
        let path = export.write_to_dir(&self.config.data.export_dir)?;
        let store_key = match &self.store {
            Some(store) => {
                let key = export.save_to_store(store)?;
                export::prune_stored(store, self.config.data.export_keep)?;
                Some(key)
            }
            None => None,
        };
        Ok(ExportResult {
            path,
            store_key,
            turns: export.recent_turns.len(),
        })
    }

    /// Keys of exports held in the database, newest first. Empty without a
    /// database.
    pub fn stored_exports(&self) -> Result<Vec<String>> {
        match &self.store {
            Some(store) => export::stored_keys(store),
            None => Ok(Vec::new()),
        }
    }

    /// Stop training, then export.
    pub async fn shutdown(&self) -> Result<ExportResult> {
        self.training.stop().await;
        let result = self.export();
        logging::log_conversation(None, "Assistant shut down");
        result
    }
}

fn live_market(config: &Config) -> Option<Arc<dyn MarketData>> {
    match CoinGeckoClient::new(&config.external.market_base_url, config.external.timeout()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            logging::log_error(None, &format!("Market client unavailable: {}", e));
            None
        }
    }
}

fn live_news(config: &Config) -> Option<Arc<dyn NewsSource>> {
    match CryptoCompareNews::new(
        &config.external.news_base_url,
        config.external.news_api_key.clone(),
        config.external.timeout(),
    ) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            logging::log_error(None, &format!("News client unavailable: {}", e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn offline_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.external.enabled = false;
        config.retrieval.seed = Some(42);
        config.data.export_dir = dir.join("exports");
        config
    }

    #[tokio::test]
    async fn test_facade_round() {
        let dir = tempfile::tempdir().unwrap();
        let assistant = Assistant::new(offline_config(dir.path())).unwrap();

        let reply = assistant.send_message("what is bitcoin?").await;
        assert_eq!(reply.mode, Mode::Primary);
        assert_eq!(assistant.switch(Mode::Stylized), Mode::Primary);
        assert_eq!(assistant.active_mode(), Mode::Stylized);

        let status = assistant.get_status();
        assert_eq!(status.conversation.total_turns, 1);
        assert_eq!(status.active_mode, Mode::Stylized);
        assert!(!status.external_enabled);
        assert!(!status.training.running);
    }

    #[tokio::test]
    async fn test_empty_vocabulary_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("primary.json");
        let raw = r#"[{"prompt": "hi", "response": "short prompts only"}]"#;
        std::fs::write(&corpus_path, raw).unwrap();
        let mut config = offline_config(dir.path());
        config.data.primary_corpus = Some(corpus_path);

        match Assistant::new(config) {
            Err(AssistantError::Corpus(msg)) => assert!(msg.contains("primary")),
            other => panic!("expected corpus error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_export_writes_file_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.data.database = Some(dir.path().join("coinpal.db"));
        let assistant = Assistant::new(config).unwrap();
        assistant.send_message("hello").await;

        let result = assistant.shutdown().await.unwrap();
        assert!(result.path.exists());
        assert_eq!(result.turns, 1);
        let key = result.store_key.unwrap();
        assert!(key.starts_with(db::EXPORT_KEY_PREFIX));
        assert_eq!(assistant.stored_exports().unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn test_stored_exports_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.data.database = Some(dir.path().join("coinpal.db"));
        config.data.export_keep = 2;
        let assistant = Assistant::new(config).unwrap();

        let mut last = None;
        for _ in 0..3 {
            last = assistant.export().unwrap().store_key;
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let stored = assistant.stored_exports().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.first(), last.as_ref());
    }

    #[test]
    fn test_no_database_means_no_stored_exports() {
        let dir = tempfile::tempdir().unwrap();
        let assistant = Assistant::new(offline_config(dir.path())).unwrap();
        assert!(assistant.stored_exports().unwrap().is_empty());
    }
}

//! Autonomous training loop.
//!
//! Each cycle reads market sentiment from the news feed, asks the router a
//! handful of probe questions matched to that sentiment, scores the replies
//! and folds the mean into a rolling quality history. The slope of that
//! history decides whether the loop slows down (quality improving) or speeds
//! up (quality falling).

use crate::config::TrainingConfig;
use crate::conversation::ConversationTurn;
use crate::db::{Store, TRAINING_SNAPSHOT_KEY};
use crate::error::{AssistantError, Result};
use crate::logging;
use crate::normalizer;
use crate::router::{BotResponse, DialogueManager};
use crate::sentiment::SentimentLabel;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const WEAK_PROBE_LIMIT: usize = 100;

const BULLISH_PROBES: &[&str] = &[
    "What does a bull market mean?",
    "Should I invest in crypto while prices are rising?",
    "How does bitcoin mining work?",
    "What is the bitcoin halving?",
    "What is ethereum?",
    "What is solana?",
    "What is market capitalization?",
    "What are NFT tokens?",
];

const BEARISH_PROBES: &[&str] = &[
    "What does a bear market mean?",
    "How do I keep my private keys safe?",
    "What is a stablecoin?",
    "What is dollar cost averaging?",
    "Should I invest in crypto during a downturn?",
    "What is a crypto wallet?",
    "What are the risks of decentralized finance?",
    "What is bitcoin?",
];

const NEUTRAL_PROBES: &[&str] = &[
    "What is a blockchain?",
    "What is bitcoin?",
    "How does ethereum staking work?",
    "What are gas fees?",
    "What is decentralized finance?",
    "What is a crypto wallet?",
    "What is market capitalization?",
    "What is dollar cost averaging?",
];

const DOMAIN_TERMS: &[&str] = &[
    "bitcoin", "ethereum", "blockchain", "crypto", "wallet", "token", "coin", "market",
    "price", "staking", "mining", "decentralized", "ledger", "exchange", "stablecoin",
    "supply", "fees", "keys", "network", "volatility", "investment", "risk",
];

pub fn probes_for(label: SentimentLabel) -> &'static [&'static str] {
    match label {
        SentimentLabel::Bullish => BULLISH_PROBES,
        SentimentLabel::Bearish => BEARISH_PROBES,
        SentimentLabel::Neutral => NEUTRAL_PROBES,
    }
}

// ============ Scoring ============

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub completeness: f64,
    pub confidence: f64,
    pub keywords: f64,
    pub total: f64,
}

/// Completeness, router confidence and domain-term overlap, combined with the
/// configured weights and capped at 1.
pub fn score_response(response: &BotResponse, config: &TrainingConfig) -> QualityBreakdown {
    let completeness = if response.message.trim().chars().count() >= config.min_response_len {
        1.0
    } else {
        0.0
    };
    let confidence = response.confidence.clamp(0.0, 1.0);

    let normalized = format!(" {} ", normalizer::normalize(&response.message));
    let hits = DOMAIN_TERMS
        .iter()
        .filter(|term| normalized.contains(&format!(" {}", term)))
        .count();
    let keywords = (hits as f64 / config.keyword_saturation.max(1) as f64).min(1.0);

    let total = (config.completeness_weight * completeness
        + config.confidence_weight * confidence
        + config.keyword_weight * keywords)
        .clamp(0.0, 1.0);

    QualityBreakdown { completeness, confidence, keywords, total }
}

/// Mean slope across the last `window` aggregates (oldest to newest).
pub fn learning_velocity(history: &[f64], window: usize) -> f64 {
    let start = history.len().saturating_sub(window.max(2));
    let recent = &history[start..];
    if recent.len() < 2 {
        return 0.0;
    }
    (recent[recent.len() - 1] - recent[0]) / (recent.len() - 1) as f64
}

pub fn adapt_interval(interval: f64, velocity: f64, config: &TrainingConfig) -> f64 {
    if velocity > config.velocity_epsilon {
        (interval * (1.0 + config.interval_step)).min(config.max_interval_secs)
    } else if velocity < -config.velocity_epsilon {
        (interval * (1.0 - config.interval_step)).max(config.min_interval_secs)
    } else {
        interval
    }
}

// ============ Session Records ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSession {
    pub cycle_index: u64,
    pub started_at: DateTime<Utc>,
    pub sentiment: SentimentLabel,
    pub probe_results: Vec<ConversationTurn>,
    pub aggregate_quality: f64,
    pub learning_velocity: f64,
    pub interval_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakProbe {
    pub question: String,
    pub response: String,
    pub intent: String,
    pub score: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSnapshot {
    pub cycle_index: u64,
    pub quality_history: Vec<f64>,
    pub interval_seconds: f64,
    #[serde(default)]
    pub weak_probes: Vec<WeakProbe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStatus {
    pub running: bool,
    pub cycle_index: u64,
    pub interval_seconds: f64,
    pub learning_velocity: f64,
    pub last_quality: Option<f64>,
    pub quality_history: Vec<f64>,
    pub errors: u64,
    pub last_error: Option<String>,
    pub weak_probes: usize,
}

struct TrainingState {
    cycle_index: u64,
    history: VecDeque<f64>,
    interval_seconds: f64,
    velocity: f64,
    sessions: VecDeque<TrainingSession>,
    weak_probes: VecDeque<WeakProbe>,
    errors: u64,
    last_error: Option<String>,
}

struct RunningTask {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

// ============ Loop ============

pub struct TrainingLoop {
    router: Arc<DialogueManager>,
    config: TrainingConfig,
    store: Option<Arc<Store>>,
    state: Mutex<TrainingState>,
    rng: Mutex<StdRng>,
    task: Mutex<Option<RunningTask>>,
}

impl TrainingLoop {
    pub fn new(
        router: Arc<DialogueManager>,
        config: TrainingConfig,
        store: Option<Arc<Store>>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let state = TrainingState {
            cycle_index: 0,
            history: VecDeque::new(),
            interval_seconds: config.initial_interval_secs,
            velocity: 0.0,
            sessions: VecDeque::new(),
            weak_probes: VecDeque::new(),
            errors: 0,
            last_error: None,
        };
        Self {
            router,
            config,
            store,
            state: Mutex::new(state),
            rng: Mutex::new(rng),
            task: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TrainingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Spawn the background loop. Returns false if it is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return false;
        }

        if let Err(e) = self.restore_from_store() {
            logging::log_error(None, &format!("Training snapshot not restored: {}", e));
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            logging::log_training(None, "Training loop started");
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                let pause = match this.run_cycle().await {
                    Ok(session) => Duration::from_secs_f64(session.interval_seconds),
                    Err(e) => {
                        this.record_error(&e);
                        this.config.backoff()
                    }
                };
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = stop_rx.changed() => break,
                }
            }
            logging::log_training(None, "Training loop stopped");
        });

        *task = Some(RunningTask { handle, stop: stop_tx });
        true
    }

    /// Signal the loop and wait for it to finish its current cycle.
    /// Returns false if it was not running.
    pub async fn stop(&self) -> bool {
        let running = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(RunningTask { mut handle, stop }) = running else {
            return false;
        };
        let _ = stop.send(true);

        let timeout = self.config.join_timeout();
        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            logging::log_error(
                None,
                &format!(
                    "Training loop did not stop within {:?}, aborting",
                    timeout
                ),
            );
            handle.abort();
        }
        true
    }

    /// Run one full cycle: sentiment, probes, scoring, interval adaptation.
    pub async fn run_cycle(&self) -> Result<TrainingSession> {
        let started_at = Utc::now();
        let (headlines, _) = self.router.news().latest("crypto", 5).await;
        let texts: Vec<String> = headlines
            .iter()
            .map(|a| format!("{}. {}", a.title, a.description))
            .collect();
        let sentiment = self.router.analyzer().analyze(&texts).label;

        let probes: Vec<&str> = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            probes_for(sentiment)
                .choose_multiple(&mut *rng, self.config.probes_per_cycle)
                .copied()
                .collect()
        };
        if probes.is_empty() {
            return Err(AssistantError::Handler("no probe questions selected".to_string()));
        }

        let mut probe_results = Vec::with_capacity(probes.len());
        let mut weak = Vec::new();
        for question in probes {
            let response = self.router.respond(question).await;
            let score = score_response(&response, &self.config).total;
            if score < self.config.weak_probe_threshold {
                weak.push(WeakProbe {
                    question: question.to_string(),
                    response: response.message.clone(),
                    intent: response.intent.as_str().to_string(),
                    score,
                    recorded_at: Utc::now(),
                });
            }
            let intent = response.intent.as_str();
            probe_results.push(
                ConversationTurn::new(question, &response.message, response.mode, intent)
                    .with_quality(score),
            );
        }
        let total: f64 = probe_results.iter().filter_map(|t| t.quality_score).sum();
        let aggregate_quality = total / probe_results.len() as f64;

        let session = {
            let mut state = self.lock_state();
            state.cycle_index += 1;
            state.history.push_back(aggregate_quality);
            let history_limit = self.config.session_history.max(self.config.velocity_window);
            while state.history.len() > history_limit {
                state.history.pop_front();
            }
            let history: Vec<f64> = state.history.iter().copied().collect();
            let velocity = learning_velocity(&history, self.config.velocity_window);
            state.velocity = velocity;
            state.interval_seconds = adapt_interval(state.interval_seconds, velocity, &self.config);

            for probe in weak {
                if state.weak_probes.len() >= WEAK_PROBE_LIMIT {
                    state.weak_probes.pop_front();
                }
                state.weak_probes.push_back(probe);
            }

            let session = TrainingSession {
                cycle_index: state.cycle_index,
                started_at,
                sentiment,
                probe_results,
                aggregate_quality,
                learning_velocity: velocity,
                interval_seconds: state.interval_seconds,
            };
            state.sessions.push_back(session.clone());
            while state.sessions.len() > self.config.session_history.max(1) {
                state.sessions.pop_front();
            }
            session
        };

        logging::log_training(
            None,
            &format!(
                "Cycle {} ({}): quality {:.3}, velocity {:+.4}, next in {:.1}s",
                session.cycle_index,
                session.sentiment.as_str(),
                session.aggregate_quality,
                session.learning_velocity,
                session.interval_seconds
            ),
        );

        self.save_to_store()?;
        Ok(session)
    }

    fn record_error(&self, error: &AssistantError) {
        logging::log_error(None, &format!("Training cycle failed: {}", error));
        let mut state = self.lock_state();
        state.errors += 1;
        state.last_error = Some(error.to_string());
    }

    pub fn snapshot(&self) -> TrainingSnapshot {
        let state = self.lock_state();
        TrainingSnapshot {
            cycle_index: state.cycle_index,
            quality_history: state.history.iter().copied().collect(),
            interval_seconds: state.interval_seconds,
            weak_probes: state.weak_probes.iter().cloned().collect(),
        }
    }

    /// Replace history, interval and weak probes with a saved snapshot.
    /// The interval is clamped to the configured bounds.
    pub fn restore(&self, snapshot: TrainingSnapshot) {
        let mut state = self.lock_state();
        state.cycle_index = snapshot.cycle_index;
        state.history = snapshot.quality_history.into_iter().collect();
        state.interval_seconds = snapshot
            .interval_seconds
            .clamp(self.config.min_interval_secs, self.config.max_interval_secs);
        let history: Vec<f64> = state.history.iter().copied().collect();
        state.velocity = learning_velocity(&history, self.config.velocity_window);
        state.weak_probes = snapshot.weak_probes.into_iter().collect();
    }

    fn restore_from_store(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if let Some(snapshot) = store.load_json::<TrainingSnapshot>(TRAINING_SNAPSHOT_KEY)? {
            logging::log_training(
                None,
                &format!(
                    "Restored training snapshot at cycle {}",
                    snapshot.cycle_index
                ),
            );
            self.restore(snapshot);
        }
        Ok(())
    }

    fn save_to_store(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save_json(TRAINING_SNAPSHOT_KEY, &self.snapshot()),
            None => Ok(()),
        }
    }

    pub fn status(&self) -> TrainingStatus {
        let running = self.is_running();
        let state = self.lock_state();
        TrainingStatus {
            running,
            cycle_index: state.cycle_index,
            interval_seconds: state.interval_seconds,
            learning_velocity: state.velocity,
            last_quality: state.history.back().copied(),
            quality_history: state.history.iter().copied().collect(),
            errors: state.errors,
            last_error: state.last_error.clone(),
            weak_probes: state.weak_probes.len(),
        }
    }

    pub fn sessions(&self) -> Vec<TrainingSession> {
        self.lock_state().sessions.iter().cloned().collect()
    }

    pub fn weak_probes(&self) -> Vec<WeakProbe> {
        self.lock_state().weak_probes.iter().cloned().collect()
    }
}

use crate::persona::Mode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub user_text: String,
    pub bot_text: String,
    pub mode: Mode,
    pub intent: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

impl ConversationTurn {
    pub fn new(user_text: &str, bot_text: &str, mode: Mode, intent: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_text: user_text.to_string(),
            bot_text: bot_text.to_string(),
            mode,
            intent: intent.to_string(),
            timestamp: Utc::now(),
            quality_score: None,
        }
    }

    pub fn with_quality(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_turns: usize,
    pub by_mode: BTreeMap<String, usize>,
    pub by_intent: BTreeMap<String, usize>,
    pub scored_turns: usize,
    pub mean_quality: Option<f64>,
}

/// Append-only exchange log shared by the router and the status surface.
#[derive(Default)]
pub struct ConversationLog {
    turns: Mutex<Vec<ConversationTurn>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, turn: ConversationTurn) {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let turns = self.turns.lock().unwrap_or_else(|e| e.into_inner());
        let start = turns.len().saturating_sub(n);
        turns[start..].to_vec()
    }

    pub fn stats(&self) -> ConversationStats {
        let turns = self.turns.lock().unwrap_or_else(|e| e.into_inner());
        let mut stats = ConversationStats {
            total_turns: turns.len(),
            ..Default::default()
        };
        let mut quality_sum = 0.0;

        for turn in turns.iter() {
            *stats.by_mode.entry(turn.mode.as_str().to_string()).or_default() += 1;
            *stats.by_intent.entry(turn.intent.clone()).or_default() += 1;
            if let Some(q) = turn.quality_score {
                stats.scored_turns += 1;
                quality_sum += q;
            }
        }

        if stats.scored_turns > 0 {
            stats.mean_quality = Some(quality_sum / stats.scored_turns as f64);
        }
        stats
    }
}

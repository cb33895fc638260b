//! Session export: configuration, statistics, training history and the most
//! recent conversation turns in one JSON document.

use crate::config::Config;
use crate::conversation::{ConversationStats, ConversationTurn};
use crate::db::{Store, EXPORT_KEY_PREFIX};
use crate::error::Result;
use crate::logging;
use crate::persona::PersonaStats;
use crate::training::{TrainingSession, TrainingStatus, WeakProbe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub id: String,
    pub exported_at: DateTime<Utc>,
    pub config: Config,
    pub personas: PersonaStats,
    pub conversation: ConversationStats,
    pub training: TrainingStatus,
    pub sessions: Vec<TrainingSession>,
    pub weak_probes: Vec<WeakProbe>,
    pub recent_turns: Vec<ConversationTurn>,
}

impl SessionExport {
    pub fn new(
        config: Config,
        personas: PersonaStats,
        conversation: ConversationStats,
        training: TrainingStatus,
        sessions: Vec<TrainingSession>,
        weak_probes: Vec<WeakProbe>,
        recent_turns: Vec<ConversationTurn>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            exported_at: Utc::now(),
            config,
            personas,
            conversation,
            training,
            sessions,
            weak_probes,
            recent_turns,
        }
    }

    fn file_name(&self) -> String {
        format!("coinpal-session-{}.json", self.exported_at.format("%Y%m%d-%H%M%S"))
    }

    /// Write pretty JSON into `dir`, creating it if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        logging::log_conversation(
            None,
            &format!(
                "Exported session ({} turns) to {}",
                self.recent_turns.len(),
                path.display()
            ),
        );
        Ok(path)
    }

    /// Store under `export.<id>` and return the key.
    pub fn save_to_store(&self, store: &Store) -> Result<String> {
        let key = format!("{}{}", EXPORT_KEY_PREFIX, self.id);
        store.save_json(&key, self)?;
        Ok(key)
    }
}

/// Keys of stored exports, newest first.
pub fn stored_keys(store: &Store) -> Result<Vec<String>> {
    Ok(store.keys_with_prefix(EXPORT_KEY_PREFIX)?)
}

/// Delete all but the `keep` newest stored exports; returns how many went.
pub fn prune_stored(store: &Store, keep: usize) -> Result<usize> {
    let mut removed = 0;
    for key in stored_keys(store)?.iter().skip(keep) {
        if store.delete(key)? {
            removed += 1;
        }
    }
    if removed > 0 {
        logging::log_conversation(None, &format!("Pruned {} old stored exports", removed));
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationLog;
    use crate::persona::Mode;
    use crate::retrieval::RetrievalStats;

    fn sample() -> SessionExport {
        let log = ConversationLog::new();
        log.append(ConversationTurn::new("hello", "hi there", Mode::Primary, "greeting"));
        SessionExport::new(
            Config::default(),
            PersonaStats {
                active_mode: Mode::Primary,
                primary: RetrievalStats::default(),
                stylized: RetrievalStats::default(),
            },
            log.stats(),
            TrainingStatus {
                running: false,
                cycle_index: 0,
                interval_seconds: 60.0,
                learning_velocity: 0.0,
                last_quality: None,
                quality_history: vec![],
                errors: 0,
                last_error: None,
                weak_probes: 0,
            },
            vec![],
            vec![],
            log.recent(50),
        )
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let export = sample();
        let path = export.write_to_dir(&dir.path().join("exports")).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("coinpal-session-"));

        let raw = fs::read_to_string(&path).unwrap();
        let loaded: SessionExport = serde_json::from_str(&raw).unwrap();
        assert_eq!(loaded.id, export.id);
        assert_eq!(loaded.recent_turns.len(), 1);
        assert_eq!(loaded.conversation.total_turns, 1);
    }

    #[test]
    fn test_store_key() {
        let store = Store::open_in_memory().unwrap();
        let export = sample();
        let key = export.save_to_store(&store).unwrap();
        assert_eq!(key, format!("export.{}", export.id));
        let loaded: SessionExport = store.load_json(&key).unwrap().unwrap();
        assert_eq!(loaded.recent_turns[0].user_text, "hello");
    }

    #[test]
    fn test_prune_keeps_newest() {
        let store = Store::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for _ in 0..4 {
            let export = sample();
            export.save_to_store(&store).unwrap();
            ids.push(export.id);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(prune_stored(&store, 2).unwrap(), 2);
        let keys = stored_keys(&store).unwrap();
        assert_eq!(keys, vec![format!("export.{}", ids[3]), format!("export.{}", ids[2])]);
        assert_eq!(prune_stored(&store, 2).unwrap(), 0);
    }
}

//! Structured logging module for Coinpal
//!
//! Every event goes through `tracing`. When a log directory is configured the
//! same line is also appended to a daily file, with categories:
//! - RETRIEVAL: Similarity lookups, cascade relaxations, cache activity
//! - ROUTING: Intent classification decisions, static-data fallbacks
//! - TRAINING: Self-evaluation cycles and cadence changes
//! - CONVERSATION: Session lifecycle and persona switches
//! - ERROR: Router faults and unexpected failures

use crate::error::AssistantError;
use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Retrieval,
    Routing,
    Training,
    Conversation,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Retrieval => "RETRIEVAL",
            LogCategory::Routing => "ROUTING",
            LogCategory::Training => "TRAINING",
            LogCategory::Conversation => "CONVERSATION",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Directory for daily log files, if file logging is enabled
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("coinpal-{}.log", today))
}

/// Install the tracing subscriber and optionally enable file logging.
/// Safe to call more than once; later calls only update the log directory.
pub fn init_logging(log_dir: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,hyper_util=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    if let Some(dir) = log_dir {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        *LOG_DIR.lock().unwrap_or_else(|e| e.into_inner()) = Some(dir.to_path_buf());
        log(LogCategory::Conversation, None, "Coinpal file logging initialized");
    }

    Ok(())
}

/// Log a message with category and optional session context
pub fn log(category: LogCategory, session_id: Option<&str>, message: &str) {
    let session = session_id
        .map(|id| id.get(..8).unwrap_or(id))
        .unwrap_or("-");

    let label = category.as_str();
    match category {
        LogCategory::Error => tracing::warn!(category = label, session, "{}", message),
        LogCategory::Retrieval => tracing::debug!(category = label, session, "{}", message),
        _ => tracing::info!(category = label, session, "{}", message),
    }

    let dir = LOG_DIR.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let Some(dir) = dir else {
        return;
    };

    let context = session_id
        .map(|_| format!("session={} | ", session))
        .unwrap_or_default();
    let line = format!(
        "[{}] [{}] {}{}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        category.as_str(),
        context,
        message
    );
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(&dir))
    {
        let _ = file.write_all(line.as_bytes());
    }
}

pub fn log_retrieval(session_id: Option<&str>, message: &str) {
    log(LogCategory::Retrieval, session_id, message);
}

pub fn log_routing(session_id: Option<&str>, message: &str) {
    log(LogCategory::Routing, session_id, message);
}

pub fn log_training(session_id: Option<&str>, message: &str) {
    log(LogCategory::Training, session_id, message);
}

pub fn log_conversation(session_id: Option<&str>, message: &str) {
    log(LogCategory::Conversation, session_id, message);
}

pub fn log_error(session_id: Option<&str>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

/// Collaborator outages are routine (static data covers them); anything else
/// is logged as an error.
pub fn log_collaborator_failure(what: &str, error: &AssistantError) {
    if error.is_external() {
        log_routing(None, &format!("{} unavailable, serving static data: {}", what, error));
    } else {
        log_error(None, &format!("{} failed: {}", what, error));
    }
}

/// Clean up old log files (keep last 7 days)
pub fn cleanup_old_logs(log_dir: &Path) -> std::io::Result<usize> {
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("coinpal-") && n.ends_with(".log"))
            .unwrap_or(false);
        if !is_ours {
            continue;
        }

        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified_time: chrono::DateTime<Utc> = modified.into();
            if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_ignores_foreign_and_fresh_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("coinpal-2099-01-01.log"), "fresh").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let deleted = cleanup_old_logs(dir.path()).unwrap();
        assert_eq!(deleted, 0);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        assert_eq!(cleanup_old_logs(Path::new("/no/such/coinpal/logs")).unwrap(), 0);
    }
}

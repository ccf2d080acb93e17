//! Configuration structures for the intake pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the intake pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Drop folder configuration.
    pub watch: WatchConfig,

    /// Line matching configuration.
    pub matching: MatchingConfig,

    /// Persistence configuration.
    pub store: StoreConfig,

    /// Operator notification configuration.
    pub notifier: NotifierConfig,
}

/// Drop folder and file lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Folder where suppliers' documents arrive.
    pub inbox_dir: PathBuf,

    /// Subfolder of the inbox receiving reconciled documents.
    pub processed_dir: String,

    /// Subfolder of the inbox receiving documents that failed to parse.
    pub quarantine_dir: String,

    /// Quiet period before a file is considered completely written.
    pub debounce_ms: u64,

    /// How often candidate files are re-checked for changes.
    pub poll_interval_ms: u64,

    /// Accepted document extensions, without the dot.
    pub extensions: Vec<String>,

    /// Skip invoices whose (supplier, number) has already been recorded.
    pub skip_duplicate_invoices: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            inbox_dir: PathBuf::from("inbox"),
            processed_dir: "processed".to_string(),
            quarantine_dir: "quarantine".to_string(),
            debounce_ms: 2000,
            poll_interval_ms: 250,
            extensions: vec!["xml".to_string()],
            skip_duplicate_invoices: true,
        }
    }
}

impl WatchConfig {
    /// Full path of the processed folder.
    pub fn processed_path(&self) -> PathBuf {
        self.inbox_dir.join(&self.processed_dir)
    }

    /// Full path of the quarantine folder.
    pub fn quarantine_path(&self) -> PathBuf {
        self.inbox_dir.join(&self.quarantine_dir)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    /// Whether `path` looks like a document this pipeline should pick up.
    ///
    /// Hidden files and files with other extensions are rejected.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with('.') {
            return false;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        self.extensions.iter().any(|e| e.to_lowercase() == ext)
    }
}

/// Line matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Unit and packaging terms never used as keywords.
    pub stop_words: Vec<String>,

    /// Tokens of this many characters or fewer are not keywords.
    pub min_keyword_len: usize,

    /// Number of keywords tried, longest first.
    pub max_keywords: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let stop_words = [
            "kg", "gr", "g", "lt", "l", "ml", "cl", "pz", "pezzi", "pezzo", "conf", "confezione",
            "confezioni", "busta", "buste", "sacco", "sacchi", "cartone", "cartoni", "scatola",
            "scatole", "vaschetta", "vaschette", "barattolo", "bottiglia", "bottiglie", "latta",
            "fusto", "brick", "cassa", "casse",
        ];
        Self {
            stop_words: stop_words.iter().map(|s| s.to_string()).collect(),
            min_keyword_len: 3,
            max_keywords: 3,
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding catalog.json, movements.jsonl and unmatched.jsonl.
    pub data_dir: PathBuf,

    /// Attempts for a store call failing with a transient error (1 = no retry).
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on each further attempt.
    pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

/// Notification channel kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    /// Write notifications to the log.
    #[default]
    Log,
    /// Pipe notifications to an external program.
    Command,
}

/// Operator notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,

    /// Program and arguments for the command notifier. The subject is
    /// appended as the last argument and the body is written to stdin.
    pub command: Vec<String>,

    /// How long the command notifier may run before it is killed.
    pub timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            command: Vec::new(),
            timeout_ms: 10_000,
        }
    }
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl IntakeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accepts_filters_hidden_and_extensions() {
        let config = WatchConfig::default();

        assert!(config.accepts(Path::new("inbox/IT01234567890_00001.xml")));
        assert!(config.accepts(Path::new("inbox/FATTURA.XML")));
        assert!(!config.accepts(Path::new("inbox/.IT01234567890_00001.xml")));
        assert!(!config.accepts(Path::new("inbox/notes.txt")));
        assert!(!config.accepts(Path::new("inbox/README")));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: IntakeConfig =
            serde_json::from_str(r#"{"watch": {"debounce_ms": 500}}"#).unwrap();

        assert_eq!(config.watch.debounce_ms, 500);
        assert_eq!(config.watch.processed_dir, "processed");
        assert_eq!(config.matching.max_keywords, 3);
        assert_eq!(config.notifier.kind, NotifierKind::Log);
        assert_eq!(config.notifier.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_derived_paths() {
        let config = WatchConfig {
            inbox_dir: PathBuf::from("/srv/fatture"),
            ..WatchConfig::default()
        };

        assert_eq!(config.processed_path(), PathBuf::from("/srv/fatture/processed"));
        assert_eq!(config.quarantine_path(), PathBuf::from("/srv/fatture/quarantine"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = IntakeConfig::default();
        config.store.max_attempts = 5;
        config.save(&path).unwrap();

        let loaded = IntakeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.store.max_attempts, 5);
    }
}

//! Drop folder watcher.
//!
//! OS events only nominate candidate files. A candidate is reported once its
//! size and modification time have stayed unchanged for the debounce period,
//! so documents are never read while a supplier is still writing them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::error::WatchError;
use crate::models::config::WatchConfig;

/// Watches the inbox folder and reports files that stopped changing.
pub struct FolderWatcher {
    config: WatchConfig,
    running: Option<Running>,
}

struct Running {
    watcher: RecommendedWatcher,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FolderWatcher {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start watching and return the stream of stable files.
    ///
    /// Files already in the folder are reported too. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self) -> Result<mpsc::UnboundedReceiver<PathBuf>, WatchError> {
        if self.running.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        let dir = prepare_dir(&self.config.inbox_dir)?;
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let event_tx = raw_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Remove(_) | EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    let _ = event_tx.send(path);
                }
            }
            Err(e) => warn!("Watcher error: {}", e),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        for path in scan(&dir, &self.config) {
            let _ = raw_tx.send(path);
        }
        drop(raw_tx);

        let (stable_tx, stable_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(debounce(self.config.clone(), raw_rx, stable_tx, shutdown_rx));

        info!("Watching {}", dir.display());
        self.running = Some(Running {
            watcher,
            shutdown,
            task,
        });
        Ok(stable_rx)
    }

    /// Release the OS watch and wait for the debounce task to exit.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        drop(running.watcher);
        let _ = running.shutdown.send(true);
        if let Err(e) = running.task.await {
            warn!("Debounce task ended abnormally: {}", e);
        }
        debug!("Watcher on {} stopped", self.config.inbox_dir.display());
    }
}

fn prepare_dir(dir: &Path) -> Result<PathBuf, WatchError> {
    let directory_error = |source| WatchError::Directory {
        path: dir.display().to_string(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(directory_error)?;
    std::fs::canonicalize(dir).map_err(directory_error)
}

/// Eligible files currently in `dir`, sorted by name.
fn scan(dir: &Path, config: &WatchConfig) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot scan {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && config.accepts(path))
        .collect();
    paths.sort();
    paths
}

/// Observed (length, modification time) of a candidate.
type Snapshot = (u64, Option<SystemTime>);

struct Candidate {
    snapshot: Option<Snapshot>,
    quiet_since: Instant,
}

enum Check {
    Waiting,
    Stable,
    Gone,
}

impl Candidate {
    fn new() -> Self {
        Self {
            snapshot: None,
            quiet_since: Instant::now(),
        }
    }

    async fn check(&mut self, path: &Path, config: &WatchConfig) -> Check {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Check::Gone,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Cannot stat {}: {}", path.display(), e);
                }
                return Check::Gone;
            }
        };

        let snapshot = (metadata.len(), metadata.modified().ok());
        if self.snapshot != Some(snapshot) {
            self.snapshot = Some(snapshot);
            self.quiet_since = Instant::now();
            return Check::Waiting;
        }

        if self.quiet_since.elapsed() >= config.debounce() {
            Check::Stable
        } else {
            Check::Waiting
        }
    }
}

async fn debounce(
    config: WatchConfig,
    mut raw_rx: mpsc::UnboundedReceiver<PathBuf>,
    stable_tx: mpsc::UnboundedSender<PathBuf>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut candidates: HashMap<PathBuf, Candidate> = HashMap::new();
    let mut tick = tokio::time::interval(config.poll_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            Some(path) = raw_rx.recv() => {
                if !config.accepts(&path) {
                    trace!("Ignoring {}", path.display());
                    continue;
                }
                candidates
                    .entry(path)
                    .and_modify(|c| c.quiet_since = Instant::now())
                    .or_insert_with(Candidate::new);
            }
            _ = tick.tick() => {
                let mut settled = Vec::new();
                for (path, candidate) in candidates.iter_mut() {
                    match candidate.check(path, &config).await {
                        Check::Waiting => {}
                        Check::Stable => settled.push((path.clone(), true)),
                        Check::Gone => settled.push((path.clone(), false)),
                    }
                }

                for (path, stable) in settled {
                    candidates.remove(&path);
                    if !stable {
                        continue;
                    }
                    debug!("{} is stable", path.display());
                    if stable_tx.send(path).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::time::timeout;

    fn config(dir: &Path) -> WatchConfig {
        WatchConfig {
            inbox_dir: dir.to_path_buf(),
            debounce_ms: 100,
            poll_interval_ms: 20,
            ..WatchConfig::default()
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<PathBuf>) -> Option<PathBuf> {
        timeout(Duration::from_secs(5), rx.recv()).await.ok().flatten()
    }

    #[test]
    fn test_scan_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.xml"), "x").unwrap();
        std::fs::write(dir.path().join("a.XML"), "x").unwrap();
        std::fs::write(dir.path().join(".hidden.xml"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("dir.xml")).unwrap();

        let found: Vec<String> = scan(dir.path(), &config(dir.path()))
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(found, vec!["a.XML".to_string(), "b.xml".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_existing_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("early.xml"), "<x/>").unwrap();

        let mut watcher = FolderWatcher::new(config(dir.path()));
        let mut rx = watcher.start().unwrap();

        let path = next(&mut rx).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "early.xml");
        watcher.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_new_file_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = FolderWatcher::new(config(dir.path()));
        let mut rx = watcher.start().unwrap();

        std::fs::write(dir.path().join("ignored.txt"), "x").unwrap();
        std::fs::write(dir.path().join("late.xml"), "<x/>").unwrap();

        let path = next(&mut rx).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "late.xml");

        let again = timeout(Duration::from_millis(400), rx.recv()).await;
        assert!(again.is_err(), "file reported twice");
        watcher.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_twice_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = FolderWatcher::new(config(dir.path()));

        let mut rx = watcher.start().unwrap();
        assert!(matches!(watcher.start(), Err(WatchError::AlreadyRunning)));

        watcher.stop().await;
        assert!(!watcher.is_running());
        // The stream ends once the debounce task is gone
        assert_eq!(next(&mut rx).await, None);
    }
}

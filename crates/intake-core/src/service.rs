//! Ingestion service: watcher, parser, reconciliation, notification and file
//! relocation wired together behind a start/stop lifecycle.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ParseError, Result, WatchError};
use crate::invoice::{DocumentParser, FatturaParser};
use crate::matching::LineMatcher;
use crate::models::config::{IntakeConfig, WatchConfig};
use crate::models::report::{IngestionStats, ProcessingReport};
use crate::notifier::{Notification, Notifier};
use crate::reconcile::{ReconciliationEngine, RetryPolicy};
use crate::store::Stores;
use crate::watcher::FolderWatcher;

/// Lifecycle state of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, never started.
    Idle,
    /// Waiting for stable files.
    Watching,
    /// Working on one file.
    Processing(PathBuf),
    /// Stopped; may be started again.
    Stopped,
}

/// What happened to one document.
#[derive(Debug)]
pub enum FileOutcome {
    /// Parsed and reconciled; the file went to the processed folder.
    Reconciled(ProcessingReport),
    /// The invoice was already recorded; the file went to the processed
    /// folder without touching stock.
    Duplicate {
        supplier_name: String,
        invoice_number: String,
    },
    /// The document did not parse; the file went to the quarantine folder.
    Rejected(ParseError),
    /// The file could not be read and was left where it is.
    Unreadable(std::io::Error),
}

struct Shared {
    state: ServiceState,
    queue: Option<mpsc::UnboundedSender<PathBuf>>,
    /// Queued or being processed.
    in_flight: HashSet<PathBuf>,
    stats: IngestionStats,
}

struct Running {
    watcher: FolderWatcher,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
    bridge: JoinHandle<()>,
}

/// Processes supplier documents one at a time.
///
/// Shared as `Arc<IngestionService>`. Files reach the worker through
/// [`submit`](Self::submit), either from the folder watcher or from a caller.
pub struct IngestionService {
    config: WatchConfig,
    parser: Box<dyn DocumentParser>,
    engine: ReconciliationEngine,
    notifier: Arc<dyn Notifier>,
    shared: Mutex<Shared>,
    running: Mutex<Option<Running>>,
}

impl IngestionService {
    pub fn new(config: &IntakeConfig, stores: Stores, notifier: Arc<dyn Notifier>) -> Self {
        let engine = ReconciliationEngine::new(stores, LineMatcher::new(config.matching.clone()))
            .with_retry(RetryPolicy::from(&config.store));

        Self {
            config: config.watch.clone(),
            parser: Box::new(FatturaParser::new()),
            engine,
            notifier,
            shared: Mutex::new(Shared {
                state: ServiceState::Idle,
                queue: None,
                in_flight: HashSet::new(),
                stats: IngestionStats::default(),
            }),
            running: Mutex::new(None),
        }
    }

    /// Use a different document parser.
    pub fn with_parser(mut self, parser: Box<dyn DocumentParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn state(&self) -> ServiceState {
        self.shared().state.clone()
    }

    pub fn stats(&self) -> IngestionStats {
        let shared = self.shared();
        IngestionStats {
            is_running: matches!(
                shared.state,
                ServiceState::Watching | ServiceState::Processing(_)
            ),
            ..shared.stats.clone()
        }
    }

    /// Prepare the folders, start the worker and the folder watcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Err(WatchError::AlreadyRunning.into());
        }

        for dir in [
            self.config.inbox_dir.clone(),
            self.config.processed_path(),
            self.config.quarantine_path(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| WatchError::Directory {
                path: dir.display().to_string(),
                source,
            })?;
        }

        let mut watcher = FolderWatcher::new(self.config.clone());
        let mut stable_rx = watcher.start()?;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        {
            let mut shared = self.shared();
            shared.state = ServiceState::Watching;
            shared.queue = Some(queue_tx);
        }

        let worker = tokio::spawn(Arc::clone(self).work(queue_rx, shutdown_rx));

        let service = Arc::clone(self);
        let bridge = tokio::spawn(async move {
            while let Some(path) = stable_rx.recv().await {
                service.submit(path);
            }
        });

        info!(
            "Ingestion started on {}",
            self.config.inbox_dir.display()
        );
        *running = Some(Running {
            watcher,
            shutdown,
            worker,
            bridge,
        });
        Ok(())
    }

    /// Stop accepting files and wait for the file in progress to finish.
    ///
    /// Files queued but not yet started are dropped; the watcher reports
    /// them again on the next start.
    pub async fn stop(&self) {
        {
            let mut shared = self.shared();
            shared.state = ServiceState::Stopped;
            shared.queue = None;
        }

        let running = lock(&self.running).take();
        let Some(mut running) = running else {
            return;
        };

        let _ = running.shutdown.send(true);
        running.watcher.stop().await;
        if let Err(e) = running.worker.await {
            error!("Ingestion worker ended abnormally: {}", e);
        }
        if let Err(e) = running.bridge.await {
            error!("Watcher bridge ended abnormally: {}", e);
        }

        self.shared().in_flight.clear();
        info!("Ingestion stopped");
    }

    /// Queue a stable file for processing.
    ///
    /// Returns `false` when the service is not running or the file is
    /// already queued or being processed.
    pub fn submit(&self, path: PathBuf) -> bool {
        let mut shared = self.shared();
        let Some(queue) = shared.queue.clone() else {
            debug!("Not running, ignoring {}", path.display());
            return false;
        };
        if !shared.in_flight.insert(path.clone()) {
            debug!("{} already in flight", path.display());
            return false;
        }
        if queue.send(path.clone()).is_err() {
            shared.in_flight.remove(&path);
            return false;
        }
        true
    }

    async fn work(
        self: Arc<Self>,
        mut queue: mpsc::UnboundedReceiver<PathBuf>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            // Shutdown is only observed between files
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = queue.recv() => match next {
                    Some(path) => self.process_queued(path).await,
                    None => break,
                },
            }
        }
    }

    async fn process_queued(&self, path: PathBuf) {
        self.shared().state = ServiceState::Processing(path.clone());

        self.process_file(&path).await;

        let mut shared = self.shared();
        shared.in_flight.remove(&path);
        if matches!(shared.state, ServiceState::Processing(_)) {
            shared.state = ServiceState::Watching;
        }
    }

    /// Run one document through the whole pipeline.
    pub async fn process_file(&self, path: &Path) -> FileOutcome {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                self.count_error();
                return FileOutcome::Unreadable(e);
            }
        };

        let invoice = match self.parser.parse_file(&bytes, &name) {
            Ok(invoice) => invoice,
            Err(e) => {
                warn!("Rejected {}: {}", name, e);
                self.count_error();
                self.notify(Notification::failure(&name, &e)).await;
                self.relocate(path, &self.config.quarantine_path()).await;
                return FileOutcome::Rejected(e);
            }
        };

        if self.config.skip_duplicate_invoices {
            match self
                .engine
                .stores()
                .invoice_seen(&invoice.supplier_name, &invoice.invoice_number)
                .await
            {
                Ok(true) => {
                    info!(
                        "Invoice {} from {} already recorded, skipping {}",
                        invoice.invoice_number, invoice.supplier_name, name
                    );
                    self.notify(Notification::duplicate(
                        &invoice.supplier_name,
                        &invoice.invoice_number,
                        &name,
                    ))
                    .await;
                    self.relocate(path, &self.config.processed_path()).await;
                    return FileOutcome::Duplicate {
                        supplier_name: invoice.supplier_name,
                        invoice_number: invoice.invoice_number,
                    };
                }
                Ok(false) => {}
                Err(e) => warn!(
                    "Cannot check invoice {} for duplicates, reconciling anyway: {}",
                    invoice.invoice_number, e
                ),
            }
        }

        let report = self.engine.process(&invoice).await;
        {
            let mut shared = self.shared();
            let stats = &mut shared.stats;
            stats.documents_processed += 1;
            stats.items_matched += report.matched_count as u64;
            stats.items_unmatched += report.unmatched_count as u64;
            stats.errors += report.error_count as u64;
            stats.last_processed_at = Some(Utc::now());
        }

        self.notify(Notification::summary(&report)).await;
        self.relocate(path, &self.config.processed_path()).await;
        FileOutcome::Reconciled(report)
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.deliver(&notification).await {
            warn!("Notification '{}' not delivered: {}", notification.subject, e);
        }
    }

    /// Move `path` into `dir`, renaming on collision.
    async fn relocate(&self, path: &Path, dir: &Path) -> Option<PathBuf> {
        match move_into(path, dir).await {
            Ok(target) => {
                debug!("Moved {} to {}", path.display(), target.display());
                Some(target)
            }
            Err(e) => {
                error!("Cannot move {} to {}: {}", path.display(), dir.display(), e);
                self.count_error();
                None
            }
        }
    }

    fn count_error(&self) {
        self.shared().stats.errors += 1;
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn move_into(path: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))?;
    let target = free_name(dir, Path::new(name)).await?;

    if let Err(e) = tokio::fs::rename(path, &target).await {
        // Different filesystem: fall back to copy and delete
        if tokio::fs::copy(path, &target).await.is_err() {
            return Err(e);
        }
        tokio::fs::remove_file(path).await?;
    }
    Ok(target)
}

/// First of `name`, `stem_1.ext`, `stem_2.ext`, ... that does not exist in `dir`.
async fn free_name(dir: &Path, name: &Path) -> std::io::Result<PathBuf> {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1u32;
    loop {
        let file_name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = dir.join(file_name);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::notifier::LogNotifier;

    #[tokio::test]
    async fn test_free_name_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        let name = Path::new("ft118.xml");

        assert_eq!(free_name(dir.path(), name).await.unwrap(), dir.path().join("ft118.xml"));

        std::fs::write(dir.path().join("ft118.xml"), "").unwrap();
        std::fs::write(dir.path().join("ft118_1.xml"), "").unwrap();
        assert_eq!(free_name(dir.path(), name).await.unwrap(), dir.path().join("ft118_2.xml"));
    }

    #[tokio::test]
    async fn test_move_into_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.xml");
        std::fs::write(&source, "<x/>").unwrap();

        let target = move_into(&source, &dir.path().join("processed")).await.unwrap();

        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(target).unwrap(), "<x/>");
    }

    #[tokio::test]
    async fn test_submit_requires_running() {
        let service = IngestionService::new(
            &IntakeConfig::default(),
            Stores::in_memory(Vec::new()),
            Arc::new(LogNotifier),
        );

        assert_eq!(service.state(), ServiceState::Idle);
        assert!(!service.submit(PathBuf::from("inbox/a.xml")));
        assert!(!service.stats().is_running);
    }
}

//! Drop-folder ingestion.
//!
//! Sheets dropped into the inbox directory are ingested and then moved to
//! `processed/` or, when ingestion fails, to `failed/`. Only the top level of
//! the inbox is watched.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, Debouncer};

use crate::error::InboxError;
use crate::ingest::{IngestReport, Ingestor};
use crate::sanitize::redact_path;
use crate::sheet::SheetFormat;

pub const PROCESSED_DIR: &str = "processed";
pub const FAILED_DIR: &str = "failed";

/// Result of handling one dropped file.
#[derive(Debug)]
pub enum InboxOutcome {
    Ingested {
        file: PathBuf,
        report: IngestReport,
    },
    Failed {
        file: PathBuf,
        reason: String,
    },
}

impl InboxOutcome {
    pub fn file(&self) -> &Path {
        match self {
            InboxOutcome::Ingested { file, .. } | InboxOutcome::Failed { file, .. } => file,
        }
    }
}

pub struct InboxWatcher {
    directory: PathBuf,
    debounce: Duration,
    ingestor: Arc<Ingestor>,
    shutdown: Arc<AtomicBool>,
}

impl InboxWatcher {
    pub fn new(directory: impl Into<PathBuf>, debounce: Duration, ingestor: Arc<Ingestor>) -> Self {
        Self {
            directory: directory.into(),
            debounce,
            ingestor,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Flag that stops [`watch`](Self::watch) once set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Ingests every sheet currently sitting in the inbox, oldest name first.
    pub fn process_pending(&self) -> Result<Vec<InboxOutcome>, InboxError> {
        let entries = std::fs::read_dir(&self.directory).map_err(|e| InboxError::ReadDirectory {
            path: self.directory.clone(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_sheet_file(path))
            .collect();
        files.sort();

        Ok(files.iter().map(|path| self.process_file(path)).collect())
    }

    fn process_file(&self, path: &Path) -> InboxOutcome {
        match self.ingestor.ingest_file(path) {
            Ok(report) => {
                let file = self.archive(path, PROCESSED_DIR);
                InboxOutcome::Ingested { file, report }
            }
            Err(e) => {
                log::warn!("Inbox file {} rejected: {}", redact_path(path), e);
                let file = self.archive(path, FAILED_DIR);
                InboxOutcome::Failed {
                    file,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Moves a handled file out of the watched level. An earlier file of the
    /// same name is kept; the new one gets a `-N` suffix. Returns where it
    /// ended up; a file that could not be moved stays put.
    fn archive(&self, path: &Path, subdir: &str) -> PathBuf {
        let Some(name) = path.file_name() else {
            return path.to_path_buf();
        };
        let target_dir = self.directory.join(subdir);
        if let Err(e) = std::fs::create_dir_all(&target_dir) {
            log::error!("Failed to create inbox {} directory: {}", subdir, e);
            return path.to_path_buf();
        }
        let target = unique_target(&target_dir, Path::new(name));
        match std::fs::rename(path, &target) {
            Ok(()) => target,
            Err(e) => {
                log::error!("Failed to move {} to {}: {}", redact_path(path), subdir, e);
                path.to_path_buf()
            }
        }
    }

    /// Processes pending files, then watches the inbox until shutdown.
    /// `on_outcome` sees every handled file.
    ///
    /// This function blocks until the shutdown flag is set.
    pub fn watch<F>(&self, mut on_outcome: F) -> Result<(), InboxError>
    where
        F: FnMut(&InboxOutcome),
    {
        for outcome in self.process_pending()? {
            on_outcome(&outcome);
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer: Debouncer<RecommendedWatcher> = new_debouncer(self.debounce, tx)
            .map_err(|e| InboxError::Watch(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|e| InboxError::Watch(e.to_string()))?;

        log::info!("Watching inbox {}", redact_path(&self.directory));

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    for event in events {
                        if event.path.is_file() && is_sheet_file(&event.path) {
                            let outcome = self.process_file(&event.path);
                            on_outcome(&outcome);
                        }
                    }
                }
                Ok(Err(e)) => {
                    log::error!("Inbox watch error: {}", e);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        log::info!("Stopped watching inbox");
        Ok(())
    }
}

/// First free name in `dir`: `orders.csv`, then `orders-1.csv`, `orders-2.csv`.
fn unique_target(dir: &Path, name: &Path) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());
    (1u32..)
        .map(|n| match &extension {
            Some(ext) => dir.join(format!("{}-{}.{}", stem, n, ext)),
            None => dir.join(format!("{}-{}", stem, n)),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// True for files the readers understand. Hidden and lock files (`.~lock`,
/// `~$book.xlsx`) are ignored.
pub fn is_sheet_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') || n.starts_with("~$"))
        .unwrap_or(true);
    !hidden && path.is_file() && SheetFormat::from_path(path).is_some()
}

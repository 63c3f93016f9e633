// SPDX-License-Identifier: MIT

//! Rule document loading and hot reload
//!
//! The loader owns the current document, fires registered callbacks on
//! every successful reload, and can watch the file for changes with a
//! polling task. A reload that fails to read or parse keeps the previous
//! document active and is reported loudly.

use super::RuleDocument;
use crate::perk::error::PerkError;
use crate::perk::metrics;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type ChangeCallback = Box<dyn Fn(Arc<RuleDocument>) + Send + Sync>;

/// Reads a YAML rule document and watches it for changes.
pub struct Loader {
    path: PathBuf,
    current: RwLock<Arc<RuleDocument>>,
    callbacks: RwLock<Vec<ChangeCallback>>,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader").field("path", &self.path).finish()
    }
}

impl Loader {
    /// Create a loader and perform the initial load.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PerkError> {
        let path = path.into();
        let document = Arc::new(load_document(&path)?);
        Ok(Self {
            path,
            current: RwLock::new(document),
            callbacks: RwLock::new(Vec::new()),
        })
    }

    /// The current (latest successfully loaded) document.
    pub fn document(&self) -> Arc<RuleDocument> {
        self.current.read().clone()
    }

    /// Register a callback invoked after every successful reload.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(Arc<RuleDocument>) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Box::new(callback));
    }

    /// Force an immediate re-read of the document and fire callbacks.
    pub fn reload(&self) -> Result<Arc<RuleDocument>, PerkError> {
        let document = Arc::new(load_document(&self.path)?);
        *self.current.write() = document.clone();
        for callback in self.callbacks.read().iter() {
            callback(document.clone());
        }
        Ok(document)
    }

    /// Start a background task that polls the file's mtime and reloads on
    /// change. Reload failures keep the previous document, log a warning
    /// and bump the reload-failure counter.
    pub fn watch(self: Arc<Self>, interval: Duration) -> WatchHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut last_modified = modified_time(&self.path);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let modified = modified_time(&self.path);
                if modified == last_modified {
                    continue;
                }
                last_modified = modified;
                match self.reload() {
                    Ok(document) => {
                        log::info!(
                            "rule document reloaded from {} ({} scenarios)",
                            self.path.display(),
                            document.scenarios.len()
                        );
                    }
                    Err(e) => {
                        metrics::reload_failures().add(1, &[]);
                        log::warn!(
                            "rule document reload failed for {}, keeping previous rules: {e}",
                            self.path.display()
                        );
                    }
                }
            }
        });
        WatchHandle { cancel, handle }
    }
}

/// Handle to a running watcher task.
pub struct WatchHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher and wait for its task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

fn load_document(path: &Path) -> Result<RuleDocument, PerkError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| PerkError::config(format!("read {}: {e}", path.display())))?;
    serde_yaml::from_str(&data)
        .map_err(|e| PerkError::config(format!("parse {}: {e}", path.display())))
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

//! Routes file watcher.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Requests a route refresh whenever the routes file changes.
pub struct RoutesFileWatcher {
    path: PathBuf,
    trigger: mpsc::Sender<()>,
}

impl RoutesFileWatcher {
    pub fn new(path: &Path, trigger: mpsc::Sender<()>) -> Self {
        Self {
            path: path.to_path_buf(),
            trigger,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    ///
    /// The parent directory is watched so that editors replacing the file
    /// are noticed too.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.trigger.clone();
        let file_name: Option<OsString> = self.path.file_name().map(|n| n.to_os_string());
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours {
                        tracing::info!("Routes file change detected, refreshing...");
                        // A full channel already holds a pending refresh.
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Routes file watcher started");
        Ok(watcher)
    }
}

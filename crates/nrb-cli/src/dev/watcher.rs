//! Source tree watcher with reload debouncing.
//!
//! Every directory under the root is registered individually (non-recursive), so
//! ignored directories such as `node_modules` never reach the OS watch limit.
//! New directories are walked and added as they appear; the watch set only grows.
//!
//! Bursts of changes are coalesced: each qualifying event resets one timer and its
//! firing produces a single [`ReloadSignal`]. Extra config files bypass the timer and
//! are reported on their own channel so the bundler can be restarted first.

use indexmap::IndexSet;
use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use walkdir::WalkDir;

use crate::config::DevConfig;
use crate::error::{Result, ResultExt};

/// What to watch and how long to wait for quiet.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Source tree, watched recursively
    pub root: PathBuf,
    /// Files outside the tree whose change restarts the bundler
    pub extra_files: Vec<PathBuf>,
    /// Directory names skipped at any depth below the root
    pub ignore: Vec<String>,
    /// Quiet period before a reload is emitted
    pub debounce: Duration,
}

impl From<&DevConfig> for WatchOptions {
    fn from(config: &DevConfig) -> Self {
        Self {
            root: config.source_root(),
            extra_files: config.extra_watch_files(),
            ignore: config.watch_ignore.clone(),
            debounce: config.debounce(),
        }
    }
}

/// One debounced reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSignal {
    /// Files written since the previous reload, relative to the root
    pub changed: Vec<PathBuf>,
}

/// Running watcher. The receivers close when the watcher task stops.
#[derive(Debug)]
pub struct ChangeWatcher {
    /// Debounced reloads; holds at most one pending signal
    pub reloads: mpsc::Receiver<ReloadSignal>,
    /// Extra config files that were created or written
    pub config_changes: mpsc::Receiver<PathBuf>,
    /// Errors reported by the OS watch primitive
    pub errors: mpsc::Receiver<notify::Error>,
    task: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Register the tree and spawn the watcher task.
    ///
    /// # Errors
    ///
    /// Fails when the root cannot be resolved or walked, or when the OS refuses a
    /// watch during the initial walk.
    pub fn start(options: WatchOptions) -> Result<Self> {
        let root = options.root.canonicalize().with_path(&options.root)?;
        let extra_files: HashSet<PathBuf> =
            options.extra_files.iter().map(|p| canonical(p)).collect();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })?;

        let watched = watch_tree(&mut watcher, &root, &options.ignore)?;

        // Parents rather than the files themselves: atomic saves replace the inode.
        let parents: HashSet<&Path> = extra_files.iter().filter_map(|p| p.parent()).collect();
        for parent in parents {
            if parent.is_dir() {
                watcher.watch(parent, RecursiveMode::NonRecursive)?;
            }
        }

        tracing::info!(
            root = %root.display(),
            directories = watched,
            "watching for changes"
        );

        let (reload_tx, reloads) = mpsc::channel(1);
        let (config_tx, config_changes) = mpsc::channel(1);
        let (error_tx, errors) = mpsc::channel(16);

        let state = WatchState {
            watcher,
            root,
            extra_files,
            ignore: options.ignore,
            debounce: options.debounce,
            pending: IndexSet::new(),
            reload_tx,
            config_tx,
            error_tx,
        };
        let task = tokio::spawn(state.run(event_rx));

        Ok(Self {
            reloads,
            config_changes,
            errors,
            task,
        })
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct WatchState {
    watcher: RecommendedWatcher,
    root: PathBuf,
    extra_files: HashSet<PathBuf>,
    ignore: Vec<String>,
    debounce: Duration,
    pending: IndexSet<PathBuf>,
    reload_tx: mpsc::Sender<ReloadSignal>,
    config_tx: mpsc::Sender<PathBuf>,
    error_tx: mpsc::Sender<notify::Error>,
}

impl WatchState {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<notify::Result<Event>>) {
        let timer = tokio::time::sleep(self.debounce);
        tokio::pin!(timer);
        let mut armed = false;

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Some(Ok(event)) => {
                        if self.handle(event) {
                            timer.as_mut().reset(Instant::now() + self.debounce);
                            armed = true;
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "file watcher error");
                        let _ = self.error_tx.try_send(err);
                    }
                    None => break,
                },
                () = &mut timer, if armed => {
                    armed = false;
                    if !self.emit_reload() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("file watcher stopped");
    }

    /// Returns true when the event should (re)start the debounce timer.
    fn handle(&mut self, event: Event) -> bool {
        if matches!(
            event.kind,
            EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_))
        ) {
            return false;
        }

        let mut qualifies = false;
        for path in &event.paths {
            if self.extra_files.contains(path) {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    self.report_config_change(path);
                }
                continue;
            }

            let Ok(relative) = path.strip_prefix(&self.root) else {
                // Sibling of an extra file.
                continue;
            };
            if relative
                .components()
                .any(|c| is_ignored(c.as_os_str(), &self.ignore))
            {
                continue;
            }

            qualifies = true;

            if is_new_directory(&event.kind, path) {
                match watch_tree(&mut self.watcher, path, &self.ignore) {
                    Ok(count) => {
                        tracing::debug!(path = %path.display(), directories = count, "watching new directory")
                    }
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "failed to watch new directory")
                    }
                }
            }

            if is_write(&event.kind) && !relative.as_os_str().is_empty() {
                self.pending.insert(relative.to_path_buf());
            }
        }

        qualifies
    }

    fn report_config_change(&self, path: &Path) {
        match self.config_tx.try_send(path.to_path_buf()) {
            Ok(()) => tracing::debug!(path = %path.display(), "config file changed"),
            Err(TrySendError::Full(_)) => {
                tracing::debug!(path = %path.display(), "config change coalesced with a pending restart")
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Returns false once nobody listens for reloads anymore.
    fn emit_reload(&mut self) -> bool {
        let signal = ReloadSignal {
            changed: self.pending.drain(..).collect(),
        };
        for path in &signal.changed {
            tracing::debug!(path = %path.display(), "changed");
        }

        match self.reload_tx.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(signal)) => {
                // Kept for the next reload; the queued one carries an older list.
                self.pending.extend(signal.changed);
                tracing::debug!("reload coalesced with a pending one");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Register `dir` and every non-ignored directory below it.
fn watch_tree(watcher: &mut RecommendedWatcher, dir: &Path, ignore: &[String]) -> Result<usize> {
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry.file_name(), ignore));

    let mut count = 0;
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() {
            watcher.watch(entry.path(), RecursiveMode::NonRecursive)?;
            count += 1;
        }
    }
    Ok(count)
}

fn is_ignored(name: &OsStr, ignore: &[String]) -> bool {
    name.to_str()
        .is_some_and(|name| ignore.iter().any(|ignored| ignored == name))
}

fn is_new_directory(kind: &EventKind, path: &Path) -> bool {
    match kind {
        EventKind::Create(CreateKind::Folder) => true,
        EventKind::Create(CreateKind::Any | CreateKind::Other) => path.is_dir(),
        EventKind::Modify(ModifyKind::Name(_)) => path.is_dir(),
        _ => false,
    }
}

fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other)
    )
}

/// Canonical form of a path that may not exist yet: the parent is resolved instead.
fn canonical(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

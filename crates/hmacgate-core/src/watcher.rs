//! Debounced file watch driving configuration reloads.
//!
//! The watch observes the parent directory of the configuration file so that
//! editors which save by rename, delete-then-create or truncate-and-write are
//! all seen. Events are forwarded to a single debounce thread which waits until
//! no further activity on the watched file has been observed for the quiet
//! period and then asks the store to reload the (possibly re-targeted) file
//! once. Activity on other files in the directory does not extend the wait.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::ConfigResult;
use crate::store::StoreInner;

/// Quiet period after the last file system event before a reload fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// An active watch. Dropping it detaches the notify handlers, which in turn
/// lets the debounce thread exit.
pub(crate) struct FileWatch {
    target: Arc<Mutex<PathBuf>>,
    cancelled: Arc<AtomicBool>,
    watcher: Option<RecommendedWatcher>,
    watched_dirs: Vec<PathBuf>,
}

impl std::fmt::Debug for FileWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatch")
            .field("target", &*self.target.lock())
            .field("cancelled", &self.cancelled.load(Ordering::Acquire))
            .field("watched_dirs", &self.watched_dirs)
            .finish_non_exhaustive()
    }
}

impl FileWatch {
    /// Start watching `path` on behalf of `store`.
    pub(crate) fn start(
        path: &Path,
        store: Weak<StoreInner>,
        debounce: Duration,
    ) -> ConfigResult<Self> {
        let path = std::fs::canonicalize(path)?;
        let dir = parent_dir(&path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone only once the debounce thread has exited.
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let target = Arc::new(Mutex::new(path));
        let cancelled = Arc::new(AtomicBool::new(false));

        let thread_target = Arc::clone(&target);
        let thread_cancelled = Arc::clone(&cancelled);
        thread::Builder::new()
            .name("hmacgate-config-watch".to_owned())
            .spawn(move || run_debounce(&rx, &store, debounce, &thread_target, &thread_cancelled))?;

        info!(path = %target.lock().display(), debounce_ms = debounce.as_millis(), "Configuration watch started");

        Ok(Self {
            target,
            cancelled,
            watcher: Some(watcher),
            watched_dirs: vec![dir],
        })
    }

    /// The file currently being watched.
    pub(crate) fn path(&self) -> PathBuf {
        self.target.lock().clone()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Make sure the directory holding `path` is observed, after a rename moved
    /// the file elsewhere.
    pub(crate) fn ensure_watching(&mut self, path: &Path) {
        let dir = parent_dir(path);
        if self.watched_dirs.contains(&dir) {
            return;
        }
        if let Some(watcher) = self.watcher.as_mut() {
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => self.watched_dirs.push(dir),
                Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to extend configuration watch"),
            }
        }
    }

    /// Cancel pending reloads and detach the notify handlers.
    pub(crate) fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.watcher.take();
        debug!(path = %self.target.lock().display(), "Configuration watch stopped");
    }
}

impl Drop for FileWatch {
    fn drop(&mut self) {
        if !self.is_cancelled() {
            self.cancel();
        }
    }
}

/// What a burst of events amounts to once it has settled.
#[derive(Debug, Default, PartialEq, Eq)]
struct Burst {
    relevant: bool,
    renamed_to: Option<PathBuf>,
}

fn run_debounce(
    rx: &Receiver<notify::Result<Event>>,
    store: &Weak<StoreInner>,
    debounce: Duration,
    target: &Mutex<PathBuf>,
    cancelled: &AtomicBool,
) {
    // `recv` fails once the watcher, and with it the sender, has been dropped.
    while let Ok(first) = rx.recv() {
        let mut current = target.lock().clone();
        let mut burst = Burst::default();
        if !observe(&mut burst, &mut current, first) {
            continue;
        }

        if !wait_quiet(rx, debounce, &mut burst, &mut current) {
            return;
        }
        if cancelled.load(Ordering::Acquire) {
            return;
        }
        if burst.renamed_to.is_some() {
            *target.lock() = current.clone();
        }

        let Some(inner) = store.upgrade() else {
            return;
        };
        inner.reload_from_watch(&current, burst.renamed_to.is_some(), cancelled);
    }
}

/// Wait until no relevant event has arrived for `debounce`. Only relevant
/// events restart the quiet period. Returns `false` once the channel is closed.
fn wait_quiet(
    rx: &Receiver<notify::Result<Event>>,
    debounce: Duration,
    burst: &mut Burst,
    target: &mut PathBuf,
) -> bool {
    let mut deadline = Instant::now() + debounce;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(next) => {
                if observe(burst, target, next) {
                    deadline = Instant::now() + debounce;
                }
            }
            Err(RecvTimeoutError::Timeout) => return true,
            Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}

/// Fold one event into the burst. Returns whether it concerns the target.
fn observe(burst: &mut Burst, target: &mut PathBuf, event: notify::Result<Event>) -> bool {
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Configuration watch error");
            return false;
        }
    };

    let relevant = match event.kind {
        EventKind::Access(_) => false,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let (from, to) = (&event.paths[0], &event.paths[1]);
            if from == target {
                debug!(from = %from.display(), to = %to.display(), "Watched configuration renamed");
                *target = to.clone();
                burst.renamed_to = Some(to.clone());
                true
            } else {
                to == target
            }
        }
        _ => {
            let hit = event.paths.iter().any(|p| p == target);
            if hit {
                debug!(kind = ?event.kind, path = %target.display(), "Configuration file event");
            }
            hit
        }
    };
    burst.relevant |= relevant;
    relevant
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

//! Polling file watcher for live reconfiguration.
//!
//! A [`ConfigWatcher`] runs one background task that owns the table of
//! watched paths. Registrations and queries reach it over a channel. On
//! every tick the task compares each file's modification time with the last
//! one seen and runs the listeners of changed files on a blocking thread, one
//! poll at a time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{LogError, Result};

/// Default time between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

type Listener = Arc<dyn Fn(&Path) -> Result<()> + Send + Sync>;

struct Watched {
    modified: Option<SystemTime>,
    listener: Listener,
}

enum Command {
    Watch {
        path: PathBuf,
        modified: Option<SystemTime>,
        listener: Listener,
    },
    Unwatch(PathBuf),
    Poll(oneshot::Sender<usize>),
    Paths(oneshot::Sender<Vec<PathBuf>>),
}

/// Handle to a running poll task.
struct WatchTask {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
}

/// Watches files and calls back when they change.
///
/// The poll task starts with the first registration and needs a tokio
/// runtime. [`ConfigWatcher::stop`] ends it and forgets every registration;
/// a later registration starts a fresh task.
pub struct ConfigWatcher {
    interval: Duration,
    task: Mutex<Option<WatchTask>>,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Default for ConfigWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ConfigWatcher {
    /// Creates a watcher that polls every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: Mutex::new(None),
        }
    }

    /// Time between two polls.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Registers `callback` for `path`, replacing any earlier registration.
    ///
    /// The callback runs once on the calling thread before this returns, and
    /// again on the poll task each time the file's modification time
    /// changes. Errors from later runs are reported and the watch continues.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::PathNotFound`] if `path` does not exist,
    /// [`LogError::NoRuntime`] if the poll task cannot be started, or the
    /// error of the initial callback run. In the last case the path stays
    /// registered.
    pub fn add_file_changed_listener<T, F>(
        &self,
        path: impl AsRef<Path>,
        target: Arc<T>,
        callback: F,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&Path, &T) -> Result<()> + Send + Sync + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let metadata =
            fs::metadata(&path).map_err(|_| LogError::PathNotFound(path.clone()))?;

        let listener: Listener = Arc::new(move |changed: &Path| callback(changed, &target));
        self.send(Command::Watch {
            path: path.clone(),
            modified: metadata.modified().ok(),
            listener: Arc::clone(&listener),
        })?;
        debug!(path = %path.display(), "watching file");

        listener(&path)
    }

    /// Stops watching `path`.
    pub fn remove_file_changed_listener(&self, path: impl AsRef<Path>) {
        self.try_send(Command::Unwatch(path.as_ref().to_path_buf()));
    }

    /// The registered paths.
    pub async fn watched_paths(&self) -> Vec<PathBuf> {
        let (reply, rx) = oneshot::channel();
        if !self.try_send(Command::Paths(reply)) {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Returns true if `path` is registered.
    pub async fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.watched_paths().await.iter().any(|p| p == path)
    }

    /// Polls now instead of waiting for the next tick.
    ///
    /// Returns the number of listeners invoked.
    pub async fn poll_now(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if !self.try_send(Command::Poll(reply)) {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Returns true while the poll task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| t.running.load(Ordering::SeqCst))
    }

    /// Stops the poll task and drops every registration.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.cancel.cancel();
        }
    }

    /// Sends `command`, starting the poll task if none is alive.
    fn send(&self, command: Command) -> Result<()> {
        let mut task = self.task.lock();
        let alive = task.as_ref().is_some_and(|t| !t.commands.is_closed());
        if !alive {
            *task = Some(self.spawn()?);
        }
        match task.as_ref() {
            Some(t) => t.commands.send(command).map_err(|_| LogError::NoRuntime),
            None => Err(LogError::NoRuntime),
        }
    }

    /// Sends `command` to a live poll task. Returns false if there is none.
    fn try_send(&self, command: Command) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| t.commands.send(command).is_ok())
    }

    fn spawn(&self) -> Result<WatchTask> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| LogError::NoRuntime)?;

        let (commands, mut inbox) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));

        let token = cancel.clone();
        let alive = Arc::clone(&running);
        let period = self.interval;

        handle.spawn(async move {
            let mut watched: HashMap<PathBuf, Watched> = HashMap::new();
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    command = inbox.recv() => match command {
                        Some(Command::Watch { path, modified, listener }) => {
                            watched.insert(path, Watched { modified, listener });
                        }
                        Some(Command::Unwatch(path)) => {
                            watched.remove(&path);
                        }
                        Some(Command::Poll(reply)) => {
                            let fired = poll(&mut watched).await;
                            let _ = reply.send(fired);
                        }
                        Some(Command::Paths(reply)) => {
                            let _ = reply.send(watched.keys().cloned().collect());
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        poll(&mut watched).await;
                    }
                }
            }

            alive.store(false, Ordering::SeqCst);
            debug!("config watcher stopped");
        });

        Ok(WatchTask {
            commands,
            cancel,
            running,
        })
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs the listeners of every changed file and returns how many ran.
async fn poll(watched: &mut HashMap<PathBuf, Watched>) -> usize {
    let due = changed(watched);
    let fired = due.len();
    if fired == 0 {
        return 0;
    }

    let run = tokio::task::spawn_blocking(move || {
        for (path, listener) in &due {
            debug!(path = %path.display(), "watched file changed");
            if let Err(e) = listener(path) {
                warn!(path = %path.display(), error = %e, "file change listener failed");
            }
        }
    });
    if let Err(e) = run.await {
        warn!(error = %e, "file change listener panicked");
    }
    fired
}

/// Collects the listeners of files whose modification time moved, recording
/// the new time. Missing files are skipped until they reappear.
fn changed(watched: &mut HashMap<PathBuf, Watched>) -> Vec<(PathBuf, Listener)> {
    watched
        .iter_mut()
        .filter_map(|(path, entry)| {
            let modified = match fs::metadata(path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "watched file unavailable");
                    return None;
                }
            };
            if entry.modified == Some(modified) {
                return None;
            }
            entry.modified = Some(modified);
            Some((path.clone(), Arc::clone(&entry.listener)))
        })
        .collect()
}

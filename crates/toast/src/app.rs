//! The application context: every long lived service, constructed once.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::session::{self, ExportOptions, Session, SessionManager};
use crate::tasks::{AsyncTaskManager, MainThreadQueue};

const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// Services shared by the whole application
///
/// Owned by the main thread and passed around by reference. Background tasks only get the
/// pieces they need: a [`crate::tasks::MainThreadHandle`] and the session manager.
pub struct AppContext {
    pub config: Config,
    pub sessions: Arc<SessionManager>,
    pub tasks: AsyncTaskManager,
    pub main_thread: MainThreadQueue,

    /// Messages for the user, queued by tasks that failed
    prompts: Arc<Mutex<Vec<String>>>,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        AppContext {
            config,
            sessions: Arc::default(),
            tasks: AsyncTaskManager::default(),
            main_thread: MainThreadQueue::new(),
            prompts: Arc::default(),
        }
    }

    /// Open `path` in the background
    ///
    /// Reading and decoding happen off the main thread; the new session is added and selected by
    /// the main thread. A failed open queues a prompt and leaves the sessions untouched.
    pub fn open_async(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let handle = self.main_thread.handle();
        let sessions = self.sessions.clone();
        let prompts = self.prompts.clone();

        self.tasks.spawn(format!("open {}", path.display()), move || {
            let result = session::open(&path);
            let queued = handle.run_sync(move || match result {
                Ok(document) => {
                    sessions.add(Session::new(path, document));
                }
                Err(e) => {
                    error!("unable to open {}: {e}", path.display());
                    prompts
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(format!("{}: {e}", path.display()));
                }
            });
            if queued.is_err() {
                error!("main thread went away before the archive was handed over");
            }
        })
    }

    /// Export the current session, returns false when there is none
    pub fn save_current(&self) -> Result<bool> {
        let config = &self.config;
        let saved = self.sessions.with_current(|session| {
            let options = ExportOptions::from_config(config, session.document.compression);
            session.save(&options)
        });
        match saved {
            Some(report) => {
                let report = report?;
                info!(
                    downscaled = report.downscaled.len(),
                    backup = ?report.backup,
                    "saved current session"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pump the main thread queue until every background task has finished
    pub fn wait_idle(&self) {
        while self.tasks.pending() > 0 {
            self.main_thread.pump_timeout(PUMP_INTERVAL);
        }
        self.main_thread.pump();
        self.tasks.join_all();
    }

    /// Take the messages queued for the user
    pub fn take_prompts(&self) -> Vec<String> {
        std::mem::take(&mut *self.prompts.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

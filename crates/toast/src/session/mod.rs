//! Open documents and the list of sessions holding them.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::info;

pub mod backup;
pub mod export;
pub mod open;

pub use crate::error::Error;
pub use backup::BackupMode;
pub use export::{export, ExportOptions, ExportReport};
pub use open::{open, open_bytes, Document, Textures};

use crate::error::Result;

/// A document and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub path: PathBuf,
    pub document: Document,

    /// Cleared only once an export succeeded
    pub modified: bool,
}

impl Session {
    pub fn new(path: impl Into<PathBuf>, document: Document) -> Self {
        Session {
            path: path.into(),
            document,
            modified: false,
        }
    }

    /// Export to the path the session was opened from
    pub fn save(&mut self, options: &ExportOptions) -> Result<ExportReport> {
        let path = self.path.clone();
        self.save_as(&path, options)
    }

    /// Export to `path`; the session moves there once the export succeeded
    pub fn save_as(&mut self, path: &Path, options: &ExportOptions) -> Result<ExportReport> {
        let report = export(&mut self.document, path, options)?;
        self.path = path.to_owned();
        self.modified = false;
        Ok(report)
    }
}

#[derive(Debug, Default)]
struct SessionList {
    sessions: Vec<Session>,
    current: Option<usize>,
}

/// Every open session and which one is current
///
/// Structural changes go through one lock; the sessions themselves are only edited by the main
/// thread.
#[derive(Debug, Default)]
pub struct SessionManager {
    list: Mutex<SessionList>,
}

impl SessionManager {
    fn lock(&self) -> std::sync::MutexGuard<'_, SessionList> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a session and make it current, returning its index
    pub fn add(&self, session: Session) -> usize {
        let mut list = self.lock();
        info!("opened session for {}", session.path.display());
        list.sessions.push(session);
        let index = list.sessions.len() - 1;
        list.current = Some(index);
        index
    }

    /// Remove a session; the current index follows the session it pointed to
    pub fn remove(&self, index: usize) -> Option<Session> {
        let mut list = self.lock();
        if index >= list.sessions.len() {
            return None;
        }
        let session = list.sessions.remove(index);
        let current = match list.current {
            Some(current) if current == index => {
                (!list.sessions.is_empty()).then(|| index.min(list.sessions.len() - 1))
            }
            Some(current) if current > index => Some(current - 1),
            current => current,
        };
        list.current = current;
        Some(session)
    }

    /// Make `index` current, returns false when it does not exist
    pub fn select(&self, index: usize) -> bool {
        let mut list = self.lock();
        if index < list.sessions.len() {
            list.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<usize> {
        self.lock().current
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    /// Run `f` on the session at `index`
    pub fn with<R>(&self, index: usize, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.lock().sessions.get_mut(index).map(f)
    }

    /// Run `f` on the current session
    pub fn with_current<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut list = self.lock();
        let index = list.current?;
        list.sessions.get_mut(index).map(f)
    }
}

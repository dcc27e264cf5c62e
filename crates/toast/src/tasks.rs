//! Background work and the hand-off back to the main thread.
//!
//! Documents are only touched by the main thread. Background tasks do the slow part (reading,
//! decompressing, decoding) and then use [`MainThreadHandle::run_sync`] to queue the step that
//! touches shared state; the task blocks until the main thread has run it.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send>;

/// Queue of jobs owned by the main thread
pub struct MainThreadQueue {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
}

/// Cloneable handle background threads use to reach the main thread
#[derive(Clone)]
pub struct MainThreadHandle {
    sender: Sender<Job>,
}

impl Default for MainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        MainThreadQueue { sender, receiver }
    }

    pub fn handle(&self) -> MainThreadHandle {
        MainThreadHandle {
            sender: self.sender.clone(),
        }
    }

    /// Run every queued job, returning how many ran
    pub fn pump(&self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            count += 1;
        }
        count
    }

    /// Wait up to `timeout` for a job, then run everything queued
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                job();
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }
}

impl MainThreadHandle {
    /// Run `f` on the main thread and wait for its result
    ///
    /// Must not be called from the main thread itself, which would wait on its own queue.
    pub fn run_sync<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        self.sender
            .send(Box::new(move || {
                // the waiting task may be gone, the result is dropped then
                let _ = sender.send(f());
            }))
            .map_err(|_| Error::MainThreadClosed)?;
        receiver.recv().map_err(|_| Error::MainThreadClosed)
    }
}

struct Task {
    name: String,
    handle: JoinHandle<()>,
}

/// Fire and forget background tasks
#[derive(Default)]
pub struct AsyncTaskManager {
    tasks: Mutex<Vec<Task>>,
}

impl AsyncTaskManager {
    /// Start `f` on a new named thread
    pub fn spawn<F>(&self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(f)
            .map_err(|source| Error::TaskSpawn {
                name: name.clone(),
                source,
            })?;
        debug!("started task {name}");

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Task { name, handle });
        Ok(())
    }

    /// Number of tasks still running
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    /// Wait for every task, returning how many of them panicked
    pub fn join_all(&self) -> usize {
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        let mut panicked = 0;
        for task in tasks {
            if task.handle.join().is_err() {
                error!("task {} panicked", task.name);
                panicked += 1;
            }
        }
        panicked
    }
}

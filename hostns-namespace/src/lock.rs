//! Timeout-bound exclusive file lock
//!
//! The blocking `flock(2)` call runs on the blocking pool and is raced
//! against a deadline. `flock` cannot be interrupted, so a timed-out attempt
//! is abandoned rather than cancelled: when it eventually returns it finds its
//! generation stale and releases the lock immediately. Dropping the `lock`
//! future abandons the attempt the same way. An attempt wedged on a
//! filesystem that never answers stays parked on its blocking thread.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hostns_core::constants::FILE_LOCK_DEFAULT_TIMEOUT;
use hostns_core::{Error, ProcessName, Result, ResultExt};
use nix::fcntl::Flock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, trace};

use crate::executor::NamespaceExecutor;
use crate::util;

/// Lifecycle of a [`FileLock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Not held; `lock` may be called
    Unlocked,
    /// Acquisition in flight
    Acquiring,
    /// Held
    Locked,
    /// Released after being held; terminal
    Released,
}

/// State shared by the caller, the acquiring task and the release waiter
struct LockSlot {
    state: LockState,
    attempt: u64,
    file: Option<Flock<File>>,
}

fn guard(slot: &Mutex<LockSlot>) -> MutexGuard<'_, LockSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One acquisition attempt that has not been handed to a release waiter yet
///
/// Unless disarmed, dropping it returns the slot to `Unlocked` and releases
/// a handle the attempt may already have stored.
struct PendingAttempt {
    slot: Arc<Mutex<LockSlot>>,
    path: PathBuf,
    attempt: u64,
    armed: bool,
}

impl PendingAttempt {
    fn disarm(mut self) {
        self.armed = false;
    }

    fn abandon(mut self) -> Result<()> {
        self.armed = false;
        self.release()
    }

    fn release(&self) -> Result<()> {
        let landed = {
            let mut slot = guard(&self.slot);
            if slot.attempt != self.attempt
                || !matches!(slot.state, LockState::Acquiring | LockState::Locked)
            {
                return Ok(());
            }
            slot.state = LockState::Unlocked;
            slot.file.take()
        };

        match landed {
            Some(file) => util::unlock_file(file).context(|| {
                format!("failed to unlock abandoned lock file {}", self.path.display())
            }),
            None => Ok(()),
        }
    }
}

impl Drop for PendingAttempt {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        trace!(file = %self.path.display(), attempt = self.attempt, "Lock attempt cancelled");
        if let Err(e) = self.release() {
            error!(file = %self.path.display(), error = %e, "Failed to release cancelled lock attempt");
        }
    }
}

/// Exclusive lock on one file, acquired within a timeout
///
/// Create one per acquisition cycle: once released it cannot be locked again.
pub struct FileLock {
    path: PathBuf,
    timeout: Duration,
    executor: NamespaceExecutor,
    process: ProcessName,
    slot: Arc<Mutex<LockSlot>>,
    done: Option<oneshot::Sender<()>>,
    waiter: Option<JoinHandle<()>>,
}

impl FileLock {
    /// Create a lock for `path`; a zero timeout selects the default
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            FILE_LOCK_DEFAULT_TIMEOUT
        } else {
            timeout
        };

        Self {
            path: path.into(),
            timeout,
            executor: NamespaceExecutor::default(),
            process: ProcessName::None,
            slot: Arc::new(Mutex::new(LockSlot {
                state: LockState::Unlocked,
                attempt: 0,
                file: None,
            })),
            done: None,
            waiter: None,
        }
    }

    /// Take the lock inside the namespace of `process`
    #[must_use]
    pub fn with_executor(mut self, executor: NamespaceExecutor, process: ProcessName) -> Self {
        self.executor = executor;
        self.process = process;
        self
    }

    /// Path of the lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquisition timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> LockState {
        guard(&self.slot).state
    }

    /// Whether a locked file handle is currently held
    #[must_use]
    pub fn is_held(&self) -> bool {
        guard(&self.slot).file.is_some()
    }

    /// Acquire the lock, giving up after the timeout
    ///
    /// On success a background task is armed that releases the lock once
    /// [`unlock`](Self::unlock) is called or the `FileLock` is dropped.
    ///
    /// # Errors
    /// [`Error::LockTimeout`] when the deadline passes, [`Error::InvalidState`]
    /// unless the lock is `Unlocked`, or the error of the lock syscall
    pub async fn lock(&mut self) -> Result<()> {
        let path = self.path.clone();
        self.acquire()
            .await
            .context(|| format!("failed to lock file {}", path.display()))
    }

    async fn acquire(&mut self) -> Result<()> {
        let attempt = {
            let mut slot = guard(&self.slot);
            if slot.state != LockState::Unlocked {
                return Err(Error::InvalidState {
                    message: format!("cannot lock a file lock in {:?} state", slot.state),
                });
            }
            slot.state = LockState::Acquiring;
            slot.attempt += 1;
            slot.attempt
        };

        // Dropping the `lock` future before it resolves abandons the attempt
        let pending = PendingAttempt {
            slot: Arc::clone(&self.slot),
            path: self.path.clone(),
            attempt,
            armed: true,
        };

        let (acquired_tx, acquired_rx) = oneshot::channel::<Result<()>>();
        let shared = Arc::clone(&self.slot);
        let executor = self.executor.clone();
        let process = self.process.clone();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let result = executor.run(&process, || util::lock_file(&path));
            let mut slot = guard(&shared);
            let current = slot.attempt == attempt && slot.state == LockState::Acquiring;

            match result {
                Ok(file) if current => {
                    slot.file = Some(file);
                    slot.state = LockState::Locked;
                    drop(slot);
                    let _ = acquired_tx.send(Ok(()));
                }
                Ok(file) => {
                    drop(slot);
                    trace!(file = %path.display(), attempt, "Releasing lock acquired after abandonment");
                    if let Err(e) = util::unlock_file(file) {
                        error!(file = %path.display(), error = %e, "Failed to unlock abandoned lock file");
                    }
                }
                Err(e) => {
                    if current {
                        slot.state = LockState::Unlocked;
                    }
                    drop(slot);
                    let _ = acquired_tx.send(Err(e));
                }
            }
        });

        match tokio::time::timeout(self.timeout, acquired_rx).await {
            Ok(Ok(Ok(()))) => {
                pending.disarm();
                trace!(file = %self.path.display(), "Locked file");
                self.arm_release_waiter();
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                pending.disarm();
                Err(e)
            }
            Ok(Err(_)) => {
                pending.abandon()?;
                Err(Error::InvalidState {
                    message: "lock acquisition ended without a result".to_string(),
                })
            }
            Err(_) => {
                trace!(file = %self.path.display(), "Timeout waiting for file to lock");
                pending.abandon()?;
                Err(Error::LockTimeout {
                    path: self.path.clone(),
                    timeout: self.timeout,
                })
            }
        }
    }

    fn arm_release_waiter(&mut self) {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let shared = Arc::clone(&self.slot);
        let path = self.path.clone();

        self.done = Some(done_tx);
        self.waiter = Some(tokio::spawn(async move {
            // A dropped sender releases as well
            let _ = done_rx.await;
            trace!(file = %path.display(), "Received done signal to unlock file");

            let mut slot = guard(&shared);
            if let Some(file) = slot.file.take() {
                if let Err(e) = util::unlock_file(file) {
                    error!(file = %path.display(), error = %e, "Failed to gracefully unlock file");
                }
            }
            slot.state = LockState::Released;
        }));
    }

    /// Signal the release; does not wait for it
    ///
    /// Only the first call after a successful `lock` signals.
    pub fn unlock(&mut self) {
        match self.done.take() {
            Some(done) => {
                let _ = done.send(());
            }
            None => trace!(file = %self.path.display(), "Unlock called without a held lock"),
        }
    }

    /// Signal the release and wait until the handle is closed
    ///
    /// # Errors
    /// Returns error if the release task panicked
    pub async fn unlock_and_wait(&mut self) -> Result<()> {
        self.unlock();
        if let Some(waiter) = self.waiter.take() {
            waiter.await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .field("process", &self.process)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

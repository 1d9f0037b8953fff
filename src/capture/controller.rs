//! Capture session state and output channel lifecycle

use super::{CaptureError, TokenWriter};
use crate::token::CanonicalToken;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Capture session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Events pass through, no tokens are produced
    #[default]
    Inactive,
    /// Events are suppressed and captured as tokens
    Active,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

struct Inner {
    state: SessionState,
    writer: Option<TokenWriter>,
}

/// Owner of the capture session and its output channel
///
/// The state and the writer sit behind one lock: a token is only queued
/// while the lock shows ACTIVE, and the INACTIVE transition closes the writer
/// before releasing the lock, so nothing can be written into a closed
/// channel and nothing is classified against a stale state.
pub struct CaptureController {
    output_path: PathBuf,
    close_timeout: Duration,
    inner: Mutex<Inner>,
    shut_down: AtomicBool,
}

impl CaptureController {
    pub fn new(output_path: impl Into<PathBuf>, close_timeout: Duration) -> Self {
        Self {
            output_path: output_path.into(),
            close_timeout,
            inner: Mutex::new(Inner {
                state: SessionState::Inactive,
                writer: None,
            }),
            shut_down: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Flip the session state and return the new one
    ///
    /// Activation truncates and opens the output channel; if that fails the
    /// session stays INACTIVE. Deactivation flushes, closes and removes the
    /// output channel before returning.
    pub fn toggle(&self) -> Result<SessionState, CaptureError> {
        let mut inner = self.lock();
        match inner.state {
            SessionState::Inactive => {
                if self.is_shut_down() {
                    return Err(CaptureError::ShutDown);
                }
                let writer = TokenWriter::open(&self.output_path)?;
                inner.writer = Some(writer);
                inner.state = SessionState::Active;
                log::info!(
                    "Trainer ON - capturing keys to {}",
                    self.output_path.display()
                );
            }
            SessionState::Active => {
                self.deactivate(&mut inner);
            }
        }
        Ok(inner.state)
    }

    /// Queue a token for the output channel. Dropped unless ACTIVE.
    pub fn emit(&self, token: CanonicalToken) -> bool {
        let inner = self.lock();
        if !inner.state.is_active() {
            return false;
        }
        match &inner.writer {
            Some(writer) => {
                log::debug!("captured {}", token);
                writer.send(token)
            }
            None => false,
        }
    }

    /// Run the INACTIVE transition once; later calls do nothing
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.lock();
        if inner.state.is_active() {
            self.deactivate(&mut inner);
        } else {
            self.remove_output();
        }
        log::debug!("capture controller shut down");
    }

    fn deactivate(&self, inner: &mut Inner) {
        inner.state = SessionState::Inactive;
        if let Some(writer) = inner.writer.take() {
            if let Err(e) = writer.close(self.close_timeout) {
                log::warn!("output channel did not close cleanly: {}", e);
            }
        }
        self.remove_output();
        log::info!("Trainer OFF - keyboard back to normal");
    }

    fn remove_output(&self) {
        match fs::remove_file(&self.output_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "could not remove {}: {}",
                self.output_path.display(),
                e
            ),
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

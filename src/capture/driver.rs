//! Outer capture loop and cancellation

use super::{CaptureEngine, CaptureError, Disposition, EngineStats};
use crate::keyboard::KeyEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Something the host input subscription reported
#[derive(Debug, Clone)]
pub enum HookEvent {
    Key(KeyEvent),
    /// The host dropped the subscription (device reset, watchdog, ...)
    Disabled(String),
}

/// Host input subscription able to intercept and re-inject key events
pub trait CaptureHook {
    /// Wait up to `timeout` for the next event
    fn next_event(&mut self, timeout: Duration) -> Result<Option<HookEvent>, CaptureError>;

    /// Deliver an event the engine let through
    fn forward(&mut self, event: &KeyEvent) -> Result<(), CaptureError>;

    /// Re-establish a subscription the host disabled
    fn reenable(&mut self) -> Result<(), CaptureError>;

    /// Give the keyboard back to the OS
    fn release(&mut self) {}
}

/// Cancellation token observed by [`run_capture`]
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal tripped by Ctrl+C and SIGTERM
    pub fn install() -> Result<Self, ctrlc::Error> {
        let signal = Self::new();
        let flag = signal.0.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })?;
        Ok(signal)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened during a capture run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub stats: EngineStats,
    pub reenabled: u64,
    pub forward_errors: u64,
}

/// Pump events from `hook` through `engine` until `shutdown` is cancelled
///
/// The controller is always shut down and the hook released before this
/// returns, whether the loop ended by cancellation or by an error.
pub fn run_capture(
    hook: &mut dyn CaptureHook,
    engine: &mut CaptureEngine,
    shutdown: &ShutdownSignal,
    poll_interval: Duration,
) -> Result<RunSummary, CaptureError> {
    let mut summary = RunSummary::default();
    let result = pump(hook, engine, shutdown, poll_interval, &mut summary);

    engine.controller().shutdown();
    hook.release();

    summary.stats = engine.stats();
    result.map(|()| summary)
}

fn pump(
    hook: &mut dyn CaptureHook,
    engine: &mut CaptureEngine,
    shutdown: &ShutdownSignal,
    poll_interval: Duration,
    summary: &mut RunSummary,
) -> Result<(), CaptureError> {
    while !shutdown.is_cancelled() {
        match hook.next_event(poll_interval)? {
            Some(HookEvent::Key(event)) => {
                if engine.handle(&event) == Disposition::PassThrough {
                    if let Err(e) = hook.forward(&event) {
                        summary.forward_errors += 1;
                        log::warn!("failed to forward key event: {}", e);
                    }
                }
            }
            Some(HookEvent::Disabled(reason)) => {
                log::debug!("capture subscription disabled ({}), re-enabling", reason);
                hook.reenable()?;
                summary.reenabled += 1;
            }
            None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureController, SessionState, ToggleCombo};
    use crate::keyboard::test_helpers::*;
    use crate::keyboard::{Modifier, NoLookup};
    use std::collections::VecDeque;

    /// Hook replaying a fixed script, cancelling the run when exhausted
    struct ScriptedHook {
        script: VecDeque<HookEvent>,
        forwarded: Vec<KeyEvent>,
        reenables: usize,
        fail_reenable: bool,
        released: bool,
        shutdown: ShutdownSignal,
        /// Cancel after this many events instead of at the end
        cancel_after: Option<usize>,
        delivered: usize,
    }

    impl ScriptedHook {
        fn new(script: Vec<HookEvent>, shutdown: ShutdownSignal) -> Self {
            Self {
                script: script.into(),
                forwarded: Vec::new(),
                reenables: 0,
                fail_reenable: false,
                released: false,
                shutdown,
                cancel_after: None,
                delivered: 0,
            }
        }
    }

    impl CaptureHook for ScriptedHook {
        fn next_event(&mut self, _timeout: Duration) -> Result<Option<HookEvent>, CaptureError> {
            if self.cancel_after == Some(self.delivered) {
                self.shutdown.cancel();
                return Ok(None);
            }
            match self.script.pop_front() {
                Some(event) => {
                    self.delivered += 1;
                    Ok(Some(event))
                }
                None => {
                    self.shutdown.cancel();
                    Ok(None)
                }
            }
        }

        fn forward(&mut self, event: &KeyEvent) -> Result<(), CaptureError> {
            self.forwarded.push(event.clone());
            Ok(())
        }

        fn reenable(&mut self) -> Result<(), CaptureError> {
            self.reenables += 1;
            if self.fail_reenable {
                Err(CaptureError::NoDevices)
            } else {
                Ok(())
            }
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    fn keys(events: Vec<KeyEvent>) -> Vec<HookEvent> {
        events.into_iter().map(HookEvent::Key).collect()
    }

    fn engine(dir: &tempfile::TempDir) -> CaptureEngine {
        let controller = Arc::new(CaptureController::new(
            dir.path().join("captured_keys.txt"),
            Duration::from_secs(2),
        ));
        CaptureEngine::new(controller, ToggleCombo::default(), Box::new(NoLookup))
    }

    #[test]
    fn passthrough_events_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        let shutdown = ShutdownSignal::new();
        let mut hook = ScriptedHook::new(keys(chord(&[], "a")), shutdown.clone());

        let summary = run_capture(&mut hook, &mut engine, &shutdown, Duration::from_millis(1)).unwrap();
        assert_eq!(hook.forwarded.len(), 2);
        assert_eq!(summary.stats.passed_through, 2);
        assert!(hook.released);
    }

    #[test]
    fn suppressed_events_are_not_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        let shutdown = ShutdownSignal::new();
        let mut script = chord(&[Modifier::Cmd, Modifier::Shift], "-");
        script.extend(chord(&[], "x"));
        let mut hook = ScriptedHook::new(keys(script), shutdown.clone());

        let summary = run_capture(&mut hook, &mut engine, &shutdown, Duration::from_millis(1)).unwrap();
        // Only the toggle chord reached the OS
        assert_eq!(hook.forwarded.len(), 6);
        assert_eq!(summary.stats.suppressed, 2);
        assert_eq!(summary.stats.tokens, 1);
    }

    #[test]
    fn disabled_subscription_is_reenabled_silently() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        let shutdown = ShutdownSignal::new();
        let mut script = keys(chord(&[], "a"));
        script.insert(1, HookEvent::Disabled("watchdog".into()));
        let mut hook = ScriptedHook::new(script, shutdown.clone());

        let summary = run_capture(&mut hook, &mut engine, &shutdown, Duration::from_millis(1)).unwrap();
        assert_eq!(hook.reenables, 1);
        assert_eq!(summary.reenabled, 1);
        assert_eq!(hook.forwarded.len(), 2);
    }

    #[test]
    fn failed_reenable_is_fatal_but_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        let path = engine.controller().output_path().to_path_buf();
        let shutdown = ShutdownSignal::new();
        let mut script = keys(chord(&[Modifier::Cmd, Modifier::Shift], "-"));
        script.push(HookEvent::Disabled("device gone".into()));
        let mut hook = ScriptedHook::new(script, shutdown.clone());
        hook.fail_reenable = true;

        let err = run_capture(&mut hook, &mut engine, &shutdown, Duration::from_millis(1)).unwrap_err();
        assert!(err.is_subscription_failure());
        assert_eq!(engine.controller().state(), SessionState::Inactive);
        assert!(!path.exists());
        assert!(hook.released);
    }

    #[test]
    fn interrupt_while_active_leaves_no_output_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        let path = engine.controller().output_path().to_path_buf();
        let shutdown = ShutdownSignal::new();
        let mut script = chord(&[Modifier::Cmd, Modifier::Shift], "-");
        script.extend(chord(&[Modifier::Cmd], "k"));
        let mut hook = ScriptedHook::new(keys(script), shutdown.clone());
        hook.cancel_after = Some(7);

        run_capture(&mut hook, &mut engine, &shutdown, Duration::from_millis(1)).unwrap();
        assert!(shutdown.is_cancelled());
        assert_eq!(engine.controller().state(), SessionState::Inactive);
        assert!(!path.exists());
        assert!(hook.released);
    }

    #[test]
    fn cancelled_before_start_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir);
        let shutdown = ShutdownSignal::new();
        shutdown.cancel();
        let mut hook = ScriptedHook::new(keys(chord(&[], "a")), shutdown.clone());

        let summary = run_capture(&mut hook, &mut engine, &shutdown, Duration::from_millis(1)).unwrap();
        assert_eq!(summary.stats.events, 0);
        assert_eq!(hook.script.len(), 2);
    }
}

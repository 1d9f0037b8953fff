//! System-wide key capture
//!
//! The capture pipeline is split into four parts:
//!
//! - [`CaptureHook`]: the host input subscription (evdev on Linux, a scripted
//!   hook in tests). It yields raw key events and re-injects the ones the
//!   engine lets through.
//! - [`CaptureEngine`]: classifies each event as toggle, passthrough or
//!   suppress-and-capture and turns captured events into tokens.
//! - [`CaptureController`]: the ACTIVE/INACTIVE session and the output
//!   channel lifecycle.
//! - [`run_capture`]: the outer loop, observing a [`ShutdownSignal`].

mod controller;
mod driver;
mod engine;
mod writer;

pub use controller::{CaptureController, SessionState};
pub use driver::{run_capture, CaptureHook, HookEvent, RunSummary, ShutdownSignal};
pub use engine::{CaptureEngine, Disposition, EngineStats, ToggleCombo};
pub use writer::TokenWriter;

use std::io;
use thiserror::Error;

/// What the user has to do when the capture subscription cannot be created
pub const PERMISSION_REMEDY: &str = "hotkey-trainer needs read access to the keyboard \
devices under /dev/input and write access to /dev/uinput. Add your user to the \
'input' group (sudo usermod -aG input $USER), install a udev rule granting the \
group access to uinput (KERNEL==\"uinput\", GROUP=\"input\", MODE=\"0660\"), \
then log out and back in. Running once with sudo confirms the setup works.";

/// Error type for capture operations
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The host refused the capture subscription
    #[error("permission denied: {detail}")]
    PermissionDenied { detail: String },
    /// No keyboard devices to capture from
    #[error("no keyboard devices found")]
    NoDevices,
    /// Capture is not implemented for this platform
    #[error("system-wide key capture is not supported on this platform")]
    Unsupported,
    /// The configured toggle combination cannot be resolved to a key
    #[error("invalid toggle combination '{0}'")]
    InvalidToggle(String),
    /// Toggle requested after the controller shut down
    #[error("capture controller has shut down")]
    ShutDown,
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CaptureError {
    /// True when the capture subscription itself could not be established
    pub fn is_subscription_failure(&self) -> bool {
        matches!(
            self,
            CaptureError::PermissionDenied { .. } | CaptureError::NoDevices | CaptureError::Unsupported
        )
    }

    /// One-paragraph remedy for the user, when there is one
    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            CaptureError::PermissionDenied { .. } | CaptureError::NoDevices => Some(PERMISSION_REMEDY),
            CaptureError::Unsupported => Some(
                "Key capture is only available on Linux. The practice and watch \
                 commands still work against an output file written by another capture process.",
            ),
            _ => None,
        }
    }
}

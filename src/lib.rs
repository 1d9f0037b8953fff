//! Hotkey Trainer - keyboard shortcut practice with system-wide key capture
//!
//! While capture is active every key event is intercepted before it reaches
//! any application, translated into a canonical token and appended to an
//! output channel. The practice side reads that channel and matches the
//! tokens against multi-step shortcuts.

pub mod capture;
pub mod config;
pub mod keyboard;
pub mod practice;
pub mod token;

pub use config::Config;

//! Keyboard events, key tables and token translation

mod event;
pub mod keymap;
pub mod test_helpers;
pub mod translate;

#[cfg(target_os = "linux")]
pub mod evdev_listener;

pub use event::{KeyEvent, KeyEventKind, Modifier, Modifiers};
pub use keymap::{KeyCode, key_name, code_for_name, modifier_for_key};
pub use translate::{KeyLookup, NoLookup, Quirks, Translator};

#[cfg(target_os = "linux")]
pub use evdev_listener::{EvdevHook, EvdevKeyLookup};

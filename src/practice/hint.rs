//! Feedback for a mismatched step

use crate::keyboard::Modifier;
use crate::token::{CanonicalToken, KeyStroke};

/// Suggest what to fix when `received` was typed instead of `expected`
pub fn hint(expected: &CanonicalToken, received: &CanonicalToken) -> Option<&'static str> {
    let expected = KeyStroke::from_token(expected).ok()?;
    let received = KeyStroke::from_token(received).ok()?;

    let missing = [
        (Modifier::Cmd, "Don't forget the Command key (⌘)"),
        (Modifier::Alt, "Include the Option/Alt key (⌥)"),
        (Modifier::Shift, "Add the Shift key (⇧)"),
        (Modifier::Ctrl, "Use the Control key (⌃)"),
        (Modifier::Fn, "Hold the fn key"),
    ];
    for (modifier, text) in missing {
        if expected.modifiers.contains(modifier) && !received.modifiers.contains(modifier) {
            return Some(text);
        }
    }

    if received.modifiers.ctrl && !expected.modifiers.ctrl && expected.modifiers.cmd {
        return Some("Use Cmd (⌘), not Ctrl");
    }
    if expected.modifiers == received.modifiers && expected.key != received.key {
        return Some("Right modifiers, wrong key");
    }
    None
}

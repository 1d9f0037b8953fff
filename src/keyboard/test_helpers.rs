//! Event builders shared by unit and integration tests
//!
//! Each builder produces the event a capture hook would report, with the
//! modifier set already applied.

use super::{KeyCode, KeyEvent, KeyEventKind, Modifier, Modifiers};
use super::keymap::code_for_name;

/// Key code for a table name; panics on unknown names (test input only)
pub fn code(name: &str) -> KeyCode {
    code_for_name(name).unwrap_or_else(|| panic!("no key named {}", name))
}

/// Key press with the given modifiers held
pub fn press(name: &str, mods: &[Modifier]) -> KeyEvent {
    KeyEvent::new(code(name), KeyEventKind::Press, Modifiers::from_slice(mods))
}

/// Auto-repeat of a held key
pub fn repeat(name: &str, mods: &[Modifier]) -> KeyEvent {
    press(name, mods).with_repeat(true)
}

/// Key release with the given modifiers still held
pub fn release(name: &str, mods: &[Modifier]) -> KeyEvent {
    KeyEvent::new(code(name), KeyEventKind::Release, Modifiers::from_slice(mods))
}

/// Modifier key change; `now_held` is the full set after the change and
/// decides whether the key went down
pub fn modifier_change(modifier: Modifier, now_held: &[Modifier]) -> KeyEvent {
    modifier_side(code(modifier.name()), now_held.contains(&modifier), now_held)
}

/// A specific modifier key (left or right side) going down or up
pub fn modifier_side(key: KeyCode, down: bool, now_held: &[Modifier]) -> KeyEvent {
    KeyEvent::new(key, KeyEventKind::ModifierChange, Modifiers::from_slice(now_held)).with_down(down)
}

/// Full key events for typing `key` while holding `mods`:
/// modifier presses, the key press and release, modifier releases
pub fn chord(mods: &[Modifier], key: &str) -> Vec<KeyEvent> {
    let mut events = Vec::new();
    let mut held: Vec<Modifier> = Vec::new();
    for m in mods {
        held.push(*m);
        events.push(modifier_change(*m, &held));
    }
    events.push(press(key, &held));
    events.push(release(key, &held));
    for m in mods.iter().rev() {
        held.retain(|h| h != m);
        events.push(modifier_change(*m, &held));
    }
    events
}

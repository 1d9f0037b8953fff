//! Keyboard event and modifier types

use super::KeyCode;
use std::fmt;
use std::time::Instant;

/// A single modifier key, left and right variants combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Cmd,
    Fn,
    CapsLock,
}

impl Modifier {
    /// Modifiers in canonical rendering order. Caps lock is last and is
    /// never rendered as part of a combination.
    pub const ALL: [Modifier; 6] = [
        Modifier::Ctrl,
        Modifier::Alt,
        Modifier::Shift,
        Modifier::Cmd,
        Modifier::Fn,
        Modifier::CapsLock,
    ];

    /// Canonical token name
    pub fn name(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Cmd => "cmd",
            Modifier::Fn => "fn",
            Modifier::CapsLock => "capslock",
        }
    }

    /// Parse a modifier name, accepting the usual aliases
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" | "option" | "opt" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "cmd" | "command" | "meta" | "super" | "win" => Some(Modifier::Cmd),
            "fn" => Some(Modifier::Fn),
            "capslock" | "caps" => Some(Modifier::CapsLock),
            _ => None,
        }
    }

    /// Whether this modifier appears in rendered combinations
    pub fn is_rendered(&self) -> bool {
        !matches!(self, Modifier::CapsLock)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the modifier keys held during an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub cmd: bool,
    pub fn_key: bool,
    pub caps_lock: bool,
}

impl Modifiers {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a list of modifiers
    pub fn from_slice(mods: &[Modifier]) -> Self {
        let mut out = Self::empty();
        for m in mods {
            out.insert(*m);
        }
        out
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Shift => self.shift,
            Modifier::Cmd => self.cmd,
            Modifier::Fn => self.fn_key,
            Modifier::CapsLock => self.caps_lock,
        }
    }

    pub fn set(&mut self, modifier: Modifier, held: bool) {
        match modifier {
            Modifier::Ctrl => self.ctrl = held,
            Modifier::Alt => self.alt = held,
            Modifier::Shift => self.shift = held,
            Modifier::Cmd => self.cmd = held,
            Modifier::Fn => self.fn_key = held,
            Modifier::CapsLock => self.caps_lock = held,
        }
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.set(modifier, true);
    }

    pub fn remove(&mut self, modifier: Modifier) {
        self.set(modifier, false);
    }

    /// Builder-style insert
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.insert(modifier);
        self
    }

    pub fn is_empty(&self) -> bool {
        !Modifier::ALL.iter().any(|m| self.contains(*m))
    }

    /// Held modifiers in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.iter().copied().filter(|m| self.contains(*m))
    }

    /// Modifiers held now that were not held in `previous`
    pub fn added_since(&self, previous: &Modifiers) -> Vec<Modifier> {
        self.iter().filter(|m| !previous.contains(*m)).collect()
    }

    /// The subset that takes part in rendered combinations (no caps lock)
    pub fn rendered(&self) -> Modifiers {
        let mut out = *self;
        out.caps_lock = false;
        out
    }

    /// Canonical names of the rendered modifiers, in fixed order
    pub fn names(&self) -> Vec<&'static str> {
        self.iter()
            .filter(|m| m.is_rendered())
            .map(|m| m.name())
            .collect()
    }
}

/// Kind of keyboard event delivered by a capture hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    /// Non-modifier key went down (or auto-repeated)
    Press,
    /// Non-modifier key went up
    Release,
    /// A modifier key went down or up; the event carries the new modifier
    /// set and `down` tells which way this particular key moved
    ModifierChange,
    /// Anything else the host reports (LEDs, sync, misc)
    Other,
}

/// A raw keyboard event, consumed within the capture pipeline
#[derive(Debug, Clone)]
pub struct KeyEvent {
    /// Physical key identifier
    pub key: KeyCode,
    pub kind: KeyEventKind,
    /// Modifier set active after this event was applied
    pub modifiers: Modifiers,
    /// The key is down after this event. Left and right modifiers share a
    /// flag in `modifiers`, so this is the only reliable direction.
    pub down: bool,
    /// Auto-repeat of a held key
    pub repeat: bool,
    pub timestamp: Instant,
}

impl KeyEvent {
    pub fn new(key: KeyCode, kind: KeyEventKind, modifiers: Modifiers) -> Self {
        Self {
            key,
            kind,
            modifiers,
            down: kind != KeyEventKind::Release,
            repeat: false,
            timestamp: Instant::now(),
        }
    }

    pub fn with_down(mut self, down: bool) -> Self {
        self.down = down;
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn is_press(&self) -> bool {
        self.kind == KeyEventKind::Press
    }
}

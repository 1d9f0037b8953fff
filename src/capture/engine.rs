//! Event classification: toggle, passthrough or suppress-and-capture

use super::{CaptureController, CaptureError, SessionState};
use crate::keyboard::keymap::{code_for_name, modifier_for_key};
use crate::keyboard::{KeyCode, KeyEvent, KeyEventKind, KeyLookup, Modifier, Modifiers, Translator};
use crate::token::KeyStroke;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What the hook should do with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Forward the event unmodified
    PassThrough,
    /// Consume the event; no application sees it
    Suppress,
}

/// The reserved combination that flips the capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleCombo {
    key: KeyCode,
    modifiers: Modifiers,
    stroke: KeyStroke,
}

impl ToggleCombo {
    pub const DEFAULT: &'static str = "cmd+shift+-";

    /// Resolve a key stroke to a physical key plus required modifiers
    pub fn from_stroke(stroke: &KeyStroke) -> Result<Self, CaptureError> {
        let key = code_for_name(&stroke.key)
            .ok_or_else(|| CaptureError::InvalidToggle(stroke.to_string()))?;
        if modifier_for_key(key).is_some() {
            return Err(CaptureError::InvalidToggle(stroke.to_string()));
        }
        Ok(Self {
            key,
            modifiers: stroke.modifiers,
            stroke: stroke.clone(),
        })
    }

    pub fn parse(s: &str) -> Result<Self, CaptureError> {
        let stroke: KeyStroke = s
            .parse()
            .map_err(|_| CaptureError::InvalidToggle(s.to_string()))?;
        Self::from_stroke(&stroke)
    }

    pub fn key(&self) -> KeyCode {
        self.key
    }

    /// True for a fresh key-down of the toggle key with exactly the
    /// required ctrl/alt/shift/cmd set. `fn` and caps lock are not compared.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if event.kind != KeyEventKind::Press || event.repeat || event.key != self.key {
            return false;
        }
        [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Cmd]
            .iter()
            .all(|m| event.modifiers.contains(*m) == self.modifiers.contains(*m))
    }
}

impl Default for ToggleCombo {
    fn default() -> Self {
        let mut modifiers = Modifiers::empty();
        modifiers.insert(Modifier::Cmd);
        modifiers.insert(Modifier::Shift);
        let stroke = KeyStroke::new(modifiers, "-");
        Self {
            key: crate::keyboard::keymap::KEY_MINUS,
            modifiers,
            stroke,
        }
    }
}

impl fmt::Display for ToggleCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stroke)
    }
}

/// Counters for a capture run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub events: u64,
    pub suppressed: u64,
    pub passed_through: u64,
    pub tokens: u64,
    pub toggles: u64,
}

/// Classifies key events and feeds captured tokens to the controller
pub struct CaptureEngine {
    translator: Translator,
    lookup: Box<dyn KeyLookup>,
    toggle: ToggleCombo,
    controller: Arc<CaptureController>,
    /// Modifier set seen on the previous modifier change
    last_modifiers: Modifiers,
    /// Disposition given to each key currently down
    held: HashMap<KeyCode, Disposition>,
    stats: EngineStats,
}

impl CaptureEngine {
    pub fn new(
        controller: Arc<CaptureController>,
        toggle: ToggleCombo,
        lookup: Box<dyn KeyLookup>,
    ) -> Self {
        Self {
            translator: Translator::default(),
            lookup,
            toggle,
            controller,
            last_modifiers: Modifiers::empty(),
            held: HashMap::new(),
            stats: EngineStats::default(),
        }
    }

    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    pub fn controller(&self) -> &Arc<CaptureController> {
        &self.controller
    }

    pub fn toggle_combo(&self) -> &ToggleCombo {
        &self.toggle
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Decide what happens to one event, emitting a token when captured
    pub fn handle(&mut self, event: &KeyEvent) -> Disposition {
        self.stats.events += 1;
        let disposition = match event.kind {
            KeyEventKind::Press => self.handle_press(event),
            KeyEventKind::Release => self.handle_release(event),
            KeyEventKind::ModifierChange => self.handle_modifier(event),
            KeyEventKind::Other => Disposition::PassThrough,
        };
        match disposition {
            Disposition::Suppress => self.stats.suppressed += 1,
            Disposition::PassThrough => self.stats.passed_through += 1,
        }
        disposition
    }

    fn session_disposition(&self) -> Disposition {
        if self.controller.is_active() {
            Disposition::Suppress
        } else {
            Disposition::PassThrough
        }
    }

    fn handle_press(&mut self, event: &KeyEvent) -> Disposition {
        if event.repeat {
            return self
                .held
                .get(&event.key)
                .copied()
                .unwrap_or_else(|| self.session_disposition());
        }

        if self.toggle.matches(event) {
            self.stats.toggles += 1;
            match self.controller.toggle() {
                Ok(SessionState::Active) => self.last_modifiers = Modifiers::empty(),
                Ok(SessionState::Inactive) => {}
                Err(e) => log::error!("could not toggle capture session: {}", e),
            }
            self.held.insert(event.key, Disposition::PassThrough);
            return Disposition::PassThrough;
        }

        let disposition = self.session_disposition();
        self.held.insert(event.key, disposition);
        if disposition == Disposition::Suppress {
            let token = self
                .translator
                .translate(event.key, &event.modifiers, self.lookup.as_ref());
            if self.controller.emit(token) {
                self.stats.tokens += 1;
            }
        }
        disposition
    }

    fn handle_release(&mut self, event: &KeyEvent) -> Disposition {
        self.held
            .remove(&event.key)
            .unwrap_or_else(|| self.session_disposition())
    }

    fn handle_modifier(&mut self, event: &KeyEvent) -> Disposition {
        let added = event.modifiers.added_since(&self.last_modifiers);
        self.last_modifiers = event.modifiers;

        let disposition = if event.down {
            match self.held.get(&event.key) {
                Some(d) => *d,
                None => {
                    let d = self.session_disposition();
                    self.held.insert(event.key, d);
                    d
                }
            }
        } else {
            self.handle_release(event)
        };

        if disposition == Disposition::Suppress {
            for modifier in added {
                let token = self.translator.translate_modifier(modifier);
                if self.controller.emit(token) {
                    self.stats.tokens += 1;
                }
            }
        }
        disposition
    }
}

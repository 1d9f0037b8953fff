//! Shortcut definitions: a named, ordered list of key strokes

use crate::token::{KeyStroke, KeyStrokeError};
use std::fmt;
use thiserror::Error;

/// Error type for shortcut definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Definition has no steps
    #[error("shortcut '{name}' has no steps")]
    Empty { name: String },
    /// A step uses the reserved skip key
    #[error("step {step} uses the reserved skip key")]
    ReservedToken { step: usize },
    /// A step could not be parsed
    #[error("step {step}: {source}")]
    InvalidStep {
        step: usize,
        #[source]
        source: KeyStrokeError,
    },
}

/// A shortcut to practice, e.g. `cmd+k cmd+s`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutDefinition {
    pub name: String,
    pub steps: Vec<KeyStroke>,
}

impl ShortcutDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<KeyStroke>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Parse space-separated steps. The result is not validated; see [`validate`].
    ///
    /// [`validate`]: ShortcutDefinition::validate
    pub fn parse(name: impl Into<String>, keys: &str) -> Result<Self, DefinitionError> {
        let steps = keys
            .split_whitespace()
            .enumerate()
            .map(|(step, part)| {
                part.parse::<KeyStroke>()
                    .map_err(|source| DefinitionError::InvalidStep { step, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(name, steps))
    }

    /// More than one step
    pub fn is_chord(&self) -> bool {
        self.steps.len() > 1
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Reject definitions the matcher cannot practice unambiguously
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty {
                name: self.name.clone(),
            });
        }
        match self.steps.iter().position(KeyStroke::is_reserved) {
            Some(step) => Err(DefinitionError::ReservedToken { step }),
            None => Ok(()),
        }
    }

    /// Steps rendered with key symbols, e.g. `⌘K → ⌘S`
    pub fn display_symbols(&self) -> String {
        self.steps
            .iter()
            .map(stroke_symbols)
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

impl fmt::Display for ShortcutDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        f.write_str(&steps.join(" "))
    }
}

fn key_symbol(key: &str) -> String {
    let symbol = match key {
        "cmd" => "⌘",
        "alt" => "⌥",
        "shift" => "⇧",
        "ctrl" => "⌃",
        "fn" => "fn",
        "tab" => "Tab",
        "space" => "Space",
        "return" => "Return",
        "delete" => "Delete",
        "forwarddelete" => "Forward Delete",
        "escape" => "Esc",
        "left" => "←",
        "right" => "→",
        "up" => "↑",
        "down" => "↓",
        "home" => "Home",
        "end" => "End",
        "pageup" => "Page Up",
        "pagedown" => "Page Down",
        other => return other.to_uppercase(),
    };
    symbol.to_string()
}

fn stroke_symbols(stroke: &KeyStroke) -> String {
    let mut out: String = stroke
        .modifiers
        .names()
        .into_iter()
        .map(key_symbol)
        .collect();
    out.push_str(&key_symbol(&stroke.key));
    out
}

//! Canonical tokens and key strokes
//!
//! A canonical token is the textual form of one key event: the rendered
//! modifiers in fixed order (`ctrl`, `alt`, `shift`, `cmd`, `fn`) followed by
//! the base key, joined with `+`. A [`KeyStroke`] is the parsed, order-free
//! view of the same thing and is what shortcut steps are made of.

use crate::keyboard::{Modifier, Modifiers};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reserved skip token: the backtick key with no modifiers
pub const SKIP_TOKEN: &str = "`";

/// Whether `name` names a modifier key (aliases included)
pub fn is_modifier_name(name: &str) -> bool {
    Modifier::from_name(name).is_some()
}

/// Normalized string form of one key event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalToken(String);

impl CanonicalToken {
    /// Render a token from a modifier set and base key name
    pub fn render(modifiers: &Modifiers, key: &str) -> Self {
        let mut parts = modifiers.names();
        parts.push(key);
        Self(parts.join("+"))
    }

    /// Wrap a line read back from the output channel
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_skip(&self) -> bool {
        self.0 == SKIP_TOKEN
    }

    /// True for a bare modifier press such as `shift` or `capslock`
    pub fn is_solo_modifier(&self) -> bool {
        is_modifier_name(&self.0)
    }
}

impl fmt::Display for CanonicalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error parsing a key stroke
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyStrokeError {
    #[error("empty key stroke")]
    Empty,
    #[error("'{0}' is not a modifier")]
    UnknownModifier(String),
    #[error("key stroke '{0}' has no base key")]
    MissingKey(String),
}

/// One step of a shortcut: an unordered modifier set plus one base key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyStroke {
    pub modifiers: Modifiers,
    pub key: String,
}

impl KeyStroke {
    pub fn new(modifiers: Modifiers, key: impl Into<String>) -> Self {
        Self {
            modifiers: modifiers.rendered(),
            key: key.into().to_ascii_lowercase(),
        }
    }

    /// Parse a token back into a key stroke
    pub fn from_token(token: &CanonicalToken) -> Result<Self, KeyStrokeError> {
        token.as_str().parse()
    }

    /// Canonical token for this stroke
    pub fn to_token(&self) -> CanonicalToken {
        CanonicalToken::render(&self.modifiers, &self.key)
    }

    /// True when this stroke is exactly the reserved skip token
    pub fn is_reserved(&self) -> bool {
        self.modifiers.is_empty() && self.key == SKIP_TOKEN
    }
}

impl FromStr for KeyStroke {
    type Err = KeyStrokeError;

    /// Accepts modifiers in any order and case, e.g. `Shift+Cmd+N`.
    /// A trailing `+` is the plus key itself (`ctrl++`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyStrokeError::Empty);
        }
        if s == "+" {
            return Ok(KeyStroke::new(Modifiers::empty(), "+"));
        }

        let (prefix, key) = if let Some(stripped) = s.strip_suffix("++") {
            (stripped, "+")
        } else {
            match s.rsplit_once('+') {
                Some((prefix, key)) => (prefix, key),
                None => ("", s),
            }
        };
        if key.is_empty() {
            return Err(KeyStrokeError::MissingKey(s.to_string()));
        }

        let mut modifiers = Modifiers::empty();
        for part in prefix.split('+').filter(|p| !p.is_empty()) {
            let modifier = Modifier::from_name(part)
                .ok_or_else(|| KeyStrokeError::UnknownModifier(part.to_string()))?;
            modifiers.insert(modifier);
        }

        // A bare modifier is its own base key (`shift`, `cmd`)
        let key = match Modifier::from_name(key) {
            Some(m) => m.name().to_string(),
            None => key.to_ascii_lowercase(),
        };
        Ok(KeyStroke::new(modifiers, key))
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_uses_fixed_modifier_order() {
        let mods = Modifiers::from_slice(&[Modifier::Cmd, Modifier::Shift, Modifier::Ctrl]);
        assert_eq!(CanonicalToken::render(&mods, "k").as_str(), "ctrl+shift+cmd+k");
    }

    #[test]
    fn parse_is_order_and_case_insensitive() {
        let a: KeyStroke = "Shift+Cmd+N".parse().unwrap();
        let b: KeyStroke = "cmd+shift+n".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "shift+cmd+n");
    }

    #[test]
    fn parse_aliases_and_plain_keys() {
        let s: KeyStroke = "command+option+escape".parse().unwrap();
        assert_eq!(s.to_string(), "alt+cmd+escape");
        let s: KeyStroke = "space".parse().unwrap();
        assert!(s.modifiers.is_empty());
        assert_eq!(s.key, "space");
    }

    #[test]
    fn parse_plus_key() {
        let s: KeyStroke = "ctrl++".parse().unwrap();
        assert_eq!(s.key, "+");
        assert!(s.modifiers.ctrl);
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<KeyStroke>(), Err(KeyStrokeError::Empty));
        assert_eq!(
            "hyper+k".parse::<KeyStroke>(),
            Err(KeyStrokeError::UnknownModifier("hyper".to_string()))
        );
        assert!(matches!("cmd+".parse::<KeyStroke>(), Err(KeyStrokeError::MissingKey(_))));
    }

    #[test]
    fn solo_modifier_tokens() {
        assert!(CanonicalToken::from_line("shift").unwrap().is_solo_modifier());
        assert!(CanonicalToken::from_line("capslock").unwrap().is_solo_modifier());
        assert!(!CanonicalToken::from_line("cmd+k").unwrap().is_solo_modifier());
        assert!(CanonicalToken::from_line("   ").is_none());
    }

    #[test]
    fn skip_token_is_reserved_only_without_modifiers() {
        assert!("`".parse::<KeyStroke>().unwrap().is_reserved());
        assert!(!"cmd+`".parse::<KeyStroke>().unwrap().is_reserved());
        assert!(CanonicalToken::from_line("`").unwrap().is_skip());
    }
}

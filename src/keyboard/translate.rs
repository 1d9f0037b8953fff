//! Key code to canonical token translation
//!
//! Translation is a pure function of the key code, the modifier set and the
//! quirk rules. Codes missing from the fixed table go to a [`KeyLookup`]
//! (the host's own key naming) and, failing that, to a `key_<code>`
//! placeholder so that no event is ever dropped.

use super::keymap::{self, KeyCode};
use super::{Modifier, Modifiers};
use crate::token::CanonicalToken;

/// Host-provided naming for keys outside the fixed table
pub trait KeyLookup {
    /// Lowercase name for `code` under `modifiers`, if the host knows one
    fn lookup(&self, code: KeyCode, modifiers: &Modifiers) -> Option<String>;
}

/// Lookup that never knows any key
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl KeyLookup for NoLookup {
    fn lookup(&self, _code: KeyCode, _modifiers: &Modifiers) -> Option<String> {
        None
    }
}

/// Keyboard quirk corrections applied during translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// Drop a spurious `fn` reported alongside arrow keys
    pub fn_arrows: bool,
    /// Treat `fn` + page-up/page-down/home/end as the matching arrow
    pub fn_page_nav_to_arrows: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            fn_arrows: true,
            fn_page_nav_to_arrows: true,
        }
    }
}

/// Maps raw key codes plus modifiers to canonical tokens
#[derive(Debug, Clone, Default)]
pub struct Translator {
    quirks: Quirks,
}

impl Translator {
    pub fn new(quirks: Quirks) -> Self {
        Self { quirks }
    }

    /// Translate a key press into its canonical token
    pub fn translate(
        &self,
        code: KeyCode,
        modifiers: &Modifiers,
        lookup: &dyn KeyLookup,
    ) -> CanonicalToken {
        let mut mods = modifiers.rendered();
        let mut code = code;

        if mods.fn_key {
            if self.quirks.fn_arrows && keymap::is_arrow(code) {
                mods.remove(Modifier::Fn);
            } else if self.quirks.fn_page_nav_to_arrows {
                if let Some(arrow) = keymap::page_nav_arrow(code) {
                    code = arrow;
                    mods.remove(Modifier::Fn);
                }
            }
        }

        match keymap::key_name(code) {
            Some(name) => CanonicalToken::render(&mods, name),
            None => {
                let name = lookup
                    .lookup(code, &mods)
                    .filter(|n| !n.is_empty())
                    .map(|n| n.to_lowercase())
                    .unwrap_or_else(|| placeholder(code));
                CanonicalToken::render(&mods, &name)
            }
        }
    }

    /// Token for a bare modifier press
    pub fn translate_modifier(&self, modifier: Modifier) -> CanonicalToken {
        CanonicalToken::render(&Modifiers::empty(), modifier.name())
    }
}

/// Placeholder name embedding the raw key code
pub fn placeholder(code: KeyCode) -> String {
    format!("key_{}", code.0)
}

//! Shortcut practice: definitions, chord matching and the token reader
//!
//! The practice side never talks to the capture engine directly. It reads
//! tokens from the output channel with [`TokenTail`] and classifies them with
//! a [`ChordMatcher`], so any token source (a capture process, a file, a
//! test) can drive it.

mod definition;
mod hint;
mod matcher;
mod tail;

pub use definition::{DefinitionError, ShortcutDefinition};
pub use hint::hint;
pub use matcher::{AttemptSummary, ChordMatcher, MatchEvent, MatcherSettings};
pub use tail::TokenTail;

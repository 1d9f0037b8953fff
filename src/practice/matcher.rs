//! Chord matcher: classifies a token stream against a shortcut definition

use super::{DefinitionError, ShortcutDefinition};
use crate::token::{CanonicalToken, KeyStroke};
use std::time::{Duration, Instant};

/// Matcher tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherSettings {
    /// Gap between chord steps above which a step counts as hesitant
    pub hesitation: Duration,
    /// Attempt is abandoned after this long without resolving
    pub attempt_timeout: Option<Duration>,
    /// Second skip only aborts if it arrives within this window
    pub abort_window: Option<Duration>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            hesitation: Duration::from_millis(1500),
            attempt_timeout: None,
            abort_window: None,
        }
    }
}

/// Timing of a successful attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSummary {
    /// From the first token of the attempt to the final step
    pub elapsed: Duration,
    /// Per step: time since the attempt began (first step) or since the
    /// previous step matched
    pub step_durations: Vec<Duration>,
    /// Chord steps that followed the previous step after a hesitation
    pub hesitations: usize,
    /// Every token received during the attempt, ignored ones included
    pub tokens: Vec<CanonicalToken>,
}

/// Classification of one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// A non-final step matched
    Progress {
        completed: usize,
        total: usize,
        hesitated: bool,
    },
    /// Final step matched; the attempt is over
    Success(AttemptSummary),
    /// Token did not match the expected step; the attempt is over
    Failure {
        expected: CanonicalToken,
        received: CanonicalToken,
    },
    /// Skip key: the attempt is abandoned without penalty
    Skip,
    /// Skip key twice in a row: end the practice session
    Abort,
    /// The attempt ran past its timeout
    TimedOut,
    /// Not part of an attempt (no attempt running, or a bare modifier)
    Ignored,
}

impl MatchEvent {
    /// True when the token ended the current attempt
    pub fn ends_attempt(&self) -> bool {
        !matches!(self, MatchEvent::Progress { .. } | MatchEvent::Ignored)
    }
}

#[derive(Debug)]
struct Attempt {
    definition: ShortcutDefinition,
    step: usize,
    started: Instant,
    first_token: Option<Instant>,
    step_started: Instant,
    step_durations: Vec<Duration>,
    hesitations: usize,
    tokens: Vec<CanonicalToken>,
}

impl Attempt {
    fn expected(&self) -> &KeyStroke {
        &self.definition.steps[self.step]
    }
}

/// Matches tokens against one shortcut at a time
#[derive(Debug)]
pub struct ChordMatcher {
    settings: MatcherSettings,
    attempt: Option<Attempt>,
    /// Time of the last skip token, if no other token arrived since
    last_skip: Option<Instant>,
}

impl ChordMatcher {
    pub fn new(settings: MatcherSettings) -> Self {
        Self {
            settings,
            attempt: None,
            last_skip: None,
        }
    }

    /// Start an attempt, replacing any attempt still running
    pub fn begin(&mut self, definition: &ShortcutDefinition, now: Instant) -> Result<(), DefinitionError> {
        definition.validate()?;
        self.attempt = Some(Attempt {
            definition: definition.clone(),
            step: 0,
            started: now,
            first_token: None,
            step_started: now,
            step_durations: Vec::with_capacity(definition.len()),
            hesitations: 0,
            tokens: Vec::new(),
        });
        Ok(())
    }

    pub fn is_attempting(&self) -> bool {
        self.attempt.is_some()
    }

    /// End the running attempt if it has exceeded the timeout
    pub fn check_timeout(&mut self, now: Instant) -> Option<MatchEvent> {
        let timeout = self.settings.attempt_timeout?;
        let started = self.attempt.as_ref()?.started;
        if now.saturating_duration_since(started) > timeout {
            self.attempt = None;
            Some(MatchEvent::TimedOut)
        } else {
            None
        }
    }

    /// Classify one token
    pub fn feed(&mut self, token: &CanonicalToken, now: Instant) -> MatchEvent {
        if token.is_skip() {
            return self.on_skip(now);
        }
        self.last_skip = None;

        if let Some(event) = self.check_timeout(now) {
            return event;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return MatchEvent::Ignored;
        };

        attempt.first_token.get_or_insert(now);
        attempt.tokens.push(token.clone());

        let expected = attempt.expected().clone();
        let received = KeyStroke::from_token(token).ok();

        if token.is_solo_modifier() && received.as_ref() != Some(&expected) {
            return MatchEvent::Ignored;
        }

        if received.as_ref() != Some(&expected) {
            self.attempt = None;
            return MatchEvent::Failure {
                expected: expected.to_token(),
                received: token.clone(),
            };
        }

        let step_time = now.saturating_duration_since(attempt.step_started);
        let hesitated = attempt.step > 0 && step_time > self.settings.hesitation;
        attempt.step_durations.push(step_time);
        if hesitated {
            attempt.hesitations += 1;
        }

        attempt.step += 1;
        attempt.step_started = now;
        let total = attempt.definition.len();
        if attempt.step < total {
            return MatchEvent::Progress {
                completed: attempt.step,
                total,
                hesitated,
            };
        }

        let first = attempt.first_token.unwrap_or(now);
        let summary = AttemptSummary {
            elapsed: now.saturating_duration_since(first),
            step_durations: std::mem::take(&mut attempt.step_durations),
            hesitations: attempt.hesitations,
            tokens: std::mem::take(&mut attempt.tokens),
        };
        self.attempt = None;
        MatchEvent::Success(summary)
    }

    fn on_skip(&mut self, now: Instant) -> MatchEvent {
        let within_window = match (self.last_skip, self.settings.abort_window) {
            (Some(prev), Some(window)) => now.saturating_duration_since(prev) <= window,
            (Some(_), None) => true,
            (None, _) => false,
        };
        self.attempt = None;

        if within_window {
            self.last_skip = None;
            MatchEvent::Abort
        } else {
            self.last_skip = Some(now);
            MatchEvent::Skip
        }
    }
}

impl Default for ChordMatcher {
    fn default() -> Self {
        Self::new(MatcherSettings::default())
    }
}

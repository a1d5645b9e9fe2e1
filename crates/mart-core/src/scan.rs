//! # Scan Module
//!
//! Turns the character stream of a shared text input into discrete scan
//! events, and suppresses duplicate echoes of the same scan.
//!
//! ## Why a classifier?
//! The same search box receives both human typing ("mil", "milk 1l") and
//! keyboard-wedge scanner bursts ("8901234567890⏎"). The classifier decides,
//! as a pure function of `(buffer, elapsed time, terminator)`, when the
//! buffer is a finished scan.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            valid char                                                   │
//! │   ┌──────┐ ─────────────► ┌───────────┐  valid char: restart quiet timer│
//! │   │ Idle │                │ Buffering │ ◄─────────────────────────────┐ │
//! │   └──────┘ ◄───────────── └─────┬─────┘ ──────────────────────────────┘ │
//! │      ▲     invalid char /       │                                       │
//! │      │     clear / short ⏎      │ len ≥ 6, all [A-Za-z0-9-], and        │
//! │      │                          │ quiet interval elapsed OR ⏎           │
//! │      │                          ▼                                       │
//! │      │                    ┌───────────┐                                 │
//! │      └─────────────────── │ Completed │ ──► ScanEvent                   │
//! │         buffer cleared    └───────────┘                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Time
//! Nothing here reads the clock. Every input carries the `Instant` it
//! happened at, and the caller asks for [`ScanClassifier::deadline`] to
//! know when to call [`ScanClassifier::poll`] again.

use std::time::{Duration, Instant};

use crate::{DEDUP_MS, MIN_TOKEN_LEN, QUIET_MS};

// =============================================================================
// Timing
// =============================================================================

/// Timing constants shared by every input surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    /// Inactivity interval that completes a candidate buffer.
    pub quiet: Duration,
    /// Identical tokens within this window of the last acceptance are echoes.
    pub dedup_window: Duration,
    /// Minimum token length.
    pub min_token_len: usize,
}

impl Default for ScanTiming {
    fn default() -> Self {
        ScanTiming {
            quiet: Duration::from_millis(QUIET_MS),
            dedup_window: Duration::from_millis(DEDUP_MS),
            min_token_len: MIN_TOKEN_LEN,
        }
    }
}

// =============================================================================
// Pure Classification
// =============================================================================

/// Characters a scanner may emit inside a token.
#[inline]
pub fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// What a buffer is, given how long it has been quiet and whether a
/// terminator key was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Contains a character no scanner emits.
    Noise,
    /// Too short to be a token (may still grow).
    Incomplete,
    /// A candidate still waiting for the quiet interval.
    Pending,
    /// A finished scan.
    Complete,
}

/// Classifies `buffer`.
///
/// ```rust
/// use std::time::Duration;
/// use mart_core::scan::{classify, Classification, ScanTiming};
///
/// let timing = ScanTiming::default();
/// assert_eq!(classify("ABC123", Duration::ZERO, true, &timing), Classification::Complete);
/// assert_eq!(classify("ABC123", Duration::from_millis(50), false, &timing), Classification::Pending);
/// assert_eq!(classify("milk", Duration::from_secs(5), true, &timing), Classification::Incomplete);
/// assert_eq!(classify("milk 1l", Duration::ZERO, false, &timing), Classification::Noise);
/// ```
pub fn classify(
    buffer: &str,
    elapsed: Duration,
    terminator: bool,
    timing: &ScanTiming,
) -> Classification {
    if !buffer.chars().all(is_token_char) {
        return Classification::Noise;
    }
    if buffer.len() < timing.min_token_len {
        return Classification::Incomplete;
    }
    if terminator || elapsed >= timing.quiet {
        Classification::Complete
    } else {
        Classification::Pending
    }
}

// =============================================================================
// Events
// =============================================================================

/// One input event from a UI text surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A single keystroke.
    Key(char),
    /// A controlled input reported its whole new value.
    Changed(String),
    /// Terminator key (scanners send Enter by default).
    Enter,
    /// The surface was cleared by the UI.
    Clear,
}

/// A completed, not yet de-duplicated scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub token: String,
    pub arrived_at: Instant,
}

/// Result of feeding one input event to the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Still collecting. `deadline` is when to [`ScanClassifier::poll`]
    /// next; `None` while the buffer is not a candidate.
    Buffering { deadline: Option<Instant> },
    /// A disallowed character reset the buffer.
    Noise,
    /// The buffer was emptied without producing a scan.
    Cleared,
    /// A scan completed, either on the terminator key or because the buffer
    /// had already been quiet for the full interval when this event arrived.
    /// In the second case the event itself starts the next buffer.
    Completed(ScanEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    Idle,
    Buffering,
}

// =============================================================================
// Classifier
// =============================================================================

/// Per-surface scan classifier.
#[derive(Debug, Clone)]
pub struct ScanClassifier {
    timing: ScanTiming,
    buffer: String,
    last_change: Option<Instant>,
}

impl ScanClassifier {
    pub fn new(timing: ScanTiming) -> Self {
        ScanClassifier {
            timing,
            buffer: String::new(),
            last_change: None,
        }
    }

    pub fn timing(&self) -> &ScanTiming {
        &self.timing
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn state(&self) -> ClassifierState {
        if self.buffer.is_empty() {
            ClassifierState::Idle
        } else {
            ClassifierState::Buffering
        }
    }

    /// Feeds one input event.
    ///
    /// A buffer whose quiet interval has already elapsed completes before
    /// the event is applied, even if the deadline was never polled.
    pub fn handle(&mut self, event: InputEvent, now: Instant) -> InputOutcome {
        match event {
            InputEvent::Key(c) => {
                let expired = self.take_expired(now);
                let outcome = if is_token_char(c) {
                    self.buffer.push(c);
                    self.touch(now)
                } else {
                    self.reset();
                    InputOutcome::Noise
                };
                expired.map_or(outcome, InputOutcome::Completed)
            }
            InputEvent::Changed(value) => {
                let expired = self.take_expired(now);
                // The field still shows the completed token ahead of the new input.
                let value = match &expired {
                    Some(scan) if value.starts_with(scan.token.as_str()) => {
                        value[scan.token.len()..].to_string()
                    }
                    _ => value,
                };
                let outcome = if value.is_empty() {
                    self.reset();
                    InputOutcome::Cleared
                } else if !value.chars().all(is_token_char) {
                    self.reset();
                    InputOutcome::Noise
                } else {
                    self.buffer = value;
                    self.touch(now)
                };
                expired.map_or(outcome, InputOutcome::Completed)
            }
            InputEvent::Enter => {
                let elapsed = self.elapsed(now);
                match classify(&self.buffer, elapsed, true, &self.timing) {
                    Classification::Complete => InputOutcome::Completed(self.complete(now)),
                    _ => {
                        self.reset();
                        InputOutcome::Cleared
                    }
                }
            }
            InputEvent::Clear => {
                self.reset();
                InputOutcome::Cleared
            }
        }
    }

    /// Completes the buffer if it has been quiet long enough.
    pub fn poll(&mut self, now: Instant) -> Option<ScanEvent> {
        self.take_expired(now)
    }

    /// When the current buffer completes if nothing else arrives.
    ///
    /// `None` unless the buffer is a scan candidate.
    pub fn deadline(&self) -> Option<Instant> {
        let last_change = self.last_change?;
        match classify(&self.buffer, Duration::ZERO, false, &self.timing) {
            Classification::Pending | Classification::Complete => {
                Some(last_change + self.timing.quiet)
            }
            Classification::Noise | Classification::Incomplete => None,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_change = None;
    }

    fn take_expired(&mut self, now: Instant) -> Option<ScanEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        match classify(&self.buffer, self.elapsed(now), false, &self.timing) {
            Classification::Complete => Some(self.complete(now)),
            _ => None,
        }
    }

    fn touch(&mut self, now: Instant) -> InputOutcome {
        self.last_change = Some(now);
        InputOutcome::Buffering {
            deadline: self.deadline(),
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.last_change
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default()
    }

    fn complete(&mut self, now: Instant) -> ScanEvent {
        let token = std::mem::take(&mut self.buffer);
        self.last_change = None;
        ScanEvent {
            token,
            arrived_at: now,
        }
    }
}

impl Default for ScanClassifier {
    fn default() -> Self {
        Self::new(ScanTiming::default())
    }
}

// =============================================================================
// Deduplicator
// =============================================================================

/// The most recently accepted scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastScan {
    pub token: String,
    pub accepted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new scan (or an intentional re-scan after the window).
    Accepted,
    /// Echo of the previous accepted scan; drop silently.
    Duplicate { since: Duration },
}

/// Suppresses an identical token arriving within the window of the previous
/// acceptance. Suppressed arrivals do not extend the window.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    window: Duration,
    last: Option<LastScan>,
}

impl Deduplicator {
    pub fn new(window: Duration) -> Self {
        Deduplicator { window, last: None }
    }

    pub fn admit(&mut self, event: &ScanEvent) -> Admission {
        if let Some(last) = &self.last {
            let since = event.arrived_at.saturating_duration_since(last.accepted_at);
            if last.token == event.token && since < self.window {
                return Admission::Duplicate { since };
            }
        }

        self.last = Some(LastScan {
            token: event.token.clone(),
            accepted_at: event.arrived_at,
        });
        Admission::Accepted
    }

    pub fn last(&self) -> Option<&LastScan> {
        self.last.as_ref()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEDUP_MS))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn type_str(c: &mut ScanClassifier, s: &str, start: Instant, gap: Duration) -> Instant {
        let mut now = start;
        for ch in s.chars() {
            c.handle(InputEvent::Key(ch), now);
            now += gap;
        }
        now - gap
    }

    #[test]
    fn test_enter_completes_candidate() {
        let mut c = ScanClassifier::default();
        let t0 = Instant::now();
        let last = type_str(&mut c, "8901234567890", t0, ms(5));

        match c.handle(InputEvent::Enter, last + ms(5)) {
            InputOutcome::Completed(ev) => assert_eq!(ev.token, "8901234567890"),
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(c.state(), ClassifierState::Idle);
        assert_eq!(c.buffer(), "");
    }

    #[test]
    fn test_quiet_interval_completes_candidate() {
        let mut c = ScanClassifier::default();
        let t0 = Instant::now();
        let last = type_str(&mut c, "ABC123", t0, ms(10));

        assert_eq!(c.deadline(), Some(last + ms(QUIET_MS)));
        assert!(c.poll(last + ms(QUIET_MS - 1)).is_none());

        let ev = c.poll(last + ms(QUIET_MS)).unwrap();
        assert_eq!(ev.token, "ABC123");
        assert_eq!(ev.arrived_at, last + ms(QUIET_MS));
        assert!(c.poll(last + ms(QUIET_MS * 2)).is_none());
    }

    #[test]
    fn test_keystroke_rearms_deadline() {
        let mut c = ScanClassifier::default();
        let t0 = Instant::now();
        type_str(&mut c, "ABC123", t0, ms(10));

        let t1 = t0 + ms(250);
        let outcome = c.handle(InputEvent::Key('4'), t1);
        assert_eq!(
            outcome,
            InputOutcome::Buffering {
                deadline: Some(t1 + ms(QUIET_MS))
            }
        );
        // Old deadline no longer completes.
        assert!(c.poll(t0 + ms(50) + ms(QUIET_MS)).is_none());
        assert_eq!(c.poll(t1 + ms(QUIET_MS)).unwrap().token, "ABC1234");
    }

    #[test]
    fn test_expired_buffer_completes_before_next_key() {
        let mut c = ScanClassifier::default();
        let t0 = Instant::now();
        let last = type_str(&mut c, "ABC123", t0, ms(5));

        // The deadline passed unpolled; the late key must not join the token.
        let t1 = last + ms(400);
        match c.handle(InputEvent::Key('4'), t1) {
            InputOutcome::Completed(ev) => {
                assert_eq!(ev.token, "ABC123");
                assert_eq!(ev.arrived_at, t1);
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(c.buffer(), "4");
        assert_eq!(c.state(), ClassifierState::Buffering);

        // A disallowed key still completes the expired token, then resets.
        let last = type_str(&mut c, "RICE-5KG", t1 + ms(5), ms(5));
        assert_eq!(c.buffer(), "4RICE-5KG");
        assert!(matches!(
            c.handle(InputEvent::Key(' '), last + ms(QUIET_MS)),
            InputOutcome::Completed(ScanEvent { ref token, .. }) if token == "4RICE-5KG"
        ));
        assert_eq!(c.state(), ClassifierState::Idle);
    }

    #[test]
    fn test_expired_changed_value_keeps_only_new_input() {
        let mut c = ScanClassifier::default();
        let t0 = Instant::now();
        c.handle(InputEvent::Changed("ABC123".into()), t0);

        let t1 = t0 + ms(QUIET_MS + 100);
        assert!(matches!(
            c.handle(InputEvent::Changed("ABC123RICE-5".into()), t1),
            InputOutcome::Completed(ScanEvent { ref token, .. }) if token == "ABC123"
        ));
        assert_eq!(c.buffer(), "RICE-5");
        assert_eq!(c.deadline(), Some(t1 + ms(QUIET_MS)));

        // A short, still-incomplete buffer is extended, not completed.
        let mut c = ScanClassifier::default();
        let last = type_str(&mut c, "mil", t0, ms(5));
        assert_eq!(
            c.handle(InputEvent::Key('k'), last + ms(2000)),
            InputOutcome::Buffering { deadline: None }
        );
        assert_eq!(c.buffer(), "milk");
    }

    #[test]
    fn test_short_tokens_never_emit() {
        let t0 = Instant::now();
        for s in ["", "A", "AB12", "12345", "ABCDE", "-----"] {
            let mut c = ScanClassifier::default();
            let last = type_str(&mut c, s, t0, ms(1));
            assert_eq!(c.deadline(), None, "{:?}", s);
            assert!(c.poll(last + Duration::from_secs(60)).is_none(), "{:?}", s);
            assert_eq!(c.handle(InputEvent::Enter, last + ms(1)), InputOutcome::Cleared);
        }
    }

    #[test]
    fn test_invalid_char_resets_without_token() {
        let mut c = ScanClassifier::default();
        let t0 = Instant::now();
        let last = type_str(&mut c, "ABC12", t0, ms(5));

        assert_eq!(c.handle(InputEvent::Key(' '), last + ms(5)), InputOutcome::Noise);
        assert_eq!(c.state(), ClassifierState::Idle);

        // Only characters after the reset count.
        let last = type_str(&mut c, "3456", last + ms(10), ms(5));
        assert_eq!(c.buffer(), "3456");
        assert!(c.poll(last + ms(1000)).is_none());
    }

    #[test]
    fn test_changed_value_replaces_buffer() {
        let mut c = ScanClassifier::default();
        let t0 = Instant::now();

        assert_eq!(
            c.handle(InputEvent::Changed("mil".into()), t0),
            InputOutcome::Buffering { deadline: None }
        );
        assert_eq!(
            c.handle(InputEvent::Changed("milk 1l".into()), t0 + ms(100)),
            InputOutcome::Noise
        );

        let t1 = t0 + ms(200);
        c.handle(InputEvent::Changed("RICE-5KG".into()), t1);
        assert_eq!(c.poll(t1 + ms(QUIET_MS)).unwrap().token, "RICE-5KG");

        c.handle(InputEvent::Changed("ABCDEF".into()), t1 + ms(400));
        assert_eq!(c.handle(InputEvent::Changed(String::new()), t1 + ms(410)), InputOutcome::Cleared);
        assert!(c.poll(t1 + ms(5000)).is_none());
    }

    #[test]
    fn test_classify_is_pure() {
        let timing = ScanTiming::default();
        assert_eq!(classify("ABC-12", ms(299), false, &timing), Classification::Pending);
        assert_eq!(classify("ABC-12", ms(300), false, &timing), Classification::Complete);
        assert_eq!(classify("ABC_12", ms(300), true, &timing), Classification::Noise);
        assert_eq!(classify("", ms(300), true, &timing), Classification::Incomplete);
    }

    #[test]
    fn test_dedup_window() {
        let mut dedup = Deduplicator::default();
        let t0 = Instant::now();
        let ev = |t: Instant| ScanEvent {
            token: "ABC123".to_string(),
            arrived_at: t,
        };

        assert_eq!(dedup.admit(&ev(t0)), Admission::Accepted);
        assert_eq!(dedup.admit(&ev(t0 + ms(900))), Admission::Duplicate { since: ms(900) });
        // Window is measured from the acceptance, not the suppressed echo.
        assert_eq!(dedup.admit(&ev(t0 + ms(1000))), Admission::Accepted);
        assert_eq!(dedup.last().unwrap().accepted_at, t0 + ms(1000));
    }

    #[test]
    fn test_dedup_only_matches_identical_previous_token() {
        let mut dedup = Deduplicator::default();
        let t0 = Instant::now();
        let ev = |token: &str, t: Instant| ScanEvent {
            token: token.to_string(),
            arrived_at: t,
        };

        assert_eq!(dedup.admit(&ev("AAA111", t0)), Admission::Accepted);
        assert_eq!(dedup.admit(&ev("BBB222", t0 + ms(10))), Admission::Accepted);
        assert_eq!(dedup.admit(&ev("AAA111", t0 + ms(20))), Admission::Accepted);
        assert_eq!(dedup.admit(&ev("aaa111", t0 + ms(30))), Admission::Accepted);
        assert_eq!(dedup.last().unwrap().token, "aaa111");
    }
}

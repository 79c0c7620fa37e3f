//! The typing-session engine.
//!
//! A [`SessionEngine`] owns exactly one [`Session`] at a time and mutates it
//! only from [`SessionEngine::handle`]. Key presses, text edits, pastes and
//! clock ticks are all messages into that one function, so the timeout path
//! and the completion path see the same state and can never both finish a
//! session.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::validate_duration;
use crate::input::{Edit, Key};
use crate::metrics;
use crate::passage::PassageSource;
use crate::report::{ResultNotifier, ResultSink, SaveStatus, SessionResult};
use crate::runtime::TickTimer;
use crate::time_series::SpeedHistory;

/// Longest session the engine will size a history buffer for.
pub const MAX_DURATION_SECS: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A key went down; only feeds the keystroke counter.
    Key(Key),
    /// The typed text changed.
    Edit(Edit),
    /// Pasted text, always rejected.
    Paste(String),
    Tick,
    ChangeDuration(u32),
    Reset,
}

/// State of one attempt
#[derive(Debug, Clone)]
pub struct Session {
    duration_secs: u32,
    passage: String,
    passage_len: usize,
    typed: String,
    typed_len: usize,
    started_at: Option<Instant>,
    state: SessionState,
    history: SpeedHistory,
    errors: usize,
    keystrokes: usize,
    wpm: u32,
    accuracy: u32,
    elapsed_secs: u32,
    remaining_secs: u32,
}

impl Session {
    pub fn new(duration_secs: u32, passage: String) -> Self {
        let passage_len = passage.chars().count();
        Self {
            duration_secs,
            passage,
            passage_len,
            typed: String::new(),
            typed_len: 0,
            started_at: None,
            state: SessionState::Idle,
            history: SpeedHistory::new(duration_secs as usize),
            errors: 0,
            keystrokes: 0,
            wpm: 0,
            accuracy: 100,
            elapsed_secs: 0,
            remaining_secs: duration_secs,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn passage(&self) -> &str {
        &self.passage
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &SpeedHistory {
        &self.history
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn has_started(&self) -> bool {
        self.state != SessionState::Idle
    }

    pub fn has_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn snapshot(&self) -> LiveMetrics {
        LiveMetrics {
            state: self.state,
            duration_secs: self.duration_secs,
            elapsed_secs: self.elapsed_secs,
            remaining_secs: self.remaining_secs,
            wpm: self.wpm,
            accuracy: self.accuracy,
            errors: self.errors,
            keystrokes: self.keystrokes,
            typed_len: self.typed_len,
            passage_len: self.passage_len,
        }
    }

    fn set_typed(&mut self, typed: String) {
        self.typed_len = typed.chars().count();
        self.errors = metrics::error_count(&typed, &self.passage);
        self.typed = typed;
    }

    fn result(&self) -> SessionResult {
        let raw_wpm = metrics::raw_wpm(self.typed_len, self.elapsed_secs);
        SessionResult {
            wpm: self.wpm,
            accuracy: self.accuracy,
            elapsed_secs: self.elapsed_secs,
            errors: self.errors,
            keystrokes: self.keystrokes,
            completion: metrics::completion(self.typed_len, self.passage_len),
            raw_wpm,
            net_wpm: metrics::net_wpm(raw_wpm, self.errors, self.elapsed_secs),
            characters: self.typed_len,
            words: metrics::word_count(&self.typed),
        }
    }
}

/// Read-only view of the live numbers, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveMetrics {
    pub state: SessionState,
    pub duration_secs: u32,
    pub elapsed_secs: u32,
    pub remaining_secs: u32,
    pub wpm: u32,
    pub accuracy: u32,
    pub errors: usize,
    pub keystrokes: usize,
    pub typed_len: usize,
    pub passage_len: usize,
}

pub struct SessionEngine<C: Clock = SystemClock> {
    session: Session,
    duration_secs: u32,
    passages: PassageSource,
    clock: C,
    timer: Box<dyn TickTimer>,
    sink: Box<dyn ResultSink>,
    notifier: Option<Box<dyn ResultNotifier>>,
    save_status: SaveStatus,
}

impl<C: Clock> SessionEngine<C> {
    pub fn new(
        duration_secs: u32,
        mut passages: PassageSource,
        clock: C,
        timer: Box<dyn TickTimer>,
        sink: Box<dyn ResultSink>,
    ) -> Self {
        let duration_secs = duration_secs.clamp(1, MAX_DURATION_SECS);
        let passage = passages.next_passage(duration_secs);
        Self {
            session: Session::new(duration_secs, passage),
            duration_secs,
            passages,
            clock,
            timer,
            sink,
            notifier: None,
            save_status: SaveStatus::Idle,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn ResultNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> LiveMetrics {
        self.session.snapshot()
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn save_status(&self) -> SaveStatus {
        self.save_status
    }

    /// Apply one event. Returns the result when this event finished the
    /// session; every later event returns `None` until a reset.
    pub fn handle(&mut self, event: SessionEvent) -> Option<SessionResult> {
        match event {
            SessionEvent::Key(key) => {
                self.on_key(key);
                None
            }
            SessionEvent::Edit(edit) => self.on_edit(edit),
            SessionEvent::Paste(text) => {
                debug!(len = text.chars().count(), "paste rejected");
                None
            }
            SessionEvent::Tick => self.on_tick(),
            SessionEvent::ChangeDuration(secs) => {
                self.change_duration(secs);
                None
            }
            SessionEvent::Reset => {
                self.reset();
                None
            }
        }
    }

    /// Hand a previously returned result to the sink again after a failed
    /// save.
    pub fn retry_submit(&mut self, result: &SessionResult) -> SaveStatus {
        if self.save_status == SaveStatus::Failed {
            self.submit(result);
        }
        self.save_status
    }

    /// Stop the clock of an abandoned session.
    pub fn shutdown(&mut self) {
        if self.timer.is_running() {
            debug!(state = %self.session.state, "stopping session clock on teardown");
            self.timer.stop();
        }
    }

    /// Let pending result notifications finish, waiting at most `deadline`.
    pub fn flush_notifications(&self, deadline: Duration) {
        if let Some(notifier) = &self.notifier {
            notifier.flush(deadline);
        }
    }

    fn on_key(&mut self, key: Key) {
        if !self.session.has_finished() && key.is_meaningful() {
            self.session.keystrokes += 1;
        }
    }

    fn on_edit(&mut self, edit: Edit) -> Option<SessionResult> {
        if self.session.has_finished() {
            return None;
        }

        let typed = edit.apply(&self.session.typed);
        self.session.set_typed(typed);

        if self.session.state == SessionState::Idle && self.session.typed_len > 0 {
            self.start();
        }

        if self.session.state == SessionState::Running
            && self.session.typed_len == self.session.passage_len
        {
            return self.finish();
        }

        None
    }

    fn start(&mut self) {
        let session = &mut self.session;
        session.state = SessionState::Running;
        session.started_at = Some(self.clock.now());
        session.history = SpeedHistory::new(session.duration_secs as usize);
        self.timer.start();
        info!(
            duration_secs = session.duration_secs,
            passage_len = session.passage_len,
            "session started"
        );
    }

    fn on_tick(&mut self) -> Option<SessionResult> {
        if self.session.state != SessionState::Running {
            return None;
        }
        let started_at = self.session.started_at?;

        let elapsed = self.clock.now().saturating_duration_since(started_at);
        let whole_secs = elapsed.as_secs();

        let session = &mut self.session;
        session.elapsed_secs = u32::try_from(whole_secs).unwrap_or(u32::MAX);
        session.remaining_secs = session.duration_secs.saturating_sub(session.elapsed_secs);
        session.wpm = metrics::wpm(&session.typed, elapsed.as_secs_f64());
        session.accuracy = metrics::accuracy(&session.typed, &session.passage);
        session.history.record(whole_secs, session.wpm);

        if session.remaining_secs == 0 {
            return self.finish();
        }
        None
    }

    fn finish(&mut self) -> Option<SessionResult> {
        if self.session.has_finished() {
            return None;
        }
        self.timer.stop();

        let now = self.clock.now();
        let session = &mut self.session;
        session.state = SessionState::Finished;

        let actual = session
            .started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        let elapsed_secs = (actual.as_secs_f64().round() as u32).max(1);

        session.elapsed_secs = elapsed_secs;
        session.remaining_secs = session.duration_secs.saturating_sub(elapsed_secs);
        session.wpm = metrics::wpm(&session.typed, f64::from(elapsed_secs));
        session.accuracy = metrics::accuracy(&session.typed, &session.passage);
        session.history.record(u64::from(elapsed_secs), session.wpm);

        let result = session.result();
        info!(
            wpm = result.wpm,
            accuracy = result.accuracy,
            elapsed_secs = result.elapsed_secs,
            errors = result.errors,
            "session finished"
        );

        self.submit(&result);
        Some(result)
    }

    fn submit(&mut self, result: &SessionResult) {
        match self.sink.submit(result) {
            Ok(()) => {
                self.save_status = SaveStatus::Saved;
                if let Some(notifier) = &self.notifier {
                    if let Err(err) = notifier.notify(result) {
                        debug!(error = %err, "result notification failed");
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to save result");
                self.save_status = SaveStatus::Failed;
            }
        }
    }

    fn change_duration(&mut self, secs: u32) {
        if self.session.state != SessionState::Idle {
            debug!(state = %self.session.state, "duration change ignored outside idle");
            return;
        }
        let secs = match validate_duration(secs) {
            Ok(secs) => secs,
            Err(err) => {
                warn!(error = %err, "duration change rejected");
                return;
            }
        };

        self.duration_secs = secs;
        let passage = self.passages.next_passage(secs);
        self.session = Session::new(secs, passage);
    }

    fn reset(&mut self) {
        let allowed = match self.session.state {
            SessionState::Idle | SessionState::Finished => true,
            SessionState::Running => self.session.typed_len == 0,
        };
        if !allowed {
            debug!("reset ignored while typing");
            return;
        }

        self.shutdown();
        let passage = self.passages.next_passage(self.duration_secs);
        self.session = Session::new(self.duration_secs, passage);
        self.save_status = SaveStatus::Idle;
    }
}

impl<C: Clock> Drop for SessionEngine<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

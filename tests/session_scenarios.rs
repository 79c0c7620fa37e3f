// End-to-end session scenarios against the SQLite store. The clock is
// manual and ticks are delivered by hand, one per simulated second.

use std::time::Duration;

use assert_matches::assert_matches;
use typepace::clock::ManualClock;
use typepace::history::ResultStore;
use typepace::input::{Edit, Key};
use typepace::passage::PassageSource;
use typepace::report::{HistoryFilter, HistorySource, SaveStatus, SessionResult};
use typepace::runtime::TickTimer;
use typepace::session::{SessionEngine, SessionEvent, SessionState};

#[derive(Default)]
struct StubTimer {
    running: bool,
}

impl TickTimer for StubTimer {
    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

struct Scenario {
    engine: SessionEngine<ManualClock>,
    clock: ManualClock,
    db: tempfile::TempDir,
}

impl Scenario {
    fn new(duration: u32, passage: &str) -> Self {
        let db = tempfile::tempdir().unwrap();
        let store = ResultStore::open(&db.path().join("results.db")).unwrap();
        let clock = ManualClock::new();
        let engine = SessionEngine::new(
            duration,
            PassageSource::fixed(passage),
            clock.clone(),
            Box::new(StubTimer::default()),
            Box::new(store),
        );
        Self { engine, clock, db }
    }

    fn type_str(&mut self, text: &str) -> Option<SessionResult> {
        let mut out = None;
        for c in text.chars() {
            self.engine.handle(SessionEvent::Key(Key::Char(c)));
            out = self.engine.handle(SessionEvent::Edit(Edit::Insert(c))).or(out);
        }
        out
    }

    fn tick_for(&mut self, secs: u32) -> Option<SessionResult> {
        let mut out = None;
        for _ in 0..secs {
            self.clock.advance(Duration::from_secs(1));
            out = self.engine.handle(SessionEvent::Tick).or(out);
        }
        out
    }

    fn stored(&self) -> Vec<SessionResult> {
        ResultStore::open(&self.db.path().join("results.db"))
            .unwrap()
            .load_history(HistoryFilter::All)
            .unwrap()
            .into_iter()
            .map(|e| e.result)
            .collect()
    }
}

#[test]
fn cleared_input_times_out_with_perfect_accuracy() {
    let mut s = Scenario::new(30, "the quick brown fox");
    s.type_str("th");
    for _ in 0..2 {
        s.engine.handle(SessionEvent::Edit(Edit::DeleteBackward));
    }

    let result = s.tick_for(30).expect("timeout should finish the session");

    assert_eq!(result.wpm, 0);
    assert_eq!(result.accuracy, 100);
    assert_eq!(result.errors, 0);
    assert_eq!(result.elapsed_secs, 30);
    assert_eq!(s.stored(), vec![result]);
}

#[test]
fn one_word_in_three_seconds_is_twenty_wpm() {
    let mut s = Scenario::new(60, "hello world");
    s.type_str("h");
    s.clock.advance(Duration::from_secs(3));
    s.type_str("ello");

    assert_eq!(s.engine.handle(SessionEvent::Tick), None);
    assert_eq!(s.engine.snapshot().wpm, 20);
    assert_eq!(s.engine.snapshot().elapsed_secs, 3);
}

#[test]
fn one_wrong_letter_in_three() {
    let mut s = Scenario::new(30, "cats");
    s.type_str("cbt");

    let result = s.tick_for(30).unwrap();

    assert_eq!(result.errors, 1);
    assert_eq!(result.accuracy, 67);
    assert_eq!(s.stored()[0].errors, 1);
}

#[test]
fn duration_is_locked_once_typing_starts() {
    let mut s = Scenario::new(30, "hello world");
    s.type_str("h");

    s.engine.handle(SessionEvent::ChangeDuration(60));

    assert_eq!(s.engine.duration_secs(), 30);
    assert_eq!(s.engine.session().duration_secs(), 30);
    assert_eq!(s.engine.session().typed(), "h");
    assert!(s.tick_for(30).is_some());
}

#[test]
fn paste_is_ignored() {
    let mut s = Scenario::new(30, "hello");

    s.engine.handle(SessionEvent::Paste("hello".into()));

    assert_eq!(s.engine.session().typed(), "");
    assert_eq!(s.engine.session().state(), SessionState::Idle);
    assert!(s.stored().is_empty());
}

#[test]
fn completion_then_stale_timeout_saves_once() {
    let mut s = Scenario::new(30, "hi");
    s.type_str("h");
    s.clock.advance(Duration::from_secs(29));
    let result = s.type_str("i");
    assert_matches!(result, Some(SessionResult { elapsed_secs: 29, .. }));

    assert_eq!(s.tick_for(5), None);
    assert_eq!(s.stored().len(), 1);
    assert_eq!(s.engine.save_status(), SaveStatus::Saved);
}

#[test]
fn reset_after_finish_starts_over() {
    let mut s = Scenario::new(30, "hi");
    s.type_str("hi");
    assert!(s.engine.session().has_finished());

    s.engine.handle(SessionEvent::Reset);

    let snap = s.engine.snapshot();
    assert_eq!(snap.state, SessionState::Idle);
    assert_eq!(snap.typed_len, 0);
    assert_eq!(snap.remaining_secs, 30);
    assert_eq!(snap.keystrokes, 0);
    assert_eq!(s.engine.save_status(), SaveStatus::Idle);

    s.type_str("hi");
    assert_eq!(s.stored().len(), 2);
}

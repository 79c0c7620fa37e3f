use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use typepace::clock::ManualClock;
use typepace::history::MemoryStore;
use typepace::input::{Edit, Key};
use typepace::passage::PassageSource;
use typepace::report::{HistoryFilter, HistorySource, SessionResult};
use typepace::runtime::{AppEvent, FixedTicker, Metronome, Runner, TestEventSource};
use typepace::session::{SessionEngine, SessionEvent, SessionState};

// Headless integration using the internal runtime + engine without a TTY.
// Keys and metronome ticks share one channel, as in the binary.
struct Rig {
    tx: Sender<AppEvent>,
    runner: Runner<TestEventSource>,
    engine: SessionEngine<ManualClock>,
    clock: ManualClock,
    store: MemoryStore,
}

impl Rig {
    fn new(duration: u32, passage: &str, tick: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        let clock = ManualClock::new();
        let store = MemoryStore::new();
        let timer = Metronome::new(FixedTicker::new(tick), tx.clone());
        let engine = SessionEngine::new(
            duration,
            PassageSource::fixed(passage),
            clock.clone(),
            Box::new(timer),
            Box::new(store.clone()),
        );
        let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(5));
        Self {
            tx,
            runner,
            engine,
            clock,
            store,
        }
    }

    fn send_key(&self, code: KeyCode) {
        self.tx
            .send(AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
            .unwrap();
    }

    /// Feed one app event to the engine the way the binary does.
    fn apply(&mut self, event: AppEvent) -> Option<SessionResult> {
        match event {
            AppEvent::Key(key) => {
                self.engine.handle(SessionEvent::Key(Key::from(&key)));
                let edit = Edit::from_key(&key)?;
                self.engine.handle(SessionEvent::Edit(edit))
            }
            AppEvent::Paste(text) => self.engine.handle(SessionEvent::Paste(text)),
            AppEvent::Tick => self.engine.handle(SessionEvent::Tick),
            AppEvent::Resize => None,
        }
    }

    /// Drive the loop until a result comes out or the step budget runs out.
    fn run(&mut self, steps: u32) -> Option<SessionResult> {
        for _ in 0..steps {
            if let Some(event) = self.runner.step() {
                if let Some(result) = self.apply(event) {
                    return Some(result);
                }
            }
        }
        None
    }

    fn drain(&mut self, steps: u32) {
        for _ in 0..steps {
            if let Some(event) = self.runner.step() {
                assert_eq!(self.apply(event), None, "session finished twice");
            }
        }
    }
}

#[test]
fn headless_typing_flow_completes() {
    let mut rig = Rig::new(30, "hi", Duration::from_secs(60));

    rig.send_key(KeyCode::Char('h'));
    assert_eq!(rig.run(1), None);
    assert_eq!(rig.engine.session().state(), SessionState::Running);

    rig.clock.advance(Duration::from_secs(3));
    rig.send_key(KeyCode::Char('i'));
    let result = rig.run(10).expect("typing the passage should finish it");

    assert_eq!(result.elapsed_secs, 3);
    assert_eq!(result.wpm, 20);
    assert_eq!(result.accuracy, 100);
    assert_eq!(result.keystrokes, 2);

    let saved = rig.store.load_history(HistoryFilter::All).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].result, result);
}

#[test]
fn headless_timed_session_finishes_by_ticks() {
    let mut rig = Rig::new(30, "hello world", Duration::from_millis(2));

    rig.send_key(KeyCode::Char('h'));
    rig.send_key(KeyCode::Char('e'));
    assert_eq!(rig.run(2), None);

    rig.clock.advance(Duration::from_secs(30));
    let result = rig.run(500).expect("metronome ticks should end the session");

    assert_eq!(result.elapsed_secs, 30);
    assert_eq!(result.errors, 0);
    assert_eq!(rig.engine.session().state(), SessionState::Finished);

    // ticks still in flight hit the latch
    rig.drain(20);
    assert_eq!(rig.store.len(), 1);
}

#[test]
fn headless_paste_never_reaches_the_input() {
    let mut rig = Rig::new(30, "hello", Duration::from_secs(60));

    rig.tx.send(AppEvent::Paste("hello".into())).unwrap();
    assert_eq!(rig.run(3), None);

    assert_eq!(rig.engine.session().typed(), "");
    assert_eq!(rig.engine.session().state(), SessionState::Idle);
    assert!(rig.store.is_empty());
}

#[test]
fn headless_backspace_corrects_a_mistake() {
    let mut rig = Rig::new(30, "ab", Duration::from_secs(60));

    rig.send_key(KeyCode::Char('x'));
    rig.send_key(KeyCode::Backspace);
    rig.send_key(KeyCode::Char('a'));
    rig.send_key(KeyCode::Char('b'));
    let result = rig.run(20).unwrap();

    assert_eq!(result.errors, 0);
    assert_eq!(result.accuracy, 100);
    assert_eq!(result.keystrokes, 4);
}

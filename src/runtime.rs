use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};
use tracing::{debug, trace};

/// Session clock period
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Unified event type consumed by the app runner
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    Key(KeyEvent),
    Paste(String),
    Resize,
    Tick,
}

/// Source of application events (keyboard, paste, resize, clock ticks)
pub trait AppEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source: a reader thread forwards crossterm events into
/// the same channel the metronome ticks into.
pub struct CrosstermEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let reader_tx = tx.clone();

        thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    Some(AppEvent::Key(key))
                }
                Ok(CtEvent::Paste(text)) => Some(AppEvent::Paste(text)),
                Ok(CtEvent::Resize(_, _)) => Some(AppEvent::Resize),
                Ok(_) => None,
                Err(err) => {
                    debug!(error = %err, "terminal event reader stopped");
                    break;
                }
            };

            if let Some(ev) = forwarded {
                if reader_tx.send(ev).is_err() {
                    break;
                }
            }
        });

        Self { tx, rx }
    }

    /// Sender for producers that share the event loop, such as the metronome.
    pub fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl AppEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(TICK_INTERVAL)
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Periodic clock owned by a session. `start` is idempotent; `stop` cancels
/// the live timer, if any.
pub trait TickTimer {
    fn start(&mut self);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

/// Thread-backed [`TickTimer`] that sends [`AppEvent::Tick`] every interval.
pub struct Metronome<T: Ticker> {
    ticker: T,
    tx: Sender<AppEvent>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T: Ticker> Metronome<T> {
    pub fn new(ticker: T, tx: Sender<AppEvent>) -> Self {
        Self {
            ticker,
            tx,
            cancel: None,
        }
    }
}

impl<T: Ticker> TickTimer for Metronome<T> {
    fn start(&mut self) {
        if self.cancel.is_some() {
            return;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&cancel);
        let tx = self.tx.clone();
        let interval = self.ticker.interval();

        thread::spawn(move || loop {
            thread::sleep(interval);
            if stopped.load(Ordering::SeqCst) {
                break;
            }
            trace!("tick");
            if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        });

        self.cancel = Some(cancel);
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::SeqCst);
        }
    }

    fn is_running(&self) -> bool {
        self.cancel.is_some()
    }
}

impl<T: Ticker> Drop for Metronome<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runner that hands the application one event at a time
pub struct Runner<E: AppEventSource> {
    event_source: E,
    poll: Duration,
}

impl<E: AppEventSource> Runner<E> {
    pub fn new(event_source: E, poll: Duration) -> Self {
        Self { event_source, poll }
    }

    /// Blocks up to the poll interval; `None` when nothing arrived.
    pub fn step(&self) -> Option<AppEvent> {
        match self.event_source.recv_timeout(self.poll) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn step_returns_none_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(1));

        assert_eq!(runner.step(), None);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Paste("cheat".into())).unwrap();
        let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(10));

        assert_eq!(runner.step(), Some(AppEvent::Paste("cheat".into())));
    }

    #[test]
    fn metronome_ticks_into_channel() {
        let (tx, rx) = mpsc::channel();
        let mut metronome = Metronome::new(FixedTicker::new(Duration::from_millis(5)), tx);

        metronome.start();
        assert!(metronome.is_running());

        let ev = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(ev, AppEvent::Tick);
        metronome.stop();
        assert!(!metronome.is_running());
    }

    #[test]
    fn metronome_start_is_idempotent() {
        let (tx, rx) = mpsc::channel();
        let mut metronome = Metronome::new(FixedTicker::new(Duration::from_millis(20)), tx);

        metronome.start();
        metronome.start();

        let begin = Instant::now();
        let mut ticks = 0;
        while begin.elapsed() < Duration::from_millis(110) {
            if rx.recv_timeout(Duration::from_millis(5)).is_ok() {
                ticks += 1;
            }
        }
        metronome.stop();

        // one thread at 20ms gives ~5 ticks, two would give ~10
        assert!(ticks <= 7, "got {ticks} ticks, timer started twice?");
    }

    #[test]
    fn stopped_metronome_goes_quiet() {
        let (tx, rx) = mpsc::channel();
        let mut metronome = Metronome::new(FixedTicker::new(Duration::from_millis(5)), tx);

        metronome.start();
        metronome.stop();
        // at most one tick can already be in flight
        thread::sleep(Duration::from_millis(30));
        let queued = rx.try_iter().count();
        assert!(queued <= 1, "{queued} ticks after stop");
    }

    #[test]
    fn default_ticker_is_one_second() {
        assert_eq!(FixedTicker::default().interval(), Duration::from_secs(1));
    }
}

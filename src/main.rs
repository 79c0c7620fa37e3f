mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin, BufWriter},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

use typepace::{
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{cycle_duration, validate_duration, Config, ConfigStore, FileConfigStore},
    history::{export_csv, HistorySummary, MemoryStore, ResultStore, UnavailableStore},
    input::{Edit, Key},
    logging,
    notify::{WebhookNotifier, WEBHOOK_ENV},
    passage::PassageSource,
    report::{HistoryEntry, HistoryFilter, HistorySource, ResultSink, SessionResult},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Metronome, Runner, TickTimer},
    session::{SessionEngine, SessionEvent, SessionState},
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const NOTIFY_GRACE: Duration = Duration::from_secs(2);

/// timed typing trainer with live wpm, accuracy and speed history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A timed typing trainer for the terminal. Type the passage before the clock runs out; live speed and accuracy are shown while you type and every finished session is recorded."
)]
pub struct Cli {
    /// session length in seconds (30, 45, 60 or 120)
    #[clap(short = 's', long, value_parser = parse_seconds)]
    seconds: Option<u32>,

    /// custom passage to type instead of a generated one
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// results database (defaults to the state directory)
    #[clap(long)]
    db: Option<PathBuf>,

    /// webhook that receives finished results
    #[clap(long, env = WEBHOOK_ENV)]
    webhook_url: Option<String>,

    /// name shown in result notifications
    #[clap(long)]
    username: Option<String>,

    /// keep results for this run only
    #[clap(long)]
    no_save: bool,

    /// write recorded results as CSV to this file and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// print a summary of recorded results and exit
    #[clap(long)]
    summary: bool,

    /// time window for --summary and --export-csv
    #[clap(long, value_enum, default_value_t = ReportWindow::All)]
    since: ReportWindow,
}

fn parse_seconds(raw: &str) -> Result<u32, String> {
    let secs: u32 = raw.parse().map_err(|_| format!("`{raw}` is not a number"))?;
    validate_duration(secs).map_err(|err| err.to_string())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum ReportWindow {
    All,
    Month,
    Week,
}

impl ReportWindow {
    fn as_filter(&self) -> HistoryFilter {
        match self {
            ReportWindow::All => HistoryFilter::All,
            ReportWindow::Month => HistoryFilter::LastMonth,
            ReportWindow::Week => HistoryFilter::LastWeek,
        }
    }
}

impl Cli {
    /// Saved configuration with command-line overrides applied.
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(secs) = self.seconds {
            config.duration_secs = secs;
        }
        if self.webhook_url.is_some() {
            config.webhook_url = self.webhook_url.clone();
        }
        if self.username.is_some() {
            config.username = self.username.clone();
        }
        config.sanitized()
    }

    fn passages(&self) -> PassageSource {
        match &self.prompt {
            Some(text) => PassageSource::fixed(text.clone()),
            None => PassageSource::random(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// What the history screen is currently showing
#[derive(Debug, Default)]
pub struct HistoryView {
    pub filter: HistoryFilter,
    pub entries: Vec<HistoryEntry>,
    pub summary: Option<HistorySummary>,
    pub error: Option<String>,
    pub scroll_offset: usize,
}

pub struct App {
    pub engine: SessionEngine,
    pub state: AppState,
    /// Result of the last finished session, kept for display and save retry
    pub last_result: Option<SessionResult>,
    pub history: HistoryView,
    pub notice: Option<&'static str>,
    history_source: Box<dyn HistorySource>,
    config: Config,
    config_store: Box<dyn ConfigStore>,
}

impl App {
    pub fn new(
        engine: SessionEngine,
        history_source: Box<dyn HistorySource>,
        config: Config,
        config_store: Box<dyn ConfigStore>,
    ) -> Self {
        Self {
            engine,
            state: AppState::Typing,
            last_result: None,
            history: HistoryView::default(),
            notice: None,
            history_source,
            config,
            config_store,
        }
    }

    pub fn on_event(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::Key(key) => return self.on_key(key),
            AppEvent::Paste(text) => self.on_paste(text),
            AppEvent::Tick => self.dispatch(SessionEvent::Tick),
            AppEvent::Resize => {}
        }
        Flow::Continue
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        let ctrl_c =
            key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
        if key.code == KeyCode::Esc || ctrl_c {
            return Flow::Quit;
        }

        match self.state {
            AppState::Typing => match key.code {
                KeyCode::Tab => self.new_passage(),
                KeyCode::Up => self.change_duration(true),
                KeyCode::Down => self.change_duration(false),
                _ => {
                    self.notice = None;
                    self.dispatch(SessionEvent::Key(Key::from(&key)));
                    if let Some(edit) = Edit::from_key(&key) {
                        self.dispatch(SessionEvent::Edit(edit));
                    }
                }
            },
            AppState::Results => match key.code {
                KeyCode::Char('r') | KeyCode::Tab => self.new_passage(),
                KeyCode::Char('s') => self.retry_save(),
                KeyCode::Char('h') => self.open_history(),
                _ => {}
            },
            AppState::History => match key.code {
                KeyCode::Char('f') => {
                    self.history.filter = self.history.filter.next();
                    self.refresh_history();
                }
                KeyCode::Up => {
                    self.history.scroll_offset = self.history.scroll_offset.saturating_sub(1);
                }
                // clamped when rendered
                KeyCode::Down => self.history.scroll_offset += 1,
                KeyCode::Char('b') | KeyCode::Backspace => {
                    self.state = if self.last_result.is_some() {
                        AppState::Results
                    } else {
                        AppState::Typing
                    };
                }
                KeyCode::Char('r') | KeyCode::Tab => self.new_passage(),
                _ => {}
            },
        }
        Flow::Continue
    }

    fn on_paste(&mut self, text: String) {
        self.dispatch(SessionEvent::Paste(text));
        if self.state == AppState::Typing {
            self.notice = Some("pasting is disabled");
        }
    }

    fn dispatch(&mut self, event: SessionEvent) {
        if let Some(result) = self.engine.handle(event) {
            self.last_result = Some(result);
            self.state = AppState::Results;
        }
    }

    fn new_passage(&mut self) {
        self.engine.handle(SessionEvent::Reset);
        if self.engine.session().state() == SessionState::Idle {
            self.state = AppState::Typing;
            self.last_result = None;
            self.notice = None;
        }
    }

    fn change_duration(&mut self, forward: bool) {
        if self.engine.session().state() != SessionState::Idle {
            return;
        }
        let secs = cycle_duration(self.engine.duration_secs(), forward);
        self.dispatch(SessionEvent::ChangeDuration(secs));

        if self.engine.duration_secs() == secs && self.config.duration_secs != secs {
            self.config.duration_secs = secs;
            if let Err(err) = self.config_store.save(&self.config) {
                warn!(error = %err, "failed to remember duration");
            }
        }
    }

    fn retry_save(&mut self) {
        if let Some(result) = self.last_result {
            let status = self.engine.retry_submit(&result);
            info!(%status, "save retried");
        }
    }

    fn open_history(&mut self) {
        self.refresh_history();
        self.state = AppState::History;
    }

    fn refresh_history(&mut self) {
        self.history.scroll_offset = 0;
        match self.history_source.load_history(self.history.filter) {
            Ok(entries) => {
                self.history.summary = HistorySummary::from_entries(&entries);
                self.history.entries = entries;
                self.history.error = None;
            }
            Err(err) => {
                warn!(error = %err, "failed to load history");
                self.history.entries.clear();
                self.history.summary = None;
                self.history.error = Some(err.to_string());
            }
        }
    }
}

type Stores = (Box<dyn ResultSink>, Box<dyn HistorySource>);

/// Write side for the engine and read side for the history screen.
fn open_stores(cli: &Cli, db_path: Option<PathBuf>) -> Stores {
    if cli.no_save {
        let store = MemoryStore::new();
        return (Box::new(store.clone()), Box::new(store));
    }

    let unavailable = |reason: String| -> Stores {
        warn!(%reason, "results will not be saved");
        let store = UnavailableStore::new(reason);
        (Box::new(store.clone()), Box::new(store))
    };

    let Some(path) = db_path else {
        return unavailable("no state directory".to_string());
    };
    match (ResultStore::open(&path), ResultStore::open(&path)) {
        (Ok(writer), Ok(reader)) => (Box::new(writer), Box::new(reader)),
        (Err(err), _) | (_, Err(err)) => unavailable(err.to_string()),
    }
}

fn build_engine(
    cli: &Cli,
    config: &Config,
    timer: Box<dyn TickTimer>,
    sink: Box<dyn ResultSink>,
) -> SessionEngine {
    let engine = SessionEngine::new(config.duration_secs, cli.passages(), SystemClock, timer, sink);
    match &config.webhook_url {
        Some(url) => engine.with_notifier(Box::new(WebhookNotifier::new(
            url.clone(),
            config.username.clone(),
        ))),
        None => engine,
    }
}

/// `--summary` / `--export-csv`: read the database, print, exit.
fn run_report(cli: &Cli, db_path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let path = db_path.ok_or("could not determine the results database location")?;
    let store = ResultStore::open(&path)?;
    let filter = cli.since.as_filter();
    let entries = store.load_history(filter)?;

    if let Some(out) = &cli.export_csv {
        export_csv(&entries, BufWriter::new(File::create(out)?))?;
        println!("exported {} results to {}", entries.len(), out.display());
    }

    if cli.summary {
        print!("{}", format_summary(filter, &entries));
    }

    Ok(())
}

fn format_summary(filter: HistoryFilter, entries: &[HistoryEntry]) -> String {
    match HistorySummary::from_entries(entries) {
        None => format!("no results recorded ({filter})\n"),
        Some(s) => format!(
            "results ({filter}): {}\n\
             average wpm:      {:.1}\n\
             best wpm:         {}\n\
             wpm std dev:      {:.2}\n\
             average accuracy: {:.1}%\n\
             average time:     {:.1}s\n",
            s.count, s.avg_wpm, s.best_wpm, s.wpm_std_dev, s.avg_accuracy, s.avg_time_secs
        ),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_path) = AppDirs::log_path() {
        logging::init(&log_path);
    }

    let db_path = cli.db.clone().or_else(AppDirs::db_path);

    if cli.summary || cli.export_csv.is_some() {
        return run_report(&cli, db_path);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    let config = cli.apply_to(config_store.load());
    let (sink, history_source) = open_stores(&cli, db_path);

    let events = CrosstermEventSource::new();
    let timer = Metronome::new(FixedTicker::default(), events.sender());
    let engine = build_engine(&cli, &config, Box::new(timer), sink);
    let mut app = App::new(engine, history_source, config, Box::new(config_store));
    let runner = Runner::new(events, POLL_INTERVAL);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app, &runner);
    app.engine.shutdown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    app.engine.flush_notifications(NOTIFY_GRACE);

    outcome
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<CrosstermEventSource>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;

        if let Some(event) = runner.step() {
            if app.on_event(event) == Flow::Quit {
                break;
            }
        }
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    ui::screen::current_screen(&app.state).render(app, f);
}

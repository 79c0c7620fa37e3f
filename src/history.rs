use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, SecondsFormat, Utc};
use itertools::Itertools;
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use tracing::debug;

use crate::error::{HistoryError, Result};
use crate::metrics::{mean, std_dev};
use crate::report::{HistoryEntry, HistoryFilter, HistorySource, ResultSink, SessionResult};

const INSERT_RESULT: &str = r#"
    INSERT INTO results
    (wpm, accuracy, elapsed_secs, errors, keystrokes, raw_wpm, net_wpm,
     completion, characters, words, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

const SELECT_RESULTS: &str = r#"
    SELECT id, wpm, accuracy, elapsed_secs, errors, keystrokes, raw_wpm, net_wpm,
           completion, characters, words, created_at
    FROM results
    WHERE created_at >= ?1
    ORDER BY created_at DESC, id DESC
"#;

/// Timestamps are stored as fixed-width UTC RFC 3339 so they sort and
/// compare as text.
fn to_db_timestamp(at: DateTime<Local>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn from_db_timestamp(raw: &str) -> std::result::Result<DateTime<Local>, HistoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Local))
        .map_err(|_| HistoryError::Timestamp(raw.to_string()))
}

/// SQLite-backed result history
#[derive(Debug)]
pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> std::result::Result<Self, HistoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HistoryError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> std::result::Result<Self, HistoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> std::result::Result<Self, HistoryError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                elapsed_secs INTEGER NOT NULL,
                errors INTEGER NOT NULL,
                keystrokes INTEGER NOT NULL,
                raw_wpm INTEGER NOT NULL,
                net_wpm INTEGER NOT NULL,
                completion REAL NOT NULL,
                characters INTEGER NOT NULL,
                words INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_results_created_at ON results(created_at)",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Record a result with an explicit timestamp.
    pub fn insert_at(
        &self,
        result: &SessionResult,
        at: DateTime<Local>,
    ) -> std::result::Result<i64, HistoryError> {
        self.conn.execute(
            INSERT_RESULT,
            params![
                result.wpm,
                result.accuracy,
                result.elapsed_secs,
                result.errors as i64,
                result.keystrokes as i64,
                result.raw_wpm,
                result.net_wpm,
                result.completion,
                result.characters as i64,
                result.words as i64,
                to_db_timestamp(at),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, wpm = result.wpm, "result stored");
        Ok(id)
    }

    /// Results matching `filter` relative to `now`, newest first.
    pub fn entries(
        &self,
        filter: HistoryFilter,
        now: DateTime<Local>,
    ) -> std::result::Result<Vec<HistoryEntry>, HistoryError> {
        // the empty string sorts before every timestamp
        let since = filter.since(now).map(to_db_timestamp).unwrap_or_default();

        let mut stmt = self.conn.prepare(SELECT_RESULTS)?;
        let rows = stmt.query_map([since], |row| {
            Ok((entry_from_row(row)?, row.get::<_, String>(11)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (mut entry, raw_ts) = row?;
            entry.created_at = from_db_timestamp(&raw_ts)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn count(&self) -> std::result::Result<usize, HistoryError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear(&self) -> std::result::Result<(), HistoryError> {
        self.conn.execute("DELETE FROM results", [])?;
        Ok(())
    }
}

/// Row columns 0..=10; the timestamp is parsed by the caller.
fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        result: SessionResult {
            wpm: row.get(1)?,
            accuracy: row.get(2)?,
            elapsed_secs: row.get(3)?,
            errors: row.get::<_, i64>(4)? as usize,
            keystrokes: row.get::<_, i64>(5)? as usize,
            raw_wpm: row.get(6)?,
            net_wpm: row.get(7)?,
            completion: row.get(8)?,
            characters: row.get::<_, i64>(9)? as usize,
            words: row.get::<_, i64>(10)? as usize,
        },
        created_at: DateTime::<Local>::default(),
    })
}

impl ResultSink for ResultStore {
    fn submit(&mut self, result: &SessionResult) -> Result<()> {
        self.insert_at(result, Local::now())?;
        Ok(())
    }
}

impl HistorySource for ResultStore {
    fn load_history(&self, filter: HistoryFilter) -> Result<Vec<HistoryEntry>> {
        Ok(self.entries(filter, Local::now())?)
    }
}

/// Results kept for the current run only. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<HistoryEntry>>> {
        self.entries
            .lock()
            .map_err(|_| HistoryError::Unavailable("memory store poisoned".into()).into())
    }
}

impl ResultSink for MemoryStore {
    fn submit(&mut self, result: &SessionResult) -> Result<()> {
        let mut entries = self.lock()?;
        let id = entries.len() as i64 + 1;
        entries.push(HistoryEntry {
            id,
            result: *result,
            created_at: Local::now(),
        });
        Ok(())
    }
}

impl HistorySource for MemoryStore {
    fn load_history(&self, filter: HistoryFilter) -> Result<Vec<HistoryEntry>> {
        let since = filter.since(Local::now());
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| since.map_or(true, |since| e.created_at >= since))
            .cloned()
            .collect())
    }
}

/// Stand-in when the database could not be opened: every call fails with
/// the original reason.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ResultSink for UnavailableStore {
    fn submit(&mut self, _result: &SessionResult) -> Result<()> {
        Err(HistoryError::Unavailable(self.reason.clone()).into())
    }
}

impl HistorySource for UnavailableStore {
    fn load_history(&self, _filter: HistoryFilter) -> Result<Vec<HistoryEntry>> {
        Err(HistoryError::Unavailable(self.reason.clone()).into())
    }
}

/// Aggregates shown on the statistics screen
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub count: usize,
    pub avg_wpm: f64,
    pub avg_accuracy: f64,
    pub avg_time_secs: f64,
    pub best_wpm: u32,
    pub wpm_std_dev: f64,
}

impl HistorySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Option<Self> {
        let wpms = entries.iter().map(|e| e.result.wpm as f64).collect_vec();
        let accuracies = entries
            .iter()
            .map(|e| e.result.accuracy as f64)
            .collect_vec();
        let times = entries
            .iter()
            .map(|e| e.result.elapsed_secs as f64)
            .collect_vec();

        Some(Self {
            count: entries.len(),
            avg_wpm: mean(&wpms)?,
            avg_accuracy: mean(&accuracies)?,
            avg_time_secs: mean(&times)?,
            best_wpm: entries.iter().map(|e| e.result.wpm).max()?,
            wpm_std_dev: std_dev(&wpms)?,
        })
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    created_at: &'a str,
    wpm: u32,
    accuracy: u32,
    elapsed_secs: u32,
    errors: usize,
    keystrokes: usize,
    raw_wpm: u32,
    net_wpm: u32,
    completion: String,
    characters: usize,
    words: usize,
}

const CSV_HEADER: [&str; 11] = [
    "created_at",
    "wpm",
    "accuracy",
    "elapsed_secs",
    "errors",
    "keystrokes",
    "raw_wpm",
    "net_wpm",
    "completion",
    "characters",
    "words",
];

/// Write entries as CSV, header first, in the order given.
pub fn export_csv<W: io::Write>(
    entries: &[HistoryEntry],
    writer: W,
) -> std::result::Result<(), HistoryError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(CSV_HEADER)?;

    for entry in entries {
        let created_at = entry.created_at.to_rfc3339_opts(SecondsFormat::Secs, false);
        let r = &entry.result;
        csv.serialize(CsvRow {
            created_at: &created_at,
            wpm: r.wpm,
            accuracy: r.accuracy,
            elapsed_secs: r.elapsed_secs,
            errors: r.errors,
            keystrokes: r.keystrokes,
            raw_wpm: r.raw_wpm,
            net_wpm: r.net_wpm,
            completion: format!("{:.1}", r.completion),
            characters: r.characters,
            words: r.words,
        })?;
    }

    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

//! Logging initialization.
//!
//! The TUI owns the terminal, so log lines go to `typepace.log` in the state
//! directory instead of stderr. The filter comes from `TYPEPACE_LOG` and
//! defaults to `info`:
//!
//! ```bash
//! TYPEPACE_LOG=debug typepace
//! TYPEPACE_LOG=typepace::session=trace,warn typepace
//! ```

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "TYPEPACE_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber writing to `path`. Logging is skipped when
/// the file cannot be opened or a subscriber is already installed; neither
/// stops the app.
pub fn init(path: &Path) -> bool {
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };

    fmt()
        .with_env_filter(filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .is_ok()
}

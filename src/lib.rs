// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod input;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod passage;
pub mod report;
pub mod runtime;
pub mod session;
pub mod time_series;

pub use error::{Error, Result};

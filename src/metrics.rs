//! Typing metric formulas.
//!
//! All counts are in characters (`char`), not bytes. Minutes are floored at
//! one second's worth so a burst at the very start of a session cannot blow
//! up the words-per-minute figure.

/// Smallest elapsed time, in minutes, used as a divisor.
pub const MIN_MINUTES: f64 = 1.0 / 60.0;

/// Characters per "word" for raw WPM.
pub const CHARS_PER_WORD: f64 = 5.0;

pub fn minutes_from_secs(secs: f64) -> f64 {
    (secs / 60.0).max(MIN_MINUTES)
}

/// Whitespace-delimited tokens of the trimmed input.
pub fn word_count(typed: &str) -> usize {
    typed.split_whitespace().count()
}

/// Rounded words per minute.
pub fn wpm(typed: &str, elapsed_secs: f64) -> u32 {
    let words = word_count(typed) as f64;
    (words / minutes_from_secs(elapsed_secs)).round() as u32
}

/// Positions that match the passage at the same index.
pub fn matching_chars(typed: &str, passage: &str) -> usize {
    typed
        .chars()
        .zip(passage.chars())
        .filter(|(t, p)| t == p)
        .count()
}

/// Typed positions that differ from the passage. Characters typed past the
/// end of the passage have nothing to match and count as errors.
pub fn error_count(typed: &str, passage: &str) -> usize {
    typed.chars().count() - matching_chars(typed, passage)
}

/// Rounded accuracy percentage, 100 when nothing has been typed.
pub fn accuracy(typed: &str, passage: &str) -> u32 {
    let typed_len = typed.chars().count();
    if typed_len == 0 {
        return 100;
    }
    let correct = matching_chars(typed, passage) as f64;
    ((correct / typed_len as f64) * 100.0).round() as u32
}

/// `(chars / 5) / minutes`, minutes taken from at least one whole second.
pub fn raw_wpm(typed_len: usize, elapsed_secs: u32) -> u32 {
    let minutes = elapsed_secs.max(1) as f64 / 60.0;
    ((typed_len as f64 / CHARS_PER_WORD) / minutes).round() as u32
}

/// Raw WPM minus errors per minute, never negative. The error rate is
/// taken over at least one minute.
pub fn net_wpm(raw_wpm: u32, errors: usize, elapsed_secs: u32) -> u32 {
    let minutes = (elapsed_secs as f64 / 60.0).max(1.0);
    let errors_per_minute = (errors as f64 / minutes).round() as u32;
    raw_wpm.saturating_sub(errors_per_minute)
}

/// Share of the passage covered by the input, in percent.
pub fn completion(typed_len: usize, passage_len: usize) -> f64 {
    if passage_len == 0 {
        return 0.0;
    }
    typed_len as f64 / passage_len as f64 * 100.0
}

/// Errors per typed character, in percent.
pub fn error_rate(errors: usize, typed_len: usize) -> f64 {
    if typed_len == 0 {
        return 0.0;
    }
    errors as f64 / typed_len as f64 * 100.0
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let avg = mean(data)?;
    let variance = data.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

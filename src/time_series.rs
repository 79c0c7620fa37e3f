#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    pub t: f64,
    pub wpm: f64,
}

impl TimeSeriesPoint {
    pub fn new(t: f64, wpm: f64) -> Self {
        Self { t, wpm }
    }
}

impl From<TimeSeriesPoint> for (f64, f64) {
    fn from(p: TimeSeriesPoint) -> Self {
        (p.t, p.wpm)
    }
}

/// Per-second WPM samples for one session.
///
/// Slot `i` holds the speed measured during second `i + 1`. The buffer is
/// allocated once with the session length and never grows; writes outside
/// `1..=len` are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedHistory {
    samples: Box<[u32]>,
}

impl SpeedHistory {
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0; len].into_boxed_slice(),
        }
    }

    /// Overwrite the sample for `elapsed_secs` (1-based). Returns false when
    /// the second falls outside the session.
    pub fn record(&mut self, elapsed_secs: u64, wpm: u32) -> bool {
        match usize::try_from(elapsed_secs) {
            Ok(secs) if secs >= 1 && secs <= self.samples.len() => {
                self.samples[secs - 1] = wpm;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.samples
    }

    pub fn peak(&self) -> u32 {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    /// Chart points for the first `upto` seconds.
    pub fn points(&self, upto: usize) -> Vec<TimeSeriesPoint> {
        self.samples
            .iter()
            .take(upto)
            .enumerate()
            .map(|(i, &wpm)| TimeSeriesPoint::new((i + 1) as f64, wpm as f64))
            .collect()
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reading speed the passage length is sized for.
pub const CHARS_PER_MINUTE: u64 = 300;

/// Bound on block draws so generation always terminates.
pub const MAX_ATTEMPTS: usize = 20;

/// Blocks may overshoot the target by this factor before truncation.
const OVERSHOOT: f64 = 1.5;

/// Word-boundary cuts never shorten the passage below this share of the target.
const MIN_CUT: f64 = 0.7;

/// Candidate blocks a passage is assembled from.
pub const CORPUS: &[&str] = &[
    "A quiet harbor wakes before the sun. Gulls circle the masts, ropes creak against the posts, and the first boats slide out past the breakwater.",
    "Good habits grow from small steps repeated every day. Practice slowly at first, keep your eyes on the text, and let speed arrive on its own.",
    "The old library smelled of paper and dust. Every shelf held a story waiting for a reader patient enough to open the cover and begin.",
    "Rain drummed on the tin roof all night long. By morning the river had risen over the path, and the ducks claimed the flooded garden.",
    "A compiler reads the source text, checks every rule of the language, and turns the program into instructions the machine can run.",
    "Mountain trails reward the steady walker. Pace yourself on the climb, drink water often, and save some strength for the long descent.",
    "The bakery on the corner opens at six. By seven the line reaches the street, and the smell of warm bread drifts across the square.",
    "Clear writing starts with clear thinking. Decide what you want to say, say it plainly, and cut every word that does not earn its place.",
    "Under the bridge the water moved slow and green. A heron stood in the shallows, perfectly still, waiting for a fish to swim too close.",
    "Keyboards reward a light touch. Rest your fingers on the home row, reach for each key without looking, and return to the center after.",
    "The night train hummed through sleeping towns. Passengers dozed under dim lamps while the fields outside rolled by in silver moonlight.",
    "Every garden needs a little patience. Seeds planted in spring may look like nothing for weeks, then one warm morning the rows turn green.",
];

/// Character count a passage for `duration_secs` aims for.
pub fn target_len(duration_secs: u32) -> usize {
    let target = CHARS_PER_MINUTE * u64::from(duration_secs) / 60;
    usize::try_from(target).unwrap_or(usize::MAX).max(1)
}

/// Build a passage sized for `duration_secs` from whole corpus blocks.
///
/// The result is never empty, never longer than the target once it has
/// overshot, and only cut at a word boundary unless no whitespace exists
/// past 70% of the target.
pub fn generate<R: Rng + ?Sized>(duration_secs: u32, rng: &mut R) -> String {
    let target = target_len(duration_secs);
    let ceiling = target as f64 * OVERSHOOT;

    let mut text = String::new();
    let mut len = 0;
    for _ in 0..MAX_ATTEMPTS {
        if len >= target {
            break;
        }
        let block = pick_block(rng);
        if (len + block.chars().count()) as f64 <= ceiling {
            len = append_block(&mut text, block);
        }
    }

    if len < target {
        len = append_block(&mut text, pick_block(rng));
    }

    if len > target {
        text = cut_at_word(&text, target);
    }

    text.trim().to_string()
}

fn pick_block<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    CORPUS[rng.gen_range(0..CORPUS.len())]
}

fn append_block(text: &mut String, block: &str) -> usize {
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(block);
    text.chars().count()
}

fn cut_at_word(text: &str, target: usize) -> String {
    let hard: String = text.chars().take(target).collect();
    let min_cut = (target as f64 * MIN_CUT).floor() as usize;

    let last_space = hard
        .chars()
        .enumerate()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(idx, _)| idx)
        .last();

    match last_space {
        Some(idx) if idx >= min_cut => hard.chars().take(idx).collect(),
        _ => hard,
    }
}

/// Supplies the passage for each attempt: either a fixed custom text or a
/// freshly generated one.
#[derive(Debug)]
pub struct PassageSource {
    custom: Option<String>,
    rng: StdRng,
}

impl PassageSource {
    pub fn random() -> Self {
        Self {
            custom: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            custom: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Always hand out `text`, whatever the duration. Blank text falls back
    /// to generation.
    pub fn fixed(text: impl Into<String>) -> Self {
        let text = text.into();
        let custom = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        Self {
            custom,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.custom.is_some()
    }

    pub fn next_passage(&mut self, duration_secs: u32) -> String {
        match &self.custom {
            Some(text) => text.clone(),
            None => generate(duration_secs, &mut self.rng),
        }
    }
}

use once_cell::sync::Lazy;
use regex::RegexSet;

const MAX_WORDS_PER_SEC: f64 = 5.0;
const MAX_CHARS_PER_SEC: f64 = 25.0;
const MIN_WORDS_FLOOR: f64 = 2.0;
const MIN_CHARS_FLOOR: f64 = 10.0;

/// Phrases whisper.cpp is known to hallucinate on silence or near-silence:
/// subtitle credits, "subscribe" calls-to-action, copyright boilerplate.
/// Case-insensitive, matched against the whole transcript.
const PATTERNS: &[&str] = &[
    r"(?i)субтитр",
    r"(?i)редактор субтитров",
    r"корректор[:\s]",
    r"(?i)подпишитесь",
    r"(?i)ставьте лайк",
    r"(?i)не забудьте подписаться",
    r"(?i)спасибо за просмотр",
    r"(?i)thanks?\s+for\s+watching",
    r"(?i)subscribe\s+to\s+(my|the|this)\s+channel",
    r"(?i)please\s+subscribe",
    r"(?i)like\s+and\s+subscribe",
    r"(?i)copyright\s+\d{4}",
    r"(?i)all\s+rights\s+reserved",
    r"(?i)amara\.org",
    r"(?i)translated\s+by",
    r"(?i)\[blank_audio\]",
    r"(?i)\[\s*music\s*\]",
    r"(?i)\[\s*applause\s*\]",
    r"(?i)www\.",
    r"(?i)до новых встреч",
];

static PATTERN_SET: Lazy<RegexSet> =
    Lazy::new(|| RegexSet::new(PATTERNS).expect("hallucination patterns must compile"));

/// Whether `text` matches a known hallucination pattern, or is implausibly
/// dense speech for the given segment duration.
pub fn is_hallucination(text: &str, duration_s: f64) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    if PATTERN_SET.is_match(trimmed) {
        return true;
    }
    duration_s > 0.0 && is_implausible_rate(trimmed, duration_s)
}

fn is_implausible_rate(text: &str, duration_s: f64) -> bool {
    let word_count = text.split_whitespace().count() as f64;
    let char_count = text.chars().filter(|c| !c.is_whitespace()).count() as f64;

    let max_words = (duration_s * MAX_WORDS_PER_SEC).max(MIN_WORDS_FLOOR);
    let max_chars = (duration_s * MAX_CHARS_PER_SEC).max(MIN_CHARS_FLOOR);

    word_count > max_words || char_count > max_chars
}

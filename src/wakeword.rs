/// Russian inflectional suffixes stripped to build fuzzy wake-word variants
/// ("дуняша" -> "дуняш", "дуня", "дуняш", "дуняж" and back).
const SUFFIXES: &[&str] = &["а", "я", "ша", "жа"];

const WAKE_WORD_THRESHOLD: f64 = 0.7;
pub const COMMAND_THRESHOLD: f64 = 0.75;

/// Detects a configured wake word in transcribed text, tolerating whisper's
/// inflectional noise via fuzzy matching rather than exact comparison.
pub struct WakeWordDetector {
    variants: Vec<String>,
}

impl WakeWordDetector {
    pub fn new(wake_word: &str) -> Self {
        Self {
            variants: build_variants(wake_word),
        }
    }

    /// Whether `text` contains the wake word, checked first as a literal
    /// case-insensitive substring (catching multi-word phrases whisper
    /// transcribed verbatim) and, failing that, as a per-token fuzzy match
    /// against the configured variants.
    pub fn contains_wake_word(&self, text: &str) -> bool {
        if self.variants.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        if self.variants.iter().any(|variant| lowered.contains(variant.as_str())) {
            return true;
        }
        text.split_whitespace()
            .any(|word| self.matches_any(&normalize(word)))
    }

    /// Remove every wake-word occurrence from `text`, returning the
    /// remainder with surrounding whitespace collapsed.
    pub fn strip_wake_word(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|word| !self.matches_any(&normalize(word)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn matches_any(&self, candidate: &str) -> bool {
        self.variants
            .iter()
            .any(|variant| is_fuzzy_match(variant, candidate, WAKE_WORD_THRESHOLD))
    }
}

fn normalize(word: &str) -> String {
    word.trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}

fn build_variants(wake_word: &str) -> Vec<String> {
    let base = normalize(wake_word);
    if base.is_empty() {
        return Vec::new();
    }
    let mut variants = vec![base.clone()];
    for suffix in SUFFIXES {
        if base.len() > suffix.len() + 2 && base.ends_with(suffix) {
            let stem = &base[..base.len() - suffix.len()];
            for other in SUFFIXES {
                variants.push(format!("{stem}{other}"));
            }
        }
    }
    variants.sort();
    variants.dedup();
    variants
}

fn is_fuzzy_match(a: &str, b: &str, threshold: f64) -> bool {
    if a == b {
        return true;
    }
    ratio(a, b) >= threshold
}

/// Ratcliff/Obershelp similarity, matching Python's
/// `difflib.SequenceMatcher(None, a, b).ratio()`: twice the total length of
/// matching blocks, divided by the combined length of both strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matches = matching_blocks_length(&a, &b);
    (2.0 * matches as f64) / ((a.len() + b.len()) as f64)
}

fn matching_blocks_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (i, j, size) = longest_match(a, b);
    if size == 0 {
        return 0;
    }
    matching_blocks_length(&a[..i], &b[..j])
        + size
        + matching_blocks_length(&a[i + size..], &b[j + size..])
}

/// Longest common contiguous substring between `a` and `b`, returning
/// (start_in_a, start_in_b, length).
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut dp = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut prev_diag = 0usize;
        let mut next_dp = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            prev_diag = dp[j];
            if a[i] == b[j] {
                let len = prev_diag + 1;
                next_dp[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        dp = next_dp;
    }
    best
}

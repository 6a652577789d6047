use std::collections::HashMap;

use crate::wakeword::{ratio, COMMAND_THRESHOLD};

const EMPTY_BUFFER_BACKSPACE_KEY: &str = "ctrl+BackSpace";

/// One piece of a processed utterance: either literal text to inject, or a
/// key to press instead of injecting text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    KeyPress(String),
}

enum Matched<'a> {
    Backspace,
    Key(&'a str),
}

/// Scans dictated text for configured command words ("enter", "backspace",
/// ...) and splits it into literal text runs and recognized key presses.
///
/// Backspace is special: if there is pending buffered text, it edits that
/// buffer (dropping its last word) rather than producing a key press, so
/// "hello world backspace" collapses to a single `inject("hello")` rather
/// than an inject followed by a backspace key. Only a backspace with no
/// pending text becomes an actual key press.
pub struct VoiceCommands {
    map: HashMap<String, String>,
}

impl VoiceCommands {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    /// Process a full utterance, returning the ordered text/key segments.
    pub fn process(&self, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut buffer: Vec<String> = Vec::new();

        for word in text.split_whitespace() {
            let normalized = word
                .trim_matches(|c: char| c.is_ascii_punctuation())
                .to_lowercase();
            match self.match_command(&normalized) {
                Some(Matched::Backspace) => {
                    if buffer.pop().is_none() {
                        segments.push(Segment::KeyPress(EMPTY_BUFFER_BACKSPACE_KEY.to_string()));
                    }
                }
                Some(Matched::Key(key)) => {
                    if !buffer.is_empty() {
                        segments.push(Segment::Text(buffer.join(" ")));
                        buffer.clear();
                    }
                    segments.push(Segment::KeyPress(key.to_string()));
                }
                None => buffer.push(word.to_string()),
            }
        }
        if !buffer.is_empty() {
            segments.push(Segment::Text(buffer.join(" ")));
        }
        segments
    }

    fn match_command(&self, word: &str) -> Option<Matched<'_>> {
        if word.is_empty() {
            return None;
        }
        if let Some(action) = self.map.get(word) {
            return Some(resolve(action));
        }
        let mut best: Option<(&str, f64)> = None;
        for key in self.map.keys() {
            let score = ratio(key, word);
            if score >= COMMAND_THRESHOLD && best.map(|(_, b)| score > b).unwrap_or(true) {
                best = Some((key, score));
            }
        }
        best.map(|(key, _)| resolve(&self.map[key]))
    }
}

fn resolve(raw: &str) -> Matched<'_> {
    if raw == "backspace" {
        return Matched::Backspace;
    }
    Matched::Key(raw.strip_prefix("key:").unwrap_or(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_VOICE_COMMANDS;

    fn default_commands() -> VoiceCommands {
        let map = DEFAULT_VOICE_COMMANDS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VoiceCommands::new(map)
    }

    #[test]
    fn plain_text_produces_single_text_segment() {
        let commands = default_commands();
        let segments = commands.process("hello world");
        assert_eq!(segments, vec![Segment::Text("hello world".to_string())]);
    }

    #[test]
    fn exact_command_word_becomes_key_press() {
        let commands = default_commands();
        let segments = commands.process("hello enter world");
        assert_eq!(
            segments,
            vec![
                Segment::Text("hello".to_string()),
                Segment::KeyPress("Return".to_string()),
                Segment::Text("world".to_string()),
            ]
        );
    }

    #[test]
    fn backspace_with_pending_text_edits_the_buffer() {
        let commands = default_commands();
        let segments = commands.process("hello world backspace more");
        assert_eq!(segments, vec![Segment::Text("hello more".to_string())]);
    }

    #[test]
    fn lone_backspace_becomes_a_key_press() {
        let commands = default_commands();
        let segments = commands.process("backspace");
        assert_eq!(
            segments,
            vec![Segment::KeyPress(EMPTY_BUFFER_BACKSPACE_KEY.to_string())]
        );
    }

    #[test]
    fn fuzzy_match_above_threshold_recognized() {
        let commands = default_commands();
        let segments = commands.process("энтерр");
        assert_eq!(
            segments,
            vec![Segment::KeyPress("Return".to_string())]
        );
    }

    #[test]
    fn unrelated_word_stays_literal() {
        let commands = default_commands();
        let segments = commands.process("совершенно другое слово");
        assert_eq!(
            segments,
            vec![Segment::Text("совершенно другое слово".to_string())]
        );
    }
}

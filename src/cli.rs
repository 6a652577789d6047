use std::path::PathBuf;

use clap::Parser;

use crate::config::{InputMode, OutputMode};

/// Voice-dictation daemon for Linux.
#[derive(Parser, Debug)]
#[command(
    name = "scribed",
    version,
    about = "Capture, VAD, transcribe and inject dictated speech at the cursor"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Send SIGUSR1 to a running instance to toggle recording/listening, then exit
    #[arg(long)]
    pub toggle: bool,

    /// Override transcription language (e.g. "en", "ru", "auto")
    #[arg(short = 'l', long)]
    pub language: Option<String>,

    /// Override the whisper model path
    #[arg(short = 'm', long)]
    pub model: Option<PathBuf>,

    /// Override the input mode (hotkey or listen)
    #[arg(long, value_enum)]
    pub input_mode: Option<CliInputMode>,

    /// Override the output mode (batch or stream)
    #[arg(long, value_enum)]
    pub output_mode: Option<CliOutputMode>,

    /// Shorthand for --output-mode stream
    #[arg(long)]
    pub stream: bool,

    /// Override the wake word required in listen mode
    #[arg(long)]
    pub wake_word: Option<String>,

    /// Override the lighter model used while waiting for the wake word
    #[arg(long)]
    pub wake_model: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliInputMode {
    Hotkey,
    Listen,
}

impl From<CliInputMode> for InputMode {
    fn from(mode: CliInputMode) -> Self {
        match mode {
            CliInputMode::Hotkey => InputMode::Hotkey,
            CliInputMode::Listen => InputMode::Listen,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliOutputMode {
    Batch,
    Stream,
}

impl From<CliOutputMode> for OutputMode {
    fn from(mode: CliOutputMode) -> Self {
        match mode {
            CliOutputMode::Batch => OutputMode::Batch,
            CliOutputMode::Stream => OutputMode::Stream,
        }
    }
}

impl Cli {
    /// Apply CLI overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut crate::config::Config) {
        if let Some(language) = &self.language {
            config.transcription.language = language.clone();
        }
        if let Some(model) = &self.model {
            config.transcription.model = model.clone();
        }
        if let Some(input_mode) = self.input_mode {
            config.mode.input_mode = input_mode.into();
        }
        if let Some(output_mode) = self.output_mode {
            config.mode.output_mode = output_mode.into();
        }
        if self.stream {
            config.mode.output_mode = OutputMode::Stream;
        }
        if let Some(wake_word) = &self.wake_word {
            config.mode.wake_word = wake_word.clone();
        }
        if let Some(wake_model) = &self.wake_model {
            config.transcription.wake_model = Some(wake_model.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn stream_flag_overrides_output_mode() {
        let cli = Cli::parse_from(["scribed", "--stream"]);
        let mut config = Config::default();
        assert_eq!(config.mode.output_mode, OutputMode::Batch);
        cli.apply_overrides(&mut config);
        assert_eq!(config.mode.output_mode, OutputMode::Stream);
    }

    #[test]
    fn wake_word_override_applies() {
        let cli = Cli::parse_from(["scribed", "--wake-word", "дуняша"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.mode.wake_word, "дуняша");
    }

    #[test]
    fn no_overrides_leaves_config_untouched() {
        let cli = Cli::parse_from(["scribed"]);
        let mut config = Config::default();
        let before = config.transcription.language.clone();
        cli.apply_overrides(&mut config);
        assert_eq!(config.transcription.language, before);
    }
}

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::TranscriptionConfig;

const TIMEOUT: Duration = Duration::from_secs(300);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TranscriberError {
    #[error("failed to start whisper-cli: {0}")]
    SpawnFailed(#[source] std::io::Error),
    #[error("whisper-cli failed (exit={exit_code:?}): {stderr_head}")]
    TranscriberFailed {
        exit_code: Option<i32>,
        stderr_head: String,
    },
    #[error("whisper-cli output was not valid UTF-8")]
    InvalidOutput,
}

/// Stderr is truncated to this many bytes before being attached to an
/// error, matching the notification length cap on the injection side.
const STDERR_HEAD_LEN: usize = 100;

fn stderr_head(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_HEAD_LEN {
        trimmed.to_string()
    } else {
        let mut end = STDERR_HEAD_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}

/// Transcribes a recorded segment to text. Implemented by [`Transcriber`]
/// for the real `whisper-cli` subprocess and by fakes in tests.
pub trait TranscribeBackend: Send {
    fn transcribe(&self, wav_path: &Path, use_wake_model: bool) -> Result<String, TranscriberError>;
}

/// Invokes the configured `whisper-cli` binary against a WAV file and
/// returns its transcript, with the model's own "blank audio" marker
/// stripped.
pub struct Transcriber {
    config: TranscriptionConfig,
}

impl Transcriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }
}

impl TranscribeBackend for Transcriber {
    /// Transcribe `wav_path`. `use_wake_model` selects the lighter model
    /// configured for wake-word listening, when one is set.
    fn transcribe(&self, wav_path: &Path, use_wake_model: bool) -> Result<String, TranscriberError> {
        let model = if use_wake_model {
            self.config.wake_model.as_ref().unwrap_or(&self.config.model)
        } else {
            &self.config.model
        };

        let mut child = Command::new(&self.config.whisper_cli)
            .arg("-m")
            .arg(model)
            .arg("-f")
            .arg(wav_path)
            .arg("-nt")
            .arg("-np")
            .arg("-t")
            .arg(self.config.threads.to_string())
            .arg("-l")
            .arg(&self.config.language)
            .arg("-dev")
            .arg(self.config.gpu_device.to_string())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(TranscriberError::SpawnFailed)?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait().map_err(TranscriberError::SpawnFailed)? {
                break status;
            }
            if started.elapsed() >= TIMEOUT {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TranscriberError::TranscriberFailed {
                    exit_code: None,
                    stderr_head: format!("timed out after {TIMEOUT:?}"),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let mut stderr = child.stderr.take().expect("stderr was piped");
            let mut captured = Vec::new();
            let _ = std::io::Read::read_to_end(&mut stderr, &mut captured);
            return Err(TranscriberError::TranscriberFailed {
                exit_code: status.code(),
                stderr_head: stderr_head(&captured),
            });
        }

        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut output = String::new();
        std::io::Read::read_to_string(&mut stdout, &mut output)
            .map_err(|_| TranscriberError::InvalidOutput)?;

        Ok(strip_blank_audio_marker(&output))
    }
}

fn strip_blank_audio_marker(text: &str) -> String {
    text.replace("[BLANK_AUDIO]", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_blank_audio_marker() {
        assert_eq!(strip_blank_audio_marker("  [BLANK_AUDIO]  "), "");
        assert_eq!(
            strip_blank_audio_marker("hello [BLANK_AUDIO] world"),
            "hello  world"
        );
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        assert_eq!(strip_blank_audio_marker("hello world"), "hello world");
    }

    #[test]
    fn wake_model_selection_falls_back_to_main_model() {
        let config = TranscriptionConfig {
            wake_model: None,
            ..TranscriptionConfig::default()
        };
        let transcriber = Transcriber::new(config.clone());
        assert_eq!(transcriber.config.model, config.model);
    }
}

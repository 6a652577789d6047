use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::SoundConfig;

/// Players tried in order to render a notification chime; whichever is
/// installed first wins.
const PLAYERS: &[&str] = &["pw-play", "paplay", "canberra-gtk-play"];

/// Plays the start/end recording chimes. Implemented by [`ChimePlayer`] and
/// by no-op fakes in tests, since chimes have no effect on coordinator state.
pub trait SoundPlayer: Send {
    fn play_start(&self);
    fn play_end(&self);
}

/// Plays the configured start/end chime candidates via a subprocess player.
pub struct ChimePlayer {
    config: SoundConfig,
}

impl ChimePlayer {
    pub fn new(config: SoundConfig) -> Self {
        Self { config }
    }
}

impl SoundPlayer for ChimePlayer {
    fn play_start(&self) {
        play_first_available(&self.config.start_signal);
    }

    fn play_end(&self) {
        play_first_available(&self.config.end_signal);
    }
}

/// Plays the first existing file from `candidates` using whichever sound
/// player is available, ignoring failures: a missing chime should never
/// block dictation.
pub fn play_first_available(candidates: &[std::path::PathBuf]) {
    let Some(path) = candidates.iter().find(|p| p.exists()) else {
        tracing::debug!("no chime file found among candidates, skipping sound");
        return;
    };
    play(path);
}

fn play(path: &Path) {
    for player in PLAYERS {
        let args: Vec<&std::ffi::OsStr> = match *player {
            "canberra-gtk-play" => vec![std::ffi::OsStr::new("-f"), path.as_os_str()],
            _ => vec![path.as_os_str()],
        };
        let result = Command::new(player)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if matches!(result, Ok(status) if status.success()) {
            return;
        }
    }
    tracing::debug!("no sound player succeeded for {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn play_first_available_skips_missing_candidates() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.oga");
        // Neither candidate exists; this must not panic.
        play_first_available(&[missing]);
    }

    #[test]
    fn play_first_available_picks_the_existing_file() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.oga");
        let present = tmp.path().join("present.oga");
        std::fs::write(&present, b"fake-ogg").unwrap();
        // Exercises the `exists()` selection path; actual playback may fail
        // in a sandboxed test environment with no player installed, which
        // is treated as a no-op, not an error.
        play_first_available(&[missing, present]);
    }
}

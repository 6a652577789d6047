use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level daemon configuration, loaded from a TOML file with layered
/// defaults. Mirrors the original project's `config.ini`, translated to the
/// serde-idiomatic shape this crate's dependency stack favors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub vad: VadConfig,
    pub transcription: TranscriptionConfig,
    pub mode: ModeConfig,
    pub display: DisplayConfig,
    pub voice_commands: VoiceCommandsConfig,
    pub sound: SoundConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// ALSA device name, or "auto"/"default" to prefer PipeWire.
    pub audio_device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Integer RMS amplitude threshold above which a 30ms frame counts as speech.
    pub threshold: i64,
    pub min_speech_ms: u64,
    pub max_speech_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub whisper_cli: String,
    pub model: PathBuf,
    /// Lighter model used while LISTENING for a wake word, if set.
    pub wake_model: Option<PathBuf>,
    pub language: String,
    pub threads: u32,
    pub gpu_device: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    pub input_mode: InputMode,
    pub output_mode: OutputMode,
    pub wake_word: String,
    pub silence_timeout_s: f64,
    pub end_signal: bool,
    pub notification: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    Hotkey,
    Listen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Batch,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayServer {
    X11,
    Wayland,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub display_server: DisplayServer,
    pub paste_keys: String,
    pub use_clipboard_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceCommandsConfig {
    pub enabled: bool,
    /// word -> "key:<KeySym>" or the sentinel "backspace"
    pub map: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub start_signal: Vec<PathBuf>,
    pub end_signal: Vec<PathBuf>,
}

// --- Defaults -------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            vad: VadConfig::default(),
            transcription: TranscriptionConfig::default(),
            mode: ModeConfig::default(),
            display: DisplayConfig::default(),
            voice_commands: VoiceCommandsConfig::default(),
            sound: SoundConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            audio_device: "auto".to_string(),
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 300,
            min_speech_ms: 300,
            max_speech_s: 30.0,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            whisper_cli: "whisper-cli".to_string(),
            model: PathBuf::from("ggml-base.bin"),
            wake_model: None,
            language: "auto".to_string(),
            threads: 4,
            gpu_device: 0,
        }
    }
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            input_mode: InputMode::Hotkey,
            output_mode: OutputMode::Batch,
            wake_word: String::new(),
            silence_timeout_s: 3.0,
            end_signal: true,
            notification: true,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            display_server: DisplayServer::X11,
            paste_keys: "ctrl+shift+v".to_string(),
            use_clipboard_fallback: false,
        }
    }
}

impl Default for VoiceCommandsConfig {
    fn default() -> Self {
        let mut map = HashMap::new();
        for (word, action) in DEFAULT_VOICE_COMMANDS {
            map.insert(word.to_string(), action.to_string());
        }
        Self { enabled: true, map }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            start_signal: vec![
                PathBuf::from("/usr/share/sounds/freedesktop/stereo/message-new-instant.oga"),
                PathBuf::from("/usr/share/sounds/freedesktop/stereo/message.oga"),
                PathBuf::from("/usr/share/sounds/freedesktop/stereo/bell.oga"),
            ],
            end_signal: vec![
                PathBuf::from("/usr/share/sounds/freedesktop/stereo/complete.oga"),
                PathBuf::from("/usr/share/sounds/freedesktop/stereo/bell.oga"),
                PathBuf::from("/usr/share/sounds/freedesktop/stereo/message.oga"),
            ],
        }
    }
}

pub const DEFAULT_VOICE_COMMANDS: &[(&str, &str)] = &[
    ("enter", "key:Return"),
    ("энтер", "key:Return"),
    ("ввод", "key:Return"),
    ("backspace", "backspace"),
    ("бэкспейс", "backspace"),
    ("бекспейс", "backspace"),
    ("назад", "backspace"),
    ("tab", "key:Tab"),
    ("таб", "key:Tab"),
    ("табуляция", "key:Tab"),
    ("escape", "key:Escape"),
    ("эскейп", "key:Escape"),
    ("стоп", "key:Escape"),
];

// --- Loading ---------------------------------------------------------------

impl Config {
    /// Load config from an explicit path, or the platform config directory,
    /// or fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(p) = path {
            let content = std::fs::read_to_string(p).map_err(|e| {
                anyhow::anyhow!("Failed to read config file {}: {}", p.display(), e)
            })?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let platform_config = config_dir.join("scribed").join("config.toml");
            if platform_config.exists() {
                let content = std::fs::read_to_string(&platform_config)?;
                let config: Config = toml::from_str(&content)?;
                return Ok(config);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Runtime directory used for the PID file and other ephemeral state.
    pub fn runtime_dir() -> PathBuf {
        dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
    }
}

use std::time::{Duration, Instant};

use crate::commands::{Segment, VoiceCommands};
use crate::config::{Config, InputMode, OutputMode};
use crate::hallucination::is_hallucination;
use crate::wakeword::WakeWordDetector;

/// Post-chime mute window: audio captured in the first 600ms after a chime
/// plays is discarded so the chime's own sound can't retrigger the VAD.
const MUTE_WINDOW: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Recording,
    Processing,
    Listening,
    Dictating,
}

/// An input to the state machine: a hotkey toggle, a chunk of captured
/// audio, an armed silence timer firing, or a finished transcription coming
/// back from the worker.
#[derive(Debug)]
pub enum Event {
    Toggle,
    AudioChunk(Vec<i16>),
    SilenceTimeout(u64),
    TranscriptReady { text: String, duration_s: f64 },
}

/// A side effect the coordinator wants performed. The caller executes these
/// against the real capture/transcriber/injector/sound collaborators and
/// feeds results back in as further [`Event`]s — the coordinator itself
/// never touches a subprocess or a clock.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    PlayStartChime,
    PlayEndChime,
    Inject(String),
    SendKey(String),
    Transcribe { samples: Vec<i16>, use_wake_model: bool },
    ArmSilenceTimer { generation: u64, after: Duration },
    CancelSilenceTimer,
    /// Remember the currently focused window, at session start, before any
    /// capture/VAD activity can steal it.
    SaveFocus,
    /// Re-focus the window saved by `SaveFocus`, immediately before an
    /// actual injection lands.
    RestoreFocus,
    /// Start the microphone capture subprocess for a new session.
    StartCapture,
    /// Stop the microphone capture subprocess; idempotent.
    StopCapture,
}

/// The dictation daemon's state machine. Pure and synchronous: every
/// transition is a function of the current state and an [`Event`], and
/// every effect the transition wants is returned as an [`Action`] rather
/// than performed inline. This keeps the four operational modes (hotkey or
/// wake-word input, crossed with batch or streaming output) testable
/// without spawning a single subprocess or thread.
pub struct Coordinator {
    config: Config,
    vad: crate::audio::vad::Vad,
    voice_commands: VoiceCommands,
    wakeword: Option<WakeWordDetector>,
    state: State,
    batch_buffer: Vec<i16>,
    segment_buffer: Vec<i16>,
    dictation_text: String,
    silence_generation: u64,
    mute_until: Option<Instant>,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        let vad = crate::audio::vad::Vad::new(&config.vad);
        let voice_commands = VoiceCommands::new(config.voice_commands.map.clone());
        let wakeword = if config.mode.wake_word.is_empty() {
            None
        } else {
            Some(WakeWordDetector::new(&config.mode.wake_word))
        };
        let state = match config.mode.input_mode {
            InputMode::Listen => State::Listening,
            InputMode::Hotkey => State::Idle,
        };
        Self {
            config,
            vad,
            voice_commands,
            wakeword,
            state,
            batch_buffer: Vec::new(),
            segment_buffer: Vec::new(),
            dictation_text: String::new(),
            silence_generation: 0,
            mute_until: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn is_muted(&self) -> bool {
        self.mute_until.map(|t| Instant::now() < t).unwrap_or(false)
    }

    fn chime(&mut self) -> Action {
        self.mute_until = Some(Instant::now() + MUTE_WINDOW);
        Action::PlayStartChime
    }

    fn arm_silence_timer(&mut self) -> Action {
        self.silence_generation += 1;
        Action::ArmSilenceTimer {
            generation: self.silence_generation,
            after: Duration::from_secs_f64(self.config.mode.silence_timeout_s),
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::Toggle => self.handle_toggle(),
            Event::AudioChunk(chunk) => self.handle_audio_chunk(chunk),
            Event::SilenceTimeout(generation) => self.handle_silence_timeout(generation),
            Event::TranscriptReady { text, duration_s } => {
                self.handle_transcript_ready(text, duration_s)
            }
        }
    }

    fn handle_toggle(&mut self) -> Vec<Action> {
        match (self.config.mode.input_mode, self.state) {
            (InputMode::Hotkey, State::Idle) => {
                self.vad.reset();
                self.batch_buffer.clear();
                self.segment_buffer.clear();
                self.state = State::Recording;
                let mut actions = vec![Action::SaveFocus, Action::StartCapture];
                // Batch mode is a silent push-to-talk toggle; only the
                // streaming sub-mode signals session start with a chime.
                if self.config.mode.output_mode == OutputMode::Stream {
                    actions.push(self.chime());
                }
                actions
            }
            (InputMode::Hotkey, State::Recording) => {
                if self.config.mode.output_mode == OutputMode::Batch {
                    self.state = State::Processing;
                    let samples = std::mem::take(&mut self.batch_buffer);
                    vec![
                        Action::StopCapture,
                        Action::Transcribe {
                            samples,
                            use_wake_model: false,
                        },
                    ]
                } else {
                    self.state = State::Idle;
                    vec![Action::StopCapture, Action::PlayEndChime]
                }
            }
            (InputMode::Listen, State::Listening) | (InputMode::Listen, State::Dictating) => {
                self.silence_generation += 1;
                self.state = State::Idle;
                let flushed = std::mem::take(&mut self.dictation_text);
                let mut actions = Vec::new();
                if !flushed.is_empty() {
                    actions.extend(self.inject_with_focus_restore(&flushed));
                }
                actions.push(Action::StopCapture);
                actions.push(Action::PlayEndChime);
                actions.push(Action::CancelSilenceTimer);
                actions
            }
            (InputMode::Listen, State::Idle) => {
                self.vad.reset();
                self.state = State::Listening;
                vec![Action::SaveFocus, Action::StartCapture, self.chime()]
            }
            _ => Vec::new(),
        }
    }

    fn handle_audio_chunk(&mut self, chunk: Vec<i16>) -> Vec<Action> {
        if self.is_muted() {
            return Vec::new();
        }

        let uses_vad = matches!(self.state, State::Listening | State::Dictating)
            || (self.state == State::Recording && self.config.mode.output_mode == OutputMode::Stream);
        if !uses_vad {
            if self.state == State::Recording {
                self.batch_buffer.extend_from_slice(&chunk);
            }
            return Vec::new();
        }

        let events = self.vad.feed(&chunk);
        if self.vad.in_speech() || events.contains(&crate::audio::vad::SpeechEvent::Start) {
            self.segment_buffer.extend_from_slice(&chunk);
        }

        let mut actions = Vec::new();
        for event in events {
            match event {
                crate::audio::vad::SpeechEvent::Start => {
                    if self.state == State::Dictating {
                        actions.push(Action::CancelSilenceTimer);
                    }
                }
                crate::audio::vad::SpeechEvent::End { keep } => {
                    let samples = std::mem::take(&mut self.segment_buffer);
                    if keep {
                        let use_wake_model = self.state == State::Listening;
                        actions.push(Action::Transcribe {
                            samples,
                            use_wake_model,
                        });
                    }
                }
            }
        }
        actions
    }

    fn handle_silence_timeout(&mut self, generation: u64) -> Vec<Action> {
        if generation != self.silence_generation || self.state != State::Dictating {
            return Vec::new();
        }
        if self.vad.in_speech() {
            return vec![self.arm_silence_timer()];
        }
        self.state = State::Listening;
        self.vad.reset();
        let flushed = std::mem::take(&mut self.dictation_text);
        let mut actions = Vec::new();
        if !flushed.is_empty() {
            actions.extend(self.inject_with_focus_restore(&flushed));
        }
        actions.push(Action::PlayEndChime);
        actions
    }

    fn handle_transcript_ready(&mut self, text: String, duration_s: f64) -> Vec<Action> {
        if is_hallucination(&text, duration_s) {
            return match self.state {
                State::Processing => {
                    self.state = State::Idle;
                    Vec::new()
                }
                _ => Vec::new(),
            };
        }

        match self.state {
            State::Processing => {
                self.state = State::Idle;
                self.inject_with_focus_restore(&text)
            }
            State::Listening => {
                let Some(detector) = &self.wakeword else {
                    return Vec::new();
                };
                if !detector.contains_wake_word(&text) {
                    return Vec::new();
                }
                let remainder = detector.strip_wake_word(&text);
                self.state = State::Dictating;
                self.dictation_text.clear();
                let mut actions = vec![self.chime()];
                actions.extend(self.handle_dictation_utterance(&remainder));
                actions
            }
            State::Dictating => {
                let wake_hit = self
                    .wakeword
                    .as_ref()
                    .map(|detector| detector.contains_wake_word(&text))
                    .unwrap_or(false);
                if wake_hit {
                    return self.stop_dictation(&text);
                }
                self.handle_dictation_utterance(&text)
            }
            State::Recording | State::Idle => self.inject_with_focus_restore(&text),
        }
    }

    /// A single utterance recognized while dictating (after any wake-word
    /// has already been stripped off): stream mode injects it immediately,
    /// batch mode appends it to the pending buffer. Either way the silence
    /// timer is (re-)armed, since this utterance is evidence dictation is
    /// still live.
    fn handle_dictation_utterance(&mut self, text: &str) -> Vec<Action> {
        if text.is_empty() {
            return Vec::new();
        }
        if self.config.mode.output_mode == OutputMode::Stream {
            let mut actions = self.inject_with_focus_restore(text);
            actions.push(self.arm_silence_timer());
            actions
        } else {
            if !self.dictation_text.is_empty() {
                self.dictation_text.push(' ');
            }
            self.dictation_text.push_str(text);
            vec![self.arm_silence_timer()]
        }
    }

    /// The wake word spoken again while dictating means "stop": flush
    /// whatever's pending plus any residue left after stripping the wake
    /// word out of this utterance, as a single injection, and return to
    /// listening.
    fn stop_dictation(&mut self, text: &str) -> Vec<Action> {
        let residue = self
            .wakeword
            .as_ref()
            .expect("wake_hit implies a detector is configured")
            .strip_wake_word(text);
        let mut combined = std::mem::take(&mut self.dictation_text);
        if !residue.is_empty() {
            if !combined.is_empty() {
                combined.push(' ');
            }
            combined.push_str(&residue);
        }
        self.state = State::Listening;
        self.vad.reset();
        self.silence_generation += 1;

        let mut actions = Vec::new();
        if !combined.is_empty() {
            actions.extend(self.inject_with_focus_restore(&combined));
        }
        actions.push(Action::CancelSilenceTimer);
        actions.push(Action::PlayEndChime);
        actions
    }

    fn segments_to_actions(&self, text: &str) -> Vec<Action> {
        self.voice_commands
            .process(text)
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(text) => Action::Inject(text),
                Segment::KeyPress(key) => Action::SendKey(key),
            })
            .collect()
    }

    /// Converts `text` to inject/key actions as [`segments_to_actions`] does,
    /// but additionally restores whatever window focus was saved at session
    /// start immediately before the actual injection, so the transcript
    /// lands wherever the user was typing rather than wherever the capture
    /// pipeline happened to leave focus.
    fn inject_with_focus_restore(&self, text: &str) -> Vec<Action> {
        let actions = self.segments_to_actions(text);
        if actions.is_empty() {
            return actions;
        }
        let mut out = Vec::with_capacity(actions.len() + 1);
        out.push(Action::RestoreFocus);
        out.extend(actions);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn hotkey_batch_config() -> Config {
        let mut config = Config::default();
        config.mode.input_mode = InputMode::Hotkey;
        config.mode.output_mode = OutputMode::Batch;
        config
    }

    fn hotkey_stream_config() -> Config {
        let mut config = Config::default();
        config.mode.input_mode = InputMode::Hotkey;
        config.mode.output_mode = OutputMode::Stream;
        config
    }

    fn listen_batch_config() -> Config {
        let mut config = Config::default();
        config.mode.input_mode = InputMode::Listen;
        config.mode.output_mode = OutputMode::Batch;
        config.mode.wake_word = "дуняша".to_string();
        config
    }

    #[test]
    fn hotkey_batch_toggle_starts_and_stops_recording() {
        let mut coordinator = Coordinator::new(hotkey_batch_config());
        assert_eq!(coordinator.state(), State::Idle);

        let actions = coordinator.handle(Event::Toggle);
        assert_eq!(actions, vec![Action::SaveFocus, Action::StartCapture]);
        assert_eq!(coordinator.state(), State::Recording);

        let actions = coordinator.handle(Event::Toggle);
        assert_eq!(coordinator.state(), State::Processing);
        assert!(matches!(actions[0], Action::StopCapture));
        assert!(matches!(actions[1], Action::Transcribe { .. }));
    }

    #[test]
    fn hotkey_batch_toggle_does_not_chime_or_mute() {
        let mut coordinator = Coordinator::new(hotkey_batch_config());
        coordinator.handle(Event::Toggle);
        assert!(!coordinator.is_muted());
    }

    #[test]
    fn hotkey_batch_accumulates_raw_audio_without_vad() {
        let mut coordinator = Coordinator::new(hotkey_batch_config());
        coordinator.handle(Event::Toggle);
        coordinator.handle(Event::AudioChunk(vec![0i16; 100]));
        coordinator.handle(Event::AudioChunk(vec![1i16; 50]));
        let actions = coordinator.handle(Event::Toggle);
        match &actions[1] {
            Action::Transcribe { samples, .. } => assert_eq!(samples.len(), 150),
            _ => panic!("expected a Transcribe action"),
        }
    }

    #[test]
    fn transcript_ready_in_processing_state_returns_to_idle_and_injects() {
        let mut coordinator = Coordinator::new(hotkey_batch_config());
        coordinator.handle(Event::Toggle);
        coordinator.handle(Event::Toggle);
        assert_eq!(coordinator.state(), State::Processing);

        let actions = coordinator.handle(Event::TranscriptReady {
            text: "hello world".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.state(), State::Idle);
        assert_eq!(
            actions,
            vec![Action::RestoreFocus, Action::Inject("hello world".to_string())]
        );
    }

    #[test]
    fn hallucinated_transcript_is_discarded() {
        let mut coordinator = Coordinator::new(hotkey_batch_config());
        coordinator.handle(Event::Toggle);
        coordinator.handle(Event::Toggle);

        let actions = coordinator.handle(Event::TranscriptReady {
            text: "Thanks for watching, please subscribe!".to_string(),
            duration_s: 1.0,
        });
        assert!(actions.is_empty());
        assert_eq!(coordinator.state(), State::Idle);
    }

    #[test]
    fn hotkey_stream_segments_speech_and_transcribes_each() {
        let mut coordinator = Coordinator::new(hotkey_stream_config());
        coordinator.handle(Event::Toggle);
        coordinator.mute_until = None;

        let loud = vec![8000i16; crate::audio::vad::FRAME_SAMPLES];
        let mut transcribe_actions = 0;
        for _ in 0..20 {
            let actions = coordinator.handle(Event::AudioChunk(loud.clone()));
            transcribe_actions += actions
                .iter()
                .filter(|a| matches!(a, Action::Transcribe { .. }))
                .count();
        }
        let silence = vec![0i16; crate::audio::vad::FRAME_SAMPLES];
        for _ in 0..15 {
            let actions = coordinator.handle(Event::AudioChunk(silence.clone()));
            transcribe_actions += actions
                .iter()
                .filter(|a| matches!(a, Action::Transcribe { .. }))
                .count();
        }
        assert!(transcribe_actions >= 1);
    }

    #[test]
    fn listen_mode_starts_in_listening_state() {
        let coordinator = Coordinator::new(listen_batch_config());
        assert_eq!(coordinator.state(), State::Listening);
    }

    #[test]
    fn wake_word_transitions_listening_to_dictating() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        let actions = coordinator.handle(Event::TranscriptReady {
            text: "дуняша привет как дела".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.state(), State::Dictating);
        assert!(actions.contains(&Action::PlayStartChime));
        assert_eq!(coordinator.dictation_text, "привет как дела");
    }

    #[test]
    fn non_wake_word_text_is_ignored_while_listening() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        let actions = coordinator.handle(Event::TranscriptReady {
            text: "случайный шум в комнате".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.state(), State::Listening);
        assert!(actions.is_empty());
    }

    #[test]
    fn silence_timeout_with_stale_generation_is_ignored() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        coordinator.handle(Event::TranscriptReady {
            text: "дуняша привет".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.state(), State::Dictating);
        let actions = coordinator.handle(Event::SilenceTimeout(999));
        assert!(actions.is_empty());
        assert_eq!(coordinator.state(), State::Dictating);
    }

    #[test]
    fn silence_timeout_returns_dictating_to_listening_and_flushes() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        coordinator.handle(Event::TranscriptReady {
            text: "дуняша привет".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.state(), State::Dictating);
        let generation = coordinator.silence_generation;
        let actions = coordinator.handle(Event::SilenceTimeout(generation));
        assert_eq!(coordinator.state(), State::Listening);
        assert_eq!(
            actions,
            vec![
                Action::RestoreFocus,
                Action::Inject("привет".to_string()),
                Action::PlayEndChime
            ]
        );
        assert!(coordinator.dictation_text.is_empty());
    }

    #[test]
    fn silence_timeout_rearms_while_still_speaking() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        coordinator.handle(Event::TranscriptReady {
            text: "дуняша привет".to_string(),
            duration_s: 2.0,
        });
        coordinator.mute_until = None;
        let generation = coordinator.silence_generation;

        let loud = vec![8000i16; crate::audio::vad::FRAME_SAMPLES];
        for _ in 0..12 {
            coordinator.handle(Event::AudioChunk(loud.clone()));
        }
        assert!(coordinator.vad.in_speech());

        let actions = coordinator.handle(Event::SilenceTimeout(generation));
        assert_eq!(coordinator.state(), State::Dictating);
        assert!(matches!(actions.as_slice(), [Action::ArmSilenceTimer { .. }]));
    }

    #[test]
    fn batch_dictation_accumulates_text_until_silence_timeout() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        coordinator.handle(Event::TranscriptReady {
            text: "дуняша открой окно".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.state(), State::Dictating);
        assert_eq!(coordinator.dictation_text, "открой окно");

        let actions = coordinator.handle(Event::TranscriptReady {
            text: "и включи свет".to_string(),
            duration_s: 2.0,
        });
        assert!(
            !actions.iter().any(|a| matches!(a, Action::Inject(_))),
            "batch mode should not inject mid-dictation"
        );
        assert_eq!(coordinator.dictation_text, "открой окно и включи свет");
    }

    #[test]
    fn wake_word_while_dictating_flushes_accumulated_text_and_returns_to_listening() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        coordinator.handle(Event::TranscriptReady {
            text: "дуняша первая часть".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.dictation_text, "первая часть");

        let actions = coordinator.handle(Event::TranscriptReady {
            text: "вторая часть дуняша".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.state(), State::Listening);
        assert_eq!(
            actions,
            vec![
                Action::RestoreFocus,
                Action::Inject("первая часть вторая часть".to_string()),
                Action::CancelSilenceTimer,
                Action::PlayEndChime,
            ]
        );
        assert!(coordinator.dictation_text.is_empty());
    }

    #[test]
    fn wake_word_alone_while_dictating_stops_with_no_injection() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        coordinator.handle(Event::TranscriptReady {
            text: "дуняша".to_string(),
            duration_s: 1.0,
        });
        assert_eq!(coordinator.state(), State::Dictating);
        assert!(coordinator.dictation_text.is_empty());

        let actions = coordinator.handle(Event::TranscriptReady {
            text: "дуняша".to_string(),
            duration_s: 1.0,
        });
        assert_eq!(coordinator.state(), State::Listening);
        assert_eq!(
            actions,
            vec![Action::CancelSilenceTimer, Action::PlayEndChime]
        );
    }

    #[test]
    fn stream_dictation_injects_each_utterance_and_arms_timer() {
        let mut config = listen_batch_config();
        config.mode.output_mode = OutputMode::Stream;
        let mut coordinator = Coordinator::new(config);
        coordinator.handle(Event::TranscriptReady {
            text: "дуняша открой окно".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.state(), State::Dictating);

        let actions = coordinator.handle(Event::TranscriptReady {
            text: "включи свет".to_string(),
            duration_s: 1.5,
        });
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], Action::RestoreFocus);
        assert_eq!(actions[1], Action::Inject("включи свет".to_string()));
        assert!(matches!(actions[2], Action::ArmSilenceTimer { .. }));
        assert!(coordinator.dictation_text.is_empty());
    }

    #[test]
    fn toggle_while_processing_is_ignored() {
        let mut coordinator = Coordinator::new(hotkey_batch_config());
        coordinator.handle(Event::Toggle);
        coordinator.handle(Event::Toggle);
        assert_eq!(coordinator.state(), State::Processing);
        let actions = coordinator.handle(Event::Toggle);
        assert!(actions.is_empty());
        assert_eq!(coordinator.state(), State::Processing);
    }

    #[test]
    fn toggle_off_while_listening_flushes_any_pending_dictation() {
        let mut coordinator = Coordinator::new(listen_batch_config());
        coordinator.handle(Event::TranscriptReady {
            text: "дуняша купи хлеба".to_string(),
            duration_s: 2.0,
        });
        assert_eq!(coordinator.dictation_text, "купи хлеба");

        let actions = coordinator.handle(Event::Toggle);
        assert_eq!(coordinator.state(), State::Idle);
        assert_eq!(
            actions,
            vec![
                Action::RestoreFocus,
                Action::Inject("купи хлеба".to_string()),
                Action::StopCapture,
                Action::PlayEndChime,
                Action::CancelSilenceTimer,
            ]
        );
    }

    #[test]
    fn mute_window_suppresses_audio_right_after_chime() {
        let mut coordinator = Coordinator::new(hotkey_stream_config());
        coordinator.handle(Event::Toggle);
        assert!(coordinator.is_muted());
        let actions = coordinator.handle(Event::AudioChunk(vec![8000i16; crate::audio::vad::FRAME_SAMPLES]));
        assert!(actions.is_empty());
    }
}

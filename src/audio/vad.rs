use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::VadConfig;

/// Samples per 30ms frame at 16kHz mono.
pub const FRAME_SAMPLES: usize = 480;
const TRAILING_SILENCE_MS: u64 = 300;

/// Emitted by [`Vad::feed`] as frames are classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Fires on the very first frame whose energy crosses the threshold.
    Start,
    /// A segment boundary was reached (trailing silence or max duration).
    /// `keep` is false when the segment never reached `min_speech_ms`, in
    /// which case the caller should discard its buffered audio rather than
    /// sending it to the transcriber.
    End { keep: bool },
}

/// Energy-based voice activity detector.
///
/// Unlike the callback-driven detector this was ported from, [`feed`] is
/// pull-based: callers push PCM chunks in and read back the events that
/// occurred, rather than registering closures the detector calls into. This
/// avoids a reference cycle between the detector and its owner.
pub struct Vad {
    threshold: i64,
    min_speech_frames: usize,
    max_speech_frames: usize,
    trailing_silence_frames: usize,

    partial: Vec<i16>,
    in_speech: AtomicBool,
    speech_frame_count: usize,
    silence_frame_count: usize,
}

impl Vad {
    pub fn new(config: &VadConfig) -> Self {
        let frame_ms = 30u64;
        let min_speech_frames = ((config.min_speech_ms as f64) / (frame_ms as f64)).ceil() as usize;
        let max_speech_frames =
            ((config.max_speech_s * 1000.0) / (frame_ms as f64)).ceil() as usize;
        let trailing_silence_frames =
            ((TRAILING_SILENCE_MS as f64) / (frame_ms as f64)).ceil() as usize;
        Self {
            threshold: config.threshold,
            min_speech_frames: min_speech_frames.max(1),
            max_speech_frames: max_speech_frames.max(1),
            trailing_silence_frames: trailing_silence_frames.max(1),
            partial: Vec::new(),
            in_speech: AtomicBool::new(false),
            speech_frame_count: 0,
            silence_frame_count: 0,
        }
    }

    /// Whether the detector currently believes it is inside a speech segment.
    /// Backed by an atomic so the coordinator's silence timer can read it
    /// from another thread without locking.
    pub fn in_speech(&self) -> bool {
        self.in_speech.load(Ordering::Acquire)
    }

    fn rms(frame: &[i16]) -> i64 {
        if frame.is_empty() {
            return 0;
        }
        let sum_sq: i64 = frame.iter().map(|&s| (s as i64) * (s as i64)).sum();
        ((sum_sq / frame.len() as i64) as f64).sqrt() as i64
    }

    /// Feed a chunk of 16-bit PCM samples and receive the speech events, if
    /// any, produced by classifying the newly completed 30ms frames.
    pub fn feed(&mut self, chunk: &[i16]) -> Vec<SpeechEvent> {
        self.partial.extend_from_slice(chunk);
        let mut events = Vec::new();

        while self.partial.len() >= FRAME_SAMPLES {
            let frame: Vec<i16> = self.partial.drain(..FRAME_SAMPLES).collect();
            let is_speech_frame = Self::rms(&frame) >= self.threshold;

            if is_speech_frame {
                self.silence_frame_count = 0;
                self.speech_frame_count += 1;

                if !self.in_speech.load(Ordering::Acquire) {
                    self.in_speech.store(true, Ordering::Release);
                    events.push(SpeechEvent::Start);
                }
                if self.speech_frame_count >= self.max_speech_frames {
                    events.push(SpeechEvent::End {
                        keep: self.speech_frame_count >= self.min_speech_frames,
                    });
                    self.in_speech.store(false, Ordering::Release);
                    self.speech_frame_count = 0;
                    self.silence_frame_count = 0;
                }
            } else if self.in_speech.load(Ordering::Acquire) {
                self.silence_frame_count += 1;
                if self.silence_frame_count >= self.trailing_silence_frames {
                    events.push(SpeechEvent::End {
                        keep: self.speech_frame_count >= self.min_speech_frames,
                    });
                    self.in_speech.store(false, Ordering::Release);
                    self.speech_frame_count = 0;
                    self.silence_frame_count = 0;
                }
            } else {
                self.speech_frame_count = 0;
            }
        }

        events
    }

    /// Reset to the idle state, discarding any buffered partial frame. Used
    /// after the start/end chimes play so the detector doesn't re-trigger on
    /// the chime's own audio.
    pub fn reset(&mut self) {
        self.partial.clear();
        self.in_speech.store(false, Ordering::Release);
        self.speech_frame_count = 0;
        self.silence_frame_count = 0;
    }
}

use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use crate::audio::wav;
use crate::coordinator::Event;
use crate::transcriber::TranscribeBackend;

/// A speech segment handed off to the transcription worker.
pub struct Job {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub use_wake_model: bool,
}

/// Runs on its own thread, pulling [`Job`]s off `jobs` one at a time so
/// transcription (which can take seconds) never blocks audio capture.
/// Exits when `jobs` is closed or yields `None`.
pub fn run(
    jobs: Receiver<Option<Job>>,
    events: Sender<Event>,
    transcriber: Box<dyn TranscribeBackend>,
) {
    loop {
        let job = match jobs.recv_timeout(Duration::from_secs(1)) {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let Some(tmp) = tempfile::Builder::new()
            .prefix("scribed-segment-")
            .suffix(".wav")
            .tempfile()
            .ok()
        else {
            tracing::warn!("failed to create temp file for segment, dropping it");
            continue;
        };
        let path = tmp.path().to_path_buf();

        if let Err(e) = wav::write_wav(&path, &job.samples, job.sample_rate) {
            tracing::warn!("failed to write segment wav: {e}");
            continue;
        }

        let duration_s = wav::duration_s(job.samples.len(), job.sample_rate);
        match transcriber.transcribe(&path, job.use_wake_model) {
            Ok(text) => {
                if events
                    .send(Event::TranscriptReady { text, duration_s })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("transcription failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcriber::TranscriberError;
    use std::path::Path;
    use std::sync::mpsc;

    struct FakeTranscriber {
        text: String,
    }

    impl TranscribeBackend for FakeTranscriber {
        fn transcribe(&self, _wav_path: &Path, _use_wake_model: bool) -> Result<String, TranscriberError> {
            Ok(self.text.clone())
        }
    }

    #[test]
    fn processes_job_and_emits_transcript_ready() {
        let (job_tx, job_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let transcriber: Box<dyn TranscribeBackend> = Box::new(FakeTranscriber {
            text: "hello".to_string(),
        });

        let handle = std::thread::spawn(move || run(job_rx, event_tx, transcriber));

        job_tx
            .send(Some(Job {
                samples: vec![0i16; 1600],
                sample_rate: 16000,
                use_wake_model: false,
            }))
            .unwrap();
        job_tx.send(None).unwrap();

        let event = event_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        match event {
            Event::TranscriptReady { text, duration_s } => {
                assert_eq!(text, "hello");
                assert_eq!(duration_s, 0.1);
            }
            _ => panic!("expected TranscriptReady"),
        }

        handle.join().unwrap();
    }
}

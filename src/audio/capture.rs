use std::io::Read;
use std::process::{Child, Command, Stdio};

use thiserror::Error;

/// Capture backends tried in order; PipeWire's `pw-record` is preferred over
/// `arecord` when both are present.
const BACKENDS: &[&str] = &["pw-record", "arecord"];

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture subprocess failed to start (tried {0:?})")]
    CaptureStartFailed(&'static [&'static str]),
    #[error("capture stream ended unexpectedly")]
    CaptureReadEnded,
}

/// A running microphone capture, abstracted behind a trait so the
/// coordinator and its tests can swap in a fake producing canned PCM.
pub trait Capture: Send {
    /// Read exactly `samples` 16-bit samples, or fewer at end of stream.
    /// Returns `Ok(None)` once the underlying stream is closed.
    fn read_chunk(&mut self, samples: usize) -> Result<Option<Vec<i16>>, CaptureError>;

    /// Stop capture. Idempotent.
    fn stop(&mut self);
}

fn build_args(backend: &str, device: &str, sample_rate: u32) -> Vec<String> {
    match backend {
        "pw-record" => vec![
            "--rate".into(),
            sample_rate.to_string(),
            "--channels".into(),
            "1".into(),
            "--format".into(),
            "s16".into(),
            "-".into(),
        ],
        "arecord" => {
            let mut args = vec![
                "-q".to_string(),
                "-f".into(),
                "S16_LE".into(),
                "-r".into(),
                sample_rate.to_string(),
                "-c".into(),
                "1".into(),
                "-t".into(),
                "raw".into(),
            ];
            if device != "auto" && device != "default" {
                args.push("-D".into());
                args.push(device.into());
            }
            args.push("-".into());
            args
        }
        _ => Vec::new(),
    }
}

/// Captures raw PCM from a subprocess (`pw-record`, falling back to
/// `arecord`) over its stdout pipe.
pub struct ProcessCapture {
    child: Child,
}

impl ProcessCapture {
    pub fn spawn(device: &str, sample_rate: u32) -> Result<Self, CaptureError> {
        for backend in BACKENDS {
            let args = build_args(backend, device, sample_rate);
            let spawned = Command::new(backend)
                .args(&args)
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .stdin(Stdio::null())
                .spawn();
            if let Ok(child) = spawned {
                return Ok(Self { child });
            }
        }
        Err(CaptureError::CaptureStartFailed(BACKENDS))
    }

    /// PID of the backend subprocess, so it can be killed by an external
    /// `kill` call without needing a lock on the `Child` itself.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Capture for ProcessCapture {
    fn read_chunk(&mut self, samples: usize) -> Result<Option<Vec<i16>>, CaptureError> {
        let stdout = self
            .child
            .stdout
            .as_mut()
            .ok_or(CaptureError::CaptureReadEnded)?;

        let mut buf = vec![0u8; samples * 2];
        let mut filled = 0;
        while filled < buf.len() {
            let n = stdout
                .read(&mut buf[filled..])
                .map_err(|_| CaptureError::CaptureReadEnded)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled - (filled % 2));
        let pcm = buf
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(Some(pcm))
    }

    fn stop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arecord_args_include_device_when_not_default() {
        let args = build_args("arecord", "hw:1,0", 16000);
        assert!(args.contains(&"-D".to_string()));
        assert!(args.contains(&"hw:1,0".to_string()));
    }

    #[test]
    fn arecord_args_omit_device_flag_when_auto() {
        let args = build_args("arecord", "auto", 16000);
        assert!(!args.contains(&"-D".to_string()));
    }

    #[test]
    fn pw_record_args_set_rate_and_format() {
        let args = build_args("pw-record", "auto", 16000);
        assert!(args.contains(&"16000".to_string()));
        assert!(args.contains(&"s16".to_string()));
    }
}

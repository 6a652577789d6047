use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;

use scribed::audio::capture::{Capture, ProcessCapture};
use scribed::cli::Cli;
use scribed::config::Config;
use scribed::coordinator::{Action, Coordinator, Event, State};
use scribed::injector::{InjectBackend, Injector};
use scribed::pid;
use scribed::sound::{ChimePlayer, SoundPlayer};
use scribed::transcriber::Transcriber;
use scribed::worker::{self, Job};

/// Sample rate the whole pipeline, and the `whisper-cli` models, operate at.
const SAMPLE_RATE: u32 = 16000;
/// Chunk size fed to the VAD per read, matching the reference app's 100ms
/// streaming granularity.
const CHUNK_SAMPLES: usize = SAMPLE_RATE as usize / 10;

enum Msg {
    Toggle,
    Audio(Vec<i16>),
    SilenceTimeout(u64),
    TranscriptReady { text: String, duration_s: f64 },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.toggle {
        return send_toggle();
    }

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let runtime_dir = Config::runtime_dir();
    std::fs::create_dir_all(&runtime_dir).ok();
    let pid_path = pid::pid_file_path(&runtime_dir);
    pid::write_pid_file(&pid_path)?;

    let result = run_daemon(config);

    pid::remove_pid_file(&pid_path).ok();
    result
}

/// Send SIGUSR1 to an already-running daemon (read from the PID file) and
/// exit. This is how `--toggle` starts/stops recording without a global
/// hotkey library: the invoking shell binds a key to `scribed --toggle`.
fn send_toggle() -> anyhow::Result<()> {
    let runtime_dir = Config::runtime_dir();
    let pid_path = pid::pid_file_path(&runtime_dir);
    let pid = pid::read_pid_file(&pid_path)
        .ok_or_else(|| anyhow::anyhow!("no running instance found at {}", pid_path.display()))?;

    let status = std::process::Command::new("kill")
        .args(["-SIGUSR1", &pid.to_string()])
        .status()?;
    if !status.success() {
        anyhow::bail!("failed to signal pid {pid}");
    }
    Ok(())
}

fn run_daemon(config: Config) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();
    let shutdown = Arc::new(AtomicBool::new(false));
    let starts_listening = config.mode.input_mode == scribed::config::InputMode::Listen;
    let shared_state = Arc::new(AtomicU8::new(encode_state(if starts_listening {
        State::Listening
    } else {
        State::Idle
    })));

    spawn_signal_handler(tx.clone(), shutdown.clone())?;

    let capture_pid: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));
    let audio_device = config.capture.audio_device.clone();
    if starts_listening {
        start_capture(tx.clone(), shutdown.clone(), capture_pid.clone(), audio_device.clone());
    }

    let (job_tx, job_rx) = mpsc::channel::<Option<Job>>();
    let transcribe_tx = tx.clone();
    let transcription_config = config.transcription.clone();
    let worker_handle = thread::spawn(move || {
        let (event_tx, event_rx) = mpsc::channel();
        let transcriber: Box<dyn scribed::transcriber::TranscribeBackend> =
            Box::new(Transcriber::new(transcription_config));
        let forwarder = thread::spawn(move || {
            while let Ok(event) = event_rx.recv() {
                if let Event::TranscriptReady { text, duration_s } = event {
                    if transcribe_tx.send(Msg::TranscriptReady { text, duration_s }).is_err() {
                        break;
                    }
                }
            }
        });
        worker::run(job_rx, event_tx, transcriber);
        let _ = forwarder.join();
    });

    let injector = Injector::new(config.display.clone());
    let sound = ChimePlayer::new(config.sound.clone());
    let mut coordinator = Coordinator::new(config);

    let tray_shutdown = shutdown.clone();
    let tray_state = shared_state.clone();
    thread::spawn(move || {
        if let Err(e) = scribed::tray::run_tray(tray_shutdown, tray_state) {
            tracing::debug!("tray icon unavailable: {e}");
        }
    });

    while !shutdown.load(Ordering::Acquire) {
        let msg = match rx.recv_timeout(std::time::Duration::from_millis(500)) {
            Ok(msg) => msg,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let event = match msg {
            Msg::Toggle => Event::Toggle,
            Msg::Audio(chunk) => Event::AudioChunk(chunk),
            Msg::SilenceTimeout(generation) => Event::SilenceTimeout(generation),
            Msg::TranscriptReady { text, duration_s } => Event::TranscriptReady { text, duration_s },
        };

        let actions = coordinator.handle(event);
        shared_state.store(encode_state(coordinator.state()), Ordering::Release);
        execute_actions(
            actions,
            &injector,
            &sound,
            &job_tx,
            tx.clone(),
            &shutdown,
            &capture_pid,
            &audio_device,
        );
    }

    let _ = job_tx.send(None);
    let _ = worker_handle.join();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn execute_actions(
    actions: Vec<Action>,
    injector: &Injector,
    sound: &ChimePlayer,
    job_tx: &Sender<Option<Job>>,
    msg_tx: Sender<Msg>,
    shutdown: &Arc<AtomicBool>,
    capture_pid: &Arc<Mutex<Option<u32>>>,
    audio_device: &str,
) {
    for action in actions {
        match action {
            Action::PlayStartChime => sound.play_start(),
            Action::PlayEndChime => sound.play_end(),
            Action::Inject(text) => {
                if let Err(e) = injector.inject_text(&text) {
                    tracing::warn!("injection failed: {e}");
                }
            }
            Action::SendKey(key) => {
                if let Err(e) = injector.send_key(&key) {
                    tracing::warn!("key press failed: {e}");
                }
            }
            Action::Transcribe { samples, use_wake_model } => {
                let _ = job_tx.send(Some(Job {
                    samples,
                    sample_rate: SAMPLE_RATE,
                    use_wake_model,
                }));
            }
            Action::ArmSilenceTimer { generation, after } => {
                let tx = msg_tx.clone();
                thread::spawn(move || {
                    thread::sleep(after);
                    let _ = tx.send(Msg::SilenceTimeout(generation));
                });
            }
            Action::CancelSilenceTimer => {}
            Action::SaveFocus => injector.save_focus(),
            Action::RestoreFocus => {
                if let Err(e) = injector.restore_focus() {
                    tracing::warn!("focus restore failed, injecting at current focus: {e}");
                }
            }
            Action::StartCapture => start_capture(
                msg_tx.clone(),
                shutdown.clone(),
                capture_pid.clone(),
                audio_device.to_string(),
            ),
            Action::StopCapture => stop_capture(capture_pid),
        }
    }
}

fn spawn_signal_handler(tx: Sender<Msg>, shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    let mut signals = Signals::new([SIGUSR1, SIGTERM, SIGINT])?;
    thread::spawn(move || {
        for signal in signals.forever() {
            match signal {
                SIGUSR1 => {
                    if tx.send(Msg::Toggle).is_err() {
                        break;
                    }
                }
                SIGTERM | SIGINT => {
                    shutdown.store(true, Ordering::Release);
                    break;
                }
                _ => {}
            }
        }
    });
    Ok(())
}

/// Spawns the capture subprocess for one recording session and a reader
/// thread that feeds chunks back to the main loop until told to stop. The
/// subprocess's PID is recorded in `capture_pid` rather than sharing the
/// `Child`/`ProcessCapture` itself, since the reader thread blocks on reads
/// against it: a shared lock would be held for the whole read, and
/// `StopCapture` would never be able to acquire it to kill the process.
/// Killing by PID from outside sidesteps that lock entirely.
fn start_capture(
    tx: Sender<Msg>,
    shutdown: Arc<AtomicBool>,
    capture_pid: Arc<Mutex<Option<u32>>>,
    device: String,
) {
    thread::spawn(move || {
        let mut capture = match ProcessCapture::spawn(&device, SAMPLE_RATE) {
            Ok(capture) => capture,
            Err(e) => {
                tracing::error!("CaptureStartFailed: {e}");
                return;
            }
        };
        *capture_pid.lock().unwrap() = Some(capture.pid());

        while !shutdown.load(Ordering::Acquire) {
            match capture.read_chunk(CHUNK_SAMPLES) {
                Ok(Some(chunk)) => {
                    if tx.send(Msg::Audio(chunk)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("CaptureReadEnded: {e}");
                    break;
                }
            }
        }
        capture.stop();
        *capture_pid.lock().unwrap() = None;
    });
}

/// Kills the capture subprocess started by [`start_capture`] by PID, rather
/// than through a shared `Child` handle. Idempotent: a PID of `None` (no
/// session running, or already stopped) is a no-op.
fn stop_capture(capture_pid: &Arc<Mutex<Option<u32>>>) {
    let pid = capture_pid.lock().unwrap().take();
    if let Some(pid) = pid {
        let _ = std::process::Command::new("kill")
            .args(["-KILL", &pid.to_string()])
            .status();
    }
}

fn encode_state(state: State) -> u8 {
    match state {
        State::Idle => 0,
        State::Recording => 1,
        State::Processing => 2,
        State::Listening => 3,
        State::Dictating => 4,
    }
}

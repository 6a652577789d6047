use std::cell::RefCell;
use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::config::{DisplayConfig, DisplayServer};

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("no injection backend succeeded for this display server")]
    InjectionFailed,
    #[error("failed to run {0}: {1}")]
    CommandFailed(&'static str, #[source] std::io::Error),
    #[error("could not query or restore window focus")]
    FocusLost,
}

/// Maps key names as used in config/commands to the name `ydotool key`
/// expects, where they differ from X11 keysym names.
fn ydotool_key_name(name: &str) -> &str {
    match name {
        "Return" => "Enter",
        "Escape" => "Esc",
        other => other,
    }
}

/// Injects text and key presses at the current cursor position. Implemented
/// by [`Injector`] for real X11/Wayland subprocess backends and by fakes in
/// tests.
pub trait InjectBackend: Send {
    fn inject_text(&self, text: &str) -> Result<(), InjectError>;
    fn send_key(&self, key: &str) -> Result<(), InjectError>;
    /// Remember whatever window currently has focus, so it can be restored
    /// before the eventual injection lands.
    fn save_focus(&self);
    /// Re-focus the window saved by [`save_focus`](Self::save_focus), if any.
    fn restore_focus(&self) -> Result<(), InjectError>;
}

/// Injects text and individual key presses at the current cursor position,
/// trying a chain of subprocess-based backends appropriate to the
/// configured display server and falling back when one fails.
pub struct Injector {
    display: DisplayConfig,
    focus: RefCell<FocusManager>,
}

impl Injector {
    pub fn new(display: DisplayConfig) -> Self {
        Self {
            display,
            focus: RefCell::new(FocusManager::new()),
        }
    }
}

impl InjectBackend for Injector {
    fn inject_text(&self, text: &str) -> Result<(), InjectError> {
        if text.is_empty() {
            return Ok(());
        }
        match self.display.display_server {
            DisplayServer::X11 => self.inject_x11(text),
            DisplayServer::Wayland => self.inject_wayland(text),
        }
    }

    fn send_key(&self, key: &str) -> Result<(), InjectError> {
        match self.display.display_server {
            DisplayServer::X11 => self.send_key_x11(key),
            DisplayServer::Wayland => self.send_key_wayland(key),
        }
    }

    fn save_focus(&self) {
        self.focus.borrow_mut().save_active_window();
    }

    fn restore_focus(&self) -> Result<(), InjectError> {
        self.focus.borrow_mut().restore_active_window()
    }
}

impl Injector {
    fn inject_x11(&self, text: &str) -> Result<(), InjectError> {
        if self.display.use_clipboard_fallback || !text.is_ascii() {
            return self.inject_clipboard_x11(text);
        }
        if run(
            "xdotool",
            &["type", "--clearmodifiers", "--", text],
        )
        .is_ok()
        {
            return Ok(());
        }
        self.inject_clipboard_x11(text)
    }

    fn inject_clipboard_x11(&self, text: &str) -> Result<(), InjectError> {
        pipe_stdin("xclip", &["-selection", "clipboard"], text)?;
        run("xdotool", &["key", "--clearmodifiers", &self.display.paste_keys])
    }

    fn inject_wayland(&self, text: &str) -> Result<(), InjectError> {
        if run("wtype", &["--", text]).is_ok() {
            return Ok(());
        }

        let clipboard_set = pipe_stdin("wl-copy", &[], text).is_ok()
            && pipe_stdin("wl-copy", &["--primary"], text).is_ok();
        if !clipboard_set {
            return self.inject_x11(text);
        }

        if run("ydotool", &["key", "--delay", "100", &self.display.paste_keys]).is_ok() {
            return Ok(());
        }
        run("xdotool", &["key", "--clearmodifiers", &self.display.paste_keys])
    }

    fn send_key_x11(&self, key: &str) -> Result<(), InjectError> {
        run("xdotool", &["key", "--clearmodifiers", key])
    }

    fn send_key_wayland(&self, key: &str) -> Result<(), InjectError> {
        let ydotool_key = ydotool_key_name(key);
        if run("ydotool", &["key", ydotool_key]).is_ok() {
            return Ok(());
        }
        run("xdotool", &["key", "--clearmodifiers", key])
    }
}

fn run(program: &'static str, args: &[&str]) -> Result<(), InjectError> {
    let status = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| InjectError::CommandFailed(program, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(InjectError::InjectionFailed)
    }
}

fn pipe_stdin(program: &'static str, args: &[&str], input: &str) -> Result<(), InjectError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| InjectError::CommandFailed(program, e))?;
    child
        .stdin
        .take()
        .expect("stdin was piped")
        .write_all(input.as_bytes())
        .map_err(|e| InjectError::CommandFailed(program, e))?;
    let status = child.wait().map_err(|e| InjectError::CommandFailed(program, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(InjectError::InjectionFailed)
    }
}

/// Saves and restores the previously focused window around an injection so
/// that transcription doesn't steal focus from wherever the user was
/// typing.
pub struct FocusManager {
    saved_window_id: Option<String>,
}

impl FocusManager {
    pub fn new() -> Self {
        Self {
            saved_window_id: None,
        }
    }

    pub fn save_active_window(&mut self) {
        let output = Command::new("xdotool").arg("getactivewindow").output();
        self.saved_window_id = output
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());
    }

    pub fn restore_active_window(&mut self) -> Result<(), InjectError> {
        if let Some(id) = self.saved_window_id.take() {
            run("xdotool", &["windowactivate", "--sync", &id]).map_err(|_| InjectError::FocusLost)?;
        }
        Ok(())
    }
}

impl Default for FocusManager {
    fn default() -> Self {
        Self::new()
    }
}

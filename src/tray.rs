//! Minimal status tray icon: shows the current daemon state (idle,
//! recording, listening, ...) and offers a quit item. Ambient UI only —
//! nothing here feeds back into the coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tray_icon::menu::{Menu, MenuEvent, MenuItem};
use tray_icon::TrayIconBuilder;

use crate::coordinator::State;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn state_label(state: State) -> &'static str {
    match state {
        State::Idle => "Idle",
        State::Recording => "Recording",
        State::Processing => "Transcribing",
        State::Listening => "Listening",
        State::Dictating => "Dictating",
    }
}

/// Runs the tray icon's event pump on the current thread until `shutdown` is
/// set. `current_state` is read each poll to refresh the status label.
pub fn run_tray(shutdown: Arc<AtomicBool>, current_state: Arc<std::sync::atomic::AtomicU8>) -> Result<()> {
    let menu = Menu::new();
    let status_item = MenuItem::new(state_label(State::Idle), false, None);
    let quit_item = MenuItem::new("Quit", true, None);
    menu.append(&status_item)?;
    menu.append(&quit_item)?;

    let _tray = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip("scribed")
        .build()?;

    let quit_id = quit_item.id().clone();
    let menu_channel = MenuEvent::receiver();

    let mut last_label = state_label(State::Idle);
    while !shutdown.load(Ordering::Acquire) {
        if let Ok(event) = menu_channel.try_recv() {
            if event.id == quit_id {
                shutdown.store(true, Ordering::Release);
                break;
            }
        }

        let state = decode_state(current_state.load(Ordering::Acquire));
        let label = state_label(state);
        if label != last_label {
            status_item.set_text(label);
            last_label = label;
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    Ok(())
}

fn decode_state(raw: u8) -> State {
    match raw {
        0 => State::Idle,
        1 => State::Recording,
        2 => State::Processing,
        3 => State::Listening,
        4 => State::Dictating,
        _ => State::Idle,
    }
}

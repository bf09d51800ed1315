//! Global toggle hotkey
//!
//! Parses the persisted "Control,Alt,B" hotkey form and listens for it on
//! raw keyboard devices, feeding toggle commands to the main loop over a
//! channel. Modifier state is read from the device at press time rather
//! than tracked from batched events.

use anyhow::{Context, Result};
use evdev::{AttributeSet, Device, EventType, InputEventKind, Key};
use std::fmt;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::constants::{input, paths, permissions};

/// Command sent from the listener threads to the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyCommand {
    ToggleBlocking,
}

/// A key plus modifier combination, persisted as "Control,Alt,B".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub key: Key,
}

impl Default for Hotkey {
    fn default() -> Self {
        Self {
            ctrl: true,
            alt: true,
            shift: false,
            key: Key::KEY_B,
        }
    }
}

impl Hotkey {
    /// Parse the comma-separated persisted form. Matching is
    /// case-insensitive and unknown tokens are skipped; a combination
    /// without a non-modifier key is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let mut ctrl = false;
        let mut alt = false;
        let mut shift = false;
        let mut key = None;
        for part in text.split(',') {
            let token = part.trim();
            if token.eq_ignore_ascii_case("control") || token.eq_ignore_ascii_case("ctrl") {
                ctrl = true;
            } else if token.eq_ignore_ascii_case("alt") {
                alt = true;
            } else if token.eq_ignore_ascii_case("shift") {
                shift = true;
            } else if let Some(parsed) = key_from_token(token) {
                key = Some(parsed);
            }
        }
        key.map(|key| Self {
            ctrl,
            alt,
            shift,
            key,
        })
    }

    /// Whether the device's current modifier state matches this hotkey
    /// exactly (extra modifiers held down do not trigger it).
    fn modifiers_match(&self, state: &AttributeSet<Key>) -> bool {
        let ctrl = state.contains(Key::KEY_LEFTCTRL) || state.contains(Key::KEY_RIGHTCTRL);
        let alt = state.contains(Key::KEY_LEFTALT) || state.contains(Key::KEY_RIGHTALT);
        let shift = state.contains(Key::KEY_LEFTSHIFT) || state.contains(Key::KEY_RIGHTSHIFT);
        ctrl == self.ctrl && alt == self.alt && shift == self.shift
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Control");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(key_token(self.key).unwrap_or("?"));
        write!(f, "{}", parts.join(","))
    }
}

/// Find all keyboard devices that can emit the hotkey's key
fn find_keyboard_devices(key: Key) -> Result<Vec<Device>> {
    info!(path = %paths::DEV_INPUT, "Scanning for keyboard devices...");

    let mut devices = Vec::new();

    for entry in std::fs::read_dir(paths::DEV_INPUT).context(format!(
        "Failed to read {} - are you in the '{}' group?",
        paths::DEV_INPUT,
        permissions::INPUT_GROUP
    ))? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(device) = Device::open(&path) {
            if let Some(keys) = device.supported_keys() {
                if keys.contains(key) {
                    info!(device_path = %path.display(), name = ?device.name(), "Found keyboard device");
                    devices.push(device);
                }
            }
        }
    }

    if devices.is_empty() {
        anyhow::bail!(
            "No keyboard device found. Ensure you're in '{}' group:\n\
             {}\n\
             Then log out and back in.",
            permissions::INPUT_GROUP,
            permissions::ADD_TO_INPUT_GROUP
        )
    }

    info!(count = devices.len(), "Listening on keyboard device(s)");

    Ok(devices)
}

/// Spawn background threads listening for the hotkey on all keyboard devices
pub fn spawn_listener(
    hotkey: Hotkey,
    sender: Sender<HotkeyCommand>,
) -> Result<Vec<thread::JoinHandle<()>>> {
    let devices = find_keyboard_devices(hotkey.key)?;
    let mut handles = Vec::new();

    for device in devices {
        let sender = sender.clone();
        let handle = thread::spawn(move || {
            info!(device = ?device.name(), "Hotkey listener started");
            if let Err(e) = listen_for_hotkey(device, hotkey, sender) {
                error!(error = %e, "Hotkey listener error");
            }
        });
        handles.push(handle);
    }

    Ok(handles)
}

/// Listen for the hotkey on a single device
fn listen_for_hotkey(
    mut device: Device,
    hotkey: Hotkey,
    sender: Sender<HotkeyCommand>,
) -> Result<()> {
    loop {
        // Fetch events (blocks until available)
        let events = device.fetch_events().context("Failed to fetch events")?;

        // Collect presses of the hotkey's key; the events iterator must be
        // finished with before the key state can be queried
        let mut presses = 0usize;

        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }

            if let InputEventKind::Key(key) = event.kind() {
                debug!(key = ?key, value = event.value(), "Key event");
                if key == hotkey.key && event.value() == input::KEY_PRESS {
                    presses += 1;
                }
            }
        }

        for _ in 0..presses {
            // Check the real modifier state at press time to avoid races
            // from batched events
            let key_state = device
                .get_key_state()
                .context("Failed to get keyboard state")?;

            if hotkey.modifiers_match(&key_state) {
                info!(hotkey = %hotkey, "Hotkey pressed, sending toggle command");
                sender
                    .send(HotkeyCommand::ToggleBlocking)
                    .context("Failed to send toggle command")?;
            }
        }
    }
}

/// Check if hotkeys are available (user has input group permissions)
pub fn check_permissions() -> bool {
    std::fs::read_dir(paths::DEV_INPUT).is_ok()
}

/// Print helpful error message if permissions missing
pub fn print_permission_error() {
    error!(path = %paths::DEV_INPUT, "Cannot access input devices");
    error!(group = %permissions::INPUT_GROUP, "Hotkeys require group membership");
    error!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group");
    error!("  Then log out and back in");
    warn!(continuing = true, "Continuing without hotkey support...");
}

fn key_from_token(token: &str) -> Option<Key> {
    let token = token.to_ascii_uppercase();
    let key = match token.as_str() {
        "A" => Key::KEY_A,
        "B" => Key::KEY_B,
        "C" => Key::KEY_C,
        "D" => Key::KEY_D,
        "E" => Key::KEY_E,
        "F" => Key::KEY_F,
        "G" => Key::KEY_G,
        "H" => Key::KEY_H,
        "I" => Key::KEY_I,
        "J" => Key::KEY_J,
        "K" => Key::KEY_K,
        "L" => Key::KEY_L,
        "M" => Key::KEY_M,
        "N" => Key::KEY_N,
        "O" => Key::KEY_O,
        "P" => Key::KEY_P,
        "Q" => Key::KEY_Q,
        "R" => Key::KEY_R,
        "S" => Key::KEY_S,
        "T" => Key::KEY_T,
        "U" => Key::KEY_U,
        "V" => Key::KEY_V,
        "W" => Key::KEY_W,
        "X" => Key::KEY_X,
        "Y" => Key::KEY_Y,
        "Z" => Key::KEY_Z,
        "0" => Key::KEY_0,
        "1" => Key::KEY_1,
        "2" => Key::KEY_2,
        "3" => Key::KEY_3,
        "4" => Key::KEY_4,
        "5" => Key::KEY_5,
        "6" => Key::KEY_6,
        "7" => Key::KEY_7,
        "8" => Key::KEY_8,
        "9" => Key::KEY_9,
        "F1" => Key::KEY_F1,
        "F2" => Key::KEY_F2,
        "F3" => Key::KEY_F3,
        "F4" => Key::KEY_F4,
        "F5" => Key::KEY_F5,
        "F6" => Key::KEY_F6,
        "F7" => Key::KEY_F7,
        "F8" => Key::KEY_F8,
        "F9" => Key::KEY_F9,
        "F10" => Key::KEY_F10,
        "F11" => Key::KEY_F11,
        "F12" => Key::KEY_F12,
        _ => return None,
    };
    Some(key)
}

fn key_token(key: Key) -> Option<&'static str> {
    let token = match key {
        Key::KEY_A => "A",
        Key::KEY_B => "B",
        Key::KEY_C => "C",
        Key::KEY_D => "D",
        Key::KEY_E => "E",
        Key::KEY_F => "F",
        Key::KEY_G => "G",
        Key::KEY_H => "H",
        Key::KEY_I => "I",
        Key::KEY_J => "J",
        Key::KEY_K => "K",
        Key::KEY_L => "L",
        Key::KEY_M => "M",
        Key::KEY_N => "N",
        Key::KEY_O => "O",
        Key::KEY_P => "P",
        Key::KEY_Q => "Q",
        Key::KEY_R => "R",
        Key::KEY_S => "S",
        Key::KEY_T => "T",
        Key::KEY_U => "U",
        Key::KEY_V => "V",
        Key::KEY_W => "W",
        Key::KEY_X => "X",
        Key::KEY_Y => "Y",
        Key::KEY_Z => "Z",
        Key::KEY_0 => "0",
        Key::KEY_1 => "1",
        Key::KEY_2 => "2",
        Key::KEY_3 => "3",
        Key::KEY_4 => "4",
        Key::KEY_5 => "5",
        Key::KEY_6 => "6",
        Key::KEY_7 => "7",
        Key::KEY_8 => "8",
        Key::KEY_9 => "9",
        Key::KEY_F1 => "F1",
        Key::KEY_F2 => "F2",
        Key::KEY_F3 => "F3",
        Key::KEY_F4 => "F4",
        Key::KEY_F5 => "F5",
        Key::KEY_F6 => "F6",
        Key::KEY_F7 => "F7",
        Key::KEY_F8 => "F8",
        Key::KEY_F9 => "F9",
        Key::KEY_F10 => "F10",
        Key::KEY_F11 => "F11",
        Key::KEY_F12 => "F12",
        _ => return None,
    };
    Some(token)
}

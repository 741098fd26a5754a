// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::thread;

use evdev::{InputEventKind, Key};
use tokio::task::JoinHandle;
use tracing::{error, info, span, warn, Level};

use super::{InputHooks, KeyDirection, KeyEvent};

const KEY_UP: i32 = 0;
const KEY_DOWN: i32 = 1;

/// A driver that listens to every keyboard under /dev/input, regardless of
/// which window has focus. The user needs read access to the devices
/// (usually membership in the "input" group).
pub struct Driver {
    devices: Vec<PathBuf>,
}

impl Driver {
    /// Finds the keyboards to listen to.
    pub fn new() -> Result<Driver, Box<dyn Error>> {
        let devices: Vec<PathBuf> = evdev::enumerate()
            .filter(|(_, device)| {
                device
                    .supported_keys()
                    .is_some_and(|keys| keys.contains(Key::KEY_A) && keys.contains(Key::KEY_ENTER))
            })
            .map(|(path, _)| path)
            .collect();

        if devices.is_empty() {
            return Err("no readable keyboards found under /dev/input".into());
        }
        info!(keyboards = devices.len(), "Found keyboards");
        Ok(Driver { devices })
    }

    /// Reads one keyboard until it goes away.
    fn monitor_device(path: PathBuf, hooks: InputHooks) -> Result<(), io::Error> {
        let mut device = evdev::Device::open(&path)?;
        info!(
            path = ?path,
            name = device.name().unwrap_or("unknown"),
            "Listening to keyboard"
        );

        loop {
            for event in device.fetch_events()? {
                let InputEventKind::Key(key) = event.kind() else {
                    continue;
                };
                let direction = match event.value() {
                    KEY_DOWN => KeyDirection::Down,
                    KEY_UP => KeyDirection::Up,
                    // Auto-repeat.
                    _ => continue,
                };
                if let Some(name) = key_name(&format!("{:?}", key)) {
                    hooks.publish(KeyEvent::new(&name, direction));
                }
            }
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, hooks: InputHooks) -> JoinHandle<Result<(), io::Error>> {
        let devices = self.devices.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "evdev driver");
            let _enter = span.enter();

            let handles: Vec<thread::JoinHandle<()>> = devices
                .into_iter()
                .map(|path| {
                    let hooks = hooks.clone();
                    thread::spawn(move || {
                        if let Err(e) = Self::monitor_device(path.clone(), hooks) {
                            warn!(path = ?path, err = %e, "Keyboard stopped");
                        }
                    })
                })
                .collect();

            for handle in handles {
                if handle.join().is_err() {
                    error!("Keyboard thread panicked");
                }
            }
            info!("All keyboards closed.");
            hooks.close();
            Ok(())
        })
    }
}

/// Maps a kernel key code name (e.g. "KEY_LEFTCTRL") to the key name used in
/// shortcuts. Modifiers lose their side, so left and right ctrl are both "ctrl".
fn key_name(code: &str) -> Option<String> {
    let name = code.strip_prefix("KEY_")?;
    let mapped = match name {
        "LEFTCTRL" | "RIGHTCTRL" => "ctrl",
        "LEFTSHIFT" | "RIGHTSHIFT" => "shift",
        "LEFTALT" => "alt",
        "RIGHTALT" => "alt_gr",
        "LEFTMETA" | "RIGHTMETA" => "windows",
        "ESC" => "esc",
        "ENTER" | "KPENTER" => "enter",
        "SPACE" => "space",
        "BACKSPACE" => "backspace",
        "CAPSLOCK" => "caps_lock",
        "PAGEUP" => "page_up",
        "PAGEDOWN" => "page_down",
        "MINUS" => "-",
        "EQUAL" => "=",
        "COMMA" => ",",
        "DOT" => ".",
        "SLASH" => "/",
        "SEMICOLON" => ";",
        "APOSTROPHE" => "'",
        "GRAVE" => "`",
        "LEFTBRACE" => "[",
        "RIGHTBRACE" => "]",
        "BACKSLASH" => "\\",
        other => return Some(other.to_string()),
    };
    Some(mapped.to_string())
}

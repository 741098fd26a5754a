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
use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::shortcut::normalize_key;

#[cfg(target_os = "linux")]
pub mod evdev;
pub mod keyboard;

/// Whether a key went down or came up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// A single key transition from the keyboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    key: String,
    direction: KeyDirection,
}

impl KeyEvent {
    /// Creates a new key event, normalizing the key name.
    pub fn new(key: &str, direction: KeyDirection) -> KeyEvent {
        KeyEvent {
            key: normalize_key(key),
            direction,
        }
    }

    pub fn down(key: &str) -> KeyEvent {
        KeyEvent::new(key, KeyDirection::Down)
    }

    pub fn up(key: &str) -> KeyEvent {
        KeyEvent::new(key, KeyDirection::Up)
    }

    /// The normalized key name.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn direction(&self) -> KeyDirection {
        self.direction
    }

    pub fn is_down(&self) -> bool {
        self.direction == KeyDirection::Down
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            KeyDirection::Down => write!(f, "+{}", self.key),
            KeyDirection::Up => write!(f, "-{}", self.key),
        }
    }
}

struct Installed {
    id: u64,
    sender: Sender<KeyEvent>,
}

struct Hooks {
    next_id: u64,
    installed: Vec<Installed>,
}

/// Fans key events out to every installed hook. Cloning shares the same set of hooks.
#[derive(Clone)]
pub struct InputHooks {
    hooks: Arc<Mutex<Hooks>>,
}

impl InputHooks {
    pub fn new() -> InputHooks {
        InputHooks {
            hooks: Arc::new(Mutex::new(Hooks {
                next_id: 1,
                installed: Vec::new(),
            })),
        }
    }

    /// Installs a new hook that receives every event published from now on.
    pub fn install(&self) -> Hook {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut hooks = self.hooks.lock();
        let id = hooks.next_id;
        hooks.next_id += 1;
        hooks.installed.push(Installed { id, sender });
        debug!(hook = id, "Hook installed");

        Hook {
            id,
            receiver,
            hooks: self.clone(),
        }
    }

    /// Removes the hook with the given ID. Removing an unknown hook does nothing.
    pub fn uninstall(&self, id: u64) {
        let mut hooks = self.hooks.lock();
        let before = hooks.installed.len();
        hooks.installed.retain(|installed| installed.id != id);
        if hooks.installed.len() != before {
            debug!(hook = id, "Hook uninstalled");
        }
    }

    /// Sends the event to every installed hook.
    pub fn publish(&self, event: KeyEvent) {
        let hooks = self.hooks.lock();
        for installed in hooks.installed.iter() {
            // A hook whose receiver is gone is removed when it is dropped.
            let _ = installed.sender.send(event.clone());
        }
    }

    /// Removes every hook. Receivers see a disconnected channel once drained.
    pub fn close(&self) {
        let mut hooks = self.hooks.lock();
        if !hooks.installed.is_empty() {
            info!(hooks = hooks.installed.len(), "Closing input hooks");
        }
        hooks.installed.clear();
    }

    /// The number of installed hooks.
    pub fn len(&self) -> usize {
        self.hooks.lock().installed.len()
    }
}

impl Default for InputHooks {
    fn default() -> Self {
        InputHooks::new()
    }
}

/// One installed listener. Dropping it uninstalls it.
pub struct Hook {
    id: u64,
    receiver: Receiver<KeyEvent>,
    hooks: InputHooks,
}

impl Hook {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The receiving end of the hook, for use with select!.
    pub fn receiver(&self) -> &Receiver<KeyEvent> {
        &self.receiver
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        self.hooks.uninstall(self.id);
    }
}

/// The set of keys currently held down. Events only count while started.
#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<String>,
    running: bool,
}

impl InputState {
    /// Creates a stopped input state.
    pub fn new() -> InputState {
        InputState::default()
    }

    /// Starts tracking keys from an empty set.
    pub fn start(&mut self) {
        self.held.clear();
        self.running = true;
        debug!("Input state started");
    }

    /// Stops tracking keys and forgets anything held.
    pub fn stop(&mut self) {
        self.held.clear();
        self.running = false;
        debug!("Input state stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Records the event. Returns false if it should be ignored: a key-down for a
    /// key already held (auto-repeat), or any event while stopped. Key-ups always
    /// count, even for keys that were never seen going down.
    pub fn apply(&mut self, event: &KeyEvent) -> bool {
        if !self.running {
            return false;
        }
        match event.direction() {
            KeyDirection::Down => self.held.insert(event.key().to_string()),
            KeyDirection::Up => {
                self.held.remove(event.key());
                true
            }
        }
    }

    /// The keys currently held.
    pub fn held(&self) -> &HashSet<String> {
        &self.held
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(key)
    }
}

/// Tracks which keys went down during one input session. A release passes only
/// for a key pressed since the session began, so a key still held from before
/// (such as the Enter that launched the program) can't end it.
#[derive(Debug, Default)]
pub struct SessionFilter {
    pressed: HashSet<String>,
}

impl SessionFilter {
    pub fn new() -> SessionFilter {
        SessionFilter::default()
    }

    /// Returns true if the event belongs to the session.
    pub fn accept(&mut self, event: &KeyEvent) -> bool {
        match event.direction() {
            KeyDirection::Down => {
                self.pressed.insert(event.key().to_string());
                true
            }
            KeyDirection::Up => self.pressed.remove(event.key()),
        }
    }
}

/// Passes events from the source hook on to the target through a
/// [`SessionFilter`]. Once the source closes, the target is closed too.
pub fn forward_session(source: Hook, target: InputHooks) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut filter = SessionFilter::new();
        for event in source.receiver().iter() {
            if filter.accept(&event) {
                target.publish(event);
            } else {
                debug!(event = %event, "Dropping release from before the session");
            }
        }
        target.close();
    })
}

/// Produces key events from some source.
pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, hooks: InputHooks) -> JoinHandle<Result<(), io::Error>>;
}

/// The available key event sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverKind {
    /// Lines on standard input.
    Stdin,
    /// Keyboards under /dev/input.
    Evdev,
}

impl FromStr for DriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdin" => Ok(DriverKind::Stdin),
            "evdev" => Ok(DriverKind::Evdev),
            _ => Err(format!("unknown input driver '{}' (expected stdin or evdev)", s)),
        }
    }
}

/// Creates the driver of the given kind.
pub fn driver(kind: DriverKind) -> Result<Arc<dyn Driver>, Box<dyn Error>> {
    match kind {
        DriverKind::Stdin => Ok(Arc::new(keyboard::Driver::new())),
        #[cfg(target_os = "linux")]
        DriverKind::Evdev => Ok(Arc::new(evdev::Driver::new()?)),
        #[cfg(not(target_os = "linux"))]
        DriverKind::Evdev => Err("the evdev driver is only available on Linux".into()),
    }
}

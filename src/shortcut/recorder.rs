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

//! Captures a chord from the keyboard. A capture session collects keys as they
//! go down and finishes as soon as any key comes up, so "hold ctrl, press A,
//! let go" records "ctrl+A". Pressing escape clears the binding.

use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info};

use super::Chord;
use crate::input::{Hook, InputHooks, KeyDirection, KeyEvent};

const CANCEL_KEY: &str = "esc";

/// What a key event did to a capture session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The recorder is not capturing; the event was ignored.
    Ignored,
    /// A key was added. Holds the chord so far, for live display.
    Updated(Chord),
    /// Capture finished with the given chord.
    Finished(Chord),
    /// Capture was cancelled with escape; the binding should be cleared.
    Cleared,
}

enum State {
    Idle,
    Capturing { keys: Chord, hook: Option<Hook> },
}

/// A shortcut capture session, one per bindable action.
pub struct ShortcutRecorder {
    state: State,
    /// The last chord this recorder produced.
    current: Chord,
}

impl ShortcutRecorder {
    /// Creates an idle recorder holding the given binding.
    pub fn new(current: Chord) -> ShortcutRecorder {
        ShortcutRecorder {
            state: State::Idle,
            current,
        }
    }

    /// Starts capturing with a hook of its own on the given input. Restarting an
    /// active capture discards the keys collected so far.
    pub fn start_capture(&mut self, hooks: &InputHooks) {
        self.begin(Some(hooks.install()));
    }

    fn begin(&mut self, hook: Option<Hook>) {
        debug!("Shortcut capture started");
        self.state = State::Capturing {
            keys: Chord::default(),
            hook,
        };
    }

    /// Abandons the capture without changing the binding.
    pub fn stop_capture(&mut self) {
        // Dropping the hook uninstalls it.
        self.state = State::Idle;
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, State::Capturing { .. })
    }

    /// The binding as of the last finished capture.
    pub fn current(&self) -> &Chord {
        &self.current
    }

    /// Feeds one key event into the session.
    pub fn handle_event(&mut self, event: &KeyEvent) -> RecordOutcome {
        let State::Capturing { keys, .. } = &mut self.state else {
            return RecordOutcome::Ignored;
        };

        match event.direction() {
            KeyDirection::Down if event.key() == CANCEL_KEY => {
                self.current = Chord::default();
                self.stop_capture();
                info!("Shortcut cleared");
                RecordOutcome::Cleared
            }
            KeyDirection::Down => {
                keys.push(event.key());
                RecordOutcome::Updated(keys.clone())
            }
            KeyDirection::Up => {
                let keys = std::mem::take(keys);
                self.stop_capture();
                if !keys.is_empty() {
                    self.current = keys.clone();
                }
                info!(shortcut = %keys, "Shortcut captured");
                RecordOutcome::Finished(keys)
            }
        }
    }

    /// Blocks on the session's own hook until the capture finishes or is cleared.
    /// Returns None if no key arrives within the timeout or the input closes.
    pub fn wait(&mut self, timeout: Duration) -> Option<RecordOutcome> {
        loop {
            let event = match &self.state {
                State::Capturing {
                    hook: Some(hook), ..
                } => match hook.receiver().recv_timeout(timeout) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                        self.stop_capture();
                        return None;
                    }
                },
                _ => return None,
            };

            match self.handle_event(&event) {
                outcome @ (RecordOutcome::Finished(_) | RecordOutcome::Cleared) => {
                    return Some(outcome)
                }
                RecordOutcome::Updated(keys) => debug!(shortcut = %keys, "Capturing"),
                RecordOutcome::Ignored => {}
            }
        }
    }
}

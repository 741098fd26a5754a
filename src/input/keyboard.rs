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
use std::io;

use tokio::task::JoinHandle;
use tracing::{info, span, warn, Level};

use super::{InputHooks, KeyEvent};

const DOWN: &str = "down";
const UP: &str = "up";
const TAP: &str = "tap";

/// A driver that reads key transitions from standard input, one per line:
/// "down ctrl", "up ctrl", "tap A", or the short forms "+ctrl" and "-ctrl".
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses one line into the events it describes.
    fn parse_line(line: &str) -> Option<Vec<KeyEvent>> {
        let line = line.trim();
        if let Some(key) = line.strip_prefix('+').filter(|key| !key.is_empty()) {
            return Some(vec![KeyEvent::down(key)]);
        }
        if let Some(key) = line.strip_prefix('-').filter(|key| !key.is_empty()) {
            return Some(vec![KeyEvent::up(key)]);
        }

        let (command, key) = line.split_once(char::is_whitespace)?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        match command.to_lowercase().as_str() {
            DOWN => Some(vec![KeyEvent::down(key)]),
            UP => Some(vec![KeyEvent::up(key)]),
            TAP => Some(vec![KeyEvent::down(key), KeyEvent::up(key)]),
            _ => None,
        }
    }

    /// Publishes events from the reader until it reaches end of input.
    fn monitor_io<R>(hooks: &InputHooks, mut reader: R) -> Result<(), io::Error>
    where
        R: io::BufRead,
    {
        let mut input = String::default();
        loop {
            input.clear();
            if reader.read_line(&mut input)? == 0 {
                return Ok(());
            }
            if input.trim().is_empty() {
                continue;
            }

            match Self::parse_line(&input) {
                Some(events) => events.into_iter().for_each(|event| hooks.publish(event)),
                None => warn!(input = input.trim(), "Unrecognized input"),
            }
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, hooks: InputHooks) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "stdin driver");
            let _enter = span.enter();

            info!("Stdin driver started.");
            let result = Self::monitor_io(&hooks, io::stdin().lock());
            info!("Stdin closed.");
            // No more input will arrive, so let the listeners finish.
            hooks.close();
            result
        })
    }
}

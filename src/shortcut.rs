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
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod recorder;

pub use recorder::{RecordOutcome, ShortcutRecorder};

/// Separates chord members in the serialized form.
const SEPARATOR: char = '+';

/// Normalizes a key name. Single characters are upper-cased ("a" and "A" are
/// the same key); named keys are lower-cased ("ctrl" and "CTRL" are the same
/// key). Spaces become underscores in both.
pub fn normalize_key(key: &str) -> String {
    let key = key.replace(' ', "_");
    if key.chars().count() == 1 {
        key.to_uppercase()
    } else {
        key.to_lowercase()
    }
}

/// A set of keys that must be held together. Members keep the order they were
/// captured in for display, but two chords with the same members are equal.
#[derive(Clone, Debug, Default)]
pub struct Chord {
    keys: Vec<String>,
}

impl Chord {
    /// Creates a chord from key names, normalizing them and dropping duplicates.
    pub fn new<I, S>(keys: I) -> Chord
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut chord = Chord::default();
        keys.into_iter().for_each(|key| {
            chord.push(key.as_ref());
        });
        chord
    }

    /// Parses the "KEY1+KEY2" form. Empty members are ignored, so "" is the
    /// empty (unbound) chord.
    pub fn parse(shortcut: &str) -> Chord {
        Chord::new(
            shortcut
                .split(SEPARATOR)
                .map(str::trim)
                .filter(|key| !key.is_empty()),
        )
    }

    /// Appends a key. Returns false if the key was already a member.
    pub fn push(&mut self, key: &str) -> bool {
        let key = normalize_key(key);
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// The members in capture order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether the (already normalized) key is a member.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|member| member == key)
    }

    /// True when the chord is bound and every member is held.
    pub fn is_satisfied_by(&self, held: &HashSet<String>) -> bool {
        !self.is_empty() && self.keys.iter().all(|key| held.contains(key))
    }
}

impl PartialEq for Chord {
    fn eq(&self, other: &Self) -> bool {
        self.keys.len() == other.keys.len() && self.keys.iter().all(|key| other.contains(key))
    }
}

impl Eq for Chord {}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join("+"))
    }
}

impl From<&str> for Chord {
    fn from(shortcut: &str) -> Self {
        Chord::parse(shortcut)
    }
}

impl Serialize for Chord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Chord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let shortcut = String::deserialize(deserializer)?;
        Ok(Chord::parse(&shortcut))
    }
}

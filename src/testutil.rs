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
use std::{
    error::Error,
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::TempDir;

use crate::audio::ChannelMixer;
use crate::pool::AudioChannelPool;

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes interleaved 32 bit float samples to a wav file.
pub fn write_wav(
    path: &Path,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// A mixer with no output device plus a directory of generated sounds.
pub struct TestBoard {
    pub mixer: Arc<ChannelMixer>,
    pub pool: AudioChannelPool,
    dir: TempDir,
}

impl TestBoard {
    /// Creates a mono 44.1kHz mixer with the default channel capacity.
    pub fn new() -> Result<TestBoard, Box<dyn Error>> {
        let mixer = Arc::new(ChannelMixer::new(1, 44100));
        let pool = AudioChannelPool::new(mixer.clone());
        Ok(TestBoard {
            mixer,
            pool,
            dir: tempfile::tempdir()?,
        })
    }

    /// Writes a constant mono sound of the given length and returns its path.
    pub fn sound(&self, name: &str, frames: usize) -> Result<PathBuf, Box<dyn Error>> {
        let path = self.dir.path().join(format!("{}.wav", name));
        write_wav(&path, &vec![0.25; frames], 1, 44100)?;
        Ok(path)
    }

    /// A path inside the board's directory that does not exist.
    pub fn missing(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

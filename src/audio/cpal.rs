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
use std::{error::Error, fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, Level};

use super::thread_priority::{callback_thread_priority, configure_audio_thread_priority};
use super::{ChannelMixer, DeviceError};
use crate::config;

/// An output device that continuously drains the channel mixer through a cpal stream.
pub struct Device {
    /// The name of the device.
    name: String,
    /// Dropping or signalling this ends the output thread.
    shutdown_tx: Option<Sender<()>>,
    /// The thread that owns the cpal stream.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl Device {
    /// Opens the named output device ("default" for the host default) and starts
    /// pulling audio from the mixer.
    pub fn open(
        name: &str,
        config: &config::Audio,
        mixer: Arc<ChannelMixer>,
    ) -> Result<Device, DeviceError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<String, DeviceError>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let device_name = name.to_string();
        let buffer_size = config.buffer_size();

        // The stream isn't Send on every platform, so it lives entirely on its own thread.
        let output_thread = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output");
            let _enter = span.enter();

            let stream = match build_stream(&device_name, buffer_size, mixer) {
                Ok((stream, resolved_name)) => match stream.play() {
                    Ok(()) => {
                        let _ = ready_tx.send(Ok(resolved_name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(DeviceError::Stream(e.to_string())));
                        return;
                    }
                },
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            wait_for_shutdown(shutdown_rx);
            drop(stream);
            info!("Output stream closed");
        });

        let resolved_name = ready_rx
            .recv()
            .map_err(|_| DeviceError::Stream("output thread exited early".to_string()))??;

        Ok(Device {
            name: resolved_name,
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }
}

fn wait_for_shutdown(shutdown_rx: Receiver<()>) {
    // Either an explicit signal or the sender being dropped ends the wait.
    let _ = shutdown_rx.recv();
}

/// Finds the output device with the given name across every available host.
fn find_device(name: &str) -> Result<cpal::Device, DeviceError> {
    if name == config::DEFAULT_DEVICE {
        return cpal::default_host()
            .default_output_device()
            .ok_or(DeviceError::NoDefault);
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        let Ok(devices) = host.output_devices() else {
            continue;
        };
        for device in devices {
            if device.name().is_ok_and(|device_name| device_name == name) {
                return Ok(device);
            }
        }
    }

    Err(DeviceError::NotFound(name.to_string()))
}

fn build_stream(
    name: &str,
    buffer_size: u32,
    mixer: Arc<ChannelMixer>,
) -> Result<(cpal::Stream, String), DeviceError> {
    let device = find_device(name)?;
    let resolved_name = device.name().unwrap_or_else(|_| name.to_string());
    let sample_format = device
        .default_output_config()
        .map_err(|e| DeviceError::Stream(e.to_string()))?
        .sample_format();

    let stream_config = cpal::StreamConfig {
        channels: mixer.num_channels(),
        sample_rate: cpal::SampleRate(mixer.sample_rate()),
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_typed_stream::<f32>(&device, &stream_config, mixer),
        cpal::SampleFormat::I16 => build_typed_stream::<i16>(&device, &stream_config, mixer),
        cpal::SampleFormat::I32 => build_typed_stream::<i32>(&device, &stream_config, mixer),
        cpal::SampleFormat::U16 => build_typed_stream::<u16>(&device, &stream_config, mixer),
        other => {
            return Err(DeviceError::Stream(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }?;

    info!(
        device = resolved_name,
        format = ?sample_format,
        channels = stream_config.channels,
        buffer_size,
        "Output stream built"
    );
    Ok((stream, resolved_name))
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mixer: Arc<ChannelMixer>,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut callback = create_callback::<T>(mixer);
    device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], info: &cpal::OutputCallbackInfo| callback(data, info),
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))
}

/// Mixes into a scratch buffer and converts into the device's sample type.
fn create_callback<T>(
    mixer: Arc<ChannelMixer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = callback_thread_priority();
    let mut priority_set = false;
    let channels = mixer.num_channels() as usize;
    let mut scratch: Vec<f32> = Vec::new();

    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, &mut priority_set);

        scratch.resize(data.len(), 0.0);
        mixer.process_into_output(&mut scratch, data.len() / channels);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl super::Device for Device {
    fn close(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(output_thread) = self.output_thread.take() {
            if output_thread.join().is_err() {
                error!(device = self.name, "Audio output thread panicked");
            }
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        super::Device::close(self);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Lists output devices across every cpal host.
pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
    // Suppress noisy backend output while probing.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|output_config| output_config.channels())
                .max()
                .unwrap_or(0);

            if max_channels > 0 {
                devices.push(format!(
                    "{} (Channels={}) ({})",
                    device.name()?,
                    max_channels,
                    host_id.name()
                ));
            }
        }
    }

    devices.sort();
    Ok(devices)
}

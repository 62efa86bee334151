//! CPAL capture session
//!
//! Runs a [`StreamProcessor`] on a live multichannel input stream and,
//! optionally, plays the steered signal on a monitor output.
//!
//! # Architecture
//!
//! ```text
//!                    ┌───────────────────────┐
//!   Array input ────►│   Input Stream        │
//!                    │  BlockAssembler       │  device buffers -> fixed blocks
//!                    │  StreamProcessor      │  owns delay lines + recordings
//!                    └───────────┬───────────┘
//!                                │
//!                    ┌───────────▼───────────┐
//!                    │  Monitor Sample Queue │  <── lock-free ring buffer
//!                    │  (SPSC, 4 blocks)     │      input produces, output consumes
//!                    └───────────┬───────────┘
//!                                │
//!                    ┌───────────▼───────────┐
//!                    │    Output Stream      │  <── reads from queue only
//!                    │  (independent thread) │      silence on underrun
//!                    └───────────────────────┘
//! ```
//!
//! The processor sits behind a mutex that only the input callback locks while
//! the session runs; [`SessionHandle::finish`] takes it after both streams are
//! stopped. A fatal processing error is published through an atomic flag so
//! the controlling thread can stop waiting early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, BufferSize};
use super::device::{resolve_device, supported_configs, Direction};
use super::error::{AudioError, AudioResult};
use crate::error::BeamformError;
use crate::recording::Recordings;
use crate::stream::{BlockAssembler, StreamProcessor, StreamSettings};
use crate::types::{StereoBuffer, StereoSample};

/// How often [`SessionHandle::wait`] checks for a failed callback
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Monitor queue capacity, in processing blocks
const MONITOR_QUEUE_BLOCKS: usize = 4;

/// State owned by the input callback
struct CaptureState {
    processor: StreamProcessor,
    assembler: BlockAssembler,
    /// Pre-allocated stereo block
    output: StereoBuffer,
    monitor: Option<rtrb::Producer<StereoSample>>,
    /// First error raised in the callback
    error: Option<BeamformError>,
}

impl CaptureState {
    /// Feed one device buffer through the processor
    fn capture(&mut self, data: &[f32]) -> Result<(), BeamformError> {
        let Self {
            processor,
            assembler,
            output,
            monitor,
            ..
        } = self;

        assembler.push_interleaved(data, |block| {
            processor.process_block(block, output)?;
            if let Some(producer) = monitor.as_mut() {
                for sample in output.iter() {
                    // Monitor is behind: drop the rest rather than block
                    if producer.push(*sample).is_err() {
                        break;
                    }
                }
            }
            Ok(())
        })
    }

    /// Hand over the recordings, together with the callback error if any
    fn take_result(&mut self) -> AudioResult<Recordings> {
        let recordings = self.processor.take_recordings();
        match self.error.take() {
            Some(error) => Err(AudioError::SessionAborted { error, recordings }),
            None => Ok(recordings),
        }
    }
}

/// A running capture session
///
/// Keeps the streams alive. Dropping the handle stops audio; call
/// [`SessionHandle::finish`] to get the recordings.
pub struct SessionHandle {
    input_stream: Stream,
    output_stream: Option<Stream>,
    state: Arc<Mutex<CaptureState>>,
    failed: Arc<AtomicBool>,
    sample_rate: u32,
    block_size: usize,
}

impl SessionHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Processing latency added by block assembly (milliseconds)
    pub fn latency_ms(&self) -> f32 {
        (self.block_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Whether the input callback hit a fatal error
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Let the session run for `duration`
    ///
    /// Returns early (with `false`) when processing fails.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.has_failed() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }

    /// Stop both streams and hand over the session recordings
    ///
    /// Fails with [`AudioError::SessionAborted`] if the callback hit an
    /// error; the error carries the blocks recorded before the failure.
    pub fn finish(self) -> AudioResult<Recordings> {
        if let Err(e) = self.input_stream.pause() {
            log::warn!("Failed to pause input stream: {}", e);
        }
        if let Some(stream) = &self.output_stream {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause monitor stream: {}", e);
            }
        }
        drop(self.output_stream);
        drop(self.input_stream);

        // A panicking callback leaves the recordings intact
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        log::info!(
            "Capture session finished: {} blocks, {} frames left unassembled",
            state.processor.blocks_processed(),
            state.assembler.pending_frames()
        );
        state.take_result()
    }
}

/// Start a capture session
///
/// Opens the input device with exactly `input_channels` f32 channels at the
/// configured sample rate, plus a stereo monitor output when
/// `audio.monitor` is set. Recording space for `duration` is reserved up
/// front so the callback does not reallocate in steady state.
pub fn start_session(
    audio: &AudioConfig,
    settings: &StreamSettings,
    duration: Duration,
) -> AudioResult<SessionHandle> {
    let mut processor = StreamProcessor::new(settings)?;
    processor.reserve_recording((duration.as_secs_f64() * settings.sample_rate as f64).ceil() as usize);

    let input_device = resolve_device(audio.input_device.as_ref(), Direction::Input)?;
    let input_name = input_device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using capture device: {}", input_name);

    let input_channels = processor.input_channels();
    let input_config = get_stream_config(
        &input_device,
        &input_name,
        Direction::Input,
        input_channels as u16,
        settings.sample_rate,
        audio.buffer_size,
    )?;

    log::info!(
        "Capture config: {} channels, {}Hz, device buffer {:?} ({}), processing block {} frames (~{:.1}ms)",
        input_config.channels,
        settings.sample_rate,
        audio.buffer_size,
        audio
            .buffer_size
            .latency_ms(settings.sample_rate)
            .map_or_else(|| "host default".to_string(), |ms| format!("~{:.1}ms", ms)),
        settings.block_size,
        settings.block_period().as_secs_f64() * 1000.0
    );

    let (monitor_producer, output_stream) = if audio.monitor {
        let output_device = resolve_device(audio.output_device.as_ref(), Direction::Output)?;
        let output_name = output_device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using monitor device: {}", output_name);

        let output_config = get_stream_config(
            &output_device,
            &output_name,
            Direction::Output,
            2,
            settings.sample_rate,
            audio.buffer_size,
        )?;

        let capacity = settings.block_size * MONITOR_QUEUE_BLOCKS;
        let (producer, consumer) = rtrb::RingBuffer::<StereoSample>::new(capacity);
        log::debug!("Monitor ring buffer created with capacity {} samples", capacity);

        let stream = build_monitor_stream(&output_device, &output_config, consumer)?;
        (Some(producer), Some(stream))
    } else {
        (None, None)
    };

    let state = Arc::new(Mutex::new(CaptureState {
        assembler: BlockAssembler::new(input_channels, settings.block_size),
        output: StereoBuffer::silence(settings.block_size),
        processor,
        monitor: monitor_producer,
        error: None,
    }));
    let failed = Arc::new(AtomicBool::new(false));

    let input_stream =
        build_capture_stream(&input_device, &input_config, state.clone(), failed.clone())?;

    if let Some(stream) = &output_stream {
        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(format!("Monitor: {}", e)))?;
    }
    input_stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(format!("Capture: {}", e)))?;

    log::info!(
        "Capture session started ({})",
        if output_stream.is_some() { "monitoring" } else { "record only" }
    );

    Ok(SessionHandle {
        input_stream,
        output_stream,
        state,
        failed,
        sample_rate: settings.sample_rate,
        block_size: settings.block_size,
    })
}

/// Pick an f32 configuration with exactly `channels` channels at `sample_rate`
fn get_stream_config(
    device: &cpal::Device,
    device_name: &str,
    direction: Direction,
    channels: u16,
    sample_rate: u32,
    buffer_size: BufferSize,
) -> AudioResult<StreamConfig> {
    let supported_configs = supported_configs(device, direction)?;
    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(format!(
            "No supported {:?} configurations for {}",
            direction, device_name
        )));
    }

    let with_channels: Vec<_> = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() == channels)
        .collect();

    if with_channels.is_empty() {
        return Err(AudioError::ChannelCount {
            device: device_name.to_string(),
            requested: channels as usize,
            available: supported_configs
                .iter()
                .map(|c| c.channels())
                .max()
                .unwrap_or(0),
        });
    }

    // The delays were quantized for this rate; resampling is not an option
    let best_config = with_channels
        .into_iter()
        .find(|c| sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0)
        .ok_or_else(|| AudioError::SampleRate {
            device: device_name.to_string(),
            requested: sample_rate,
        })?;

    let buffer_size = match buffer_size.as_frames() {
        Some(frames) => CpalBufferSize::Fixed(frames),
        None => CpalBufferSize::Default,
    };

    let config = best_config
        .clone()
        .with_sample_rate(cpal::SampleRate(sample_rate))
        .config();

    Ok(StreamConfig {
        buffer_size,
        ..config
    })
}

/// Build the capture stream that drives the processor
fn build_capture_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    state: Arc<Mutex<CaptureState>>,
    failed: Arc<AtomicBool>,
) -> AudioResult<Stream> {
    let stream = device
        .build_input_stream(
            config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                if failed.load(Ordering::Relaxed) {
                    return;
                }
                let Ok(mut state) = state.lock() else {
                    failed.store(true, Ordering::Release);
                    return;
                };
                if let Err(e) = state.capture(data) {
                    state.error = Some(e);
                    failed.store(true, Ordering::Release);
                }
            },
            move |err| {
                log::error!("Capture stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}

/// Build the monitor output stream using lock-free ring buffer
///
/// If samples aren't available (startup, or the capture side is slow),
/// plays silence.
fn build_monitor_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: rtrb::Consumer<StereoSample>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    match consumer.pop() {
                        Ok(sample) => {
                            frame[0] = sample.left;
                            if channels > 1 {
                                frame[1] = sample.right;
                            }
                            for ch in frame.iter_mut().skip(2) {
                                *ch = 0.0;
                            }
                        }
                        Err(_) => {
                            for ch in frame.iter_mut() {
                                *ch = 0.0;
                            }
                        }
                    }
                }
            },
            move |err| {
                log::error!("Monitor stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}

//! Live audio output for tape playback.
//!
//! A cpal output stream is fed from an SPSC ring buffer. The producer
//! side blocks when the buffer is full, which creates back-pressure that
//! naturally paces rendering to the device's consumption rate. Underruns
//! on the consumer side fill with the rest level (line idle) to avoid
//! clicks, and are reported back to the producer: a receiver decoding
//! the tape in real time cannot tolerate the timing gap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use ringbuf::{
    HeapRb,
    traits::{Consumer, Producer, Split},
};
use tapecast::DeviceError;

/// Ring buffer capacity in samples (~0.75 s at 44.1 kHz).
const RING_CAPACITY: usize = 32_768;

/// Samples pre-filled before the stream starts, to ride out startup
/// jitter.
const PREFILL: usize = RING_CAPACITY / 2;

/// Audio output handler that manages the cpal stream and ring buffer.
pub struct AudioOutput {
    _stream: Stream,
    producer: ringbuf::HeapProd<f32>,
    underrun: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Open the default output device at the given rate.
    ///
    /// `rest_level` is the sample value of an idle line; it fills the
    /// pre-buffer and any underrun.
    ///
    /// # Errors
    ///
    /// `DeviceError::Unavailable` when no output device exists;
    /// `DeviceError::Stream` when the stream cannot be built or started.
    pub fn new(sample_rate: u32, rest_level: f32) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::Unavailable)?;

        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = HeapRb::<f32>::new(RING_CAPACITY);
        let (mut producer, mut consumer) = ring.split();
        for _ in 0..PREFILL {
            let _ = producer.try_push(rest_level);
        }

        let underrun = Arc::new(AtomicBool::new(false));
        let underrun_flag = Arc::clone(&underrun);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        // Rest level on underrun to avoid clicks.
                        *sample = match consumer.try_pop() {
                            Some(s) => s,
                            None => {
                                underrun_flag.store(true, Ordering::Relaxed);
                                rest_level
                            }
                        };
                    }
                },
                |err| tracing::error!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        stream.play().map_err(|e| DeviceError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            producer,
            underrun,
        })
    }

    /// Push rendered samples to the ring buffer.
    ///
    /// Blocks while the buffer is full — this synchronizes rendering to
    /// the device's real-time rate.
    ///
    /// # Errors
    ///
    /// `DeviceError::Underrun` if the device ran dry since the last push;
    /// the stream's timing is already corrupted at that point, so the
    /// session is not retried.
    pub fn push_samples(&mut self, samples: &[f32]) -> Result<(), DeviceError> {
        for &sample in samples {
            while self.producer.try_push(sample).is_err() {
                std::thread::yield_now();
            }
        }
        if self.underrun.swap(false, Ordering::Relaxed) {
            return Err(DeviceError::Underrun);
        }
        Ok(())
    }

    /// Forget a recorded underrun. Used when the ring is expected to run
    /// dry, such as while playback is paused at a stop marker.
    pub fn clear_underrun(&self) {
        self.underrun.store(false, Ordering::Relaxed);
    }
}

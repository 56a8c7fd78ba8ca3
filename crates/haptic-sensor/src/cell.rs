//! The single value shared between the sensor task and the frame loop.
//!
//! [`PressureCell`] packs the raw and normalised pressure into one
//! `AtomicU64` so a reader can never observe the raw value of one packet next
//! to the normalised value of another.  A reserved bit pattern encodes
//! "no data yet".
//!
//! [`PressureChannel`] is the subscriber that the [`SensorLink`] feeds: it
//! normalises each [`RawSample`] and stores the pair in its cell.
//!
//! [`SensorLink`]: crate::link::SensorLink

use std::sync::atomic::{AtomicU64, Ordering};

use haptic_types::{PressureReading, RawSample};
use tracing::trace;

use crate::link::SampleSubscriber;
use crate::normalizer::PressureNormalizer;

/// All-ones is a NaN in both halves; NaN readings are rejected upstream so it
/// never collides with a real sample.
const NO_DATA: u64 = u64::MAX;

fn pack(raw: f32, normalized: f32) -> u64 {
    (u64::from(raw.to_bits()) << 32) | u64::from(normalized.to_bits())
}

fn unpack(bits: u64) -> PressureReading {
    if bits == NO_DATA {
        return PressureReading::NoData;
    }
    PressureReading::Sample {
        raw: f32::from_bits((bits >> 32) as u32),
        normalized: f32::from_bits(bits as u32),
    }
}

/// Lock-free latest-value cell for a raw/normalised pressure pair.
#[derive(Debug)]
pub struct PressureCell {
    bits: AtomicU64,
}

impl Default for PressureCell {
    fn default() -> Self {
        Self {
            bits: AtomicU64::new(NO_DATA),
        }
    }
}

impl PressureCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the current reading.
    pub fn store(&self, raw: f32, normalized: f32) {
        self.bits.store(pack(raw, normalized), Ordering::Release);
    }

    /// Read the current reading.
    pub fn load(&self) -> PressureReading {
        unpack(self.bits.load(Ordering::Acquire))
    }
}

/// Normalises incoming samples and publishes them to a [`PressureCell`].
#[derive(Debug)]
pub struct PressureChannel {
    normalizer: PressureNormalizer,
    cell: PressureCell,
}

impl PressureChannel {
    pub fn new(normalizer: PressureNormalizer) -> Self {
        Self {
            normalizer,
            cell: PressureCell::new(),
        }
    }

    /// Latest reading; [`PressureReading::NoData`] until the first sample.
    pub fn latest(&self) -> PressureReading {
        self.cell.load()
    }

    pub fn normalizer(&self) -> &PressureNormalizer {
        &self.normalizer
    }
}

impl SampleSubscriber for PressureChannel {
    fn on_sample(&self, sample: &RawSample) {
        let normalized = self.normalizer.normalize(sample.raw_pressure);
        trace!(raw = sample.raw_pressure, normalized, "pressure updated");
        self.cell.store(sample.raw_pressure, normalized);
    }
}

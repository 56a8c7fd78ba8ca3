//! `haptic-sensor` – pressure ingestion pipeline.
//!
//! Receives the force sensor's UDP telemetry, normalises it, and exposes the
//! latest value to the frame loop through a single atomic cell.
//!
//! # Modules
//!
//! - [`link`] – [`SensorLink`]: UDP socket + receive task that parses
//!   `PRESSURE:<float>` datagrams and fans [`RawSample`][haptic_types::RawSample]s
//!   out to registered [`SampleSubscriber`]s.
//! - [`normalizer`] – [`normalize`][normalizer::normalize] and
//!   [`PressureNormalizer`]: clamped inverse-lerp to `[0, 1]` at five decimals.
//! - [`cell`] – [`PressureCell`] / [`PressureChannel`]: the one value shared
//!   between the receive task and the frame loop.
//! - [`bus`] – [`SampleBus`]: broadcast fan-out for monitors.

pub mod bus;
pub mod cell;
pub mod link;
pub mod normalizer;

pub use bus::{SampleBus, SampleReceiver};
pub use cell::{PressureCell, PressureChannel};
pub use link::{LinkStatus, SampleSubscriber, SensorLink, parse_datagram};
pub use normalizer::PressureNormalizer;

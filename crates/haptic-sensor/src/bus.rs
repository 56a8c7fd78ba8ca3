//! Broadcast fan-out of raw samples for monitors.
//!
//! The frame loop never reads from the bus; it reads the
//! [`PressureCell`][crate::cell::PressureCell].  The bus exists for
//! observers that want every sample (operator status lines, recorders of the
//! raw stream) without coupling them to the receive loop.
//!
//! Uses [`tokio::sync::broadcast`] so a slow monitor lags and skips instead of
//! back-pressuring the socket.

use haptic_types::RawSample;
use tokio::sync::broadcast;
use tracing::warn;

use crate::link::SampleSubscriber;

/// Default channel capacity (number of buffered samples before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared sample bus.  Clones share the same channel.
#[derive(Clone, Debug)]
pub struct SampleBus {
    sender: broadcast::Sender<RawSample>,
}

impl SampleBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `sample` to every current subscriber.
    ///
    /// Returns the number of subscribers handed the sample; `0` when nobody
    /// is listening, which is a normal condition.
    pub fn publish(&self, sample: RawSample) -> usize {
        self.sender.send(sample).unwrap_or(0)
    }

    pub fn subscribe(&self) -> SampleReceiver {
        SampleReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SampleBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SampleSubscriber for SampleBus {
    fn on_sample(&self, sample: &RawSample) {
        self.publish(*sample);
    }
}

/// Receiving end of a [`SampleBus`].
pub struct SampleReceiver {
    receiver: broadcast::Receiver<RawSample>,
}

impl SampleReceiver {
    /// Wait for the next sample, skipping over any the receiver lagged past.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<RawSample> {
        loop {
            match self.receiver.recv().await {
                Ok(sample) => return Some(sample),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "sample monitor lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv] for polling loops.
    pub fn try_recv(&mut self) -> Option<RawSample> {
        loop {
            match self.receiver.try_recv() {
                Ok(sample) => return Some(sample),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "sample monitor lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}

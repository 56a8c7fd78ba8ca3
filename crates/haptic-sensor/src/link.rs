//! [`SensorLink`] – UDP ingestion of pressure telemetry.
//!
//! The sensor bridge sends one ASCII datagram per reading:
//!
//! ```text
//! PRESSURE:<float>
//! ```
//!
//! Every well-formed datagram becomes a [`RawSample`] that is handed, in
//! registration order, to each [`SampleSubscriber`] given to
//! [`SensorLink::open`].  Anything else is dropped and counted; a bad packet
//! never stops the loop.
//!
//! The receive loop runs on its own Tokio task.  [`SensorLink::close`] (or
//! dropping the link) stops it and releases the socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use haptic_types::{HapticError, RawSample};
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Message prefix of a pressure datagram.
pub const PRESSURE_PREFIX: &str = "PRESSURE:";

/// Largest datagram we read; longer ones are truncated by the OS and then
/// fail to parse.
const MAX_DATAGRAM: usize = 1024;

/// Consumer of raw samples, called from the receive task.
///
/// Implementations must be cheap and must not block: they run inline on the
/// socket loop.
pub trait SampleSubscriber: Send + Sync {
    fn on_sample(&self, sample: &RawSample);
}

/// Parse one datagram into a raw pressure value.
///
/// # Errors
///
/// Returns [`HapticError::Parse`] when the payload is not ASCII, lacks the
/// `PRESSURE:` prefix, or does not carry a finite float.
pub fn parse_datagram(bytes: &[u8]) -> Result<f32, HapticError> {
    if !bytes.is_ascii() {
        return Err(HapticError::Parse("datagram is not ASCII".to_string()));
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|e| HapticError::Parse(e.to_string()))?
        .trim();
    let value = text
        .strip_prefix(PRESSURE_PREFIX)
        .ok_or_else(|| HapticError::Parse(format!("unrecognised message {text:?}")))?;
    let pressure: f32 = value
        .trim()
        .parse()
        .map_err(|e| HapticError::Parse(format!("bad pressure value {value:?}: {e}")))?;
    if !pressure.is_finite() {
        return Err(HapticError::Parse(format!("non-finite pressure {value:?}")));
    }
    Ok(pressure)
}

// ────────────────────────────────────────────────────────────────────────────
// Status
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LinkCounters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    last_message: Mutex<Option<String>>,
}

/// Snapshot of link activity for operator displays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkStatus {
    /// Datagrams parsed and delivered to subscribers.
    pub accepted: u64,
    /// Datagrams that failed to decode or parse.
    pub dropped: u64,
    /// Text of the most recent datagram, valid or not.
    pub last_message: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// SensorLink
// ────────────────────────────────────────────────────────────────────────────

/// Owns the inbound UDP socket and its receive task.
pub struct SensorLink {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    counters: Arc<LinkCounters>,
    task: Option<JoinHandle<()>>,
}

impl SensorLink {
    /// Bind `addr` and start the receive loop.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`HapticError::Bind`] if the socket cannot be bound.
    pub async fn open(
        addr: SocketAddr,
        subscribers: Vec<Arc<dyn SampleSubscriber>>,
    ) -> Result<Self, HapticError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| HapticError::Bind { addr, source })?;
        let local_addr = socket.local_addr().map_err(|source| HapticError::Io {
            context: "reading bound sensor address".to_string(),
            source,
        })?;
        info!(%local_addr, subscribers = subscribers.len(), "listening for pressure telemetry");

        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let counters = Arc::new(LinkCounters::default());

        let task = tokio::spawn(receive_loop(
            socket,
            subscribers,
            Arc::clone(&closed),
            Arc::clone(&shutdown),
            Arc::clone(&counters),
        ));

        Ok(Self {
            local_addr,
            closed,
            shutdown,
            counters,
            task: Some(task),
        })
    }

    /// The address actually bound (useful when opened on port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            last_message: self
                .counters
                .last_message
                .lock()
                .map(|m| m.clone())
                .unwrap_or_default(),
        }
    }

    /// Stop the receive loop and release the socket.  Idempotent.
    pub async fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.notify_one();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "sensor receive task ended abnormally");
        }
        info!(local_addr = %self.local_addr, "sensor link closed");
    }
}

impl Drop for SensorLink {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn receive_loop(
    socket: UdpSocket,
    subscribers: Vec<Arc<dyn SampleSubscriber>>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    counters: Arc<LinkCounters>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            result = socket.recv_from(&mut buf) => {
                if closed.load(Ordering::Acquire) {
                    break;
                }
                match result {
                    Ok((len, peer)) => {
                        handle_datagram(&buf[..len], peer, &subscribers, &counters);
                    }
                    Err(e) => {
                        // Transient (e.g. ICMP port unreachable surfacing on
                        // some platforms); re-arm and keep listening.
                        warn!(error = %e, "sensor receive failed; re-arming");
                    }
                }
            }
        }
    }
    debug!("sensor receive loop stopped");
}

fn handle_datagram(
    bytes: &[u8],
    peer: SocketAddr,
    subscribers: &[Arc<dyn SampleSubscriber>],
    counters: &LinkCounters,
) {
    if let Ok(mut last) = counters.last_message.lock() {
        *last = Some(String::from_utf8_lossy(bytes).trim().to_string());
    }
    match parse_datagram(bytes) {
        Ok(pressure) => {
            counters.accepted.fetch_add(1, Ordering::Relaxed);
            let sample = RawSample::now(pressure);
            for subscriber in subscribers {
                subscriber.on_sample(&sample);
            }
        }
        Err(e) => {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(peer = %peer, error = %e, "dropped sensor datagram");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<f32>>,
    }

    impl SampleSubscriber for Collector {
        fn on_sample(&self, sample: &RawSample) {
            self.seen.lock().unwrap().push(sample.raw_pressure);
        }
    }

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    #[test]
    fn parses_well_formed_datagrams() {
        assert_eq!(parse_datagram(b"PRESSURE:512.25").unwrap(), 512.25);
        assert_eq!(parse_datagram(b"PRESSURE: -3\r\n").unwrap(), -3.0);
        assert_eq!(parse_datagram(b"PRESSURE:1e2").unwrap(), 100.0);
    }

    #[test]
    fn rejects_malformed_datagrams() {
        assert!(parse_datagram(b"PRESSURE:").is_err());
        assert!(parse_datagram(b"PRESSURE:abc").is_err());
        assert!(parse_datagram(b"PRESSURE:NaN").is_err());
        assert!(parse_datagram(b"PRESSURE:inf").is_err());
        assert!(parse_datagram(b"FORCE:12").is_err());
        assert!(parse_datagram("PRESSURE:1\u{00e9}".as_bytes()).is_err());
        assert!(parse_datagram(b"").is_err());
    }

    #[tokio::test]
    async fn delivers_samples_and_survives_garbage() {
        let collector = Arc::new(Collector::default());
        let subscribers = vec![collector.clone() as Arc<dyn SampleSubscriber>];
        let mut link = SensorLink::open(loopback(), subscribers).await.unwrap();

        let sender = UdpSocket::bind(loopback()).await.unwrap();
        let target = link.local_addr();
        sender.send_to(b"garbage", target).await.unwrap();
        sender.send_to(b"PRESSURE:oops", target).await.unwrap();
        sender.send_to(b"PRESSURE:250", target).await.unwrap();
        sender.send_to(b"PRESSURE:300.5", target).await.unwrap();

        wait_for(|| collector.seen.lock().unwrap().len() == 2).await;
        assert_eq!(*collector.seen.lock().unwrap(), vec![250.0, 300.5]);

        let status = link.status();
        assert_eq!(status.accepted, 2);
        assert_eq!(status.dropped, 2);
        assert_eq!(status.last_message.as_deref(), Some("PRESSURE:300.5"));

        link.close().await;
        assert!(link.is_closed());
    }

    #[tokio::test]
    async fn packets_after_close_are_ignored() {
        let collector = Arc::new(Collector::default());
        let subscribers = vec![collector.clone() as Arc<dyn SampleSubscriber>];
        let mut link = SensorLink::open(loopback(), subscribers).await.unwrap();
        let target = link.local_addr();
        link.close().await;
        // Second close is a no-op.
        link.close().await;

        let sender = UdpSocket::bind(loopback()).await.unwrap();
        let _ = sender.send_to(b"PRESSURE:10", target).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(collector.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = SensorLink::open(loopback(), Vec::new()).await.unwrap();
        let err = SensorLink::open(first.local_addr(), Vec::new())
            .await
            .err()
            .expect("second bind on the same port must fail");
        assert!(matches!(err, HapticError::Bind { .. }));
    }
}

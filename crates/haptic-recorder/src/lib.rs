//! `haptic-recorder` – durable session log plus live telemetry.
//!
//! [`DataRecorder`] is the [`MeasurementSink`] of a session.  Every
//! measurement becomes one comma-separated row that is
//!
//! 1. appended to the session's CSV file and synced to disk before
//!    [`record`][MeasurementSink::record] returns, and
//! 2. sent, best effort, as one UDP datagram to the telemetry listener.
//!
//! A failed append is fatal to the session.  A failed send is logged and
//! otherwise ignored.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use haptic_types::{HapticError, MEASUREMENT_HEADER, Measurement, MeasurementSink};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Where measurements go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory holding session logs; created if missing.
    pub log_dir: PathBuf,
    /// File name stem; the session timestamp and `.csv` are appended.
    pub file_prefix: String,
    /// Destination of the live row stream.
    pub telemetry_addr: SocketAddr,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            file_prefix: "PressureSession".to_string(),
            telemetry_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8893)),
        }
    }
}

/// Log file name for a session started at `started`, unique to the
/// millisecond.
pub fn session_file_name(prefix: &str, started: &DateTime<Local>) -> String {
    format!("{prefix}_{}.csv", started.format("%Y%m%d_%H%M%S_%3f"))
}

// ────────────────────────────────────────────────────────────────────────────
// Telemetry
// ────────────────────────────────────────────────────────────────────────────

/// Fire-and-forget UDP sender for measurement rows.
#[derive(Debug)]
struct TelemetrySender {
    socket: Option<UdpSocket>,
    target: SocketAddr,
}

impl TelemetrySender {
    fn new(target: SocketAddr) -> Self {
        let local = if target.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local).and_then(|socket| {
            socket.set_nonblocking(true)?;
            Ok(socket)
        });
        match socket {
            Ok(socket) => Self {
                socket: Some(socket),
                target,
            },
            Err(e) => {
                warn!(
                    %target,
                    error = %e,
                    "telemetry socket unavailable; rows will only be logged"
                );
                Self {
                    socket: None,
                    target,
                }
            }
        }
    }

    fn send(&self, row: &str) -> Result<(), HapticError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| HapticError::NetworkSend("no telemetry socket".to_string()))?;
        let sent = socket
            .send_to(row.as_bytes(), self.target)
            .map_err(|e| HapticError::NetworkSend(format!("{}: {e}", self.target)))?;
        if sent != row.len() {
            return Err(HapticError::NetworkSend(format!(
                "{}: short send ({sent} of {} bytes)",
                self.target,
                row.len()
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DataRecorder
// ────────────────────────────────────────────────────────────────────────────

/// Append-only CSV log of one session, mirrored to UDP telemetry.
#[derive(Debug)]
pub struct DataRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    telemetry: TelemetrySender,
    rows_written: u64,
    sends_failed: u64,
}

impl DataRecorder {
    /// Create the session log and write its header.
    ///
    /// The file is created fresh; an existing file with the same name is an
    /// error rather than being appended to or truncated.
    ///
    /// # Errors
    ///
    /// [`HapticError::Io`] if the directory or file cannot be created or the
    /// header cannot be synced.
    pub fn create(config: &RecorderConfig, started: &DateTime<Local>) -> Result<Self, HapticError> {
        fs::create_dir_all(&config.log_dir).map_err(|source| HapticError::Io {
            context: format!("creating log directory {}", config.log_dir.display()),
            source,
        })?;
        let path = config
            .log_dir
            .join(session_file_name(&config.file_prefix, started));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| HapticError::Io {
                context: format!("creating session log {}", path.display()),
                source,
            })?;

        let mut recorder = Self {
            path,
            writer: BufWriter::new(file),
            telemetry: TelemetrySender::new(config.telemetry_addr),
            rows_written: 0,
            sends_failed: 0,
        };
        recorder.append_line(MEASUREMENT_HEADER)?;
        info!(
            path = %recorder.path.display(),
            telemetry = %config.telemetry_addr,
            "session log created"
        );
        Ok(recorder)
    }

    fn append_line(&mut self, line: &str) -> Result<(), HapticError> {
        let path = &self.path;
        let io_err = |source| HapticError::Io {
            context: format!("appending to {}", path.display()),
            source,
        };
        self.writer.write_all(line.as_bytes()).map_err(io_err)?;
        self.writer.write_all(b"\n").map_err(io_err)?;
        self.writer.flush().map_err(io_err)?;
        self.writer.get_ref().sync_data().map_err(io_err)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Measurement rows durably written so far (header excluded).
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Telemetry datagrams that could not be sent.
    pub fn sends_failed(&self) -> u64 {
        self.sends_failed
    }
}

impl MeasurementSink for DataRecorder {
    fn record(&mut self, measurement: &Measurement) -> Result<(), HapticError> {
        let row = measurement.to_row();
        if let Err(e) = self.append_line(&row) {
            error!(step = measurement.step, error = %e, "measurement could not be stored");
            return Err(e);
        }
        self.rows_written += 1;
        debug!(step = measurement.step, "measurement stored");

        if let Err(e) = self.telemetry.send(&row) {
            self.sends_failed += 1;
            warn!(step = measurement.step, error = %e, "telemetry send failed");
        }
        Ok(())
    }
}

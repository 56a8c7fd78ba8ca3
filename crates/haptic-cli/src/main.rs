//! `haptic-rig` – headless driver for a pressure-deformation session.
//!
//! This binary stands in for the presentation layer.  It:
//!
//! 1. Loads `./haptic.toml` (or the path given as the first argument) and
//!    applies `HAPTIC_*` environment overrides.
//! 2. Opens a [`Session`]: sensor socket, session log, telemetry sender.
//! 3. Runs the frame loop at ~60 Hz, feeding live pressure into the
//!    deformation model.
//! 4. Maps every Enter keypress to one `advance` and prints the instructions
//!    for the new state.
//! 5. Intercepts **Ctrl-C** to close the session cleanly.
//!
//! `haptic-rig --write-config [PATH]` writes the default configuration and
//! exits.

mod config;

use colored::Colorize;
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use haptic_experiment::{ControllerView, ExperimentState};
use haptic_runtime::{Session, SessionConfig};
use haptic_types::PressureReading;

const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);
const STATUS_INTERVAL: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let _guard = haptic_runtime::telemetry::init_tracing("haptic-rig");

    print_banner();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--write-config") {
        let path = config::config_path(args.get(1).map(String::as_str));
        return match config::save_to(&SessionConfig::default(), &path) {
            Ok(()) => {
                println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let path = config::config_path(args.first().map(String::as_str));
    let cfg = match config::load_from(&path) {
        Ok(cfg) => {
            if path.exists() {
                println!("  Config loaded from {}", path.display().to_string().bold());
            } else {
                println!(
                    "  No config at {}; using defaults.",
                    path.display().to_string().dimmed()
                );
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received, closing the session …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(
            error = %e,
            "Failed to install Ctrl-C handler; the session will not close cleanly on Ctrl-C"
        );
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(cfg, shutdown))
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame loop
// ─────────────────────────────────────────────────────────────────────────────

async fn run(cfg: SessionConfig, shutdown: Arc<AtomicBool>) -> ExitCode {
    let mut session = match Session::init(cfg).await {
        Ok(session) => session,
        Err(e) => {
            println!("{}: {}", "Session failed to start".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    println!(
        "  Listening for pressure on {}",
        session.sensor_addr().to_string().bold()
    );
    println!(
        "  Logging to {}",
        session.log_path().display().to_string().bold()
    );
    println!();

    let mut advances = spawn_enter_reader();
    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_frame = Instant::now();
    let mut last_status = Instant::now();
    let mut exit = ExitCode::SUCCESS;

    print_instructions(&session.view());

    while !shutdown.load(Ordering::SeqCst) {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_frame).as_secs_f32();
                last_frame = now;
                session.tick(dt);

                if last_status.elapsed() >= STATUS_INTERVAL
                    && matches!(
                        session.state(),
                        ExperimentState::DevicePress | ExperimentState::TrialActive
                    )
                {
                    last_status = now;
                    print_status(&session);
                }
            }
            Some(()) = advances.recv() => {
                match session.advance() {
                    Ok(state) => {
                        print_instructions(&session.view());
                        if state == ExperimentState::Complete {
                            break;
                        }
                    }
                    Err(e) => {
                        println!("{}: {}", "Error".red().bold(), e);
                        if session.is_aborted() {
                            exit = ExitCode::FAILURE;
                            break;
                        }
                    }
                }
            }
        }
    }

    session.shutdown().await;
    println!(
        "  {} {} measurement(s) saved to {}",
        "✓".green().bold(),
        session.rows_written(),
        session.log_path().display().to_string().bold()
    );
    exit
}

/// Forward every line read from stdin as one advance request.
fn spawn_enter_reader() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_instructions(view: &ControllerView) {
    match view.state {
        ExperimentState::Welcome => {
            println!("  {}", "Welcome!".bold());
            println!("  Press {} to begin.", "Enter".bold().cyan());
        }
        ExperimentState::DevicePress => {
            println!("  Rest your thumb and index finger on the sensor.");
            println!("  Press {} to start the first trial.", "Enter".bold().cyan());
        }
        ExperimentState::TrialActive => {
            let target = view
                .target
                .map(|t| format!("target {} (compression {:.3})", t.id + 1, t.target_compression))
                .unwrap_or_else(|| "the target".to_string());
            println!(
                "  {} squeeze until the object's edge meets {}, then press {}.",
                format!("Step {}/{}:", view.step, view.total_steps).bold(),
                target,
                "Enter".bold().cyan()
            );
            if !view.object_visible {
                println!("    {}", "(object hidden: go by feel)".dimmed());
            }
        }
        ExperimentState::NonVisualTransition => {
            println!("  {}", "The object is now hidden.".yellow().bold());
            println!(
                "  Keep going by feel. Press {} for the next trial.",
                "Enter".bold().cyan()
            );
        }
        ExperimentState::Complete => {
            println!("  {}", "All trials complete. Thank you!".green().bold());
        }
    }
}

fn print_status(session: &Session) {
    let status = session.sensor_status();
    let reading = match session.latest_reading() {
        PressureReading::NoData => "no data".yellow().to_string(),
        PressureReading::Sample { raw, normalized } => format!("{raw} ({normalized:.3})"),
    };
    println!(
        "    {} {}  {} {:.1}%  {} {}/{}",
        "pressure".dimmed(),
        reading,
        "compression".dimmed(),
        session.compression_amount() * 100.0,
        "packets".dimmed(),
        status.accepted,
        status.dropped,
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "haptic-rig".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Pressure-driven deformation experiment");
    println!();
}

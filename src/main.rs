//! GDL90 Receiver - RTL-SDR capture with GDL90 traffic output
//!
//! Captures raw IQ samples from an RTL-SDR tuner, demodulates 1090 MHz
//! extended squitters on a dedicated worker thread, and prints the decoded
//! traffic as GDL90 Traffic Reports.

mod adsb;
mod config;
mod error;
mod gdl90;
mod receiver;
mod sdr;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Config;
use error::CaptureError;
use receiver::ReportSink;
use sdr::{CaptureContext, ModeSDemodulator, PipelineState, WorkerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;

    info!("===========================================");
    info!("   GDL90 Receiver - RTL-SDR");
    info!("===========================================");

    let config = Config::from_env();
    info!("Configuration:");
    info!("  Tuner serial: {}", config.tuner_serial);
    info!("  rtl_sdr path: {:?}", config.rtl_sdr_path);
    info!("  Capture buffer: {} bytes", config.capture_buffer_bytes);

    // Lookup tables are built before any frame arrives
    gdl90::crc::init();
    adsb::crc::init();
    sdr::demod::init();

    let mut state = PipelineState::Idle;
    let ctx = CaptureContext::new();

    let mut tuner = match sdr::open_tuner(&config) {
        Ok(tuner) => {
            state.advance(PipelineState::DeviceOpen);
            Some(tuner)
        }
        Err(e @ CaptureError::DeviceNotFound(_)) => {
            warn!("Receiver disabled: {}", e);
            None
        }
        Err(e) => {
            error!("Receiver disabled: {}", e);
            None
        }
    };

    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
    let mut worker = None;

    if let Some(reader) = tuner.as_mut().and_then(|t| t.take_reader()) {
        let spawned = sdr::spawn_worker(
            Box::new(reader),
            Box::new(ModeSDemodulator::new()),
            Box::new(ReportSink::new(config.max_aircraft)),
            ctx.clone(),
            WorkerSettings::from_config(&config),
            done_tx,
        );
        match spawned {
            Ok(handle) => {
                state.advance(PipelineState::Streaming);
                worker = Some(handle);
            }
            Err(e) => error!("Receiver disabled: {}", e),
        }
    }

    info!("Press Ctrl+C to stop.");

    // Park until SIGINT, or until the worker stops on its own
    let has_worker = worker.is_some();
    let worker_exit = async move {
        if has_worker {
            let _ = tokio::task::spawn_blocking(move || done_rx.recv()).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Interrupt received, shutting down"),
                Err(e) => error!("Failed to listen for interrupt: {}", e),
            }
        }
        _ = worker_exit => warn!("Capture worker stopped"),
    }

    state.advance(PipelineState::ShuttingDown);
    ctx.request_shutdown();

    // Unblock a pending read, then wait for the worker before releasing the device
    if let Some(tuner) = tuner.as_mut() {
        tuner.cancel();
    }

    if let Some(handle) = worker {
        match handle.join() {
            Ok(Ok(stats)) => info!(
                "Capture finished: {} bytes read, {} frames, {} bytes discarded",
                stats.bytes_read, stats.frames, stats.bytes_discarded
            ),
            Ok(Err(e)) => error!("Capture worker failed: {}", e),
            Err(_) => error!("Capture worker panicked"),
        }
    }

    if let Some(tuner) = tuner {
        tuner.close();
    }
    state.advance(PipelineState::Closed);

    info!("Shutdown complete");
    Ok(())
}

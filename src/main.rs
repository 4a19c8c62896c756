mod block_logger;
mod bus;
mod clock;
mod config;
mod display;
mod dst;
mod models;
mod storage;
mod utils;

use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use block_logger::BlockLogger;
use bus::{run_capture, FrameMailbox};
use clock::RtcClock;
use config::MonitorConfig;
use display::decode;
use models::{LogRecord, StoredRecord};
use storage::{spawn_writer, RecordSinks};
use utils::format_datetime;

/// Stamp a flushed block and queue it for storage
fn dispatch(
    record: LogRecord,
    clock: &RtcClock,
    now_ms: u64,
    writer: &mpsc::Sender<StoredRecord>,
) {
    let Some(stored) = clock.stamp(&record, now_ms) else {
        warn!("Clock not set, dropping reading {}", record.text);
        return;
    };

    info!(
        "Reading {} {} at {} ({} samples over {} ms)",
        stored.text,
        stored.unit,
        format_datetime(&stored.time),
        stored.samples,
        stored.duration_ms
    );

    if let Err(e) = writer.try_send(stored) {
        error!("Storage queue unavailable, reading lost: {}", e);
    }
}

async fn main_loop(
    config: &MonitorConfig,
    mailbox: Arc<FrameMailbox>,
    mut capture: JoinHandle<Result<u64, String>>,
    logger: &mut BlockLogger,
    clock: &mut RtcClock,
    writer: &mpsc::Sender<StoredRecord>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting display bus monitor for {}", config.device_name);

    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut capture_running = true;
    let mut frames = 0u64;
    let mut discarded = 0u64;

    loop {
        ticker.tick().await;

        if clock.has_pending() {
            if let Some(utc) = clock.apply_pending() {
                info!("Applied pending clock set, now {} UTC", utc);
            }
        }

        let now_ms = clock.mono_ms();
        logger.set_clock_available(clock.is_available());
        let record = match mailbox.take() {
            Some(frame) => {
                frames += 1;
                let result = decode(&frame);
                if result.valid {
                    debug!(
                        "Frame {}: {} (stable={}, negative={}, unit='{}')",
                        frames,
                        result.text,
                        result.stable,
                        result.negative,
                        result.units.suffix()
                    );
                } else {
                    discarded += 1;
                }
                logger.observe(result, now_ms)
            }
            None => logger.poll(now_ms),
        };

        if let Some(record) = record {
            dispatch(record, clock, now_ms, writer);
        }

        if capture_running && capture.is_finished() {
            capture_running = false;
            match (&mut capture).await {
                Ok(Ok(count)) => info!("Capture finished after {} frames", count),
                Ok(Err(e)) => error!("Capture failed: {}", e),
                Err(e) => error!("Capture task panicked: {}", e),
            }
        }

        // Once the source is exhausted, wait for the open block to time out before leaving
        if !capture_running && !mailbox.is_ready() && !logger.is_active() {
            info!(
                "Decoded {} frames ({} discarded, {} dropped at the mailbox)",
                frames,
                discarded,
                mailbox.dropped()
            );
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match MonitorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let sinks = RecordSinks::from_config(&config);
    if let Err(e) = sinks.initialize().await {
        error!("Failed to prepare storage, continuing: {}", e);
    }
    let (writer, writer_handle) = spawn_writer(sinks);

    let mut clock = RtcClock::new();
    if let Some(local) = config.clock_set_local {
        clock.request_set_local(local);
    } else if !clock.is_available() {
        warn!("Clock is not set; readings will not be stored until it is");
    }

    let mailbox = Arc::new(FrameMailbox::new());
    let capture = tokio::spawn(run_capture(
        config.capture_path.clone(),
        config.replay_interval,
        Arc::clone(&mailbox),
    ));
    let mut logger = BlockLogger::new();

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                // Keep the sender alive so the monitor is not mistaken for interrupted
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(&config, Arc::clone(&mailbox), capture, &mut logger, &mut clock, &writer) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    // Keep the run that was still open
    logger.set_clock_available(clock.is_available());
    if let Some(record) = logger.flush() {
        dispatch(record, &clock, clock.mono_ms(), &writer);
    }

    drop(writer);
    match writer_handle.await {
        Ok(written) => info!("Storage writer finished after {} readings", written),
        Err(e) => error!("Storage writer failed: {}", e),
    }

    Ok(())
}

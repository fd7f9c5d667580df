//! # MSP Link
//!
//! Ground-station link for MSP flight controllers over serial.
//!
//! Connects to the flight controller, starts attitude telemetry
//! polling, and prints decoded messages until interrupted. The polling
//! cadence is driven by the link itself: each response triggers the
//! next request, so the rate is bounded only by round-trip latency.

use anyhow::Result;
use tracing::{error, info, warn};

use msp_link::config::Config;
use msp_link::link::{Link, LinkEvent, LinkFault, Stream};
use msp_link::msp::protocol::Message;
use msp_link::serial::FcSerial;

/// Number of telemetry messages between status log lines
const LOG_INTERVAL_MESSAGES: u64 = 50;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // Keep the appender guard alive for the life of the process
    let _log_guard = init_logging(&config);

    info!("MSP Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let serial = if config.serial.port.is_empty() {
        FcSerial::open()?
    } else {
        FcSerial::open_path(&config.serial.port, config.serial.baud_rate)?
    };
    info!("flight controller port: {}", serial.device_path());

    let (link, mut events, _telemetry) = Link::connect(serial.into_stream(), config.link.clone());
    link.start_stream(Stream::Attitude)?;

    info!("attitude stream started; press Ctrl+C to exit");

    let mut message_count: u64 = 0;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(LinkEvent::Message(message)) => {
                        message_count += 1;
                        if message_count % LOG_INTERVAL_MESSAGES == 0 {
                            log_message(&message, message_count);
                        }
                    }
                    Some(LinkEvent::Fault(LinkFault::NoResponse)) => {
                        error!("no response from flight controller; check the port and firmware");
                        break;
                    }
                    None => {
                        warn!("link closed");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    link.disconnect();
    info!("total messages decoded: {}", message_count);

    Ok(())
}

/// Initialize tracing output, optionally into a rolling file
fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if config.log.dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    } else {
        let appender = tracing_appender::rolling::daily(&config.log.dir, "msp-link.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    }
}

fn log_message(message: &Message, count: u64) {
    match message {
        Message::AttitudeRadians(att) => {
            info!(
                "attitude #{}: roll {:+.3} pitch {:+.3} yaw {:+.3}",
                count, att.roll, att.pitch, att.yaw
            );
        }
        Message::RcNormal(rc) => {
            info!("rc channels #{}: {:?}", count, rc.channels);
        }
        Message::ArmStatus { armed } => {
            info!("arm status: {}", if *armed { "ARMED" } else { "disarmed" });
        }
        Message::BatteryStatus(batt) => {
            info!("battery: {:.2} V {:.2} A", batt.volts, batt.amps);
        }
    }
}

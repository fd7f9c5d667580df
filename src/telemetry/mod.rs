//! # Telemetry Snapshot Module
//!
//! Latest-value store for decoded telemetry.
//!
//! Dispatch runs on the link's reader task; consumers (a UI, a logger)
//! run elsewhere. The snapshot is a single-writer, multi-reader value
//! behind a `tokio::sync::watch` channel, so readers never block the
//! dispatch path and always observe a consistent whole.

use tokio::sync::watch;

use crate::msp::protocol::{Attitude, Battery, Message, RcChannels};

/// Most recent value of each telemetry message, if any has arrived
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub attitude: Option<Attitude>,
    pub channels: Option<RcChannels>,
    pub armed: Option<bool>,
    pub battery: Option<Battery>,
}

/// Writer half, owned by the link's dispatch path
#[derive(Debug)]
pub struct TelemetryStore {
    tx: watch::Sender<TelemetrySnapshot>,
}

/// Reader half, cloneable for any number of consumers
#[derive(Debug, Clone)]
pub struct TelemetryReader {
    rx: watch::Receiver<TelemetrySnapshot>,
}

/// Create a connected store/reader pair
pub fn channel() -> (TelemetryStore, TelemetryReader) {
    let (tx, rx) = watch::channel(TelemetrySnapshot::default());
    (TelemetryStore { tx }, TelemetryReader { rx })
}

impl TelemetryStore {
    /// Fold a decoded message into the snapshot
    pub fn update(&self, message: &Message) {
        self.tx.send_modify(|snapshot| match *message {
            Message::AttitudeRadians(att) => snapshot.attitude = Some(att),
            Message::RcNormal(rc) => snapshot.channels = Some(rc),
            Message::ArmStatus { armed } => snapshot.armed = Some(armed),
            Message::BatteryStatus(batt) => snapshot.battery = Some(batt),
        });
    }
}

impl TelemetryReader {
    /// Copy of the current snapshot
    pub fn latest(&self) -> TelemetrySnapshot {
        *self.rx.borrow()
    }

    /// Wait until the snapshot changes
    ///
    /// Returns an error only when the link (and its store) is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

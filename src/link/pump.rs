//! # Request–Response Pump State
//!
//! Pure state machine behind the link: which streams are active, which
//! requests are in flight, and whether the connection has produced its
//! first response yet. All transitions happen under the link's lock; the
//! async plumbing around it lives in the parent module.

use std::time::Instant;

use crate::error::{MspLinkError, Result};
use crate::msp::protocol::{Message, MSP_ATTITUDE_RADIANS, MSP_RC_NORMAL};

/// A logical recurring telemetry exchange
///
/// Each stream polls one telemetry message: request out, response in,
/// request out again. Streams are independent; each carries at most one
/// in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// ATTITUDE_RADIANS polling
    Attitude,
    /// RC_NORMAL polling
    RcChannels,
}

/// Number of streams, used to size the slot table
pub(crate) const STREAM_COUNT: usize = 2;

impl Stream {
    /// The message ID this stream requests
    pub fn request_id(self) -> u8 {
        match self {
            Stream::Attitude => MSP_ATTITUDE_RADIANS,
            Stream::RcChannels => MSP_RC_NORMAL,
        }
    }

    /// The stream a decoded message belongs to, if any
    ///
    /// Unsolicited telemetry (arm status, battery) belongs to no stream
    /// and never drives the polling cycle.
    pub(crate) fn of_message(message: &Message) -> Option<Stream> {
        match message {
            Message::AttitudeRadians(_) => Some(Stream::Attitude),
            Message::RcNormal(_) => Some(Stream::RcChannels),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Stream::Attitude => 0,
            Stream::RcChannels => 1,
        }
    }
}

/// Connection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// No connection attempt in progress
    Idle,
    /// Connected, waiting for the first decodable response
    Connecting,
    /// At least one response decoded; polling may run
    Streaming,
    /// The first-response watchdog fired; reconnect required
    Faulted,
}

/// Per-stream request bookkeeping
#[derive(Debug, Default, Clone, Copy)]
struct StreamSlot {
    /// Caller wants this stream polling
    active: bool,
    /// When the in-flight request was sent, if one is outstanding
    pending: Option<Instant>,
}

/// Pump state for one connection attempt
///
/// Resets completely on every connect; nothing survives a reconnect.
#[derive(Debug)]
pub(crate) struct PumpState {
    phase: Phase,
    awaiting_first_response: bool,
    slots: [StreamSlot; STREAM_COUNT],
}

impl PumpState {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Idle,
            awaiting_first_response: false,
            slots: [StreamSlot::default(); STREAM_COUNT],
        }
    }

    /// Begin a connection attempt
    pub(crate) fn connect(&mut self) {
        self.phase = Phase::Connecting;
        self.awaiting_first_response = true;
        self.slots = [StreamSlot::default(); STREAM_COUNT];
    }

    /// Mark a stream active and record its request as in flight
    ///
    /// # Errors
    ///
    /// * `NotConnected` - no connection attempt is in progress
    /// * `StreamBusy` - the stream already has a request in flight
    pub(crate) fn start_stream(&mut self, stream: Stream) -> Result<()> {
        match self.phase {
            Phase::Connecting | Phase::Streaming => {}
            Phase::Idle | Phase::Faulted => return Err(MspLinkError::NotConnected),
        }

        let slot = &mut self.slots[stream.index()];
        if slot.pending.is_some() {
            return Err(MspLinkError::StreamBusy(stream));
        }

        slot.active = true;
        slot.pending = Some(Instant::now());
        Ok(())
    }

    /// Mark a stream inactive
    ///
    /// Any in-flight request completes without a successor.
    pub(crate) fn stop_stream(&mut self, stream: Stream) {
        self.slots[stream.index()].active = false;
    }

    /// Record a decoded message; returns the stream to re-issue, if any
    ///
    /// The active flag is read here, at the moment of would-re-issue, so
    /// a `stop_stream` racing with the response still prevents exactly
    /// one further request.
    pub(crate) fn on_message(&mut self, message: &Message) -> Option<Stream> {
        if self.awaiting_first_response && self.phase == Phase::Connecting {
            self.awaiting_first_response = false;
            self.phase = Phase::Streaming;
        }

        let stream = Stream::of_message(message)?;
        let phase = self.phase;
        let slot = &mut self.slots[stream.index()];

        if slot.pending.take().is_some() && slot.active && phase == Phase::Streaming {
            slot.pending = Some(Instant::now());
            return Some(stream);
        }

        None
    }

    /// Handle the first-response watchdog elapsing
    ///
    /// Returns true exactly once per connection attempt that never
    /// produced a decodable response.
    pub(crate) fn watchdog_fired(&mut self) -> bool {
        if self.phase == Phase::Connecting && self.awaiting_first_response {
            self.phase = Phase::Faulted;
            self.slots = [StreamSlot::default(); STREAM_COUNT];
            true
        } else {
            false
        }
    }

    /// Tear down to idle, clearing all pending and active flags
    pub(crate) fn disconnect(&mut self) {
        self.phase = Phase::Idle;
        self.awaiting_first_response = false;
        self.slots = [StreamSlot::default(); STREAM_COUNT];
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }
}

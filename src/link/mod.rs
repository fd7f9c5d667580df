//! # Link Module
//!
//! Request–response pump driving the serial link.
//!
//! This module handles:
//! - Reader task: pulls bytes off the link and feeds the stream parser
//! - Writer task: drains outgoing frames without blocking dispatch
//! - Polling telemetry streams (response in, next request out)
//! - First-response watchdog and link-health events
//!
//! The transport is any ordered byte stream; the flight controller's
//! serial port in production, an in-memory pipe in tests.

mod pump;

pub use pump::Stream;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::error::{MspLinkError, Result};
use crate::msp::decoder::MspParser;
use crate::msp::encoder::{serialize_command, serialize_request};
use crate::msp::protocol::{Message, MSP_SET_MOTOR_NORMAL};
use crate::msp::registry::FieldValue;
use crate::telemetry::{self, TelemetryReader, TelemetryStore};
use pump::PumpState;

/// Link-health faults surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFault {
    /// No decodable response arrived within the connection watchdog
    NoResponse,
}

/// Events delivered to the consumer of the link
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkEvent {
    /// A decoded inbound message
    Message(Message),
    /// A link-health fault
    Fault(LinkFault),
}

/// Receiver side of the link's event channel
pub type LinkEvents = mpsc::UnboundedReceiver<LinkEvent>;

/// State shared between the caller-facing handle and the I/O tasks
struct Shared {
    pump: Mutex<PumpState>,
    frames: mpsc::UnboundedSender<Vec<u8>>,
    events: mpsc::UnboundedSender<LinkEvent>,
    telemetry: TelemetryStore,
}

/// Active connection to a flight controller
///
/// Owns the I/O tasks for one connection attempt. Dropping the handle
/// (or calling [`Link::disconnect`]) stops them.
///
/// # Examples
///
/// ```no_run
/// use msp_link::config::LinkConfig;
/// use msp_link::link::{Link, LinkEvent, Stream};
/// use msp_link::serial::FcSerial;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let serial = FcSerial::open()?;
///     let (link, mut events, _telemetry) =
///         Link::connect(serial.into_stream(), LinkConfig::default());
///
///     link.start_stream(Stream::Attitude)?;
///     while let Some(event) = events.recv().await {
///         if let LinkEvent::Message(msg) = event {
///             println!("{:?}", msg);
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct Link {
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

impl Link {
    /// Connect the pump to an open transport
    ///
    /// Spawns the reader, writer, and watchdog tasks, so this must run
    /// inside a tokio runtime. The transport is assumed already open,
    /// reliable, and ordered.
    ///
    /// # Arguments
    ///
    /// * `transport` - Byte stream to the flight controller
    /// * `config` - Link tuning (watchdog timeout)
    ///
    /// # Returns
    ///
    /// * The link handle, the event receiver, and a telemetry snapshot
    ///   reader
    pub fn connect<S>(transport: S, config: LinkConfig) -> (Self, LinkEvents, TelemetryReader)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(transport);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (store, snapshot_reader) = telemetry::channel();

        let mut pump = PumpState::new();
        pump.connect();

        let shared = Arc::new(Shared {
            pump: Mutex::new(pump),
            frames: frame_tx,
            events: event_tx,
            telemetry: store,
        });

        let timeout = Duration::from_millis(config.connect_timeout_ms);
        info!("link connecting, watchdog {:?}", timeout);

        let tasks = vec![
            tokio::spawn(read_loop(read_half, Arc::clone(&shared))),
            tokio::spawn(write_loop(write_half, frame_rx)),
            tokio::spawn(watchdog(Arc::clone(&shared), timeout)),
        ];

        (Self { shared, tasks }, event_rx, snapshot_reader)
    }

    /// Start polling a telemetry stream
    ///
    /// Transmits the stream's request and records it in flight; the next
    /// request goes out automatically when the response arrives.
    ///
    /// # Errors
    ///
    /// * `StreamBusy` - a request for this stream is already in flight
    /// * `NotConnected` - the link is idle, faulted, or torn down
    pub fn start_stream(&self, stream: Stream) -> Result<()> {
        self.lock_pump().start_stream(stream)?;
        debug!("starting {:?} stream", stream);
        self.transmit(serialize_request(stream.request_id()))
    }

    /// Stop polling a telemetry stream
    ///
    /// Any in-flight request completes; no further request follows.
    pub fn stop_stream(&self, stream: Stream) {
        debug!("stopping {:?} stream", stream);
        self.lock_pump().stop_stream(stream);
    }

    /// Transmit a one-shot request for any message ID
    pub fn submit_request(&self, id: u8) -> Result<()> {
        self.transmit(serialize_request(id))
    }

    /// Serialize and transmit a command
    ///
    /// # Errors
    ///
    /// * `Protocol` / `ArityMismatch` - the values do not fit the
    ///   registered schema; nothing is sent
    pub fn submit_command(&self, id: u8, values: &[FieldValue]) -> Result<()> {
        self.transmit(serialize_command(id, values)?)
    }

    /// Send a SET_MOTOR_NORMAL command
    ///
    /// # Arguments
    ///
    /// * `motors` - Motor outputs 1-4 as fractions in [0, 1]
    pub fn set_motors(&self, motors: [f32; 4]) -> Result<()> {
        let values = [
            FieldValue::F32(motors[0]),
            FieldValue::F32(motors[1]),
            FieldValue::F32(motors[2]),
            FieldValue::F32(motors[3]),
        ];
        self.submit_command(MSP_SET_MOTOR_NORMAL, &values)
    }

    /// Tear the link down
    ///
    /// Stops the I/O tasks and clears all pending requests and stream
    /// flags. The handle cannot be reused; reconnecting builds a new
    /// link.
    pub fn disconnect(&self) {
        info!("link disconnecting");
        for task in &self.tasks {
            task.abort();
        }
        self.lock_pump().disconnect();
    }

    fn transmit(&self, frame: Vec<u8>) -> Result<()> {
        self.shared
            .frames
            .send(frame)
            .map_err(|_| MspLinkError::NotConnected)
    }

    fn lock_pump(&self) -> MutexGuard<'_, PumpState> {
        self.shared.pump.lock().expect("pump state lock poisoned")
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Pull bytes off the link and dispatch decoded messages
async fn read_loop<R>(mut reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin + Send,
{
    let mut parser = MspParser::new();
    let mut buf = [0u8; 512];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("link closed by peer");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("serial read failed: {}", e);
                break;
            }
        };

        for &byte in &buf[..n] {
            if let Some(message) = parser.feed_decoded(byte) {
                dispatch(&shared, message);
            }
        }
    }
}

/// Handle one decoded message on the reader task
fn dispatch(shared: &Shared, message: Message) {
    let reissue = shared
        .pump
        .lock()
        .expect("pump state lock poisoned")
        .on_message(&message);

    shared.telemetry.update(&message);

    if let Some(stream) = reissue {
        trace!("re-issuing {:?} request", stream);
        // Unbounded send keeps the reader from blocking on transport I/O
        if shared
            .frames
            .send(serialize_request(stream.request_id()))
            .is_err()
        {
            debug!("writer gone, dropping re-issue");
        }
    }

    let _ = shared.events.send(LinkEvent::Message(message));
}

/// Drain outgoing frames onto the transport
async fn write_loop<W>(mut writer: W, mut frames: mpsc::UnboundedReceiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!("serial write failed: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!("serial flush failed: {}", e);
            break;
        }
        debug!("sent frame ({} bytes)", frame.len());
    }
}

/// Fault the link if nothing decodes before the timeout
async fn watchdog(shared: Arc<Shared>, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let fired = shared
        .pump
        .lock()
        .expect("pump state lock poisoned")
        .watchdog_fired();

    if fired {
        warn!("no response from flight controller within {:?}", timeout);
        let _ = shared.events.send(LinkEvent::Fault(LinkFault::NoResponse));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msp::crc::checksum;
    use crate::msp::protocol::{
        Attitude, MSP_ATTITUDE_RADIANS, MSP_DIRECTION_FROM_DEVICE, MSP_HEADER_DOLLAR,
        MSP_HEADER_M,
    };
    use tokio::io::duplex;
    use tokio::time::timeout as tokio_timeout;
    use tokio_test::assert_ok;

    const ATTITUDE_REQUEST: [u8; 6] = [0x24, 0x4D, 0x3C, 0x00, 0x7A, 0x7A];

    fn test_config(connect_timeout_ms: u64) -> LinkConfig {
        LinkConfig { connect_timeout_ms }
    }

    fn attitude_response(roll: f32, pitch: f32, yaw: f32) -> Vec<u8> {
        let mut frame = vec![
            MSP_HEADER_DOLLAR,
            MSP_HEADER_M,
            MSP_DIRECTION_FROM_DEVICE,
            12,
            MSP_ATTITUDE_RADIANS,
        ];
        frame.extend_from_slice(&roll.to_le_bytes());
        frame.extend_from_slice(&pitch.to_le_bytes());
        frame.extend_from_slice(&yaw.to_le_bytes());
        frame.push(checksum(&frame[3..]));
        frame
    }

    async fn read_request(fc: &mut tokio::io::DuplexStream) -> [u8; 6] {
        let mut request = [0u8; 6];
        tokio_timeout(Duration::from_secs(1), fc.read_exact(&mut request))
            .await
            .expect("timed out waiting for request")
            .expect("transport closed");
        request
    }

    async fn next_event(events: &mut LinkEvents) -> LinkEvent {
        tokio_timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_start_stream_transmits_request() {
        let (gcs, mut fc) = duplex(256);
        let (link, _events, _telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.start_stream(Stream::Attitude));
        assert_eq!(read_request(&mut fc).await, ATTITUDE_REQUEST);
    }

    #[tokio::test]
    async fn test_response_dispatches_and_reissues() {
        let (gcs, mut fc) = duplex(256);
        let (link, mut events, _telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.start_stream(Stream::Attitude));
        read_request(&mut fc).await;

        fc.write_all(&attitude_response(0.1, 0.2, 0.3)).await.unwrap();

        match next_event(&mut events).await {
            LinkEvent::Message(Message::AttitudeRadians(att)) => {
                assert!((att.roll - 0.1).abs() < f32::EPSILON);
            }
            other => panic!("expected attitude message, got {:?}", other),
        }

        // The next request goes out without further caller action
        assert_eq!(read_request(&mut fc).await, ATTITUDE_REQUEST);
    }

    #[tokio::test]
    async fn test_polling_continues_across_responses() {
        let (gcs, mut fc) = duplex(256);
        let (link, mut events, _telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.start_stream(Stream::Attitude));

        for round in 0..3 {
            read_request(&mut fc).await;
            fc.write_all(&attitude_response(round as f32, 0.0, 0.0))
                .await
                .unwrap();
            let event = next_event(&mut events).await;
            assert!(
                matches!(event, LinkEvent::Message(Message::AttitudeRadians(_))),
                "round {}: {:?}",
                round,
                event
            );
        }
    }

    #[tokio::test]
    async fn test_second_start_is_busy() {
        let (gcs, _fc) = duplex(256);
        let (link, _events, _telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.start_stream(Stream::Attitude));
        assert!(matches!(
            link.start_stream(Stream::Attitude),
            Err(MspLinkError::StreamBusy(Stream::Attitude))
        ));
    }

    #[tokio::test]
    async fn test_stop_stream_prevents_reissue() {
        let (gcs, mut fc) = duplex(256);
        let (link, mut events, _telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.start_stream(Stream::Attitude));
        read_request(&mut fc).await;

        link.stop_stream(Stream::Attitude);
        fc.write_all(&attitude_response(0.1, 0.2, 0.3)).await.unwrap();

        // The in-flight response still dispatches
        assert!(matches!(
            next_event(&mut events).await,
            LinkEvent::Message(Message::AttitudeRadians(_))
        ));

        // But no further request may follow
        let mut byte = [0u8; 1];
        let result = tokio_timeout(Duration::from_millis(100), fc.read_exact(&mut byte)).await;
        assert!(result.is_err(), "unexpected request after stop_stream");
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_faults_silent_link() {
        let (gcs, _fc) = duplex(256);
        let (link, mut events, _telemetry) = Link::connect(gcs, test_config(100));

        assert_ok!(link.start_stream(Stream::Attitude));

        assert_eq!(
            next_event(&mut events).await,
            LinkEvent::Fault(LinkFault::NoResponse)
        );

        // Faulted: no new streams until the caller reconnects
        assert!(matches!(
            link.start_stream(Stream::RcChannels),
            Err(MspLinkError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_quiet_after_response() {
        let (gcs, mut fc) = duplex(256);
        let (link, mut events, _telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.start_stream(Stream::Attitude));
        read_request(&mut fc).await;
        fc.write_all(&attitude_response(0.0, 0.0, 0.0)).await.unwrap();

        assert!(matches!(
            next_event(&mut events).await,
            LinkEvent::Message(_)
        ));

        // Well past the watchdog window; only the polling request and no
        // fault may appear
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert!(matches!(
            events.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_set_motors_transmits_command() {
        let (gcs, mut fc) = duplex(256);
        let (link, _events, _telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.set_motors([0.0, 0.0, 0.0, 0.5]));

        let mut frame = [0u8; 22];
        tokio_timeout(Duration::from_secs(1), fc.read_exact(&mut frame))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(&frame[..3], &[0x24, 0x4D, 0x3C]);
        assert_eq!(frame[3], 16);
        assert_eq!(frame[4], MSP_SET_MOTOR_NORMAL);
        assert_eq!(frame[21], checksum(&frame[3..21]));
    }

    #[tokio::test]
    async fn test_set_motors_faulty_arity_not_sent() {
        let (gcs, _fc) = duplex(256);
        let (link, _events, _telemetry) = Link::connect(gcs, test_config(4000));

        let err = link
            .submit_command(MSP_SET_MOTOR_NORMAL, &[FieldValue::F32(1.0)])
            .unwrap_err();
        assert!(matches!(err, MspLinkError::ArityMismatch(_)));
    }

    #[tokio::test]
    async fn test_telemetry_snapshot_tracks_messages() {
        let (gcs, mut fc) = duplex(256);
        let (link, mut events, telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.start_stream(Stream::Attitude));
        read_request(&mut fc).await;
        fc.write_all(&attitude_response(0.25, -0.5, 1.0)).await.unwrap();
        next_event(&mut events).await;

        let snapshot = telemetry.latest();
        assert_eq!(
            snapshot.attitude,
            Some(Attitude { roll: 0.25, pitch: -0.5, yaw: 1.0 })
        );
        assert_eq!(snapshot.channels, None);
    }

    #[tokio::test]
    async fn test_disconnect_rejects_further_requests() {
        let (gcs, _fc) = duplex(256);
        let (link, _events, _telemetry) = Link::connect(gcs, test_config(4000));

        link.disconnect();
        assert!(matches!(
            link.start_stream(Stream::Attitude),
            Err(MspLinkError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_noise_between_frames_tolerated() {
        let (gcs, mut fc) = duplex(256);
        let (link, mut events, _telemetry) = Link::connect(gcs, test_config(4000));

        assert_ok!(link.start_stream(Stream::Attitude));
        read_request(&mut fc).await;

        // Line noise around the real response
        fc.write_all(&[0xFF, 0x24, 0x00]).await.unwrap();
        fc.write_all(&attitude_response(0.1, 0.2, 0.3)).await.unwrap();
        fc.write_all(&[0xAB, 0xCD]).await.unwrap();

        assert!(matches!(
            next_event(&mut events).await,
            LinkEvent::Message(Message::AttitudeRadians(_))
        ));
    }
}

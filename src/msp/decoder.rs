//! # MSP Stream Parser
//!
//! Incremental byte-stream parser for inbound MSP frames.
//!
//! The serial link delivers bytes in arbitrary chunks: a read may end in
//! the middle of a header, a payload, or anywhere else, and line noise can
//! inject garbage between frames. The parser is a state machine fed one
//! byte at a time; it holds all intermediate state across calls, so a
//! frame split over any number of reads decodes identically to one fed
//! whole.
//!
//! Corruption is self-healing: a bad checksum discards the frame and the
//! parser resynchronizes on the next `'$'`. Nothing the wire can produce
//! makes `feed` panic or return an error; the worst outcome is a dropped
//! frame.

use tracing::trace;

use super::crc::Crc8Xor;
use super::protocol::{
    Frame, FrameDirection, Message, MSP_DIRECTION_FROM_DEVICE, MSP_DIRECTION_TO_DEVICE,
    MSP_HEADER_DOLLAR, MSP_HEADER_M,
};
use super::registry;

/// Parser position within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    AwaitDollar,
    AwaitM,
    AwaitDirection,
    AwaitSize,
    AwaitId,
    AwaitPayload,
    AwaitCrc,
}

/// Incremental frame parser
///
/// # Examples
///
/// ```
/// use msp_link::msp::decoder::MspParser;
///
/// let mut parser = MspParser::new();
/// let frame_bytes = [0x24, 0x4D, 0x3E, 0x00, 0x7A, 0x7A];
///
/// let mut frames = Vec::new();
/// for byte in frame_bytes {
///     if let Some(frame) = parser.feed(byte) {
///         frames.push(frame);
///     }
/// }
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].id, 0x7A);
/// ```
#[derive(Debug)]
pub struct MspParser {
    state: ParseState,
    direction: FrameDirection,
    size: u8,
    id: u8,
    payload: Vec<u8>,
    crc: Crc8Xor,
}

impl Default for MspParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MspParser {
    /// Create a parser waiting for the start of a frame
    pub fn new() -> Self {
        Self {
            state: ParseState::AwaitDollar,
            direction: FrameDirection::FromDevice,
            size: 0,
            id: 0,
            payload: Vec::new(),
            crc: Crc8Xor::new(),
        }
    }

    /// Consume one byte from the link
    ///
    /// # Arguments
    ///
    /// * `byte` - Next byte off the wire
    ///
    /// # Returns
    ///
    /// * `Option<Frame>` - A complete checksum-validated frame, or `None`
    ///   while mid-frame or after discarding a corrupt one
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            ParseState::AwaitDollar => {
                if byte == MSP_HEADER_DOLLAR {
                    self.state = ParseState::AwaitM;
                }
                None
            }
            ParseState::AwaitM => {
                // A failed 'M' may itself be the '$' of the next frame
                self.state = match byte {
                    MSP_HEADER_M => ParseState::AwaitDirection,
                    MSP_HEADER_DOLLAR => ParseState::AwaitM,
                    _ => ParseState::AwaitDollar,
                };
                None
            }
            ParseState::AwaitDirection => {
                match byte {
                    MSP_DIRECTION_TO_DEVICE => {
                        self.direction = FrameDirection::ToDevice;
                        self.state = ParseState::AwaitSize;
                    }
                    MSP_DIRECTION_FROM_DEVICE => {
                        self.direction = FrameDirection::FromDevice;
                        self.state = ParseState::AwaitSize;
                    }
                    _ => {
                        trace!("invalid direction byte 0x{:02X}, resyncing", byte);
                        self.state = ParseState::AwaitDollar;
                    }
                }
                None
            }
            ParseState::AwaitSize => {
                self.size = byte;
                self.payload.clear();
                self.payload.reserve(byte as usize);
                self.crc = Crc8Xor::new();
                self.crc.update(byte);
                self.state = ParseState::AwaitId;
                None
            }
            ParseState::AwaitId => {
                self.id = byte;
                self.crc.update(byte);
                self.state = if self.size == 0 {
                    ParseState::AwaitCrc
                } else {
                    ParseState::AwaitPayload
                };
                None
            }
            ParseState::AwaitPayload => {
                self.payload.push(byte);
                self.crc.update(byte);
                if self.payload.len() == self.size as usize {
                    self.state = ParseState::AwaitCrc;
                }
                None
            }
            ParseState::AwaitCrc => {
                // Scanning restarts after this byte either way; discarded
                // bytes are never replayed
                self.state = ParseState::AwaitDollar;

                if byte == self.crc.value() {
                    Some(Frame {
                        direction: self.direction,
                        id: self.id,
                        payload: std::mem::take(&mut self.payload),
                    })
                } else {
                    trace!(
                        "checksum mismatch on id {}: expected 0x{:02X}, got 0x{:02X}",
                        self.id,
                        self.crc.value(),
                        byte
                    );
                    None
                }
            }
        }
    }

    /// Consume one byte and dispatch through the registry
    ///
    /// Only frames travelling from the device are decoded. Unknown IDs
    /// and schema mismatches drop the frame silently; the link stays
    /// healthy.
    ///
    /// # Arguments
    ///
    /// * `byte` - Next byte off the wire
    ///
    /// # Returns
    ///
    /// * `Option<Message>` - A decoded message, or `None`
    pub fn feed_decoded(&mut self, byte: u8) -> Option<Message> {
        let frame = self.feed(byte)?;

        if frame.direction != FrameDirection::FromDevice {
            trace!("ignoring to-device frame id {}", frame.id);
            return None;
        }

        match registry::decode(frame.id, &frame.payload) {
            Ok(message) => Some(message),
            Err(e) => {
                trace!("dropping frame: {}", e);
                None
            }
        }
    }
}

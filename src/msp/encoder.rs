//! # MSP Frame Serializer
//!
//! Builds complete outgoing frames for the flight controller.
//!
//! Requests carry an empty payload and ask the device to respond with the
//! named telemetry message. Commands carry a payload packed per the
//! registry schema. Every outgoing frame uses the `'<'` direction byte;
//! responses are never serialized on this side of the link.

use bytes::{BufMut, BytesMut};

use super::crc::checksum;
use super::protocol::{MSP_DIRECTION_TO_DEVICE, MSP_HEADER_DOLLAR, MSP_HEADER_M};
use super::registry::{self, FieldValue, MessageClass};
use crate::error::{MspLinkError, Result};

/// Serialize a zero-payload request frame
///
/// # Arguments
///
/// * `id` - Message ID to request
///
/// # Returns
///
/// * `Vec<u8>` - Complete 6-byte frame
///
/// # Examples
///
/// ```
/// use msp_link::msp::encoder::serialize_request;
/// use msp_link::msp::protocol::MSP_ATTITUDE_RADIANS;
///
/// let frame = serialize_request(MSP_ATTITUDE_RADIANS);
/// assert_eq!(frame, [0x24, 0x4D, 0x3C, 0x00, 0x7A, 0x7A]);
/// ```
pub fn serialize_request(id: u8) -> Vec<u8> {
    // Size is 0, so the checksum reduces to the id byte
    vec![
        MSP_HEADER_DOLLAR,
        MSP_HEADER_M,
        MSP_DIRECTION_TO_DEVICE,
        0x00,
        id,
        checksum(&[0x00, id]),
    ]
}

/// Serialize a command frame with a packed payload
///
/// # Arguments
///
/// * `id` - Command message ID
/// * `values` - Field values, one per schema field, in schema order
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Complete frame ready for the wire
///
/// # Errors
///
/// * `Protocol` - `id` is not registered, or is not a command
/// * `ArityMismatch` - value count or types disagree with the schema
pub fn serialize_command(id: u8, values: &[FieldValue]) -> Result<Vec<u8>> {
    let def = registry::lookup(id)
        .ok_or_else(|| MspLinkError::Protocol(format!("unknown message id {}", id)))?;

    if def.class != MessageClass::Command {
        return Err(MspLinkError::Protocol(format!(
            "message {} ({}) is not a command",
            id, def.name
        )));
    }

    if values.len() != def.fields.len() {
        return Err(MspLinkError::ArityMismatch(format!(
            "{} expects {} fields, got {}",
            def.name,
            def.fields.len(),
            values.len()
        )));
    }

    let mut payload = BytesMut::with_capacity(def.payload_len());
    for (field, value) in def.fields.iter().zip(values) {
        if value.ty() != field.ty {
            return Err(MspLinkError::ArityMismatch(format!(
                "{} field '{}' expects {:?}, got {:?}",
                def.name,
                field.name,
                field.ty,
                value.ty()
            )));
        }

        match *value {
            FieldValue::F32(v) => payload.put_f32_le(v),
            FieldValue::U8(v) => payload.put_u8(v),
            FieldValue::U16(v) => payload.put_u16_le(v),
            FieldValue::I16(v) => payload.put_i16_le(v),
            FieldValue::U32(v) => payload.put_u32_le(v),
        }
    }

    Ok(build_frame(id, &payload))
}

/// Assemble header, payload, and checksum into a wire frame
fn build_frame(id: u8, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u8;

    let mut frame = Vec::with_capacity(6 + payload.len());
    frame.push(MSP_HEADER_DOLLAR);
    frame.push(MSP_HEADER_M);
    frame.push(MSP_DIRECTION_TO_DEVICE);
    frame.push(size);
    frame.push(id);
    frame.extend_from_slice(payload);

    // Checksum covers size, id, and payload
    frame.push(checksum(&frame[3..]));
    frame
}

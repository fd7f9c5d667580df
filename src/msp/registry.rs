//! # MSP Message Registry
//!
//! Static table mapping message IDs to their payload schemas.
//!
//! Every message the link understands is registered here once, at compile
//! time. A schema is an ordered list of fixed-width numeric fields; the
//! payload length of an ID is the sum of its field widths, with no
//! padding. Inbound frames whose declared size disagrees with the schema
//! are rejected before any field is read.

use bytes::Buf;
use thiserror::Error;

use super::protocol::{
    Attitude, Battery, Message, RcChannels, MSP_ARM_STATUS, MSP_ATTITUDE_RADIANS,
    MSP_BATTERY_STATUS, MSP_RC_NORMAL, MSP_SET_MOTOR_NORMAL,
};

/// Fixed-width numeric field types carried in MSP payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// IEEE-754 single precision, little-endian
    F32,
    /// Unsigned byte
    U8,
    /// Unsigned 16-bit, little-endian
    U16,
    /// Signed 16-bit, little-endian
    I16,
    /// Unsigned 32-bit, little-endian
    U32,
}

impl FieldType {
    /// Encoded width in bytes
    pub fn width(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::F32 | FieldType::U32 => 4,
        }
    }
}

/// A single named field in a message schema
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
}

/// Direction capability of a registered ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Requestable with an empty payload; received as a response
    Telemetry,
    /// Sent to the device with a payload; never decoded inbound
    Command,
}

/// Immutable definition of one message ID
#[derive(Debug, Clone, Copy)]
pub struct MessageDef {
    pub id: u8,
    pub name: &'static str,
    pub class: MessageClass,
    pub fields: &'static [Field],
}

impl MessageDef {
    /// Payload length in bytes, computed from the field list
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|f| f.ty.width()).sum()
    }
}

/// A field value, typed to match its schema entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    F32(f32),
    U8(u8),
    U16(u16),
    I16(i16),
    U32(u32),
}

impl FieldValue {
    /// The schema type this value satisfies
    pub fn ty(&self) -> FieldType {
        match self {
            FieldValue::F32(_) => FieldType::F32,
            FieldValue::U8(_) => FieldType::U8,
            FieldValue::U16(_) => FieldType::U16,
            FieldValue::I16(_) => FieldType::I16,
            FieldValue::U32(_) => FieldType::U32,
        }
    }
}

/// All message IDs known to this ground station
pub const REGISTRY: &[MessageDef] = &[
    MessageDef {
        id: MSP_RC_NORMAL,
        name: "RC_NORMAL",
        class: MessageClass::Telemetry,
        fields: &[
            Field { name: "c1", ty: FieldType::F32 },
            Field { name: "c2", ty: FieldType::F32 },
            Field { name: "c3", ty: FieldType::F32 },
            Field { name: "c4", ty: FieldType::F32 },
            Field { name: "c5", ty: FieldType::F32 },
            Field { name: "c6", ty: FieldType::F32 },
        ],
    },
    MessageDef {
        id: MSP_ATTITUDE_RADIANS,
        name: "ATTITUDE_RADIANS",
        class: MessageClass::Telemetry,
        fields: &[
            Field { name: "roll", ty: FieldType::F32 },
            Field { name: "pitch", ty: FieldType::F32 },
            Field { name: "yaw", ty: FieldType::F32 },
        ],
    },
    MessageDef {
        id: MSP_ARM_STATUS,
        name: "ARM_STATUS",
        class: MessageClass::Telemetry,
        fields: &[Field { name: "armed", ty: FieldType::U8 }],
    },
    MessageDef {
        id: MSP_BATTERY_STATUS,
        name: "BATTERY_STATUS",
        class: MessageClass::Telemetry,
        fields: &[
            Field { name: "volts", ty: FieldType::F32 },
            Field { name: "amps", ty: FieldType::F32 },
        ],
    },
    MessageDef {
        id: MSP_SET_MOTOR_NORMAL,
        name: "SET_MOTOR_NORMAL",
        class: MessageClass::Command,
        fields: &[
            Field { name: "m1", ty: FieldType::F32 },
            Field { name: "m2", ty: FieldType::F32 },
            Field { name: "m3", ty: FieldType::F32 },
            Field { name: "m4", ty: FieldType::F32 },
        ],
    },
];

/// Errors produced while decoding an inbound payload
///
/// Both variants describe frames that were structurally valid on the wire.
/// Callers drop the frame and keep reading; neither is a link fault.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The ID has no registry entry
    #[error("unknown message id {0}")]
    UnknownMessage(u8),

    /// The payload length does not match the registered schema
    #[error("message {id} expects a {expected}-byte payload, got {got}")]
    SchemaMismatch { id: u8, expected: usize, got: usize },
}

/// Look up the definition for a message ID
///
/// # Arguments
///
/// * `id` - Message ID (0..=255)
///
/// # Returns
///
/// * `Option<&'static MessageDef>` - The definition, or `None` if the ID
///   is not registered
pub fn lookup(id: u8) -> Option<&'static MessageDef> {
    REGISTRY.iter().find(|def| def.id == id)
}

/// Decode an inbound payload into a typed [`Message`]
///
/// # Arguments
///
/// * `id` - Message ID from the frame header
/// * `payload` - Raw payload bytes
///
/// # Returns
///
/// * `Result<Message, DecodeError>` - Typed message, or why decoding
///   cannot proceed
///
/// # Errors
///
/// * [`DecodeError::UnknownMessage`] - ID not registered for inbound
///   decode (unregistered, or command-class)
/// * [`DecodeError::SchemaMismatch`] - payload length disagrees with the
///   registered field list
pub fn decode(id: u8, payload: &[u8]) -> Result<Message, DecodeError> {
    let def = lookup(id).ok_or(DecodeError::UnknownMessage(id))?;

    if def.class != MessageClass::Telemetry {
        // Outbound-only IDs have no inbound decode entry
        return Err(DecodeError::UnknownMessage(id));
    }

    let expected = def.payload_len();
    if payload.len() != expected {
        return Err(DecodeError::SchemaMismatch {
            id,
            expected,
            got: payload.len(),
        });
    }

    let mut buf = payload;
    let message = match id {
        MSP_RC_NORMAL => {
            let mut channels = [0.0f32; 6];
            for channel in &mut channels {
                *channel = buf.get_f32_le();
            }
            Message::RcNormal(RcChannels { channels })
        }
        MSP_ATTITUDE_RADIANS => Message::AttitudeRadians(Attitude {
            roll: buf.get_f32_le(),
            pitch: buf.get_f32_le(),
            yaw: buf.get_f32_le(),
        }),
        MSP_ARM_STATUS => Message::ArmStatus {
            armed: buf.get_u8() != 0,
        },
        MSP_BATTERY_STATUS => Message::BatteryStatus(Battery {
            volts: buf.get_f32_le(),
            amps: buf.get_f32_le(),
        }),
        _ => return Err(DecodeError::UnknownMessage(id)),
    };

    Ok(message)
}

/// Decode a payload into raw field values per a schema
///
/// Schema-driven counterpart of [`decode`]: interprets each field's byte
/// range by its declared type without mapping to a [`Message`] variant.
///
/// # Arguments
///
/// * `def` - Message definition describing the layout
/// * `payload` - Raw payload bytes
///
/// # Returns
///
/// * `Result<Vec<FieldValue>, DecodeError>` - One value per schema field
///
/// # Errors
///
/// * [`DecodeError::SchemaMismatch`] - payload length disagrees with the
///   field list
pub fn decode_fields(def: &MessageDef, payload: &[u8]) -> Result<Vec<FieldValue>, DecodeError> {
    let expected = def.payload_len();
    if payload.len() != expected {
        return Err(DecodeError::SchemaMismatch {
            id: def.id,
            expected,
            got: payload.len(),
        });
    }

    let mut buf = payload;
    let values = def
        .fields
        .iter()
        .map(|field| match field.ty {
            FieldType::F32 => FieldValue::F32(buf.get_f32_le()),
            FieldType::U8 => FieldValue::U8(buf.get_u8()),
            FieldType::U16 => FieldValue::U16(buf.get_u16_le()),
            FieldType::I16 => FieldValue::I16(buf.get_i16_le()),
            FieldType::U32 => FieldValue::U32(buf.get_u32_le()),
        })
        .collect();

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_ids() {
        let def = lookup(MSP_ATTITUDE_RADIANS).unwrap();
        assert_eq!(def.name, "ATTITUDE_RADIANS");
        assert_eq!(def.class, MessageClass::Telemetry);

        let def = lookup(MSP_SET_MOTOR_NORMAL).unwrap();
        assert_eq!(def.class, MessageClass::Command);
    }

    #[test]
    fn test_lookup_unknown_id() {
        assert!(lookup(0).is_none());
        assert!(lookup(200).is_none());
    }

    #[test]
    fn test_registry_ids_unique() {
        for (i, a) in REGISTRY.iter().enumerate() {
            for b in &REGISTRY[i + 1..] {
                assert_ne!(a.id, b.id, "duplicate registry id {}", a.id);
            }
        }
    }

    #[test]
    fn test_payload_lengths() {
        assert_eq!(lookup(MSP_RC_NORMAL).unwrap().payload_len(), 24);
        assert_eq!(lookup(MSP_ATTITUDE_RADIANS).unwrap().payload_len(), 12);
        assert_eq!(lookup(MSP_ARM_STATUS).unwrap().payload_len(), 1);
        assert_eq!(lookup(MSP_BATTERY_STATUS).unwrap().payload_len(), 8);
        assert_eq!(lookup(MSP_SET_MOTOR_NORMAL).unwrap().payload_len(), 16);
    }

    #[test]
    fn test_decode_attitude() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0.1f32.to_le_bytes());
        payload.extend_from_slice(&(-0.2f32).to_le_bytes());
        payload.extend_from_slice(&1.5f32.to_le_bytes());

        let msg = decode(MSP_ATTITUDE_RADIANS, &payload).unwrap();
        match msg {
            Message::AttitudeRadians(att) => {
                assert!((att.roll - 0.1).abs() < f32::EPSILON);
                assert!((att.pitch + 0.2).abs() < f32::EPSILON);
                assert!((att.yaw - 1.5).abs() < f32::EPSILON);
            }
            other => panic!("expected attitude, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rc_channels() {
        let mut payload = Vec::new();
        for i in 0..6 {
            payload.extend_from_slice(&(i as f32 * 0.25).to_le_bytes());
        }

        let msg = decode(MSP_RC_NORMAL, &payload).unwrap();
        match msg {
            Message::RcNormal(rc) => {
                assert_eq!(rc.channels[0], 0.0);
                assert_eq!(rc.channels[4], 1.0);
            }
            other => panic!("expected rc channels, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_arm_status() {
        assert_eq!(
            decode(MSP_ARM_STATUS, &[1]).unwrap(),
            Message::ArmStatus { armed: true }
        );
        assert_eq!(
            decode(MSP_ARM_STATUS, &[0]).unwrap(),
            Message::ArmStatus { armed: false }
        );
    }

    #[test]
    fn test_decode_unknown_id() {
        assert_eq!(decode(42, &[]), Err(DecodeError::UnknownMessage(42)));
    }

    #[test]
    fn test_decode_command_id_not_inbound() {
        // Command-class IDs are never decoded from the wire
        let payload = [0u8; 16];
        assert_eq!(
            decode(MSP_SET_MOTOR_NORMAL, &payload),
            Err(DecodeError::UnknownMessage(MSP_SET_MOTOR_NORMAL))
        );
    }

    #[test]
    fn test_decode_schema_mismatch() {
        let err = decode(MSP_ATTITUDE_RADIANS, &[0u8; 11]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::SchemaMismatch {
                id: MSP_ATTITUDE_RADIANS,
                expected: 12,
                got: 11
            }
        );
    }

    #[test]
    fn test_decode_fields_all_types() {
        const MIXED: MessageDef = MessageDef {
            id: 0,
            name: "MIXED",
            class: MessageClass::Telemetry,
            fields: &[
                Field { name: "a", ty: FieldType::F32 },
                Field { name: "b", ty: FieldType::U8 },
                Field { name: "c", ty: FieldType::U16 },
                Field { name: "d", ty: FieldType::I16 },
                Field { name: "e", ty: FieldType::U32 },
            ],
        };

        let mut payload = Vec::new();
        payload.extend_from_slice(&3.25f32.to_le_bytes());
        payload.push(0xAB);
        payload.extend_from_slice(&0x1234u16.to_le_bytes());
        payload.extend_from_slice(&(-77i16).to_le_bytes());
        payload.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());

        let values = decode_fields(&MIXED, &payload).unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::F32(3.25),
                FieldValue::U8(0xAB),
                FieldValue::U16(0x1234),
                FieldValue::I16(-77),
                FieldValue::U32(0xDEAD_BEEF),
            ]
        );
    }

    #[test]
    fn test_decode_fields_length_check() {
        let def = lookup(MSP_BATTERY_STATUS).unwrap();
        assert!(decode_fields(def, &[0u8; 7]).is_err());
        assert!(decode_fields(def, &[0u8; 9]).is_err());
        assert!(decode_fields(def, &[0u8; 8]).is_ok());
    }
}

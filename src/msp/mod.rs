//! # MSP Protocol Module
//!
//! Implementation of the MSP-style serial protocol spoken by the flight
//! controller.
//!
//! This module handles:
//! - Request and command frame serialization
//! - Incremental frame parsing with noise resynchronization
//! - Message registry (ID to payload schema mapping)
//! - XOR-8 checksum calculation and validation

pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod protocol;
pub mod registry;

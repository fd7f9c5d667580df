//! # MSP Link Library
//!
//! Ground-station link for MSP flight controllers over serial.
//!
//! This library provides the core functionality for talking to an
//! MSP-style flight controller: frame parsing and serialization, the
//! message registry, and the request–response pump that drives
//! continuous polling telemetry.

pub mod config;
pub mod error;
pub mod link;
pub mod msp;
pub mod serial;
pub mod telemetry;

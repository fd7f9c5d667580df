//! # Serial Communication Module
//!
//! Handles the serial connection to the MSP flight controller.
//!
//! This module handles:
//! - Opening the serial port at 115,200 baud (8N1, no flow control)
//! - Auto-detecting the device on common USB paths
//! - Handing the open port to the link as a plain byte stream

use crate::error::{MspLinkError, Result};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default MSP baud rate
pub const MSP_BAUD_RATE: u32 = 115_200;

/// Default flight-controller device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices (most common for flight controllers)
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Flight-controller serial port handle
///
/// Wraps the open port until the link takes ownership of the byte
/// stream via [`FcSerial::into_stream`].
pub struct FcSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
}

impl std::fmt::Debug for FcSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl FcSerial {
    /// Open a connection to the flight controller
    ///
    /// Auto-detects the device by trying common paths at the default
    /// baud rate.
    ///
    /// # Returns
    ///
    /// * `Result<FcSerial>` - Connected serial port or error
    ///
    /// # Errors
    ///
    /// Returns error if no flight controller is found or the port cannot
    /// be opened
    pub fn open() -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS)
    }

    /// Open a connection trying custom device paths in order
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., `&["/dev/ttyACM0"]`)
    ///
    /// # Returns
    ///
    /// * `Result<FcSerial>` - Connected serial port or error
    pub fn open_with_paths(paths: &[&str]) -> Result<Self> {
        for path in paths {
            debug!("trying to open serial port: {}", path);

            match Self::open_port(path, MSP_BAUD_RATE) {
                Ok(port) => {
                    info!("opened flight controller at {}", path);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(MspLinkError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific device path at a specific baud rate
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Line speed in baud
    pub fn open_path(path: &str, baud_rate: u32) -> Result<Self> {
        let port = Self::open_port(path, baud_rate)?;
        info!("opened flight controller at {} ({} baud)", path, baud_rate);
        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    /// Open a serial port with MSP line settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| MspLinkError::Serial(format!("failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Surrender the port as a raw byte stream for the link
    pub fn into_stream(self) -> tokio_serial::SerialStream {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(MSP_BAUD_RATE, 115_200);
        assert_eq!(DEFAULT_DEVICE_PATHS.len(), 2);
        assert_eq!(DEFAULT_DEVICE_PATHS[0], "/dev/ttyACM0");
        assert_eq!(DEFAULT_DEVICE_PATHS[1], "/dev/ttyUSB0");
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = FcSerial::open_with_paths(invalid_paths);

        assert!(result.is_err());
        match result.unwrap_err() {
            MspLinkError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("expected SerialPortNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        let result = FcSerial::open_with_paths(empty_paths);

        assert!(matches!(
            result,
            Err(MspLinkError::SerialPortNotFound(_))
        ));
    }

    #[test]
    fn test_open_path_with_invalid_path_returns_error() {
        let result = FcSerial::open_path("/dev/nonexistent_serial_device_12345", MSP_BAUD_RATE);

        assert!(result.is_err());
        match result.unwrap_err() {
            MspLinkError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
            }
            other => panic!("expected Serial error, got: {:?}", other),
        }
    }

    // Integration test - only runs if a flight controller is connected
    // Skipped in CI/CD environments
    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_open_with_real_hardware() {
        let result = FcSerial::open();

        if let Ok(serial) = result {
            println!("opened flight controller at: {}", serial.device_path());
            let path = serial.device_path();
            assert!(
                path == "/dev/ttyACM0" || path == "/dev/ttyUSB0",
                "unexpected device path: {}",
                path
            );
        } else {
            println!("no flight controller detected (this is OK for CI/CD)");
        }
    }
}

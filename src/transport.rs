//! Serial transport for SDS011 sensors.
//!
//! The sensor ships with a USB serial adapter fixed at 9600 baud with no
//! flow control. This module only opens the port; the engine drives the
//! resulting stream directly.

use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};

/// Baud rate the SDS011 serial adapter is fixed to.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Configuration for the serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }
}

/// Opens the serial port described by `config`.
///
/// # Errors
///
/// Returns an error if the port cannot be opened.
pub fn open(config: &SerialConfig) -> Result<SerialStream> {
    tracing::info!("opening serial port: {}", config.port);

    let stream = tokio_serial::new(&config.port, config.baud_rate)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(Error::Serial)?;

    Ok(stream)
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

//! # sds011
//!
//! An async Rust driver for the Nova Fitness SDS011 particulate matter
//! sensor, connected over USB/Serial.
//!
//! The sensor speaks a small binary protocol: fixed-size framed packets
//! with a checksum, one command in flight at a time, and unsolicited
//! measurement broadcasts interleaved with command replies. This crate
//! implements the full protocol engine - stream framing with
//! resynchronization, reply correlation, and timeout-driven retransmission.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Robust framing: resynchronizes after noise or corruption on the line
//! - Automatic retransmission of unconfirmed commands
//! - Sample broadcasts delivered through a registered observer
//!
//! ## Quick Start
//!
//! ```no_run
//! use sds011::Sds011;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sds011::Error> {
//!     let sensor = Sds011::open("/dev/ttyUSB0").await?;
//!
//!     sensor.register_sample_observer(|sample| {
//!         println!("PM2.5: {:.1} µg/m³, PM10: {:.1} µg/m³", sample.pm2_5, sample.pm10);
//!     });
//!
//!     // Wake the sensor and report a reading every 5 minutes.
//!     sensor.set_work_state(true).await?;
//!     sensor.set_cycle_interval(5).await?;
//!
//!     // Request one reading right away.
//!     sensor.poll().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Low-level protocol types (frame codec, stream scanner,
//!   command codes)
//! - [`types`] - Decoded data ([`Sample`], [`Version`])
//! - [`transport`] - Serial port configuration and opening
//! - [`client`] - High-level [`Sds011`] client
//!
//! The command multiplexer between transport and client runs as a single
//! background task owned by the client.

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;

mod engine;

// Re-exports for convenience
pub use client::Sds011;
pub use error::{Error, FrameError, Result};
pub use protocol::{CommandCode, Frame, FrameScanner, Mode, Reply};
pub use transport::{SerialConfig, list_ports};
pub use types::{Sample, Version};

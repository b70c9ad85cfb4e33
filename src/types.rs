//! Data types decoded from sensor replies and broadcasts.

use std::fmt;

/// Firmware version as reported by the sensor: three raw date bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Release year (two digits).
    pub year: u8,
    /// Release month.
    pub month: u8,
    /// Release day.
    pub day: u8,
}

impl Version {
    /// Decodes a version from the payload of a firmware reply.
    ///
    /// Payload layout: `[command echo] [year] [month] [day] [id] [id]`.
    #[must_use]
    pub const fn from_payload(payload: &[u8; 6]) -> Self {
        Self {
            year: payload[1],
            month: payload[2],
            day: payload[3],
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.year, self.month, self.day)
    }
}

/// A decoded particulate reading broadcast by the sensor.
///
/// Raw values are 16-bit little-endian fixed-point with a scale of 1/10,
/// so readings carry one fractional digit in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// PM2.5 concentration in µg/m³.
    pub pm2_5: f32,
    /// PM10 concentration in µg/m³.
    pub pm10: f32,
}

impl Sample {
    /// Decodes a sample from the payload of a Sample frame.
    ///
    /// Payload layout: `[pm2.5 lo] [pm2.5 hi] [pm10 lo] [pm10 hi] [id] [id]`.
    #[must_use]
    pub fn from_payload(payload: &[u8; 6]) -> Self {
        let pm2_5 = u16::from_le_bytes([payload[0], payload[1]]);
        let pm10 = u16::from_le_bytes([payload[2], payload[3]]);
        Self {
            pm2_5: f32::from(pm2_5) / 10.0,
            pm10: f32::from(pm10) / 10.0,
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PM2.5 {:.1} µg/m³, PM10 {:.1} µg/m³", self.pm2_5, self.pm10)
    }
}

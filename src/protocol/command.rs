//! Command codes for the SDS011 protocol.
//!
//! Every command frame carries a command code and a mode byte selecting
//! between reading and writing the addressed setting.

/// Command codes sent to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// Get/set the reporting mode (active push vs. passive query).
    ReportMode = 2,
    /// Request a one-shot measurement; answered by a Sample frame, not a Reply.
    Query = 4,
    /// Get/set the device ID.
    DeviceId = 5,
    /// Get/set the working state (measuring vs. sleeping).
    WorkState = 6,
    /// Query the firmware version (year, month, day).
    Firmware = 7,
    /// Get/set the working period in minutes (0 = continuous).
    Cycle = 8,
}

impl From<CommandCode> for u8 {
    fn from(cmd: CommandCode) -> Self {
        cmd as Self
    }
}

/// Mode byte selecting between reading and writing a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    /// Read the current value.
    Get = 0,
    /// Write a new value.
    Set = 1,
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        mode as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_code_values() {
        assert_eq!(CommandCode::ReportMode as u8, 2);
        assert_eq!(CommandCode::Query as u8, 4);
        assert_eq!(CommandCode::DeviceId as u8, 5);
        assert_eq!(CommandCode::WorkState as u8, 6);
        assert_eq!(CommandCode::Firmware as u8, 7);
        assert_eq!(CommandCode::Cycle as u8, 8);
    }

    #[test]
    fn test_mode_values() {
        assert_eq!(Mode::Get as u8, 0);
        assert_eq!(Mode::Set as u8, 1);
    }

    #[test]
    fn test_command_from_conversion() {
        let cmd: u8 = CommandCode::Firmware.into();
        assert_eq!(cmd, 7);
    }
}

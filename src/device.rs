//! The interface to a connected Asphodel device
//!
//! The transport that actually talks to the hardware lives outside of this crate. Everything in
//! here only describes what the bootload engine needs from it.

use num_enum::{FromPrimitive, IntoPrimitive};
use thiserror::Error;

/// Indicates an error code returned by the device in response to a command
#[repr(u8)]
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, FromPrimitive)]
pub enum ErrorCode {
    #[error("ERROR_CODE_UNSPECIFIED")]
    #[num_enum(default)]
    Unspecified = 0x01,
    #[error("The command was malformed")]
    MalformedCommand = 0x02,
    #[error("The command is not implemented by the device")]
    UnimplementedCommand = 0x03,
    #[error("The command parameters had an unexpected length")]
    BadCommandLength = 0x04,
    #[error("ERROR_CODE_BAD_ADDRESS")]
    BadAddress = 0x05,
    #[error("ERROR_CODE_BAD_INDEX")]
    BadIndex = 0x06,
    #[error("The device rejected the data - for a page verify this means the contents differ")]
    InvalidData = 0x07,
    #[error("ERROR_CODE_UNSUPPORTED")]
    Unsupported = 0x08,
    #[error("The command was unexpected in the current device state")]
    BadState = 0x09,
    #[error("ERROR_CODE_I2C_ERROR")]
    I2cError = 0x0a,
    #[error("ERROR_CODE_INCOMPLETE")]
    Incomplete = 0x0b,
}

/// A failure reported by a device primitive
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DeviceError {
    #[error("Device returned error {:?}: {}", _0, _0)]
    Command(ErrorCode),
    #[error("Timed out while waiting for the device")]
    Timeout,
    #[error("The device disconnected")]
    Disconnected,
    #[error("Transport error: {}", _0)]
    Transport(String),
}

/// The execution context to bind to when reconnecting to a device
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    Bootloader,
    Application,
}

/// The result of asking the bootloader whether the armed page matches a digest
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VerifyOutcome {
    /// The page already holds the expected contents
    Matches,
    /// The page holds something else and needs to be written
    Differs,
}

impl VerifyOutcome {
    /// Maps the raw result of a verify command onto an outcome.
    ///
    /// The device signals a content mismatch with `ErrorCode::InvalidData`; every other error is
    /// passed through unchanged.
    pub fn from_command_result(result: Result<(), DeviceError>) -> Result<Self, DeviceError> {
        match result {
            Ok(()) => Ok(VerifyOutcome::Matches),
            Err(DeviceError::Command(ErrorCode::InvalidData)) => Ok(VerifyOutcome::Differs),
            Err(err) => Err(err),
        }
    }
}

/// Identity of a connected device, as read from the device itself
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct DeviceInfo {
    pub chip_model: String,
    /// Board name and revision, in that order
    pub board_info: (String, u32),
    /// Whether the device handle currently accepts bootloader commands
    pub supports_bootloader: bool,
    pub build_info: Option<String>,
    pub build_date: Option<String>,
}

/// The primitive operations the bootload engine drives.
///
/// Implemented by the transport layer. None of these are retried by the implementation; the
/// bootload orchestrator owns the retry policy.
pub trait Device {
    /// Whether the current handle is bound to the bootloader
    fn supports_bootloader_commands(&self) -> bool;

    /// Reset the device and start its bootloader
    fn bootloader_jump(&mut self) -> Result<(), DeviceError>;

    /// Leave the bootloader and start the main application
    fn bootloader_start_program(&mut self) -> Result<(), DeviceError>;

    /// Drop the current handle and reconnect to the same device in the given mode
    fn reconnect(&mut self, mode: Mode) -> Result<(), DeviceError>;

    /// Returns the bootloader description string, e.g. "XMega AES"
    fn get_bootloader_info(&mut self) -> Result<String, DeviceError>;

    /// Returns the code block sizes the bootloader accepts
    fn get_bootloader_block_sizes(&mut self) -> Result<Vec<u32>, DeviceError>;

    fn start_bootloader_page(&mut self, page_number: u32, nonce: &[u8]) -> Result<(), DeviceError>;

    fn write_bootloader_code_block(&mut self, data: &[u8]) -> Result<(), DeviceError>;

    fn finish_bootloader_page(&mut self, digest: &[u8]) -> Result<(), DeviceError>;

    fn verify_bootloader_page(&mut self, digest: &[u8]) -> Result<VerifyOutcome, DeviceError>;
}

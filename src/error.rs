use std::io;

use thiserror::Error;

use crate::bootload::BuilderError;
use crate::device::DeviceError;

/// Errors that can occur while decoding a firmware container
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error while decompressing firmware: {}", _0)]
    Io(#[from] io::Error),

    #[error("Could not set up the LZMA decoder: {}", _0)]
    Lzma(#[from] xz2::stream::Error),

    #[error("Firmware contents are not valid UTF-8: {}", _0)]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Firmware contents are not a valid firmware document: {}", _0)]
    Json(#[from] serde_json::Error),

    #[error("Page {} has an invalid hex encoded {}: {}", page, field, source)]
    Hex {
        page: u32,
        field: &'static str,
        source: hex::FromHexError,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Corrupt firmware image: {}", _0)]
    CorruptImage(#[from] ImageError),

    #[error("Firmware does not support chip {} on board {} rev {}", chip, board.0, board.1)]
    IncompatibleDevice { chip: String, board: (String, u32) },

    #[error("Device error: {}", _0)]
    Device(#[from] DeviceError),

    #[error("Page {} failed verification after it was written", page)]
    VerificationMismatch { page: u32 },

    #[error("Ran out of retries, last device error: {}", _0)]
    RetryBudgetExhausted(#[source] DeviceError),

    #[error("Bootload was cancelled")]
    Cancelled,

    #[error("Device did not report any bootloader block sizes")]
    NoBlockSizes,

    #[error("No supported block size fits the remaining {} bytes of the page", remaining)]
    NoFittingBlockSize { remaining: usize },

    #[error("Invalid bootload options: {}", _0)]
    Builder(#[from] BuilderError),
}

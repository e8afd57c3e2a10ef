//! Firmware to device compatibility checks

use log::debug;

use crate::device::DeviceInfo;
use crate::firmware::FirmwareImage;
use crate::Error;

/// Returns true if the image was built for the device's chip and board.
///
/// The image lists boards as `(revision, board_name)` while the device reports
/// `(board_name, revision)`.
pub fn is_supported(image: &FirmwareImage, info: &DeviceInfo) -> bool {
    if image.chip != info.chip_model {
        return false;
    }

    let (board_name, revision) = &info.board_info;

    image
        .board
        .iter()
        .any(|(rev, name)| rev == revision && name == board_name)
}

/// Like `is_supported`, but returns `Error::IncompatibleDevice` instead of false
pub fn ensure_supported(image: &FirmwareImage, info: &DeviceInfo) -> Result<(), Error> {
    if is_supported(image, info) {
        Ok(())
    } else {
        Err(Error::IncompatibleDevice {
            chip: info.chip_model.clone(),
            board: info.board_info.clone(),
        })
    }
}

/// Returns true if the device is known to already run exactly this application build.
///
/// A device reachable through bootloader commands is in an unknown state, so this is always
/// false for those.
pub fn already_programmed(image: &FirmwareImage, info: &DeviceInfo) -> bool {
    if info.supports_bootloader {
        debug!("Device is in bootloader mode, can't tell what it is running");
        return false;
    }

    image.build_info == info.build_info
        && image.build_date == info.build_date
        && image.is_application_only()
}

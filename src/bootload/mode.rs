//! Explicit mode changes requested by the user, outside of a bootload
//!
//! Unlike the transitions made by `Orchestrator::run`, these are tried once and any device error
//! is returned to the caller.

use log::info;

use crate::device::{Device, DeviceError, Mode};

/// Resets the device into its bootloader and reconnects to it
pub fn force_bootloader<D: Device + ?Sized>(device: &mut D) -> Result<(), DeviceError> {
    info!("Forcing device into bootloader mode");

    device.bootloader_jump()?;
    device.reconnect(Mode::Bootloader)
}

/// Starts the application from the bootloader and reconnects to it
pub fn force_application<D: Device + ?Sized>(device: &mut D) -> Result<(), DeviceError> {
    info!("Forcing device into application mode");

    device.bootloader_start_program()?;
    device.reconnect(Mode::Application)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Operation, SimulatedDevice};

    #[test]
    fn it_should_force_the_bootloader() {
        let mut device = SimulatedDevice::new(vec![16]);

        force_bootloader(&mut device).unwrap();

        assert_eq!(device.mode(), Mode::Bootloader);
        assert_eq!(
            device.calls(),
            &[Operation::BootloaderJump, Operation::ReconnectBootloader]
        );
    }

    #[test]
    fn it_should_force_the_application() {
        let mut device = SimulatedDevice::new(vec![16]);
        force_bootloader(&mut device).unwrap();
        device.clear_log();

        force_application(&mut device).unwrap();

        assert_eq!(device.mode(), Mode::Application);
        assert_eq!(
            device.calls(),
            &[
                Operation::BootloaderStartProgram,
                Operation::ReconnectApplication
            ]
        );
    }

    #[test]
    fn it_should_not_retry_failures() {
        let mut device = SimulatedDevice::new(vec![16]);
        device.fail_next(Operation::ReconnectBootloader, 1);

        assert_eq!(force_bootloader(&mut device), Err(DeviceError::Timeout));
        assert_eq!(device.count(Operation::ReconnectBootloader), 1);
        assert_eq!(device.count(Operation::BootloaderJump), 1);
    }

    #[test]
    fn it_should_not_reconnect_when_the_jump_fails() {
        let mut device = SimulatedDevice::new(vec![16]);
        device.fail_next_with(Operation::BootloaderJump, DeviceError::Disconnected);

        assert_eq!(force_bootloader(&mut device), Err(DeviceError::Disconnected));
        assert!(!device.calls().contains(&Operation::ReconnectBootloader));
    }
}

//! Typed command layer over a [`Transport`].
//!
//! [`Device`] turns the controller's wire protocol into methods: motion
//! commands, settings upload and download, and variable reads.  It knows
//! nothing about where the transport goes, so the same code runs over USB
//! and over the in-memory transports the tests use.

use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{self, cmd, setting};
use crate::settings::{Product, Settings, StepMode};
use crate::transport::{Direction, Transport, TransportError};
use crate::variables::Variables;

const DEBUG_DATA_SIZE: usize = 255;

/// One stepper motor controller, addressed through a transport.
pub struct Device<T: Transport> {
    transport: T,
    product: Product,
}

impl<T: Transport> Device<T> {
    /// Wrap a transport to a device of the given product.
    pub fn new(transport: T, product: Product) -> Self {
        Device { transport, product }
    }

    /// The product this device was opened as.
    pub fn product(&self) -> Product {
        self.product
    }

    fn quick(&mut self, request: u8, context: &str) -> Result<()> {
        self.transfer(Direction::Out, request, 0, 0, &mut [], context)?;
        Ok(())
    }

    fn command_32(&mut self, request: u8, value: u32, context: &str) -> Result<()> {
        self.transfer(
            Direction::Out,
            request,
            value as u16,
            (value >> 16) as u16,
            &mut [],
            context,
        )?;
        Ok(())
    }

    fn command_7(&mut self, request: u8, value: u8, context: &str) -> Result<()> {
        self.transfer(Direction::Out, request, value as u16, 0, &mut [], context)?;
        Ok(())
    }

    fn transfer(
        &mut self,
        direction: Direction,
        request: u8,
        value: u16,
        index: u16,
        data: &mut [u8],
        context: &str,
    ) -> Result<usize> {
        self.transport
            .control(direction, request, value, index, data)
            .map_err(|TransportError(message)| Error::Transport {
                context: context.to_string(),
                message,
            })
    }

    /// Set the target position, in microsteps.
    pub fn set_target_position(&mut self, position: i32) -> Result<()> {
        self.command_32(
            cmd::SET_TARGET_POSITION,
            position as u32,
            "There was an error setting the target position.",
        )
    }

    /// Set the target velocity, in microsteps per 10000 s.
    pub fn set_target_velocity(&mut self, velocity: i32) -> Result<()> {
        self.command_32(
            cmd::SET_TARGET_VELOCITY,
            velocity as u32,
            "There was an error setting the target velocity.",
        )
    }

    /// Stop abruptly and declare the given position to be the current one.
    pub fn halt_and_set_position(&mut self, position: i32) -> Result<()> {
        self.command_32(
            cmd::HALT_AND_SET_POSITION,
            position as u32,
            "There was an error halting and setting the position.",
        )
    }

    /// Stop abruptly and hold position.
    pub fn halt_and_hold(&mut self) -> Result<()> {
        self.quick(cmd::HALT_AND_HOLD, "There was an error halting.")
    }

    /// Keep the command timeout from firing without issuing a command.
    pub fn reset_command_timeout(&mut self) -> Result<()> {
        self.quick(
            cmd::RESET_COMMAND_TIMEOUT,
            "There was an error resetting the command timeout.",
        )
    }

    /// Turn the motor outputs off.
    pub fn deenergize(&mut self) -> Result<()> {
        self.quick(cmd::DEENERGIZE, "There was an error de-energizing.")
    }

    /// Turn the motor outputs on.
    pub fn energize(&mut self) -> Result<()> {
        self.quick(cmd::ENERGIZE, "There was an error energizing.")
    }

    /// Clear the safe start violation so motion commands take effect.
    pub fn exit_safe_start(&mut self) -> Result<()> {
        self.quick(cmd::EXIT_SAFE_START, "There was an error exiting safe start.")
    }

    /// Re-arm safe start.
    pub fn enter_safe_start(&mut self) -> Result<()> {
        self.quick(cmd::ENTER_SAFE_START, "There was an error entering safe start.")
    }

    /// Make the controller forget its state and reload settings, without
    /// modifying them.
    pub fn reset(&mut self) -> Result<()> {
        self.quick(cmd::RESET, "There was an error resetting the device.")
    }

    /// Clear a latched motor driver error.
    pub fn clear_driver_error(&mut self) -> Result<()> {
        self.quick(
            cmd::CLEAR_DRIVER_ERROR,
            "There was an error clearing the driver error.",
        )
    }

    /// Temporarily set the speed limit, in microsteps per 10000 s.
    pub fn set_speed_max(&mut self, speed: u32) -> Result<()> {
        self.command_32(
            cmd::SET_SPEED_MAX,
            speed,
            "There was an error setting the speed limit.",
        )
    }

    /// Temporarily set the starting speed, in microsteps per 10000 s.
    pub fn set_starting_speed(&mut self, speed: u32) -> Result<()> {
        self.command_32(
            cmd::SET_STARTING_SPEED,
            speed,
            "There was an error setting the starting speed.",
        )
    }

    /// Temporarily set the acceleration limit.
    pub fn set_accel_max(&mut self, accel: u32) -> Result<()> {
        self.command_32(
            cmd::SET_ACCEL_MAX,
            accel,
            "There was an error setting the acceleration limit.",
        )
    }

    /// Temporarily set the deceleration limit.
    pub fn set_decel_max(&mut self, decel: u32) -> Result<()> {
        self.command_32(
            cmd::SET_DECEL_MAX,
            decel,
            "There was an error setting the deceleration limit.",
        )
    }

    /// Temporarily set the step mode.
    pub fn set_step_mode(&mut self, mode: StepMode) -> Result<()> {
        self.command_7(
            cmd::SET_STEP_MODE,
            mode.code(),
            "There was an error setting the step mode.",
        )
    }

    /// Temporarily set the current limit, by code.
    pub fn set_current_limit_code(&mut self, code: u8) -> Result<()> {
        self.command_7(
            cmd::SET_CURRENT_LIMIT,
            code,
            "There was an error setting the current limit.",
        )
    }

    /// Temporarily set the decay mode, by code.
    pub fn set_decay_mode_code(&mut self, code: u8) -> Result<()> {
        self.command_7(
            cmd::SET_DECAY_MODE,
            code,
            "There was an error setting the decay mode.",
        )
    }

    /// Read and decode the device's runtime variables.
    ///
    /// With `clear_errors_occurred`, the errors-occurred flags are cleared
    /// as a side effect of the read.
    pub fn get_variables(&mut self, clear_errors_occurred: bool) -> Result<Variables> {
        let request = if clear_errors_occurred {
            cmd::GET_VARIABLE_AND_CLEAR_ERRORS_OCCURRED
        } else {
            cmd::GET_VARIABLE
        };
        let context = "There was an error reading variables from the device.";
        let mut buf = [0u8; protocol::VARIABLES_SIZE];
        let transferred = self.transfer(Direction::In, request, 0, 0, &mut buf, context)?;
        Variables::decode(&buf[..transferred])
    }

    /// Read and decode the device's settings.
    ///
    /// Invalid stored values append warnings rather than failing.
    pub fn get_settings(&mut self, warnings: &mut Vec<String>) -> Result<Settings> {
        let context = "There was an error reading settings from the device.";
        let mut buf = [0u8; protocol::SETTINGS_SIZE];
        let mut offset = 0;
        while offset < buf.len() {
            let length = (buf.len() - offset).min(protocol::MAX_RESPONSE_SIZE);
            let chunk = &mut buf[offset..offset + length];
            let transferred = self.transfer(
                Direction::In,
                cmd::GET_SETTING,
                0,
                offset as u16,
                chunk,
                context,
            )?;
            if transferred != length {
                return Err(Error::ProtocolSize {
                    context: context.to_string(),
                    expected: length,
                    actual: transferred,
                });
            }
            offset += length;
        }
        Settings::from_buffer(self.product, &buf, warnings)
    }

    /// Write settings to the device and reinitialize so they take effect.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<()> {
        let context = "There was an error applying settings to the device.";
        let buf = settings.to_buffer();
        debug!(product = %self.product, "applying settings");
        // Byte 0 is the not-initialized flag; leave it alone.
        for (address, &value) in buf.iter().enumerate().skip(1) {
            self.transfer(
                Direction::Out,
                cmd::SET_SETTING,
                value as u16,
                address as u16,
                &mut [],
                context,
            )?;
        }
        self.reinitialize()
    }

    /// Tell the firmware to restore its default settings.
    pub fn restore_defaults(&mut self) -> Result<()> {
        let context = "There was an error restoring the default settings.";
        self.transfer(
            Direction::Out,
            cmd::SET_SETTING,
            1,
            setting::NOT_INITIALIZED as u16,
            &mut [],
            context,
        )?;
        self.reinitialize()
    }

    /// Reload settings from EEPROM and reset the controller's state.
    pub fn reinitialize(&mut self) -> Result<()> {
        self.quick(cmd::REINITIALIZE, "There was an error reinitializing the device.")
    }

    /// Read the firmware's debug data block.
    pub fn get_debug_data(&mut self) -> Result<Vec<u8>> {
        let context = "There was an error reading debug data from the device.";
        let mut buf = [0u8; DEBUG_DATA_SIZE];
        let transferred =
            self.transfer(Direction::In, cmd::GET_DEBUG_DATA, 0, 0, &mut buf, context)?;
        Ok(buf[..transferred].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport that records every transfer and can serve canned settings.
    struct RecordingTransport {
        settings: [u8; protocol::SETTINGS_SIZE],
        log: Vec<(Direction, u8, u16, u16)>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            RecordingTransport {
                settings: [0; protocol::SETTINGS_SIZE],
                log: Vec::new(),
            }
        }
    }

    impl Transport for RecordingTransport {
        fn control(
            &mut self,
            direction: Direction,
            request: u8,
            value: u16,
            index: u16,
            data: &mut [u8],
        ) -> std::result::Result<usize, TransportError> {
            self.log.push((direction, request, value, index));
            match request {
                cmd::GET_SETTING => {
                    let offset = index as usize;
                    data.copy_from_slice(&self.settings[offset..offset + data.len()]);
                    Ok(data.len())
                }
                cmd::SET_SETTING => {
                    self.settings[index as usize] = value as u8;
                    Ok(0)
                }
                _ => Ok(data.len()),
            }
        }
    }

    #[test]
    fn test_32_bit_command_splits_value_and_index() {
        let mut device = Device::new(RecordingTransport::new(), Product::Drv8825);
        device.set_target_position(-2).unwrap();
        assert_eq!(
            device.transport.log,
            vec![(Direction::Out, cmd::SET_TARGET_POSITION, 0xFFFE, 0xFFFF)]
        );
    }

    #[test]
    fn test_apply_settings_skips_byte_zero_and_reinitializes() {
        let mut settings = Settings::new(Product::Drv8825);
        settings.fill_with_defaults();
        let mut device = Device::new(RecordingTransport::new(), Product::Drv8825);
        device.apply_settings(&settings).unwrap();

        let writes: Vec<_> = device
            .transport
            .log
            .iter()
            .filter(|(_, request, _, _)| *request == cmd::SET_SETTING)
            .collect();
        assert_eq!(writes.len(), protocol::SETTINGS_SIZE - 1);
        assert!(writes.iter().all(|(_, _, _, index)| *index != 0));
        assert_eq!(
            device.transport.log.last(),
            Some(&(Direction::Out, cmd::REINITIALIZE, 0, 0))
        );
        assert_eq!(device.transport.settings[0], 0);
    }

    #[test]
    fn test_settings_survive_device_round_trip() {
        let mut settings = Settings::new(Product::Drv8825);
        settings.fill_with_defaults();
        let mut device = Device::new(RecordingTransport::new(), Product::Drv8825);
        device.apply_settings(&settings).unwrap();

        let mut warnings = Vec::new();
        let read_back = device.get_settings(&mut warnings).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(read_back, settings);
    }

    #[test]
    fn test_restore_defaults_sets_not_initialized() {
        let mut device = Device::new(RecordingTransport::new(), Product::Drv8825);
        device.transport.settings[setting::NOT_INITIALIZED as usize] = 0;
        device.restore_defaults().unwrap();
        assert_eq!(device.transport.settings[setting::NOT_INITIALIZED as usize], 1);
    }

    #[test]
    fn test_transport_error_carries_context() {
        struct FailingTransport;
        impl Transport for FailingTransport {
            fn control(
                &mut self,
                _: Direction,
                _: u8,
                _: u16,
                _: u16,
                _: &mut [u8],
            ) -> std::result::Result<usize, TransportError> {
                Err(TransportError("pipe error".to_string()))
            }
        }
        let mut device = Device::new(FailingTransport, Product::Drv8825);
        let message = device.energize().unwrap_err().to_string();
        assert!(message.contains("error energizing"));
        assert!(message.contains("pipe error"));
    }
}

//! Conversion between [`Settings`] and the device's settings buffer.
//!
//! The buffer mirrors the controller's EEPROM layout: fixed offsets,
//! little-endian multi-byte fields, enums as single-byte codes.  The baud
//! rate is stored as a divisor and the current limits as codes, so a
//! settings record coming off the wire is already quantized.

use crate::error::{Error, Result};
use crate::protocol::{
    self, read_i16, read_i32, read_u16, read_u32, setting, write_i16, write_i32, write_u16,
    write_u32,
};
use crate::quant;

use super::{
    ControlMode, DecayMode, Pin, PinFunc, Product, ScalingDegree, Settings, SoftErrorResponse,
    StepMode,
};

const PIN_FUNC_MASK: u8 = 0x0F;
const PIN_PULLUP_BIT: u8 = 1 << 4;
const PIN_ANALOG_BIT: u8 = 1 << 5;
const PIN_POLARITY_BIT: u8 = 1 << 6;

impl Settings {
    /// Encode into the device buffer layout.
    ///
    /// Byte 0 (the not-initialized flag) is left clear.
    pub fn to_buffer(&self) -> [u8; protocol::SETTINGS_SIZE] {
        let mut buf = [0u8; protocol::SETTINGS_SIZE];
        buf[setting::CONTROL_MODE as usize] = self.control_mode.code();
        buf[setting::NEVER_SLEEP as usize] = self.never_sleep as u8;
        buf[setting::DISABLE_SAFE_START as usize] = self.disable_safe_start as u8;
        buf[setting::IGNORE_ERR_LINE_HIGH as usize] = self.ignore_err_line_high as u8;
        buf[setting::AUTO_CLEAR_DRIVER_ERROR as usize] = self.auto_clear_driver_error as u8;
        buf[setting::SOFT_ERROR_RESPONSE as usize] = self.soft_error_response.code();
        write_i32(
            &mut buf,
            setting::SOFT_ERROR_POSITION as usize,
            self.soft_error_position,
        );
        write_u16(
            &mut buf,
            setting::SERIAL_BAUD_RATE_DIVISOR as usize,
            quant::baud_rate_to_divisor(self.serial_baud_rate),
        );
        buf[setting::SERIAL_DEVICE_NUMBER as usize] = self.serial_device_number;
        buf[setting::SERIAL_CRC_ENABLED as usize] = self.serial_crc_enabled as u8;
        buf[setting::SERIAL_RESPONSE_DELAY as usize] = self.serial_response_delay;
        write_u16(&mut buf, setting::COMMAND_TIMEOUT as usize, self.command_timeout);
        write_u16(&mut buf, setting::LOW_VIN_TIMEOUT as usize, self.low_vin_timeout);
        write_u16(
            &mut buf,
            setting::LOW_VIN_SHUTOFF_VOLTAGE as usize,
            self.low_vin_shutoff_voltage,
        );
        write_u16(
            &mut buf,
            setting::LOW_VIN_STARTUP_VOLTAGE as usize,
            self.low_vin_startup_voltage,
        );
        write_u16(
            &mut buf,
            setting::HIGH_VIN_SHUTOFF_VOLTAGE as usize,
            self.high_vin_shutoff_voltage,
        );
        write_i16(&mut buf, setting::VIN_CALIBRATION as usize, self.vin_calibration);
        write_u16(
            &mut buf,
            setting::RC_MAX_PULSE_PERIOD as usize,
            self.rc_max_pulse_period,
        );
        write_u16(
            &mut buf,
            setting::RC_BAD_SIGNAL_TIMEOUT as usize,
            self.rc_bad_signal_timeout,
        );
        buf[setting::RC_CONSECUTIVE_GOOD_PULSES as usize] = self.rc_consecutive_good_pulses;
        buf[setting::INPUT_AVERAGING_ENABLED as usize] = self.input_averaging_enabled as u8;
        write_u16(&mut buf, setting::INPUT_HYSTERESIS as usize, self.input_hysteresis);
        write_u16(&mut buf, setting::INPUT_ERROR_MIN as usize, self.input_error_min);
        write_u16(&mut buf, setting::INPUT_ERROR_MAX as usize, self.input_error_max);
        buf[setting::INPUT_SCALING_DEGREE as usize] = self.input_scaling_degree.code();
        buf[setting::INPUT_INVERT as usize] = self.input_invert as u8;
        write_u16(&mut buf, setting::INPUT_MIN as usize, self.input_min);
        write_u16(&mut buf, setting::INPUT_NEUTRAL_MIN as usize, self.input_neutral_min);
        write_u16(&mut buf, setting::INPUT_NEUTRAL_MAX as usize, self.input_neutral_max);
        write_u16(&mut buf, setting::INPUT_MAX as usize, self.input_max);
        write_i32(&mut buf, setting::OUTPUT_MIN as usize, self.output_min);
        write_i32(&mut buf, setting::OUTPUT_MAX as usize, self.output_max);
        write_u32(&mut buf, setting::ENCODER_PRESCALER as usize, self.encoder_prescaler);
        write_u32(&mut buf, setting::ENCODER_POSTSCALER as usize, self.encoder_postscaler);
        buf[setting::ENCODER_UNLIMITED as usize] = self.encoder_unlimited as u8;
        for pin in Pin::ALL {
            let ps = self.pin(pin);
            let mut byte = ps.func.code() & PIN_FUNC_MASK;
            if ps.pullup {
                byte |= PIN_PULLUP_BIT;
            }
            if ps.analog {
                byte |= PIN_ANALOG_BIT;
            }
            if ps.polarity {
                byte |= PIN_POLARITY_BIT;
            }
            buf[setting::PIN_CONFIG_BASE as usize + pin.index()] = byte;
        }
        buf[setting::CURRENT_LIMIT_CODE as usize] =
            quant::current_limit_to_code(self.product, self.current_limit);
        buf[setting::CURRENT_LIMIT_CODE_DURING_ERROR as usize] =
            if self.current_limit_during_error < 0 {
                0xFF
            } else {
                quant::current_limit_to_code(self.product, self.current_limit_during_error as u32)
            };
        buf[setting::STEP_MODE as usize] = self.step_mode.code();
        buf[setting::DECAY_MODE as usize] = self.decay_mode.code();
        write_u32(&mut buf, setting::STARTING_SPEED as usize, self.starting_speed);
        write_u32(&mut buf, setting::SPEED_MAX as usize, self.speed_max);
        write_u32(&mut buf, setting::DECEL_MAX as usize, self.decel_max);
        write_u32(&mut buf, setting::ACCEL_MAX as usize, self.accel_max);
        buf[setting::INVERT_MOTOR_DIRECTION as usize] = self.invert_motor_direction as u8;
        buf
    }

    /// Decode a device buffer.
    ///
    /// The product is not stored in the buffer; it comes from the USB
    /// product ID.  Enum codes the firmware does not define fall back to
    /// their defaults with a warning.
    pub fn from_buffer(
        product: Product,
        buf: &[u8],
        warnings: &mut Vec<String>,
    ) -> Result<Settings> {
        if buf.len() < protocol::SETTINGS_SIZE {
            return Err(Error::ProtocolSize {
                context: "settings buffer".to_string(),
                expected: protocol::SETTINGS_SIZE,
                actual: buf.len(),
            });
        }
        let mut s = Settings::new(product);
        s.control_mode = decode_enum(
            ControlMode::from_code(buf[setting::CONTROL_MODE as usize]),
            "control mode",
            warnings,
        );
        s.never_sleep = buf[setting::NEVER_SLEEP as usize] != 0;
        s.disable_safe_start = buf[setting::DISABLE_SAFE_START as usize] != 0;
        s.ignore_err_line_high = buf[setting::IGNORE_ERR_LINE_HIGH as usize] != 0;
        s.auto_clear_driver_error = buf[setting::AUTO_CLEAR_DRIVER_ERROR as usize] != 0;
        s.soft_error_response = decode_enum(
            SoftErrorResponse::from_code(buf[setting::SOFT_ERROR_RESPONSE as usize]),
            "soft error response",
            warnings,
        );
        s.soft_error_position = read_i32(buf, setting::SOFT_ERROR_POSITION as usize);
        s.serial_baud_rate =
            quant::baud_rate_from_divisor(read_u16(buf, setting::SERIAL_BAUD_RATE_DIVISOR as usize));
        s.serial_device_number = buf[setting::SERIAL_DEVICE_NUMBER as usize];
        s.serial_crc_enabled = buf[setting::SERIAL_CRC_ENABLED as usize] != 0;
        s.serial_response_delay = buf[setting::SERIAL_RESPONSE_DELAY as usize];
        s.command_timeout = read_u16(buf, setting::COMMAND_TIMEOUT as usize);
        s.low_vin_timeout = read_u16(buf, setting::LOW_VIN_TIMEOUT as usize);
        s.low_vin_shutoff_voltage = read_u16(buf, setting::LOW_VIN_SHUTOFF_VOLTAGE as usize);
        s.low_vin_startup_voltage = read_u16(buf, setting::LOW_VIN_STARTUP_VOLTAGE as usize);
        s.high_vin_shutoff_voltage = read_u16(buf, setting::HIGH_VIN_SHUTOFF_VOLTAGE as usize);
        s.vin_calibration = read_i16(buf, setting::VIN_CALIBRATION as usize);
        s.rc_max_pulse_period = read_u16(buf, setting::RC_MAX_PULSE_PERIOD as usize);
        s.rc_bad_signal_timeout = read_u16(buf, setting::RC_BAD_SIGNAL_TIMEOUT as usize);
        s.rc_consecutive_good_pulses = buf[setting::RC_CONSECUTIVE_GOOD_PULSES as usize];
        s.input_averaging_enabled = buf[setting::INPUT_AVERAGING_ENABLED as usize] != 0;
        s.input_hysteresis = read_u16(buf, setting::INPUT_HYSTERESIS as usize);
        s.input_error_min = read_u16(buf, setting::INPUT_ERROR_MIN as usize);
        s.input_error_max = read_u16(buf, setting::INPUT_ERROR_MAX as usize);
        s.input_scaling_degree = decode_enum(
            ScalingDegree::from_code(buf[setting::INPUT_SCALING_DEGREE as usize]),
            "input scaling degree",
            warnings,
        );
        s.input_invert = buf[setting::INPUT_INVERT as usize] != 0;
        s.input_min = read_u16(buf, setting::INPUT_MIN as usize);
        s.input_neutral_min = read_u16(buf, setting::INPUT_NEUTRAL_MIN as usize);
        s.input_neutral_max = read_u16(buf, setting::INPUT_NEUTRAL_MAX as usize);
        s.input_max = read_u16(buf, setting::INPUT_MAX as usize);
        s.output_min = read_i32(buf, setting::OUTPUT_MIN as usize);
        s.output_max = read_i32(buf, setting::OUTPUT_MAX as usize);
        s.encoder_prescaler = read_u32(buf, setting::ENCODER_PRESCALER as usize);
        s.encoder_postscaler = read_u32(buf, setting::ENCODER_POSTSCALER as usize);
        s.encoder_unlimited = buf[setting::ENCODER_UNLIMITED as usize] != 0;
        for pin in Pin::ALL {
            let byte = buf[setting::PIN_CONFIG_BASE as usize + pin.index()];
            let ps = &mut s.pins[pin.index()];
            ps.func = decode_enum(
                PinFunc::from_code(byte & PIN_FUNC_MASK),
                "pin function",
                warnings,
            );
            ps.pullup = byte & PIN_PULLUP_BIT != 0;
            ps.analog = byte & PIN_ANALOG_BIT != 0;
            ps.polarity = byte & PIN_POLARITY_BIT != 0;
        }
        s.current_limit =
            quant::current_limit_from_code(product, buf[setting::CURRENT_LIMIT_CODE as usize]);
        let during_error = buf[setting::CURRENT_LIMIT_CODE_DURING_ERROR as usize];
        s.current_limit_during_error = if during_error == 0xFF {
            -1
        } else {
            quant::current_limit_from_code(product, during_error) as i32
        };
        s.step_mode = decode_enum(
            StepMode::from_code(buf[setting::STEP_MODE as usize]),
            "step mode",
            warnings,
        );
        s.decay_mode = decode_enum(
            DecayMode::from_code(buf[setting::DECAY_MODE as usize]),
            "decay mode",
            warnings,
        );
        s.starting_speed = read_u32(buf, setting::STARTING_SPEED as usize);
        s.speed_max = read_u32(buf, setting::SPEED_MAX as usize);
        s.decel_max = read_u32(buf, setting::DECEL_MAX as usize);
        s.accel_max = read_u32(buf, setting::ACCEL_MAX as usize);
        s.invert_motor_direction = buf[setting::INVERT_MOTOR_DIRECTION as usize] != 0;
        Ok(s)
    }
}

fn decode_enum<T: Default>(decoded: Option<T>, what: &str, warnings: &mut Vec<String>) -> T {
    match decoded {
        Some(value) => value,
        None => {
            warnings.push(format!(
                "The device reported an invalid {what} so the default will be used."
            ));
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_fixed_settings() {
        let mut settings = Settings::new(Product::Drv8825);
        settings.fill_with_defaults();
        settings.serial_baud_rate = 115_200;
        settings.soft_error_position = -500;
        settings.vin_calibration = -30;
        settings.current_limit = 1024;
        settings.current_limit_during_error = 512;
        settings.pins[Pin::Rc.index()].func = PinFunc::KillSwitch;
        settings.pins[Pin::Rc.index()].polarity = true;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert!(warnings.is_empty(), "{warnings:?}");

        let buf = settings.to_buffer();
        let parsed = Settings::from_buffer(Product::Drv8825, &buf, &mut warnings).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_baud_rate_is_stored_as_divisor() {
        let mut settings = Settings::new(Product::Drv8825);
        settings.serial_baud_rate = 9600;
        let buf = settings.to_buffer();
        assert_eq!(
            read_u16(&buf, setting::SERIAL_BAUD_RATE_DIVISOR as usize),
            1249
        );
    }

    #[test]
    fn test_during_error_sentinel() {
        let mut settings = Settings::new(Product::Drv8825);
        settings.current_limit_during_error = -1;
        let buf = settings.to_buffer();
        assert_eq!(buf[setting::CURRENT_LIMIT_CODE_DURING_ERROR as usize], 0xFF);

        let mut warnings = Vec::new();
        let parsed = Settings::from_buffer(Product::Drv8825, &buf, &mut warnings).unwrap();
        assert_eq!(parsed.current_limit_during_error, -1);
    }

    #[test]
    fn test_short_buffer_is_an_error() {
        let mut warnings = Vec::new();
        let buf = [0u8; protocol::SETTINGS_SIZE - 1];
        assert!(Settings::from_buffer(Product::Drv8825, &buf, &mut warnings).is_err());
    }

    #[test]
    fn test_invalid_enum_code_warns_and_defaults() {
        let settings = Settings::new(Product::Drv8825);
        let mut buf = settings.to_buffer();
        buf[setting::STEP_MODE as usize] = 0x77;
        let mut warnings = Vec::new();
        let parsed = Settings::from_buffer(Product::Drv8825, &buf, &mut warnings).unwrap();
        assert_eq!(parsed.step_mode, StepMode::Full);
        assert!(warnings.iter().any(|w| w.contains("step mode")));
    }
}

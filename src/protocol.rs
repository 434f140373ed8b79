//! Wire protocol constants shared by the device firmware and this library.
//!
//! Every command is a single USB control transfer.  Settings live in a
//! fixed-layout EEPROM image addressed byte-by-byte; live status is read as
//! one fixed-layout variables block.  All multi-byte integers are
//! little-endian; signed fields are two's-complement.

/// Number of configurable control pins (SCL, SDA, TX, RX, RC).
pub const CONTROL_PIN_COUNT: usize = 5;

/// Largest payload a single control transfer can carry.
pub const MAX_RESPONSE_SIZE: usize = 128;

/// Current limit resolution for the linear products, in milliamps per code.
pub const CURRENT_LIMIT_UNITS_MA: u32 = 32;

/// Current limit ceiling for the DRV8825-based product, in milliamps.
pub const MAX_ALLOWED_CURRENT_DRV8825: u32 = 3968;

/// Current limit ceiling for the DRV8834-based product, in milliamps.
pub const MAX_ALLOWED_CURRENT_DRV8834: u32 = 3456;

/// Highest valid current limit code for the MP6500-based product.
pub const MAX_ALLOWED_CURRENT_CODE_MP6500: u8 = 31;

/// Clock feeding the serial baud rate generator, in Hz.
pub const BAUD_RATE_GENERATOR_FACTOR: u32 = 12_000_000;

/// Lowest baud rate the firmware can generate.
pub const MIN_ALLOWED_BAUD_RATE: u32 = 200;

/// Highest baud rate the firmware can generate.
pub const MAX_ALLOWED_BAUD_RATE: u32 = 115_385;

/// Highest valid serial device number.
pub const MAX_SERIAL_DEVICE_NUMBER: u8 = 127;

/// Highest valid command timeout, in milliseconds.
pub const MAX_ALLOWED_COMMAND_TIMEOUT: u16 = 60_000;

/// Speed limit ceiling, in microsteps per 10000 s.
pub const MAX_ALLOWED_SPEED: u32 = 500_000_000;

/// Acceleration/deceleration floor, in microsteps per 100 s^2.
pub const MIN_ALLOWED_ACCEL: u32 = 100;

/// Acceleration/deceleration ceiling, in microsteps per 100 s^2.
pub const MAX_ALLOWED_ACCEL: u32 = 0x7FFF_FFFF;

/// Largest magnitude accepted for the VIN measurement calibration offset.
pub const MAX_VIN_CALIBRATION: i16 = 500;

/// Largest encoder prescaler/postscaler value.
pub const MAX_ALLOWED_ENCODER_SCALER: u32 = 0x7FFF_FFFF;

/// Command opcodes (the `bRequest` byte of each control transfer).
pub mod cmd {
    /// Set target position (32-bit value split across wValue/wIndex).
    pub const SET_TARGET_POSITION: u8 = 0xE0;
    /// Set target velocity (32-bit value split across wValue/wIndex).
    pub const SET_TARGET_VELOCITY: u8 = 0xE3;
    /// Stop abruptly and set the current position.
    pub const HALT_AND_SET_POSITION: u8 = 0xEC;
    /// Stop abruptly and hold.
    pub const HALT_AND_HOLD: u8 = 0x89;
    /// Clear the command timeout error.
    pub const RESET_COMMAND_TIMEOUT: u8 = 0x8C;
    /// Disable the motor driver.
    pub const DEENERGIZE: u8 = 0x86;
    /// Stop disabling the motor driver.
    pub const ENERGIZE: u8 = 0x85;
    /// Leave the safe start state.
    pub const EXIT_SAFE_START: u8 = 0x83;
    /// Enter the safe start state.
    pub const ENTER_SAFE_START: u8 = 0x8F;
    /// Make the controller forget its current state.
    pub const RESET: u8 = 0xB0;
    /// Attempt to clear a motor driver error.
    pub const CLEAR_DRIVER_ERROR: u8 = 0x8A;
    /// Temporarily set the speed limit.
    pub const SET_SPEED_MAX: u8 = 0xE6;
    /// Temporarily set the starting speed.
    pub const SET_STARTING_SPEED: u8 = 0xE5;
    /// Temporarily set the acceleration limit.
    pub const SET_ACCEL_MAX: u8 = 0xEA;
    /// Temporarily set the deceleration limit.
    pub const SET_DECEL_MAX: u8 = 0xE9;
    /// Temporarily set the step mode.
    pub const SET_STEP_MODE: u8 = 0x94;
    /// Temporarily set the current limit (wValue is the code).
    pub const SET_CURRENT_LIMIT: u8 = 0x91;
    /// Temporarily set the decay mode.
    pub const SET_DECAY_MODE: u8 = 0x92;
    /// Read a segment of the variables block.
    pub const GET_VARIABLE: u8 = 0xA1;
    /// Same as `GET_VARIABLE` but also clears the errors-occurred bits.
    pub const GET_VARIABLE_AND_CLEAR_ERRORS_OCCURRED: u8 = 0xA2;
    /// Read a segment of the settings EEPROM image.
    pub const GET_SETTING: u8 = 0xA8;
    /// Write one byte of the settings EEPROM image (wValue = byte,
    /// wIndex = address).
    pub const SET_SETTING: u8 = 0x13;
    /// Apply the written settings to the running firmware.
    pub const REINITIALIZE: u8 = 0x10;
    /// Read the firmware's internal debug blob.
    pub const GET_DEBUG_DATA: u8 = 0x20;
}

/// Byte offsets in the settings EEPROM image.
pub mod setting {
    /// Nonzero when the device should restore factory settings at reinit.
    pub const NOT_INITIALIZED: u8 = 0x00;
    /// Control mode code.
    pub const CONTROL_MODE: u8 = 0x01;
    /// Never-sleep flag.
    pub const NEVER_SLEEP: u8 = 0x02;
    /// Safe start disable flag.
    pub const DISABLE_SAFE_START: u8 = 0x03;
    /// Ignore-ERR-line-high flag.
    pub const IGNORE_ERR_LINE_HIGH: u8 = 0x04;
    /// Auto-clear-driver-error flag.
    pub const AUTO_CLEAR_DRIVER_ERROR: u8 = 0x05;
    /// Soft error response code.
    pub const SOFT_ERROR_RESPONSE: u8 = 0x06;
    /// Soft error target position (i32).
    pub const SOFT_ERROR_POSITION: u8 = 0x07;
    /// Serial baud rate divisor (u16).
    pub const SERIAL_BAUD_RATE_DIVISOR: u8 = 0x0B;
    /// Serial device number.
    pub const SERIAL_DEVICE_NUMBER: u8 = 0x0D;
    /// Serial CRC enable flag.
    pub const SERIAL_CRC_ENABLED: u8 = 0x0E;
    /// Serial response delay, in microseconds.
    pub const SERIAL_RESPONSE_DELAY: u8 = 0x0F;
    /// Command timeout in ms (u16).
    pub const COMMAND_TIMEOUT: u8 = 0x10;
    /// Low VIN timeout in ms (u16).
    pub const LOW_VIN_TIMEOUT: u8 = 0x12;
    /// Low VIN shutoff threshold in mV (u16).
    pub const LOW_VIN_SHUTOFF_VOLTAGE: u8 = 0x14;
    /// Low VIN startup threshold in mV (u16).
    pub const LOW_VIN_STARTUP_VOLTAGE: u8 = 0x16;
    /// High VIN shutoff threshold in mV (u16).
    pub const HIGH_VIN_SHUTOFF_VOLTAGE: u8 = 0x18;
    /// VIN measurement calibration offset (i16).
    pub const VIN_CALIBRATION: u8 = 0x1A;
    /// Maximum RC pulse period in ms (u16).
    pub const RC_MAX_PULSE_PERIOD: u8 = 0x1C;
    /// RC bad signal timeout in ms (u16).
    pub const RC_BAD_SIGNAL_TIMEOUT: u8 = 0x1E;
    /// Consecutive good RC pulses required.
    pub const RC_CONSECUTIVE_GOOD_PULSES: u8 = 0x20;
    /// Input averaging enable flag.
    pub const INPUT_AVERAGING_ENABLED: u8 = 0x21;
    /// Input hysteresis (u16).
    pub const INPUT_HYSTERESIS: u8 = 0x22;
    /// Input error minimum (u16).
    pub const INPUT_ERROR_MIN: u8 = 0x24;
    /// Input error maximum (u16).
    pub const INPUT_ERROR_MAX: u8 = 0x26;
    /// Input scaling degree code.
    pub const INPUT_SCALING_DEGREE: u8 = 0x28;
    /// Input invert flag.
    pub const INPUT_INVERT: u8 = 0x29;
    /// Input minimum breakpoint (u16).
    pub const INPUT_MIN: u8 = 0x2A;
    /// Input neutral minimum breakpoint (u16).
    pub const INPUT_NEUTRAL_MIN: u8 = 0x2C;
    /// Input neutral maximum breakpoint (u16).
    pub const INPUT_NEUTRAL_MAX: u8 = 0x2E;
    /// Input maximum breakpoint (u16).
    pub const INPUT_MAX: u8 = 0x30;
    /// Output minimum (i32).
    pub const OUTPUT_MIN: u8 = 0x32;
    /// Output maximum (i32).
    pub const OUTPUT_MAX: u8 = 0x36;
    /// Encoder prescaler (u32).
    pub const ENCODER_PRESCALER: u8 = 0x3A;
    /// Encoder postscaler (u32).
    pub const ENCODER_POSTSCALER: u8 = 0x3E;
    /// Encoder unlimited-position flag.
    pub const ENCODER_UNLIMITED: u8 = 0x42;
    /// Packed pin configuration for SCL; SDA, TX, RX, RC follow at
    /// consecutive addresses.  Bits 0-3 function, bit 4 pull-up, bit 5
    /// analog, bit 6 polarity.
    pub const PIN_CONFIG_BASE: u8 = 0x43;
    /// Current limit code.
    pub const CURRENT_LIMIT_CODE: u8 = 0x48;
    /// Current limit code during a soft error (0xFF = same as normal).
    pub const CURRENT_LIMIT_CODE_DURING_ERROR: u8 = 0x49;
    /// Step mode code.
    pub const STEP_MODE: u8 = 0x4A;
    /// Decay mode code.
    pub const DECAY_MODE: u8 = 0x4B;
    /// Starting speed (u32).
    pub const STARTING_SPEED: u8 = 0x4C;
    /// Speed limit (u32).
    pub const SPEED_MAX: u8 = 0x50;
    /// Deceleration limit (u32), 0 = same as acceleration limit.
    pub const DECEL_MAX: u8 = 0x54;
    /// Acceleration limit (u32).
    pub const ACCEL_MAX: u8 = 0x58;
    /// Motor direction invert flag.
    pub const INVERT_MOTOR_DIRECTION: u8 = 0x5C;
}

/// Size of the settings EEPROM image in bytes.
pub const SETTINGS_SIZE: usize = 0x5D;

/// Byte offsets in the variables block.
pub mod var {
    /// Operation state code.
    pub const OPERATION_STATE: usize = 0x00;
    /// Miscellaneous flags: bit 0 energized, bit 1 position uncertain.
    pub const MISC_FLAGS: usize = 0x01;
    /// Error status bitmask (u16): errors currently stopping the motor.
    pub const ERROR_STATUS: usize = 0x02;
    /// Errors-occurred bitmask (u32): cumulative since last cleared.
    pub const ERRORS_OCCURRED: usize = 0x04;
    /// Step planning mode code.
    pub const PLANNING_MODE: usize = 0x08;
    /// Target position (i32).
    pub const TARGET_POSITION: usize = 0x09;
    /// Target velocity (i32).
    pub const TARGET_VELOCITY: usize = 0x0D;
    /// Currently active starting speed (u32).
    pub const STARTING_SPEED: usize = 0x11;
    /// Currently active speed limit (u32).
    pub const SPEED_MAX: usize = 0x15;
    /// Currently active deceleration limit (u32).
    pub const DECEL_MAX: usize = 0x19;
    /// Currently active acceleration limit (u32).
    pub const ACCEL_MAX: usize = 0x1D;
    /// Current position (i32).
    pub const CURRENT_POSITION: usize = 0x21;
    /// Current velocity (i32).
    pub const CURRENT_VELOCITY: usize = 0x25;
    /// Acting target position (i32).
    pub const ACTING_TARGET_POSITION: usize = 0x29;
    /// Time since last step, in 1/3 us units (u32).
    pub const TIME_SINCE_LAST_STEP: usize = 0x2D;
    /// Cause of the last device reset.
    pub const DEVICE_RESET: usize = 0x31;
    /// VIN voltage in mV (u16).
    pub const VIN_VOLTAGE: usize = 0x32;
    /// Time since the last reset, in ms (u32).
    pub const UP_TIME: usize = 0x34;
    /// Encoder position (i32).
    pub const ENCODER_POSITION: usize = 0x38;
    /// RC pulse width in 1/12 us units (u16), 0xFFFF = no valid signal.
    pub const RC_PULSE_WIDTH: usize = 0x3C;
    /// Analog reading of SCL (u16), 0xFFFF = not available.
    pub const ANALOG_READING_SCL: usize = 0x3E;
    /// Analog reading of SDA (u16).
    pub const ANALOG_READING_SDA: usize = 0x40;
    /// Analog reading of TX (u16).
    pub const ANALOG_READING_TX: usize = 0x42;
    /// Analog reading of RX (u16).
    pub const ANALOG_READING_RX: usize = 0x44;
    /// Switch status bits, one per pin.
    pub const SWITCH_STATUS: usize = 0x46;
    /// Digital reading bits, one per pin.
    pub const DIGITAL_READINGS: usize = 0x47;
    /// Electrical pin states, two bits per pin for pins 0-3.
    pub const PIN_STATES: usize = 0x48;
    /// Currently active step mode code.
    pub const STEP_MODE: usize = 0x49;
    /// Currently active current limit code.
    pub const CURRENT_LIMIT_CODE: usize = 0x4A;
    /// Currently active decay mode code.
    pub const DECAY_MODE: usize = 0x4B;
}

/// Size of the variables block in bytes.
pub const VARIABLES_SIZE: usize = 0x4C;

/// Read a little-endian u16 at `offset`.
pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Read a little-endian u32 at `offset`.
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Read a little-endian two's-complement i32 at `offset`.
pub(crate) fn read_i32(buf: &[u8], offset: usize) -> i32 {
    read_u32(buf, offset) as i32
}

/// Read a little-endian two's-complement i16 at `offset`.
pub(crate) fn read_i16(buf: &[u8], offset: usize) -> i16 {
    read_u16(buf, offset) as i16
}

pub(crate) fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_i32(buf: &mut [u8], offset: usize, value: i32) {
    write_u32(buf, offset, value as u32);
}

pub(crate) fn write_i16(buf: &mut [u8], offset: usize, value: i16) {
    write_u16(buf, offset, value as u16);
}

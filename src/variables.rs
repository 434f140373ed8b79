//! Decoded snapshot of the controller's runtime state.
//!
//! The device reports its variables as one fixed-layout block; [`Variables`]
//! decodes a block into typed fields.  Decoding is total: every byte value
//! maps to something, with `Unknown` variants covering codes newer firmware
//! might add, so a poll never fails on content, only on length.

use crate::error::{Error, Result};
use crate::protocol::{self, read_i32, read_u16, read_u32, var};
use crate::quant;
use crate::settings::{DecayMode, Pin, Product, StepMode};

/// High-level state of the motion controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Firmware is initializing.
    Reset,
    /// Motor outputs are off.
    DeEnergized,
    /// A soft error response is in effect.
    SoftError,
    /// Waiting for the ERR line to go low.
    WaitingForErrLine,
    /// Safe start is holding the motor back.
    StartingUp,
    /// Normal operation.
    Normal,
    /// A code this library does not know about.
    Unknown(u8),
}

impl OperationState {
    fn from_code(code: u8) -> Self {
        match code {
            0 => OperationState::Reset,
            2 => OperationState::DeEnergized,
            4 => OperationState::SoftError,
            6 => OperationState::WaitingForErrLine,
            8 => OperationState::StartingUp,
            10 => OperationState::Normal,
            other => OperationState::Unknown(other),
        }
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            OperationState::Reset => "Reset",
            OperationState::DeEnergized => "De-energized",
            OperationState::SoftError => "Soft error",
            OperationState::WaitingForErrLine => "Waiting for ERR line",
            OperationState::StartingUp => "Starting up",
            OperationState::Normal => "Normal",
            OperationState::Unknown(_) => "Unknown",
        }
    }
}

/// What the motion planner is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanningMode {
    /// No target; the motor holds or coasts.
    Off,
    /// Moving toward a target position.
    TargetPosition,
    /// Tracking a target velocity.
    TargetVelocity,
    /// A code this library does not know about.
    Unknown(u8),
}

impl PlanningMode {
    fn from_code(code: u8) -> Self {
        match code {
            0 => PlanningMode::Off,
            1 => PlanningMode::TargetPosition,
            2 => PlanningMode::TargetVelocity,
            other => PlanningMode::Unknown(other),
        }
    }
}

/// Cause of the most recent microcontroller reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceReset {
    /// Power was applied.
    PowerUp,
    /// Supply voltage dipped too low.
    Brownout,
    /// The external reset line was driven.
    ResetLine,
    /// The watchdog timer fired.
    Watchdog,
    /// Firmware requested a reset.
    Software,
    /// Stack overflow trap.
    StackOverflow,
    /// Stack underflow trap.
    StackUnderflow,
    /// A code this library does not know about.
    Unknown(u8),
}

impl DeviceReset {
    fn from_code(code: u8) -> Self {
        match code {
            0 => DeviceReset::PowerUp,
            1 => DeviceReset::Brownout,
            2 => DeviceReset::ResetLine,
            4 => DeviceReset::Watchdog,
            8 => DeviceReset::Software,
            16 => DeviceReset::StackOverflow,
            32 => DeviceReset::StackUnderflow,
            other => DeviceReset::Unknown(other),
        }
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            DeviceReset::PowerUp => "Power up",
            DeviceReset::Brownout => "Brownout",
            DeviceReset::ResetLine => "Reset line",
            DeviceReset::Watchdog => "Watchdog",
            DeviceReset::Software => "Software reset",
            DeviceReset::StackOverflow => "Stack overflow",
            DeviceReset::StackUnderflow => "Stack underflow",
            DeviceReset::Unknown(_) => "Unknown",
        }
    }
}

/// Electrical state of one control pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// Input with no pull-up.
    HighImpedance,
    /// Input with the internal pull-up enabled.
    PulledUp,
    /// Driven low.
    OutputLow,
    /// Driven high.
    OutputHigh,
}

impl PinState {
    fn from_code(code: u8) -> Self {
        match code & 3 {
            0 => PinState::HighImpedance,
            1 => PinState::PulledUp,
            2 => PinState::OutputLow,
            _ => PinState::OutputHigh,
        }
    }
}

/// Error status bit masks, as reported in the error status and
/// errors-occurred words.
pub mod error_bit {
    /// The de-energize command is in effect.
    pub const INTENTIONALLY_DEENERGIZED: u32 = 1 << 0;
    /// The motor driver chip reported a fault.
    pub const MOTOR_DRIVER_ERROR: u32 = 1 << 1;
    /// VIN is below the shutoff threshold.
    pub const LOW_VIN: u32 = 1 << 2;
    /// A kill switch input is active.
    pub const KILL_SWITCH: u32 = 1 << 3;
    /// The configured control input is missing or invalid.
    pub const REQUIRED_INPUT_INVALID: u32 = 1 << 4;
    /// Any serial error.
    pub const SERIAL_ERROR: u32 = 1 << 5;
    /// No command arrived within the command timeout.
    pub const COMMAND_TIMEOUT: u32 = 1 << 6;
    /// Safe start is blocking movement.
    pub const SAFE_START_VIOLATION: u32 = 1 << 7;
    /// The ERR line is being driven high externally.
    pub const ERR_LINE_HIGH: u32 = 1 << 8;
    /// Serial framing error (errors-occurred only).
    pub const SERIAL_FRAMING: u32 = 1 << 16;
    /// Serial receive overrun (errors-occurred only).
    pub const SERIAL_RX_OVERRUN: u32 = 1 << 17;
    /// Serial format error (errors-occurred only).
    pub const SERIAL_FORMAT: u32 = 1 << 18;
    /// Serial CRC mismatch (errors-occurred only).
    pub const SERIAL_CRC: u32 = 1 << 19;
}

const ERROR_NAMES: &[(u32, &str)] = &[
    (error_bit::INTENTIONALLY_DEENERGIZED, "Intentionally de-energized"),
    (error_bit::MOTOR_DRIVER_ERROR, "Motor driver error"),
    (error_bit::LOW_VIN, "Low VIN"),
    (error_bit::KILL_SWITCH, "Kill switch active"),
    (error_bit::REQUIRED_INPUT_INVALID, "Required input invalid"),
    (error_bit::SERIAL_ERROR, "Serial error"),
    (error_bit::COMMAND_TIMEOUT, "Command timeout"),
    (error_bit::SAFE_START_VIOLATION, "Safe start violation"),
    (error_bit::ERR_LINE_HIGH, "ERR line high"),
    (error_bit::SERIAL_FRAMING, "Serial framing error"),
    (error_bit::SERIAL_RX_OVERRUN, "Serial RX overrun"),
    (error_bit::SERIAL_FORMAT, "Serial format error"),
    (error_bit::SERIAL_CRC, "Serial CRC error"),
];

/// Names of every error bit set in `mask`, in bit order.
pub fn error_names(mask: u32) -> Vec<&'static str> {
    ERROR_NAMES
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}

const MISC_FLAG_ENERGIZED: u8 = 1 << 0;
const MISC_FLAG_POSITION_UNCERTAIN: u8 = 1 << 1;

/// Reading not available sentinel for analog readings and RC pulse width.
const READING_UNAVAILABLE: u16 = 0xFFFF;

/// One decoded snapshot of the device's runtime variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    /// High-level controller state.
    pub operation_state: OperationState,
    misc_flags: u8,
    /// Errors currently stopping the motor.
    pub error_status: u16,
    /// Errors seen since the flags were last cleared.
    pub errors_occurred: u32,
    /// What the motion planner is doing.
    pub planning_mode: PlanningMode,
    /// Target position, meaningful in position planning mode.
    pub target_position: i32,
    /// Target velocity, meaningful in velocity planning mode.
    pub target_velocity: i32,
    /// Starting speed currently in effect.
    pub starting_speed: u32,
    /// Speed limit currently in effect.
    pub speed_max: u32,
    /// Deceleration limit currently in effect.
    pub decel_max: u32,
    /// Acceleration limit currently in effect.
    pub accel_max: u32,
    /// Current position in microsteps.
    pub current_position: i32,
    /// Current velocity in microsteps per 10000 s.
    pub current_velocity: i32,
    /// Position the planner is currently heading for.
    pub acting_target_position: i32,
    /// Time since the last step, in 1/3 us units.
    pub time_since_last_step: u32,
    /// Cause of the last microcontroller reset.
    pub device_reset: DeviceReset,
    /// VIN voltage in millivolts.
    pub vin_voltage: u16,
    /// Time since the last reset, in milliseconds.
    pub up_time: u32,
    /// Raw encoder count.
    pub encoder_position: i32,
    rc_pulse_width: u16,
    analog_readings: [u16; 4],
    switch_status: u8,
    digital_readings: u8,
    pin_states: u8,
    /// Step mode currently in effect, if the code is known.
    pub step_mode: Option<StepMode>,
    /// Current limit code currently in effect.
    pub current_limit_code: u8,
    /// Decay mode currently in effect, if the code is known.
    pub decay_mode: Option<DecayMode>,
}

impl Variables {
    /// Decode a variables block as read from the device.
    pub fn decode(buf: &[u8]) -> Result<Variables> {
        if buf.len() < protocol::VARIABLES_SIZE {
            return Err(Error::ProtocolSize {
                context: "variables buffer".to_string(),
                expected: protocol::VARIABLES_SIZE,
                actual: buf.len(),
            });
        }
        Ok(Variables {
            operation_state: OperationState::from_code(buf[var::OPERATION_STATE]),
            misc_flags: buf[var::MISC_FLAGS],
            error_status: read_u16(buf, var::ERROR_STATUS),
            errors_occurred: read_u32(buf, var::ERRORS_OCCURRED),
            planning_mode: PlanningMode::from_code(buf[var::PLANNING_MODE]),
            target_position: read_i32(buf, var::TARGET_POSITION),
            target_velocity: read_i32(buf, var::TARGET_VELOCITY),
            starting_speed: read_u32(buf, var::STARTING_SPEED),
            speed_max: read_u32(buf, var::SPEED_MAX),
            decel_max: read_u32(buf, var::DECEL_MAX),
            accel_max: read_u32(buf, var::ACCEL_MAX),
            current_position: read_i32(buf, var::CURRENT_POSITION),
            current_velocity: read_i32(buf, var::CURRENT_VELOCITY),
            acting_target_position: read_i32(buf, var::ACTING_TARGET_POSITION),
            time_since_last_step: read_u32(buf, var::TIME_SINCE_LAST_STEP),
            device_reset: DeviceReset::from_code(buf[var::DEVICE_RESET]),
            vin_voltage: read_u16(buf, var::VIN_VOLTAGE),
            up_time: read_u32(buf, var::UP_TIME),
            encoder_position: read_i32(buf, var::ENCODER_POSITION),
            rc_pulse_width: read_u16(buf, var::RC_PULSE_WIDTH),
            analog_readings: [
                read_u16(buf, var::ANALOG_READING_SCL),
                read_u16(buf, var::ANALOG_READING_SDA),
                read_u16(buf, var::ANALOG_READING_TX),
                read_u16(buf, var::ANALOG_READING_RX),
            ],
            switch_status: buf[var::SWITCH_STATUS],
            digital_readings: buf[var::DIGITAL_READINGS],
            pin_states: buf[var::PIN_STATES],
            step_mode: StepMode::from_code(buf[var::STEP_MODE]),
            current_limit_code: buf[var::CURRENT_LIMIT_CODE],
            decay_mode: DecayMode::from_code(buf[var::DECAY_MODE]),
        })
    }

    /// Whether the motor outputs are energized.
    pub fn energized(&self) -> bool {
        self.misc_flags & MISC_FLAG_ENERGIZED != 0
    }

    /// Whether the controller has lost track of the motor's position.
    pub fn position_uncertain(&self) -> bool {
        self.misc_flags & MISC_FLAG_POSITION_UNCERTAIN != 0
    }

    /// The current limit in milliamps for the given product.
    pub fn current_limit(&self, product: Product) -> u32 {
        quant::current_limit_from_code(product, self.current_limit_code)
    }

    /// Measured RC pulse width in 1/12 us units, if a valid signal is
    /// being received.
    pub fn rc_pulse_width(&self) -> Option<u16> {
        (self.rc_pulse_width != READING_UNAVAILABLE).then_some(self.rc_pulse_width)
    }

    /// Analog reading for a pin, 0 to 0xFFFE full scale.
    ///
    /// `None` when the reading is unavailable.  The RC pin has no analog
    /// input, so it never has a reading.
    pub fn analog_reading(&self, pin: Pin) -> Option<u16> {
        if pin == Pin::Rc {
            return None;
        }
        let raw = self.analog_readings[pin.index()];
        (raw != READING_UNAVAILABLE).then_some(raw)
    }

    /// Whether the switch wired to this pin is in its active position.
    pub fn switch_active(&self, pin: Pin) -> bool {
        self.switch_status & (1 << pin.index()) != 0
    }

    /// Digital reading of a pin.
    pub fn digital_reading(&self, pin: Pin) -> bool {
        self.digital_readings & (1 << pin.index()) != 0
    }

    /// Electrical state of a pin.
    ///
    /// The RC pin is always a high-impedance input in hardware, so its
    /// state is not reported and this returns [`PinState::HighImpedance`].
    pub fn pin_state(&self, pin: Pin) -> PinState {
        if pin == Pin::Rc {
            return PinState::HighImpedance;
        }
        PinState::from_code(self.pin_states >> (pin.index() * 2))
    }
}

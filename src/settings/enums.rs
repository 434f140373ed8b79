//! Enumerated settings values and their firmware codes.
//!
//! Each enum maps to a single byte in the settings EEPROM image via
//! `code`/`from_code`, and to a snake_case string in the settings document
//! via serde.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hardware product variant, named after the motor driver chip it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    /// DRV8825 driver: the baseline variant (3968 mA ceiling).
    Drv8825,
    /// DRV8834 low-voltage driver (3456 mA ceiling).
    Drv8834,
    /// MP6500 driver with a nonuniform current sense table.
    Mp6500,
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Product::Drv8825 => "drv8825",
            Product::Drv8834 => "drv8834",
            Product::Mp6500 => "mp6500",
        };
        f.write_str(name)
    }
}

/// What input source commands the motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Commands over USB, serial, or I2C.
    #[default]
    Serial,
    /// RC pulse width sets the target position.
    RcPosition,
    /// RC pulse width sets the target velocity.
    RcSpeed,
    /// Analog voltage sets the target position.
    AnalogPosition,
    /// Analog voltage sets the target velocity.
    AnalogSpeed,
    /// Quadrature encoder sets the target position.
    EncoderPosition,
    /// Quadrature encoder sets the target velocity.
    EncoderSpeed,
    /// External STEP/DIR interface.
    StepDir,
}

impl ControlMode {
    /// The firmware code for this mode.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a firmware code, if it is defined.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ControlMode::Serial),
            1 => Some(ControlMode::RcPosition),
            2 => Some(ControlMode::RcSpeed),
            3 => Some(ControlMode::AnalogPosition),
            4 => Some(ControlMode::AnalogSpeed),
            5 => Some(ControlMode::EncoderPosition),
            6 => Some(ControlMode::EncoderSpeed),
            7 => Some(ControlMode::StepDir),
            _ => None,
        }
    }
}

/// Microstepping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Full step.
    #[default]
    Full,
    /// 1/2 step.
    Half,
    /// 1/4 step.
    Microstep4,
    /// 1/8 step.
    Microstep8,
    /// 1/16 step.
    Microstep16,
    /// 1/32 step.
    Microstep32,
}

impl StepMode {
    /// The firmware code for this mode.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a firmware code, if it is defined.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(StepMode::Full),
            1 => Some(StepMode::Half),
            2 => Some(StepMode::Microstep4),
            3 => Some(StepMode::Microstep8),
            4 => Some(StepMode::Microstep16),
            5 => Some(StepMode::Microstep32),
            _ => None,
        }
    }

    /// Microsteps per full step (1, 2, 4, 8, 16, or 32).
    pub fn microsteps(self) -> u16 {
        1 << self.code()
    }
}

/// Motor driver decay mode.  Which modes are legal depends on the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    /// Mixed decay.
    #[default]
    Mixed,
    /// Slow decay.
    Slow,
    /// Fast decay.
    Fast,
    /// Mixed decay, 25% fast (DRV8834 only).
    Mixed25,
    /// Mixed decay, 50% fast (DRV8834 only).
    Mixed50,
    /// Mixed decay, 75% fast (DRV8834 only).
    Mixed75,
}

impl DecayMode {
    /// The firmware code for this mode.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a firmware code, if it is defined.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DecayMode::Mixed),
            1 => Some(DecayMode::Slow),
            2 => Some(DecayMode::Fast),
            3 => Some(DecayMode::Mixed25),
            4 => Some(DecayMode::Mixed50),
            5 => Some(DecayMode::Mixed75),
            _ => None,
        }
    }

    /// The decay modes the product's driver chip actually supports.
    pub fn legal_modes(product: Product) -> &'static [DecayMode] {
        match product {
            Product::Drv8825 => &[DecayMode::Mixed, DecayMode::Slow, DecayMode::Fast],
            Product::Drv8834 => &[
                DecayMode::Mixed,
                DecayMode::Slow,
                DecayMode::Fast,
                DecayMode::Mixed25,
                DecayMode::Mixed50,
                DecayMode::Mixed75,
            ],
            // The MP6500 picks its decay mode automatically.
            Product::Mp6500 => &[DecayMode::Mixed],
        }
    }
}

impl fmt::Display for DecayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecayMode::Mixed => "mixed",
            DecayMode::Slow => "slow",
            DecayMode::Fast => "fast",
            DecayMode::Mixed25 => "mixed25",
            DecayMode::Mixed50 => "mixed50",
            DecayMode::Mixed75 => "mixed75",
        };
        f.write_str(name)
    }
}

/// How the device responds to a soft error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftErrorResponse {
    /// Disable the motor driver.
    #[default]
    DeEnergize,
    /// Stop abruptly and hold position.
    HaltAndHold,
    /// Decelerate to a stop and hold position.
    DecelToHold,
    /// Go to the configured soft error position.
    GoToPosition,
}

impl SoftErrorResponse {
    /// The firmware code for this response.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a firmware code, if it is defined.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SoftErrorResponse::DeEnergize),
            1 => Some(SoftErrorResponse::HaltAndHold),
            2 => Some(SoftErrorResponse::DecelToHold),
            3 => Some(SoftErrorResponse::GoToPosition),
            _ => None,
        }
    }
}

/// Polynomial degree of the input scaling curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingDegree {
    /// Linear scaling.
    #[default]
    Linear,
    /// Quadratic scaling.
    Quadratic,
    /// Cubic scaling.
    Cubic,
}

impl ScalingDegree {
    /// The firmware code for this degree.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a firmware code, if it is defined.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ScalingDegree::Linear),
            1 => Some(ScalingDegree::Quadratic),
            2 => Some(ScalingDegree::Cubic),
            _ => None,
        }
    }
}

/// A configurable control pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pin {
    /// SCL pin.
    Scl,
    /// SDA pin.
    Sda,
    /// TX pin.
    Tx,
    /// RX pin.
    Rx,
    /// RC pin.  Always an input; cannot be analog.
    Rc,
}

impl Pin {
    /// All pins, in wire order.
    pub const ALL: [Pin; 5] = [Pin::Scl, Pin::Sda, Pin::Tx, Pin::Rx, Pin::Rc];

    /// Wire index of this pin (bit position in packed status bytes).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name of this pin.
    pub fn name(self) -> &'static str {
        match self {
            Pin::Scl => "SCL",
            Pin::Sda => "SDA",
            Pin::Tx => "TX",
            Pin::Rx => "RX",
            Pin::Rc => "RC",
        }
    }

    /// Key used for this pin in the settings document.
    pub fn key(self) -> &'static str {
        match self {
            Pin::Scl => "scl",
            Pin::Sda => "sda",
            Pin::Tx => "tx",
            Pin::Rx => "rx",
            Pin::Rc => "rc",
        }
    }

    /// Whether the pin's hardware can do analog readings.
    pub fn analog_capable(self) -> bool {
        !matches!(self, Pin::Rc)
    }

    /// The functions this physical pin supports.
    pub fn supported_funcs(self) -> &'static [PinFunc] {
        use PinFunc::*;
        match self {
            Pin::Scl | Pin::Sda => &[
                Default, UserIo, UserInput, PotPower, SerialIo, KillSwitch,
                LimitSwitchForward, LimitSwitchReverse,
            ],
            Pin::Tx | Pin::Rx => &[
                Default, UserIo, UserInput, SerialIo, EncoderInput, KillSwitch,
                LimitSwitchForward, LimitSwitchReverse,
            ],
            Pin::Rc => &[
                Default, UserInput, RcInput, KillSwitch, LimitSwitchForward, LimitSwitchReverse,
            ],
        }
    }
}

/// Function assigned to a control pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinFunc {
    /// Default function for the pin's control mode.
    #[default]
    Default,
    /// General purpose input or output.
    UserIo,
    /// General purpose input.
    UserInput,
    /// Potentiometer power.
    PotPower,
    /// Serial or I2C communication.
    SerialIo,
    /// RC pulse input (RC pin only).
    RcInput,
    /// Quadrature encoder input (TX/RX pins).
    EncoderInput,
    /// Kill switch input.
    KillSwitch,
    /// Forward limit switch input.
    LimitSwitchForward,
    /// Reverse limit switch input.
    LimitSwitchReverse,
}

impl PinFunc {
    /// The firmware code for this function.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a firmware code, if it is defined.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PinFunc::Default),
            1 => Some(PinFunc::UserIo),
            2 => Some(PinFunc::UserInput),
            3 => Some(PinFunc::PotPower),
            4 => Some(PinFunc::SerialIo),
            5 => Some(PinFunc::RcInput),
            6 => Some(PinFunc::EncoderInput),
            7 => Some(PinFunc::KillSwitch),
            8 => Some(PinFunc::LimitSwitchForward),
            9 => Some(PinFunc::LimitSwitchReverse),
            _ => None,
        }
    }

    /// Whether at most one pin may claim this function at a time.
    ///
    /// Encoder input is not exclusive: it takes both TX and RX.  Kill
    /// switches may be wired to several pins.
    pub fn exclusive(self) -> bool {
        matches!(
            self,
            PinFunc::RcInput | PinFunc::LimitSwitchForward | PinFunc::LimitSwitchReverse
        )
    }
}

impl fmt::Display for PinFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinFunc::Default => "default",
            PinFunc::UserIo => "user_io",
            PinFunc::UserInput => "user_input",
            PinFunc::PotPower => "pot_power",
            PinFunc::SerialIo => "serial_io",
            PinFunc::RcInput => "rc_input",
            PinFunc::EncoderInput => "encoder_input",
            PinFunc::KillSwitch => "kill_switch",
            PinFunc::LimitSwitchForward => "limit_switch_forward",
            PinFunc::LimitSwitchReverse => "limit_switch_reverse",
        };
        f.write_str(name)
    }
}

//! The device settings model.
//!
//! [`Settings`] is a plain copyable record of every configuration parameter
//! the device stores.  It carries no device handle: the session controller
//! owns the working/cached copies, and the fix pass
//! ([`Settings::fix`]) is the single gate settings pass through before they
//! are written to a device or to a file.

mod buffer;
mod enums;
mod fix;
mod text;

pub use enums::{
    ControlMode, DecayMode, Pin, PinFunc, Product, ScalingDegree, SoftErrorResponse, StepMode,
};

use crate::protocol::CONTROL_PIN_COUNT;
use crate::quant;

/// Configuration of a single control pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinSettings {
    /// Function assigned to the pin.
    pub func: PinFunc,
    /// Enable the internal pull-up resistor.
    pub pullup: bool,
    /// Use the pin as an analog input.
    pub analog: bool,
    /// Switch polarity: true means active high.
    pub polarity: bool,
}

/// Every configuration parameter of one device, grouped by subsystem.
///
/// Fields are deliberately public: the record is pure data and the fix pass,
/// not field encapsulation, is what enforces hardware constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Hardware product variant.  Determines the legal range of several
    /// other fields.
    pub product: Product,

    /// What input source commands the motor.
    pub control_mode: ControlMode,
    /// Keep the device awake even when USB is suspended.
    pub never_sleep: bool,
    /// Skip the safe start condition after errors.
    pub disable_safe_start: bool,
    /// Ignore the ERR line being driven high externally.
    pub ignore_err_line_high: bool,
    /// Periodically try to clear latched motor driver errors.
    pub auto_clear_driver_error: bool,
    /// Response to a soft error.
    pub soft_error_response: SoftErrorResponse,
    /// Target position used when the soft error response is go-to-position.
    pub soft_error_position: i32,

    /// Serial baud rate in bits per second.  Quantized through the baud
    /// divisor by the fix pass.
    pub serial_baud_rate: u32,
    /// Serial device number (0-127).
    pub serial_device_number: u8,
    /// Require 7-bit CRC bytes on serial commands.
    pub serial_crc_enabled: bool,
    /// Delay before serial responses, in microseconds.
    pub serial_response_delay: u8,
    /// Time without a command before a command timeout error, in ms.
    /// 0 disables the timeout.
    pub command_timeout: u16,

    /// Low VIN reading duration before a low-VIN error, in ms.
    pub low_vin_timeout: u16,
    /// VIN threshold below which the device shuts off, in mV.
    pub low_vin_shutoff_voltage: u16,
    /// VIN threshold above which the device starts up again, in mV.
    pub low_vin_startup_voltage: u16,
    /// VIN threshold above which the device shuts off, in mV.
    pub high_vin_shutoff_voltage: u16,
    /// Calibration offset applied to VIN readings.
    pub vin_calibration: i16,

    /// Longest accepted RC pulse period, in ms.
    pub rc_max_pulse_period: u16,
    /// Time without a good RC pulse before an input error, in ms.
    pub rc_bad_signal_timeout: u16,
    /// Consecutive good RC pulses required to accept the signal.
    pub rc_consecutive_good_pulses: u8,

    /// Average analog/RC readings over a small window.
    pub input_averaging_enabled: bool,
    /// Hysteresis applied to analog/RC readings.
    pub input_hysteresis: u16,
    /// Readings below this are an input error (0-4095 scale).
    pub input_error_min: u16,
    /// Readings above this are an input error (0-4095 scale).
    pub input_error_max: u16,
    /// Polynomial degree of the input scaling curve.
    pub input_scaling_degree: ScalingDegree,
    /// Invert the direction of the input scale.
    pub input_invert: bool,
    /// Input scaling breakpoint: minimum (0-4095).
    pub input_min: u16,
    /// Input scaling breakpoint: low end of the neutral band (0-4095).
    pub input_neutral_min: u16,
    /// Input scaling breakpoint: high end of the neutral band (0-4095).
    pub input_neutral_max: u16,
    /// Input scaling breakpoint: maximum (0-4095).
    pub input_max: u16,
    /// Output value the input minimum maps to.
    pub output_min: i32,
    /// Output value the input maximum maps to.
    pub output_max: i32,

    /// Encoder counts per unit, numerator.  At least 1 after fix-up.
    pub encoder_prescaler: u32,
    /// Encoder output scale factor.  At least 1 after fix-up.
    pub encoder_postscaler: u32,
    /// Let encoder position wrap instead of stopping at the output limits.
    pub encoder_unlimited: bool,

    /// Per-pin configuration, indexed by [`Pin::index`].
    pub pins: [PinSettings; CONTROL_PIN_COUNT],

    /// Coil current limit in mA.  Quantized to a product-specific code by
    /// the fix pass and capped to the product ceiling.
    pub current_limit: u32,
    /// Current limit during a soft error, in mA; -1 means "same as normal".
    pub current_limit_during_error: i32,
    /// Microstepping mode.
    pub step_mode: StepMode,
    /// Motor driver decay mode.  Legal subset depends on the product.
    pub decay_mode: DecayMode,
    /// Speed below which steps are issued instantly, in microsteps/10000s.
    pub starting_speed: u32,
    /// Speed limit, in microsteps/10000s.
    pub speed_max: u32,
    /// Deceleration limit, in microsteps/100s^2; 0 means "same as accel".
    pub decel_max: u32,
    /// Acceleration limit, in microsteps/100s^2.
    pub accel_max: u32,
    /// Invert the motor direction.
    pub invert_motor_direction: bool,
}

impl Settings {
    /// Create settings for `product` with every other field zeroed, the
    /// way a blank device image reads.  Run [`Settings::fix`] or
    /// [`Settings::fill_with_defaults`] before using the result.
    pub fn new(product: Product) -> Self {
        Settings {
            product,
            control_mode: ControlMode::Serial,
            never_sleep: false,
            disable_safe_start: false,
            ignore_err_line_high: false,
            auto_clear_driver_error: false,
            soft_error_response: SoftErrorResponse::DeEnergize,
            soft_error_position: 0,
            serial_baud_rate: 0,
            serial_device_number: 0,
            serial_crc_enabled: false,
            serial_response_delay: 0,
            command_timeout: 0,
            low_vin_timeout: 0,
            low_vin_shutoff_voltage: 0,
            low_vin_startup_voltage: 0,
            high_vin_shutoff_voltage: 0,
            vin_calibration: 0,
            rc_max_pulse_period: 0,
            rc_bad_signal_timeout: 0,
            rc_consecutive_good_pulses: 0,
            input_averaging_enabled: false,
            input_hysteresis: 0,
            input_error_min: 0,
            input_error_max: 0,
            input_scaling_degree: ScalingDegree::Linear,
            input_invert: false,
            input_min: 0,
            input_neutral_min: 0,
            input_neutral_max: 0,
            input_max: 0,
            output_min: 0,
            output_max: 0,
            encoder_prescaler: 0,
            encoder_postscaler: 0,
            encoder_unlimited: false,
            pins: [PinSettings::default(); CONTROL_PIN_COUNT],
            current_limit: 0,
            current_limit_during_error: 0,
            step_mode: StepMode::Full,
            decay_mode: DecayMode::Mixed,
            starting_speed: 0,
            speed_max: 0,
            decel_max: 0,
            accel_max: 0,
            invert_motor_direction: false,
        }
    }

    /// Populate the factory default values.
    ///
    /// Only the baseline Drv8825 variant defines a default table; for every
    /// other product this is a no-op.  This narrow policy mirrors the
    /// shipped firmware (other variants arrive pre-configured) and is kept
    /// deliberately; see DESIGN.md.
    pub fn fill_with_defaults(&mut self) {
        if self.product != Product::Drv8825 {
            return;
        }

        *self = Settings::new(self.product);
        self.auto_clear_driver_error = true;
        self.soft_error_response = SoftErrorResponse::DecelToHold;
        self.serial_baud_rate = 9600;
        self.serial_device_number = 14;
        self.command_timeout = 1000;
        self.low_vin_timeout = 250;
        self.low_vin_shutoff_voltage = 6000;
        self.low_vin_startup_voltage = 6500;
        self.high_vin_shutoff_voltage = 35_000;
        self.rc_max_pulse_period = 100;
        self.rc_bad_signal_timeout = 500;
        self.rc_consecutive_good_pulses = 2;
        self.input_averaging_enabled = true;
        self.input_error_max = 4095;
        self.input_neutral_min = 2015;
        self.input_neutral_max = 2080;
        self.input_max = 4095;
        self.output_min = -200;
        self.output_max = 200;
        self.encoder_prescaler = 1;
        self.encoder_postscaler = 1;
        self.current_limit = 192;
        self.current_limit_during_error = -1;
        self.speed_max = 2_000_000;
        self.accel_max = 40_000;
    }

    /// The baud rate a requested rate would actually achieve on this
    /// device, after the divisor round trip.
    pub fn achievable_serial_baud_rate(&self, baud_rate: u32) -> u32 {
        quant::achievable_baud_rate(baud_rate)
    }

    /// The current limit a requested limit would actually achieve on this
    /// product, after the code round trip.
    pub fn achievable_current_limit(&self, milliamps: u32) -> u32 {
        quant::achievable_current_limit(self.product, milliamps)
    }

    /// Configuration of one pin.
    pub fn pin(&self, pin: Pin) -> &PinSettings {
        &self.pins[pin.index()]
    }

    /// Mutable configuration of one pin.
    pub fn pin_mut(&mut self, pin: Pin) -> &mut PinSettings {
        &mut self.pins[pin.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_with_defaults_is_fix_clean() {
        let mut settings = Settings::new(Product::Drv8825);
        settings.fill_with_defaults();
        let mut warnings = Vec::new();
        let before = settings.clone();
        settings.fix(&mut warnings);
        assert_eq!(settings, before);
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_fill_with_defaults_noop_for_other_products() {
        let mut settings = Settings::new(Product::Mp6500);
        settings.fill_with_defaults();
        assert_eq!(settings, Settings::new(Product::Mp6500));
    }

    #[test]
    fn test_achievable_current_limit() {
        let settings = Settings::new(Product::Drv8825);
        assert_eq!(settings.achievable_current_limit(1000), 992);
        assert_eq!(settings.achievable_current_limit(992), 992);
    }
}

//! The settings validation/repair pass.
//!
//! `fix` never fails: every out-of-range or mutually inconsistent value is
//! coerced to the nearest legal value, and each coercion appends one
//! human-readable warning line.  It is the single authoritative gate before
//! settings are written to a device or to a file, and it is idempotent: a
//! second application changes nothing and emits no warnings.

use crate::protocol::{
    MAX_ALLOWED_ACCEL, MAX_ALLOWED_BAUD_RATE, MAX_ALLOWED_COMMAND_TIMEOUT,
    MAX_ALLOWED_ENCODER_SCALER, MAX_ALLOWED_SPEED, MAX_SERIAL_DEVICE_NUMBER,
    MAX_VIN_CALIBRATION, MIN_ALLOWED_ACCEL, MIN_ALLOWED_BAUD_RATE,
};
use crate::quant;

use super::{DecayMode, Pin, PinFunc, Product, Settings, StepMode};

/// Highest value the 12-bit analog/RC input scale can take.
const INPUT_SCALE_MAX: u16 = 4095;

impl Settings {
    /// Coerce every field into its legal range and relationship, appending
    /// one warning per repair to `warnings`.
    pub fn fix(&mut self, warnings: &mut Vec<String>) {
        self.fix_serial(warnings);
        self.fix_vin(warnings);
        self.fix_input_scaling(warnings);
        self.fix_encoder(warnings);
        self.fix_pins(warnings);
        self.fix_motor(warnings);
    }

    fn fix_serial(&mut self, warnings: &mut Vec<String>) {
        if self.serial_baud_rate < MIN_ALLOWED_BAUD_RATE {
            warnings.push(format!(
                "The serial baud rate was too low so it was changed to {MIN_ALLOWED_BAUD_RATE}."
            ));
            self.serial_baud_rate = MIN_ALLOWED_BAUD_RATE;
        }
        if self.serial_baud_rate > MAX_ALLOWED_BAUD_RATE {
            warnings.push(format!(
                "The serial baud rate was too high so it was changed to {MAX_ALLOWED_BAUD_RATE}."
            ));
            self.serial_baud_rate = MAX_ALLOWED_BAUD_RATE;
        }
        // Quantize to what the baud rate generator can actually produce.
        self.serial_baud_rate = quant::achievable_baud_rate(self.serial_baud_rate);

        if self.serial_device_number > MAX_SERIAL_DEVICE_NUMBER {
            warnings.push(format!(
                "The serial device number was too high so it was changed to \
                 {MAX_SERIAL_DEVICE_NUMBER}."
            ));
            self.serial_device_number = MAX_SERIAL_DEVICE_NUMBER;
        }

        if self.command_timeout > MAX_ALLOWED_COMMAND_TIMEOUT {
            warnings.push(format!(
                "The command timeout was too high so it was changed to \
                 {MAX_ALLOWED_COMMAND_TIMEOUT} ms."
            ));
            self.command_timeout = MAX_ALLOWED_COMMAND_TIMEOUT;
        }
    }

    fn fix_vin(&mut self, warnings: &mut Vec<String>) {
        if self.low_vin_shutoff_voltage >= self.low_vin_startup_voltage {
            self.low_vin_startup_voltage = self.low_vin_shutoff_voltage.saturating_add(500);
            if self.low_vin_startup_voltage == self.low_vin_shutoff_voltage {
                self.low_vin_shutoff_voltage = self.low_vin_startup_voltage - 500;
            }
            warnings.push(format!(
                "The low VIN startup voltage must be above the low VIN shutoff voltage \
                 so it was changed to {} mV.",
                self.low_vin_startup_voltage
            ));
        }
        if self.high_vin_shutoff_voltage <= self.low_vin_startup_voltage {
            self.high_vin_shutoff_voltage = self.low_vin_startup_voltage.saturating_add(500);
            if self.high_vin_shutoff_voltage == self.low_vin_startup_voltage {
                // Saturated at the top of the range; push the lower
                // thresholds down instead.
                self.low_vin_startup_voltage = self.high_vin_shutoff_voltage - 500;
                if self.low_vin_shutoff_voltage >= self.low_vin_startup_voltage {
                    self.low_vin_shutoff_voltage = self.low_vin_startup_voltage - 500;
                }
            }
            warnings.push(format!(
                "The high VIN shutoff voltage must be above the low VIN startup voltage \
                 so it was changed to {} mV.",
                self.high_vin_shutoff_voltage
            ));
        }

        if self.vin_calibration < -MAX_VIN_CALIBRATION {
            warnings.push(format!(
                "The VIN calibration was too low so it was changed to {}.",
                -MAX_VIN_CALIBRATION
            ));
            self.vin_calibration = -MAX_VIN_CALIBRATION;
        }
        if self.vin_calibration > MAX_VIN_CALIBRATION {
            warnings.push(format!(
                "The VIN calibration was too high so it was changed to {MAX_VIN_CALIBRATION}."
            ));
            self.vin_calibration = MAX_VIN_CALIBRATION;
        }
    }

    fn fix_input_scaling(&mut self, warnings: &mut Vec<String>) {
        for (name, value) in [
            ("input minimum", &mut self.input_min),
            ("input neutral minimum", &mut self.input_neutral_min),
            ("input neutral maximum", &mut self.input_neutral_max),
            ("input maximum", &mut self.input_max),
            ("input error minimum", &mut self.input_error_min),
            ("input error maximum", &mut self.input_error_max),
        ] {
            if *value > INPUT_SCALE_MAX {
                warnings.push(format!(
                    "The {name} was too high so it was changed to {INPUT_SCALE_MAX}."
                ));
                *value = INPUT_SCALE_MAX;
            }
        }

        let ordered = self.input_min <= self.input_neutral_min
            && self.input_neutral_min <= self.input_neutral_max
            && self.input_neutral_max <= self.input_max;
        if !ordered {
            let mut points = [
                self.input_min,
                self.input_neutral_min,
                self.input_neutral_max,
                self.input_max,
            ];
            points.sort_unstable();
            [
                self.input_min,
                self.input_neutral_min,
                self.input_neutral_max,
                self.input_max,
            ] = points;
            warnings.push(
                "The input scaling values were out of order so they were rearranged into \
                 non-decreasing order."
                    .to_string(),
            );
        }

        if self.input_error_min > self.input_min {
            warnings.push(format!(
                "The input error minimum must not be above the input minimum so it was \
                 changed to {}.",
                self.input_min
            ));
            self.input_error_min = self.input_min;
        }
        if self.input_error_max < self.input_max {
            warnings.push(format!(
                "The input error maximum must not be below the input maximum so it was \
                 changed to {}.",
                self.input_max
            ));
            self.input_error_max = self.input_max;
        }

        if self.output_min > 0 {
            warnings.push("The output minimum must not be positive so it was changed to 0.".to_string());
            self.output_min = 0;
        }
        if self.output_max < 0 {
            warnings.push("The output maximum must not be negative so it was changed to 0.".to_string());
            self.output_max = 0;
        }
    }

    fn fix_encoder(&mut self, warnings: &mut Vec<String>) {
        for (name, value) in [
            ("encoder prescaler", &mut self.encoder_prescaler),
            ("encoder postscaler", &mut self.encoder_postscaler),
        ] {
            if *value == 0 {
                warnings.push(format!("The {name} must be at least 1 so it was changed to 1."));
                *value = 1;
            }
            if *value > MAX_ALLOWED_ENCODER_SCALER {
                warnings.push(format!(
                    "The {name} was too high so it was changed to {MAX_ALLOWED_ENCODER_SCALER}."
                ));
                *value = MAX_ALLOWED_ENCODER_SCALER;
            }
        }
    }

    fn fix_pins(&mut self, warnings: &mut Vec<String>) {
        for pin in Pin::ALL {
            let func = self.pins[pin.index()].func;
            if !pin.supported_funcs().contains(&func) {
                warnings.push(format!(
                    "The {} pin cannot be used as {} so its function was reset to default.",
                    pin.name(),
                    func
                ));
                self.pins[pin.index()].func = PinFunc::Default;
            }
            if self.pins[pin.index()].analog && !pin.analog_capable() {
                warnings.push(format!(
                    "The {} pin cannot be an analog input so that option was turned off.",
                    pin.name()
                ));
                self.pins[pin.index()].analog = false;
            }
        }

        // Exclusive functions may be claimed by one pin only; the first
        // claimant in wire order keeps it.
        let mut claimed: Vec<PinFunc> = Vec::new();
        for pin in Pin::ALL {
            let func = self.pins[pin.index()].func;
            if !func.exclusive() {
                continue;
            }
            if claimed.contains(&func) {
                warnings.push(format!(
                    "The {} function was already assigned to another pin so the {} pin's \
                     function was reset to default.",
                    func,
                    pin.name()
                ));
                self.pins[pin.index()].func = PinFunc::Default;
            } else {
                claimed.push(func);
            }
        }
    }

    fn fix_motor(&mut self, warnings: &mut Vec<String>) {
        let max_current = quant::max_allowed_current(self.product);
        if self.current_limit > max_current {
            warnings.push(format!(
                "The current limit was too high so it was changed to {max_current} mA."
            ));
            self.current_limit = max_current;
        }
        // Quantize to what the product's current sense can represent.
        self.current_limit = quant::achievable_current_limit(self.product, self.current_limit);

        if self.current_limit_during_error < -1 {
            warnings.push(
                "The current limit during error must be at least -1 so it was changed to -1."
                    .to_string(),
            );
            self.current_limit_during_error = -1;
        }
        if self.current_limit_during_error >= 0 {
            if self.current_limit_during_error as u32 > max_current {
                warnings.push(format!(
                    "The current limit during error was too high so it was changed to \
                     {max_current} mA."
                ));
                self.current_limit_during_error = max_current as i32;
            }
            self.current_limit_during_error = quant::achievable_current_limit(
                self.product,
                self.current_limit_during_error as u32,
            ) as i32;
        }

        if !DecayMode::legal_modes(self.product).contains(&self.decay_mode) {
            warnings.push(format!(
                "The {} decay mode is not supported by this product so it was changed to mixed.",
                self.decay_mode
            ));
            self.decay_mode = DecayMode::Mixed;
        }

        if self.product == Product::Mp6500 && self.step_mode > StepMode::Microstep8 {
            warnings.push(
                "This product only supports step modes down to 1/8 step so the step mode \
                 was changed to 1/8 step."
                    .to_string(),
            );
            self.step_mode = StepMode::Microstep8;
        }

        if self.speed_max > MAX_ALLOWED_SPEED {
            warnings.push(format!(
                "The maximum speed was too high so it was changed to {MAX_ALLOWED_SPEED}."
            ));
            self.speed_max = MAX_ALLOWED_SPEED;
        }
        if self.starting_speed > self.speed_max {
            warnings.push(format!(
                "The starting speed was above the maximum speed so it was changed to {}.",
                self.speed_max
            ));
            self.starting_speed = self.speed_max;
        }

        if self.accel_max < MIN_ALLOWED_ACCEL {
            warnings.push(format!(
                "The maximum acceleration was too low so it was changed to {MIN_ALLOWED_ACCEL}."
            ));
            self.accel_max = MIN_ALLOWED_ACCEL;
        }
        if self.accel_max > MAX_ALLOWED_ACCEL {
            warnings.push(format!(
                "The maximum acceleration was too high so it was changed to {MAX_ALLOWED_ACCEL}."
            ));
            self.accel_max = MAX_ALLOWED_ACCEL;
        }

        // decel_max == 0 means "use the acceleration limit" and must be
        // preserved, not clamped to the acceleration floor.
        if self.decel_max != 0 {
            if self.decel_max < MIN_ALLOWED_ACCEL {
                warnings.push(format!(
                    "The maximum deceleration was too low so it was changed to \
                     {MIN_ALLOWED_ACCEL}."
                ));
                self.decel_max = MIN_ALLOWED_ACCEL;
            }
            if self.decel_max > MAX_ALLOWED_ACCEL {
                warnings.push(format!(
                    "The maximum deceleration was too high so it was changed to \
                     {MAX_ALLOWED_ACCEL}."
                ));
                self.decel_max = MAX_ALLOWED_ACCEL;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        let mut settings = Settings::new(Product::Drv8825);
        settings.fill_with_defaults();
        settings
    }

    #[test]
    fn test_current_limit_clamped_to_product_ceiling() {
        let mut settings = base();
        settings.current_limit = 5000;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert_eq!(settings.current_limit, 3968);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("current limit"), "{warnings:?}");
    }

    #[test]
    fn test_current_limit_quantized_down() {
        let mut settings = base();
        settings.current_limit = 1000;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        // 1000 mA is not representable; the next code down is 992 mA.
        assert_eq!(settings.current_limit, 992);
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_neutral_breakpoints_reordered() {
        let mut settings = base();
        settings.input_neutral_min = 3000;
        settings.input_neutral_max = 2000;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert!(settings.input_neutral_min <= settings.input_neutral_max);
        assert_eq!(settings.input_neutral_min, 2000);
        assert_eq!(settings.input_neutral_max, 3000);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_decel_zero_sentinel_preserved() {
        let mut settings = base();
        settings.decel_max = 0;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert_eq!(settings.decel_max, 0);
        assert!(warnings.is_empty());

        settings.decel_max = 7;
        settings.fix(&mut warnings);
        assert_eq!(settings.decel_max, MIN_ALLOWED_ACCEL);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_decay_mode_restricted_by_product() {
        let mut settings = base();
        settings.decay_mode = DecayMode::Mixed25;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert_eq!(settings.decay_mode, DecayMode::Mixed);
        assert_eq!(warnings.len(), 1);

        let mut settings = base();
        settings.product = Product::Drv8834;
        settings.decay_mode = DecayMode::Mixed25;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert_eq!(settings.decay_mode, DecayMode::Mixed25);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_exclusive_pin_func_kept_by_first_claimant() {
        let mut settings = base();
        settings.pin_mut(Pin::Scl).func = PinFunc::LimitSwitchForward;
        settings.pin_mut(Pin::Tx).func = PinFunc::LimitSwitchForward;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert_eq!(settings.pin(Pin::Scl).func, PinFunc::LimitSwitchForward);
        assert_eq!(settings.pin(Pin::Tx).func, PinFunc::Default);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_kill_switch_allowed_on_multiple_pins() {
        let mut settings = base();
        settings.pin_mut(Pin::Scl).func = PinFunc::KillSwitch;
        settings.pin_mut(Pin::Sda).func = PinFunc::KillSwitch;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert_eq!(settings.pin(Pin::Sda).func, PinFunc::KillSwitch);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unsupported_pin_func_reset() {
        let mut settings = base();
        settings.pin_mut(Pin::Scl).func = PinFunc::RcInput;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert_eq!(settings.pin(Pin::Scl).func, PinFunc::Default);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_rc_pin_analog_cleared() {
        let mut settings = base();
        settings.pin_mut(Pin::Rc).analog = true;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert!(!settings.pin(Pin::Rc).analog);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_mp6500_step_mode_limited() {
        let mut settings = Settings::new(Product::Mp6500);
        settings.fill_with_defaults();
        settings.step_mode = StepMode::Microstep32;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert_eq!(settings.step_mode, StepMode::Microstep8);
        assert!(warnings.iter().any(|w| w.contains("step mode")));
    }

    #[test]
    fn test_fix_is_idempotent_on_zeroed_settings() {
        for product in [Product::Drv8825, Product::Drv8834, Product::Mp6500] {
            let mut settings = Settings::new(product);
            let mut warnings = Vec::new();
            settings.fix(&mut warnings);
            assert!(!warnings.is_empty());

            let fixed = settings.clone();
            let mut second = Vec::new();
            settings.fix(&mut second);
            assert_eq!(settings, fixed);
            assert!(second.is_empty(), "{product:?}: {second:?}");
        }
    }

    #[test]
    fn test_vin_thresholds_ordered() {
        let mut settings = base();
        settings.low_vin_shutoff_voltage = 7000;
        settings.low_vin_startup_voltage = 6500;
        settings.high_vin_shutoff_voltage = 7100;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert!(settings.low_vin_shutoff_voltage < settings.low_vin_startup_voltage);
        assert!(settings.low_vin_startup_voltage < settings.high_vin_shutoff_voltage);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_vin_thresholds_saturating_at_top() {
        let mut settings = base();
        settings.low_vin_shutoff_voltage = u16::MAX;
        settings.low_vin_startup_voltage = 0;
        settings.high_vin_shutoff_voltage = 0;
        let mut warnings = Vec::new();
        settings.fix(&mut warnings);
        assert!(settings.low_vin_shutoff_voltage < settings.low_vin_startup_voltage);
        assert!(settings.low_vin_startup_voltage < settings.high_vin_shutoff_voltage);

        let fixed = settings.clone();
        let mut second = Vec::new();
        settings.fix(&mut second);
        assert_eq!(settings, fixed);
        assert!(second.is_empty(), "{second:?}");
    }
}

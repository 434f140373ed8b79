//! Conversion between [`Settings`] and the persisted text document.
//!
//! The document is TOML: one key per field, enum values as snake_case
//! strings, per-pin settings in `[pins.*]` tables.  Parsing is
//! forward-compatible by construction: unknown keys and unparseable values
//! produce warnings, never failures, and out-of-range numbers are stored
//! saturated and left for [`Settings::fix`] to repair.

use serde::de::DeserializeOwned;
use serde::Serialize;
use toml::Value;

use crate::error::{Error, Result};

use super::{Pin, Product, Settings};

impl Settings {
    /// Serialize to the settings document format.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(1500);
        out.push_str("# Stepper motor controller settings file.\n");
        push_str_kv(&mut out, "product", &self.product);
        push_str_kv(&mut out, "control_mode", &self.control_mode);
        push_kv(&mut out, "never_sleep", self.never_sleep);
        push_kv(&mut out, "disable_safe_start", self.disable_safe_start);
        push_kv(&mut out, "ignore_err_line_high", self.ignore_err_line_high);
        push_kv(&mut out, "auto_clear_driver_error", self.auto_clear_driver_error);
        push_str_kv(&mut out, "soft_error_response", &self.soft_error_response);
        push_kv(&mut out, "soft_error_position", self.soft_error_position);
        push_kv(&mut out, "serial_baud_rate", self.serial_baud_rate);
        push_kv(&mut out, "serial_device_number", self.serial_device_number);
        push_kv(&mut out, "serial_crc_enabled", self.serial_crc_enabled);
        push_kv(&mut out, "serial_response_delay", self.serial_response_delay);
        push_kv(&mut out, "command_timeout", self.command_timeout);
        push_kv(&mut out, "low_vin_timeout", self.low_vin_timeout);
        push_kv(&mut out, "low_vin_shutoff_voltage", self.low_vin_shutoff_voltage);
        push_kv(&mut out, "low_vin_startup_voltage", self.low_vin_startup_voltage);
        push_kv(&mut out, "high_vin_shutoff_voltage", self.high_vin_shutoff_voltage);
        push_kv(&mut out, "vin_calibration", self.vin_calibration);
        push_kv(&mut out, "rc_max_pulse_period", self.rc_max_pulse_period);
        push_kv(&mut out, "rc_bad_signal_timeout", self.rc_bad_signal_timeout);
        push_kv(&mut out, "rc_consecutive_good_pulses", self.rc_consecutive_good_pulses);
        push_kv(&mut out, "input_averaging_enabled", self.input_averaging_enabled);
        push_kv(&mut out, "input_hysteresis", self.input_hysteresis);
        push_kv(&mut out, "input_error_min", self.input_error_min);
        push_kv(&mut out, "input_error_max", self.input_error_max);
        push_str_kv(&mut out, "input_scaling_degree", &self.input_scaling_degree);
        push_kv(&mut out, "input_invert", self.input_invert);
        push_kv(&mut out, "input_min", self.input_min);
        push_kv(&mut out, "input_neutral_min", self.input_neutral_min);
        push_kv(&mut out, "input_neutral_max", self.input_neutral_max);
        push_kv(&mut out, "input_max", self.input_max);
        push_kv(&mut out, "output_min", self.output_min);
        push_kv(&mut out, "output_max", self.output_max);
        push_kv(&mut out, "encoder_prescaler", self.encoder_prescaler);
        push_kv(&mut out, "encoder_postscaler", self.encoder_postscaler);
        push_kv(&mut out, "encoder_unlimited", self.encoder_unlimited);
        push_kv(&mut out, "current_limit", self.current_limit);
        push_kv(&mut out, "current_limit_during_error", self.current_limit_during_error);
        push_str_kv(&mut out, "step_mode", &self.step_mode);
        push_str_kv(&mut out, "decay_mode", &self.decay_mode);
        push_kv(&mut out, "starting_speed", self.starting_speed);
        push_kv(&mut out, "speed_max", self.speed_max);
        push_kv(&mut out, "decel_max", self.decel_max);
        push_kv(&mut out, "accel_max", self.accel_max);
        push_kv(&mut out, "invert_motor_direction", self.invert_motor_direction);
        for pin in Pin::ALL {
            let ps = self.pin(pin);
            out.push_str(&format!("\n[pins.{}]\n", pin.key()));
            push_str_kv(&mut out, "func", &ps.func);
            push_kv(&mut out, "pullup", ps.pullup);
            push_kv(&mut out, "analog", ps.analog);
            push_kv(&mut out, "polarity", ps.polarity);
        }
        out
    }

    /// Parse a settings document.
    ///
    /// Returns an error only when the document is not valid TOML at all.
    /// Omitted keys keep their zeroed defaults; unknown keys and bad values
    /// append warnings.  The result has not been through [`Settings::fix`].
    pub fn from_text(text: &str, warnings: &mut Vec<String>) -> Result<Settings> {
        let table: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| Error::SettingsParse(e.message().to_string()))?;

        let product = match table.get("product") {
            Some(value) => match value.clone().try_into::<Product>() {
                Ok(product) => product,
                Err(_) => {
                    warnings.push(format!(
                        "The product '{}' is not recognized so {} will be assumed.",
                        value.as_str().unwrap_or("?"),
                        Product::Drv8825
                    ));
                    Product::Drv8825
                }
            },
            None => {
                warnings.push(format!(
                    "The settings file does not specify a product so {} will be assumed.",
                    Product::Drv8825
                ));
                Product::Drv8825
            }
        };

        let mut s = Settings::new(product);
        for (key, value) in &table {
            match key.as_str() {
                "product" => {}
                "pins" => parse_pins(&mut s, value, warnings),
                "control_mode" => parse_enum(value, key, &mut s.control_mode, warnings),
                "never_sleep" => parse_bool(value, key, &mut s.never_sleep, warnings),
                "disable_safe_start" => parse_bool(value, key, &mut s.disable_safe_start, warnings),
                "ignore_err_line_high" => {
                    parse_bool(value, key, &mut s.ignore_err_line_high, warnings)
                }
                "auto_clear_driver_error" => {
                    parse_bool(value, key, &mut s.auto_clear_driver_error, warnings)
                }
                "soft_error_response" => {
                    parse_enum(value, key, &mut s.soft_error_response, warnings)
                }
                "soft_error_position" => {
                    parse_i32(value, key, &mut s.soft_error_position, warnings)
                }
                "serial_baud_rate" => parse_u32(value, key, &mut s.serial_baud_rate, warnings),
                "serial_device_number" => {
                    parse_u8(value, key, &mut s.serial_device_number, warnings)
                }
                "serial_crc_enabled" => parse_bool(value, key, &mut s.serial_crc_enabled, warnings),
                "serial_response_delay" => {
                    parse_u8(value, key, &mut s.serial_response_delay, warnings)
                }
                "command_timeout" => parse_u16(value, key, &mut s.command_timeout, warnings),
                "low_vin_timeout" => parse_u16(value, key, &mut s.low_vin_timeout, warnings),
                "low_vin_shutoff_voltage" => {
                    parse_u16(value, key, &mut s.low_vin_shutoff_voltage, warnings)
                }
                "low_vin_startup_voltage" => {
                    parse_u16(value, key, &mut s.low_vin_startup_voltage, warnings)
                }
                "high_vin_shutoff_voltage" => {
                    parse_u16(value, key, &mut s.high_vin_shutoff_voltage, warnings)
                }
                "vin_calibration" => parse_i16(value, key, &mut s.vin_calibration, warnings),
                "rc_max_pulse_period" => {
                    parse_u16(value, key, &mut s.rc_max_pulse_period, warnings)
                }
                "rc_bad_signal_timeout" => {
                    parse_u16(value, key, &mut s.rc_bad_signal_timeout, warnings)
                }
                "rc_consecutive_good_pulses" => {
                    parse_u8(value, key, &mut s.rc_consecutive_good_pulses, warnings)
                }
                "input_averaging_enabled" => {
                    parse_bool(value, key, &mut s.input_averaging_enabled, warnings)
                }
                "input_hysteresis" => parse_u16(value, key, &mut s.input_hysteresis, warnings),
                "input_error_min" => parse_u16(value, key, &mut s.input_error_min, warnings),
                "input_error_max" => parse_u16(value, key, &mut s.input_error_max, warnings),
                "input_scaling_degree" => {
                    parse_enum(value, key, &mut s.input_scaling_degree, warnings)
                }
                "input_invert" => parse_bool(value, key, &mut s.input_invert, warnings),
                "input_min" => parse_u16(value, key, &mut s.input_min, warnings),
                "input_neutral_min" => parse_u16(value, key, &mut s.input_neutral_min, warnings),
                "input_neutral_max" => parse_u16(value, key, &mut s.input_neutral_max, warnings),
                "input_max" => parse_u16(value, key, &mut s.input_max, warnings),
                "output_min" => parse_i32(value, key, &mut s.output_min, warnings),
                "output_max" => parse_i32(value, key, &mut s.output_max, warnings),
                "encoder_prescaler" => parse_u32(value, key, &mut s.encoder_prescaler, warnings),
                "encoder_postscaler" => parse_u32(value, key, &mut s.encoder_postscaler, warnings),
                "encoder_unlimited" => parse_bool(value, key, &mut s.encoder_unlimited, warnings),
                "current_limit" => parse_u32(value, key, &mut s.current_limit, warnings),
                "current_limit_during_error" => {
                    parse_i32(value, key, &mut s.current_limit_during_error, warnings)
                }
                "step_mode" => parse_enum(value, key, &mut s.step_mode, warnings),
                "decay_mode" => parse_enum(value, key, &mut s.decay_mode, warnings),
                "starting_speed" => parse_u32(value, key, &mut s.starting_speed, warnings),
                "speed_max" => parse_u32(value, key, &mut s.speed_max, warnings),
                "decel_max" => parse_u32(value, key, &mut s.decel_max, warnings),
                "accel_max" => parse_u32(value, key, &mut s.accel_max, warnings),
                "invert_motor_direction" => {
                    parse_bool(value, key, &mut s.invert_motor_direction, warnings)
                }
                _ => warnings.push(format!(
                    "The settings file has an unrecognized key: '{key}'."
                )),
            }
        }
        Ok(s)
    }
}

fn push_kv<V: std::fmt::Display>(out: &mut String, key: &str, value: V) {
    out.push_str(&format!("{key} = {value}\n"));
}

fn push_str_kv<V: Serialize>(out: &mut String, key: &str, value: &V) {
    let name = Value::try_from(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    out.push_str(&format!("{key} = \"{name}\"\n"));
}

fn parse_pins(s: &mut Settings, value: &Value, warnings: &mut Vec<String>) {
    let Some(pins) = value.as_table() else {
        warnings.push("The 'pins' key is not a table so it will be ignored.".to_string());
        return;
    };
    for (name, pin_value) in pins {
        let Some(pin) = Pin::ALL.iter().copied().find(|p| p.key() == name) else {
            warnings.push(format!("The settings file has an unrecognized pin: '{name}'."));
            continue;
        };
        let Some(pin_table) = pin_value.as_table() else {
            warnings.push(format!("The '{name}' pin settings are not a table."));
            continue;
        };
        for (key, value) in pin_table {
            let ps = &mut s.pins[pin.index()];
            match key.as_str() {
                "func" => parse_enum(value, key, &mut ps.func, warnings),
                "pullup" => parse_bool(value, key, &mut ps.pullup, warnings),
                "analog" => parse_bool(value, key, &mut ps.analog, warnings),
                "polarity" => parse_bool(value, key, &mut ps.polarity, warnings),
                _ => warnings.push(format!(
                    "The '{name}' pin settings have an unrecognized key: '{key}'."
                )),
            }
        }
    }
}

fn parse_enum<T: DeserializeOwned>(
    value: &Value,
    key: &str,
    out: &mut T,
    warnings: &mut Vec<String>,
) {
    match value.clone().try_into::<T>() {
        Ok(parsed) => *out = parsed,
        Err(_) => warnings.push(format!(
            "The '{key}' value is not valid so the default will be used."
        )),
    }
}

fn parse_bool(value: &Value, key: &str, out: &mut bool, warnings: &mut Vec<String>) {
    match value.as_bool() {
        Some(b) => *out = b,
        None => warnings.push(format!(
            "The '{key}' value is not a boolean so the default will be used."
        )),
    }
}

fn parse_int(value: &Value, key: &str, warnings: &mut Vec<String>) -> Option<i64> {
    match value.as_integer() {
        Some(n) => Some(n),
        None => {
            warnings.push(format!(
                "The '{key}' value is not an integer so the default will be used."
            ));
            None
        }
    }
}

// Out-of-storage-range values saturate silently; the legal-range check and
// its warning belong to the fix pass.

fn parse_u8(value: &Value, key: &str, out: &mut u8, warnings: &mut Vec<String>) {
    if let Some(n) = parse_int(value, key, warnings) {
        *out = n.clamp(0, u8::MAX as i64) as u8;
    }
}

fn parse_u16(value: &Value, key: &str, out: &mut u16, warnings: &mut Vec<String>) {
    if let Some(n) = parse_int(value, key, warnings) {
        *out = n.clamp(0, u16::MAX as i64) as u16;
    }
}

fn parse_u32(value: &Value, key: &str, out: &mut u32, warnings: &mut Vec<String>) {
    if let Some(n) = parse_int(value, key, warnings) {
        *out = n.clamp(0, u32::MAX as i64) as u32;
    }
}

fn parse_i16(value: &Value, key: &str, out: &mut i16, warnings: &mut Vec<String>) {
    if let Some(n) = parse_int(value, key, warnings) {
        *out = n.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
    }
}

fn parse_i32(value: &Value, key: &str, out: &mut i32, warnings: &mut Vec<String>) {
    if let Some(n) = parse_int(value, key, warnings) {
        *out = n.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{DecayMode, PinFunc, ScalingDegree};

    #[test]
    fn test_round_trip_is_lossless() {
        let mut settings = Settings::new(Product::Drv8834);
        settings.serial_baud_rate = 115_200;
        settings.soft_error_position = -44;
        settings.vin_calibration = -123;
        settings.input_scaling_degree = ScalingDegree::Cubic;
        settings.decay_mode = DecayMode::Mixed75;
        settings.pins[Pin::Rc.index()].func = PinFunc::RcInput;
        settings.pins[Pin::Scl.index()].pullup = true;

        let text = settings.to_text();
        let mut warnings = Vec::new();
        let parsed = Settings::from_text(&text, &mut warnings).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_unknown_key_warns_but_parses() {
        let text = "product = \"drv8825\"\nfuture_feature = 7\ncurrent_limit = 320\n";
        let mut warnings = Vec::new();
        let parsed = Settings::from_text(text, &mut warnings).unwrap();
        assert_eq!(parsed.current_limit, 320);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("future_feature"));
    }

    #[test]
    fn test_comments_and_omitted_keys_tolerated() {
        let text = "# a comment\nproduct = \"mp6500\" # trailing\n";
        let mut warnings = Vec::new();
        let parsed = Settings::from_text(text, &mut warnings).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(parsed, Settings::new(Product::Mp6500));
    }

    #[test]
    fn test_missing_product_warns_and_uses_baseline() {
        let text = "current_limit = 320\n";
        let mut warnings = Vec::new();
        let parsed = Settings::from_text(text, &mut warnings).unwrap();
        assert_eq!(parsed.product, Product::Drv8825);
        assert!(warnings.iter().any(|w| w.contains("product")));
    }

    #[test]
    fn test_bad_enum_value_warns_and_keeps_default() {
        let text = "product = \"drv8825\"\nstep_mode = \"1/64\"\n";
        let mut warnings = Vec::new();
        let parsed = Settings::from_text(text, &mut warnings).unwrap();
        assert_eq!(parsed.step_mode, crate::settings::StepMode::Full);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_out_of_storage_range_saturates_and_defers_to_fix() {
        let text = "product = \"drv8825\"\ncommand_timeout = 100000\n";
        let mut warnings = Vec::new();
        let mut parsed = Settings::from_text(text, &mut warnings).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(parsed.command_timeout, u16::MAX);
        parsed.fix(&mut warnings);
        assert_eq!(parsed.command_timeout, 60_000);
        assert!(warnings.iter().any(|w| w.contains("command timeout")));
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let mut warnings = Vec::new();
        assert!(Settings::from_text("this is [not toml", &mut warnings).is_err());
    }

    #[test]
    fn test_unordered_neutral_band_from_file() {
        let text = "product = \"drv8825\"\ninput_neutral_min = 3000\ninput_neutral_max = 2000\n";
        let mut warnings = Vec::new();
        let mut parsed = Settings::from_text(text, &mut warnings).unwrap();
        assert!(warnings.is_empty());
        parsed.fix(&mut warnings);
        assert!(parsed.input_neutral_min <= parsed.input_neutral_max);
        assert!(!warnings.is_empty());
    }
}

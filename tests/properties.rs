//! Property tests for the quantizers, the repair pass, and the decoders.

use proptest::prelude::*;

use stepctl::variables::Variables;
use stepctl::{protocol, quant, Product, Settings};

fn any_product() -> impl Strategy<Value = Product> {
    prop_oneof![
        Just(Product::Drv8825),
        Just(Product::Drv8834),
        Just(Product::Mp6500),
    ]
}

/// Settings decoded from an arbitrary EEPROM image.  Decoding is total,
/// so this reaches every representable record, including nonsense ones.
fn any_settings() -> impl Strategy<Value = Settings> {
    (
        any_product(),
        proptest::collection::vec(any::<u8>(), protocol::SETTINGS_SIZE),
    )
        .prop_map(|(product, bytes)| {
            let mut warnings = Vec::new();
            Settings::from_buffer(product, &bytes, &mut warnings).unwrap()
        })
}

proptest! {
    #[test]
    fn current_limit_from_code_is_monotonic(
        product in any_product(),
        a in any::<u8>(),
        b in any::<u8>(),
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            quant::current_limit_from_code(product, lo)
                <= quant::current_limit_from_code(product, hi)
        );
    }

    #[test]
    fn achievable_current_never_overshoots(
        product in any_product(),
        milliamps in 0u32..=4000,
    ) {
        let request = milliamps.min(quant::max_allowed_current(product));
        // The MP6500 grid has no zero entry; its lowest code is the floor.
        let floor = quant::current_limit_from_code(product, 0);
        let achieved = quant::achievable_current_limit(product, request);
        prop_assert!(achieved <= request.max(floor));
    }

    #[test]
    fn achievable_current_is_stable(product in any_product(), milliamps in 0u32..=5000) {
        let once = quant::achievable_current_limit(product, milliamps);
        prop_assert_eq!(quant::achievable_current_limit(product, once), once);
    }

    #[test]
    fn achievable_baud_is_stable(baud in 200u32..=115_385) {
        let once = quant::achievable_baud_rate(baud);
        prop_assert_eq!(quant::achievable_baud_rate(once), once);
    }

    #[test]
    fn fix_is_idempotent(mut settings in any_settings()) {
        let mut first = Vec::new();
        settings.fix(&mut first);

        let mut second_pass = settings.clone();
        let mut second = Vec::new();
        second_pass.fix(&mut second);

        prop_assert_eq!(&second_pass, &settings);
        prop_assert!(second.is_empty(), "second pass warned: {:?}", second);
    }

    #[test]
    fn fix_orders_the_scaling_breakpoints(mut settings in any_settings()) {
        settings.fix(&mut Vec::new());
        prop_assert!(settings.input_min <= settings.input_neutral_min);
        prop_assert!(settings.input_neutral_min <= settings.input_neutral_max);
        prop_assert!(settings.input_neutral_max <= settings.input_max);
        prop_assert!(settings.input_error_min <= settings.input_min);
        prop_assert!(settings.input_error_max >= settings.input_max);
    }

    #[test]
    fn text_round_trip_is_lossless(settings in any_settings()) {
        // No fix in between: the document format represents every record
        // exactly, legal or not.
        let mut warnings = Vec::new();
        let parsed = Settings::from_text(&settings.to_text(), &mut warnings).unwrap();
        prop_assert!(warnings.is_empty(), "round trip warned: {:?}", warnings);
        prop_assert_eq!(parsed, settings);
    }

    #[test]
    fn buffer_round_trip_is_lossless_for_legal_settings(mut settings in any_settings()) {
        settings.fix(&mut Vec::new());

        let mut warnings = Vec::new();
        let parsed =
            Settings::from_buffer(settings.product, &settings.to_buffer(), &mut warnings)
                .unwrap();
        prop_assert!(warnings.is_empty(), "round trip warned: {:?}", warnings);
        prop_assert_eq!(parsed, settings);
    }

    #[test]
    fn variables_decode_is_total(
        bytes in proptest::collection::vec(any::<u8>(), protocol::VARIABLES_SIZE)
    ) {
        let variables = Variables::decode(&bytes).unwrap();
        // Exercise the derived accessors on arbitrary content too.
        for pin in stepctl::Pin::ALL {
            let _ = variables.pin_state(pin);
            let _ = variables.analog_reading(pin);
            let _ = variables.switch_active(pin);
        }
        let _ = variables.rc_pulse_width();
        let _ = stepctl::variables::error_names(variables.errors_occurred);
    }
}

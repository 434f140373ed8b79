//! Quantization tables mapping engineering units onto firmware codes.
//!
//! The firmware stores a current limit as a small discrete code and a baud
//! rate as a clock divisor.  Conversions here round toward zero so the
//! device is never commanded to exceed a caller-specified limit.

use crate::protocol::{
    BAUD_RATE_GENERATOR_FACTOR, CURRENT_LIMIT_UNITS_MA, MAX_ALLOWED_CURRENT_CODE_MP6500,
    MAX_ALLOWED_CURRENT_DRV8825, MAX_ALLOWED_CURRENT_DRV8834,
};
use crate::settings::Product;

/// Nominal current limit in milliamps for each MP6500 code.  The MP6500's
/// current sense is nonuniform, so this is a measured table rather than a
/// formula.
const MP6500_CURRENT_TABLE: [u16; 32] = [
    19, 152, 275, 388, 492, 589, 680, 766, 847, 924, 998, 1069, 1137, 1203, 1268, 1331, 1393,
    1455, 1516, 1577, 1639, 1701, 1764, 1829, 1895, 1964, 2036, 2111, 2190, 2274, 2365, 2463,
];

/// Highest current limit the hardware allows for `product`, in milliamps.
pub fn max_allowed_current(product: Product) -> u32 {
    match product {
        Product::Mp6500 => MP6500_CURRENT_TABLE[MAX_ALLOWED_CURRENT_CODE_MP6500 as usize] as u32,
        Product::Drv8834 => MAX_ALLOWED_CURRENT_DRV8834,
        Product::Drv8825 => MAX_ALLOWED_CURRENT_DRV8825,
    }
}

/// Coerce a raw code to the nearest legal code at or below it.
///
/// The linear products cannot resolve every code: above 32 only multiples
/// of 2 are representable, above 64 only multiples of 4.
fn fix_code(product: Product, code: u8) -> u8 {
    match product {
        Product::Mp6500 => code.min(MAX_ALLOWED_CURRENT_CODE_MP6500),
        _ => {
            let max = (max_allowed_current(product) / CURRENT_LIMIT_UNITS_MA) as u8;
            if code > max {
                max
            } else if code > 64 {
                code & !3
            } else if code > 32 {
                code & !1
            } else {
                code
            }
        }
    }
}

/// Convert a current limit code as stored on the EEPROM to the current
/// limit in milliamps it actually represents.
pub fn current_limit_from_code(product: Product, code: u8) -> u32 {
    let code = fix_code(product, code);
    match product {
        Product::Mp6500 => MP6500_CURRENT_TABLE[code as usize] as u32,
        _ => code as u32 * CURRENT_LIMIT_UNITS_MA,
    }
}

/// Convert a current limit in milliamps to a code for the firmware,
/// rounding down so the device never exceeds the requested limit.
pub fn current_limit_to_code(product: Product, milliamps: u32) -> u8 {
    match product {
        Product::Mp6500 => {
            let mut code = 0;
            for (i, &ma) in MP6500_CURRENT_TABLE.iter().enumerate() {
                if ma as u32 <= milliamps {
                    code = i as u8;
                }
            }
            code
        }
        _ => fix_code(product, (milliamps / CURRENT_LIMIT_UNITS_MA).min(255) as u8),
    }
}

/// The current limit that a requested limit actually maps to, after the
/// code round trip.  Never exceeds the request (except that requests below
/// the lowest representable value map up to it on table-based products).
pub fn achievable_current_limit(product: Product, milliamps: u32) -> u32 {
    current_limit_from_code(product, current_limit_to_code(product, milliamps))
}

/// Every legal current limit code for `product`, in increasing order.
/// A strict subset of the raw code space: codes above the product ceiling
/// and codes the hardware cannot resolve are excluded.  Drives selector
/// widgets in user interfaces.
pub fn recommended_current_limit_codes(product: Product) -> Vec<u8> {
    (0..=255u8).filter(|&c| fix_code(product, c) == c).collect()
}

/// Convert a baud rate to the divisor the firmware stores.
///
/// Truncating division makes the round trip stable: converting the
/// achieved rate back yields the same divisor.
pub fn baud_rate_to_divisor(baud_rate: u32) -> u16 {
    if baud_rate == 0 {
        return u16::MAX;
    }
    let divisor = BAUD_RATE_GENERATOR_FACTOR / baud_rate;
    divisor.saturating_sub(1).min(u16::MAX as u32) as u16
}

/// Convert a stored divisor back to the baud rate it generates.
pub fn baud_rate_from_divisor(divisor: u16) -> u32 {
    BAUD_RATE_GENERATOR_FACTOR / (divisor as u32 + 1)
}

/// The baud rate a requested rate actually achieves, after the divisor
/// round trip.  Exactly the request only when the request is exactly
/// representable.
pub fn achievable_baud_rate(baud_rate: u32) -> u32 {
    baud_rate_from_divisor(baud_rate_to_divisor(baud_rate))
}

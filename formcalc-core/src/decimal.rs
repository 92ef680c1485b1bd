//! Decimal Arithmetic
//!
//! Binary floating point cannot represent most decimal fractions, so
//! `0.1 + 0.2` yields `0.30000000000000004`. Form totals must not drift like
//! that, so calculations combine values through the helpers in this module.
//!
//! # Algorithm
//!
//! 1. Every operand gets a shift factor: `10^d`, where `d` is the number of
//!    digits after the decimal point in its shortest decimal rendering. Whole
//!    numbers have a factor of 1, and so do magnitudes below
//!    [`MIN_SCALED_MAGNITUDE`], which would otherwise need more digits than
//!    an `f64` scale can hold.
//! 2. The largest factor among the operands becomes the common scale.
//! 3. Operands are scaled by that factor and rounded to integers, the integer
//!    operation runs, and the result is scaled back: addition and subtraction
//!    divide by the factor once, multiplication divides by its square, and
//!    division needs no rescale because the factor cancels.

/// Smallest non-zero magnitude that is scaled by its fraction digits.
pub const MIN_SCALED_MAGNITUDE: f64 = 1e-6;

/// Shift factor for a single operand.
///
/// Non-finite values and magnitudes below [`MIN_SCALED_MAGNITUDE`] get a
/// factor of 1.
pub fn shift_factor(x: f64) -> f64 {
    if !x.is_finite() || x.abs() < MIN_SCALED_MAGNITUDE {
        return 1.0;
    }
    let rendered = x.to_string();
    let factor = match rendered.split_once('.') {
        Some((_, fraction)) => 10f64.powi(fraction.len() as i32),
        None => 1.0,
    };
    if factor.is_finite() {
        factor
    } else {
        1.0
    }
}

/// The largest shift factor among `operands`, never less than 1.
pub fn common_factor(operands: &[f64]) -> f64 {
    operands
        .iter()
        .map(|&x| shift_factor(x))
        .fold(1.0, f64::max)
}

/// Round half-way cases toward positive infinity.
fn round_half_up(x: f64) -> f64 {
    let rounded = x.round();
    // `f64::round` sends negative ties away from zero.
    if x - rounded == 0.5 {
        rounded + 1.0
    } else {
        rounded
    }
}

fn scaled(x: f64, factor: f64) -> f64 {
    round_half_up(x * factor)
}

/// Add two decimals without binary representation drift.
pub fn add(left: f64, right: f64) -> f64 {
    let factor = common_factor(&[left, right]);
    (scaled(left, factor) + scaled(right, factor)) / factor
}

/// Subtract `right` from `left` without binary representation drift.
pub fn subtract(left: f64, right: f64) -> f64 {
    let factor = common_factor(&[left, right]);
    (scaled(left, factor) - scaled(right, factor)) / factor
}

/// Multiply two decimals without binary representation drift.
pub fn multiply(left: f64, right: f64) -> f64 {
    let factor = common_factor(&[left, right]);
    scaled(left, factor) * scaled(right, factor) / (factor * factor)
}

/// Divide `left` by `right` on the common scale.
///
/// No exactness is promised beyond what native division gives.
pub fn divide(left: f64, right: f64) -> f64 {
    let factor = common_factor(&[left, right]);
    scaled(left, factor) / scaled(right, factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_factor_counts_fraction_digits() {
        assert_eq!(shift_factor(3.0), 1.0);
        assert_eq!(shift_factor(0.5), 10.0);
        assert_eq!(shift_factor(12.345), 1000.0);
        assert_eq!(shift_factor(-0.25), 100.0);
        assert_eq!(shift_factor(f64::NAN), 1.0);
        assert_eq!(shift_factor(f64::INFINITY), 1.0);
    }

    #[test]
    fn tiny_operands_keep_a_unit_factor() {
        assert_eq!(shift_factor(5e-324), 1.0);
        assert_eq!(shift_factor(1e-310), 1.0);
        assert_eq!(shift_factor(-1e-7), 1.0);
        assert_eq!(shift_factor(0.000001), 1_000_000.0);

        assert_eq!(add(1.0, 5e-324), 1.0);
        assert_eq!(add(1.0, 1e-310), 1.0);
        assert_eq!(subtract(2.5, 1e-300), 2.5);
        assert!(!multiply(3.0, 1e-320).is_nan());
    }

    #[test]
    fn common_factor_takes_the_maximum() {
        assert_eq!(common_factor(&[]), 1.0);
        assert_eq!(common_factor(&[1.0, 2.0]), 1.0);
        assert_eq!(common_factor(&[0.1, 0.25, 3.0]), 100.0);
    }

    #[test]
    fn add_is_exact_for_decimal_fractions() {
        assert_ne!(0.1 + 0.2, 0.3);
        assert_eq!(add(0.1, 0.2), 0.3);
        assert_eq!(add(1.005, 2.0), 3.005);
        assert_eq!(add(-0.1, 0.3), 0.2);
    }

    #[test]
    fn subtract_is_exact_for_decimal_fractions() {
        assert_ne!(1.0 - 0.9, 0.1);
        assert_eq!(subtract(1.0, 0.9), 0.1);
        assert_eq!(subtract(0.3, 0.1), 0.2);
    }

    #[test]
    fn multiply_is_exact_for_decimal_fractions() {
        assert_ne!(0.1 * 0.2, 0.02);
        assert_eq!(multiply(0.1, 0.2), 0.02);
        assert_eq!(multiply(19.99, 3.0), 59.97);
    }

    #[test]
    fn divide_matches_native_division() {
        assert_eq!(divide(1.0, 3.0), 1.0 / 3.0);
        assert_eq!(divide(0.3, 0.1), 3.0);
        assert_eq!(divide(1.0, 0.0), f64::INFINITY);
    }

    #[test]
    fn nan_operands_propagate() {
        assert!(add(f64::NAN, 1.0).is_nan());
        assert!(multiply(2.0, f64::NAN).is_nan());
    }

    #[test]
    fn ties_round_toward_positive_infinity() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
    }
}

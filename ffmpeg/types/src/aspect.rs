/*!
    Sample aspect ratio correction.
*/

use crate::{ReadParams, Rational};

/**
    Returns true if a stream with aspect ratio `aspect` falls inside the
    tolerance band `[1/tolerance, tolerance]`.
*/
pub fn within_tolerance(aspect: f64, tolerance: f64) -> bool {
    aspect * tolerance >= 1.0 && aspect <= tolerance
}

/**
    Compute the display width and height of a frame with the given sample
    aspect ratio.

    Widening ratios scale the width, narrowing ratios scale the height. A
    corrected dimension is rounded up to an even number. Zero, negative or
    square ratios leave both dimensions untouched, as does a ratio outside
    the tolerance band.
*/
pub fn corrected_size(
    width: u32,
    height: u32,
    sample_aspect_ratio: Rational,
    params: &ReadParams,
) -> (u32, u32) {
    if !params.fix_aspect_ratio
        || !within_tolerance(sample_aspect_ratio.to_f64(), params.aspect_ratio_tol)
    {
        return (width, height);
    }

    let num = i64::from(sample_aspect_ratio.num).unsigned_abs();
    let den = i64::from(sample_aspect_ratio.den).unsigned_abs();
    if num == 0 || den == 0 || num == den {
        return (width, height);
    }

    if num > den {
        (round_up_even(u64::from(width) * num / den), height)
    } else {
        (width, round_up_even(u64::from(height) * den / num))
    }
}

fn round_up_even(value: u64) -> u32 {
    let value = u32::try_from(value).unwrap_or(u32::MAX - 1);
    value + (value & 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(tolerance: f64) -> ReadParams {
        ReadParams::new().with_aspect_fix(tolerance)
    }

    #[test]
    fn disabled_leaves_size() {
        let size = corrected_size(720, 576, Rational::new(16, 11), &ReadParams::default());
        assert_eq!(size, (720, 576));
    }

    #[test]
    fn widening_scales_width() {
        // 720 * 16 / 11 = 1047.27 -> 1047 -> 1048
        let size = corrected_size(720, 576, Rational::new(16, 11), &fix(2.0));
        assert_eq!(size, (1048, 576));
    }

    #[test]
    fn narrowing_scales_height() {
        // 480 * 11 / 10 = 528
        let size = corrected_size(720, 480, Rational::new(10, 11), &fix(2.0));
        assert_eq!(size, (720, 528));
    }

    #[test]
    fn tolerance_boundary() {
        // Exactly at the tolerance is corrected.
        let size = corrected_size(100, 100, Rational::new(2, 1), &fix(2.0));
        assert_eq!(size, (200, 100));

        // Just outside is left alone.
        let size = corrected_size(100, 100, Rational::new(20001, 10000), &fix(2.0));
        assert_eq!(size, (100, 100));

        // Lower edge of the band.
        let size = corrected_size(100, 100, Rational::new(1, 2), &fix(2.0));
        assert_eq!(size, (100, 200));
        let size = corrected_size(100, 100, Rational::new(10000, 20001), &fix(2.0));
        assert_eq!(size, (100, 100));
    }

    #[test]
    fn degenerate_ratios_are_ignored() {
        for sar in [Rational::new(0, 1), Rational::new(0, 0), Rational::new(1, 1)] {
            assert_eq!(corrected_size(640, 480, sar, &fix(2.0)), (640, 480));
        }
    }

    #[test]
    fn results_are_even() {
        for num in 1..=30 {
            for den in 1..=30 {
                let (w, h) = corrected_size(638, 478, Rational::new(num, den), &fix(30.0));
                assert_eq!(w % 2, 0);
                assert_eq!(h % 2, 0);
            }
        }
    }
}

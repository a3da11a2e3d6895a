/*!
    Rational number type for time bases, frame rates and aspect ratios.
*/

use std::fmt;

/**
    A rational number represented as a numerator and denominator.

    Used for time bases (e.g., 1/90000 for MPEG-TS), frame rates
    (e.g., 24000/1001 for 23.976 fps) and sample aspect ratios.

    FFmpeg reports unknown values as `0/0` or `0/1`, so a zero
    denominator is representable here and reads as zero.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /**
        Create a new rational number.
    */
    #[inline]
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /**
        Convert to f64, returning zero for a zero denominator.
    */
    #[inline]
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /**
        Returns true if both terms are nonzero.
    */
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.num != 0 && self.den != 0
    }

    /**
        Invert the rational (swap numerator and denominator).
    */
    #[inline]
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self::new(num, den)
    }
}

impl From<i32> for Rational {
    fn from(num: i32) -> Self {
        Self::new(num, 1)
    }
}

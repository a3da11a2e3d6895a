/*!
    Timestamp types for media timing.
*/

use std::time::Duration;

use crate::Rational;

/**
    Presentation timestamp in time_base units.

    This is the raw timestamp value from the media stream. To convert to
    a meaningful duration, you need the stream's time base.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pts(pub i64);

impl Pts {
    /**
        Convert this PTS to seconds using the given time base.
    */
    #[inline]
    pub fn to_seconds(self, time_base: Rational) -> f64 {
        self.0 as f64 * time_base.to_f64()
    }

    /**
        Convert this PTS to a Duration using the given time base.

        Negative PTS values are clamped to zero.
    */
    #[inline]
    pub fn to_duration(self, time_base: Rational) -> Duration {
        if self.0 <= 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.to_seconds(time_base).max(0.0))
    }
}

impl From<i64> for Pts {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Pts> for i64 {
    fn from(pts: Pts) -> Self {
        pts.0
    }
}

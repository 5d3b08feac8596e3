/*!
    Time base arithmetic.
*/

use serde::Serialize;

/**
    A rational number, used for stream time bases and frame rates.

    Timestamps are integers counted in units of a stream's time base;
    everything handed to the caller is normalized to milliseconds.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /// Milliseconds, the unit every caller-facing timestamp uses.
    pub const MILLIS: Rational = Rational { num: 1, den: 1000 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /**
        Returns true if the denominator is zero or the value is not positive.
    */
    pub const fn is_invalid(self) -> bool {
        self.den == 0 || self.num == 0 || (self.num < 0) != (self.den < 0)
    }

    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /**
        The reciprocal, e.g. a frame duration from a frame rate.
    */
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    /**
        Rescale `ts` from time base `self` to time base `to`, rounding to
        the nearest integer (halfway cases away from zero).
    */
    pub fn rescale(self, ts: i64, to: Rational) -> i64 {
        if self.is_invalid() || to.is_invalid() {
            return 0;
        }
        let num = ts as i128 * self.num as i128 * to.den as i128;
        let den = self.den as i128 * to.num as i128;
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /**
        Rescale `ts` from time base `self` to time base `to`, rounding down.
    */
    pub fn rescale_floor(self, ts: i64, to: Rational) -> i64 {
        if self.is_invalid() || to.is_invalid() {
            return 0;
        }
        let num = ts as i128 * self.num as i128 * to.den as i128;
        let den = self.den as i128 * to.num as i128;
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        num.div_euclid(den)
            .clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /**
        Convert a timestamp in this time base to milliseconds.
    */
    pub fn ts_to_millis(self, ts: i64) -> i64 {
        self.rescale(ts, Self::MILLIS)
    }

    /**
        Convert milliseconds to a timestamp in this time base, rounding down
        so that the result never lies after the requested instant.
    */
    pub fn millis_to_ts(self, millis: i64) -> i64 {
        Self::MILLIS.rescale_floor(millis, self)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::MILLIS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_to_millis_rounds_to_nearest() {
        let tb = Rational::new(1, 30);
        assert_eq!(tb.ts_to_millis(0), 0);
        assert_eq!(tb.ts_to_millis(149), 4967);
        assert_eq!(tb.ts_to_millis(150), 5000);
        assert_eq!(tb.ts_to_millis(-1), -33);
    }

    #[test]
    fn millis_to_ts_rounds_down() {
        let tb = Rational::new(1, 90000);
        assert_eq!(tb.millis_to_ts(5000), 450_000);
        let tb = Rational::new(1, 30);
        assert_eq!(tb.millis_to_ts(4999), 149);
        assert_eq!(tb.millis_to_ts(5000), 150);
        assert_eq!(tb.millis_to_ts(-10), -1);
    }

    #[test]
    fn rescale_between_stream_bases() {
        let video = Rational::new(1, 90000);
        let audio = Rational::new(1, 44100);
        assert_eq!(video.rescale(90000, audio), 44100);
        assert_eq!(audio.rescale(1024, Rational::MILLIS), 23);
    }

    #[test]
    fn invalid_bases_rescale_to_zero() {
        assert!(Rational::new(1, 0).is_invalid());
        assert!(Rational::new(0, 1).is_invalid());
        assert_eq!(Rational::new(1, 0).ts_to_millis(100), 0);
    }

    #[test]
    fn frame_rate_inverts_to_frame_duration() {
        let fps = Rational::new(30000, 1001);
        let frame = fps.invert();
        assert_eq!(frame.ts_to_millis(1), 33);
        assert!((fps.to_f64() - 29.97).abs() < 0.01);
    }
}

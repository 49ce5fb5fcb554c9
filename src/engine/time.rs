use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// A point in simulated time, in integer picoseconds.
///
/// NoC clock periods are sub-nanosecond (a 1 GHz clock is 1000 ps), so the
/// picosecond is the natural integer unit; all scheduling arithmetic stays
/// exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualTime(pub u64);

/// A span of simulated time, in integer picoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(pub u64);

impl VirtualTime {
    pub const ZERO: VirtualTime = VirtualTime(0);

    pub fn from_picos(picos: u64) -> Self {
        VirtualTime(picos)
    }

    pub fn from_nanos(nanos: u64) -> Self {
        VirtualTime(nanos * 1_000)
    }

    pub fn as_picos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 * 1e-12
    }

    /// Round up to the next multiple of `period` (a clock boundary).
    /// A time already on a boundary is returned unchanged.
    pub fn ceil_to(&self, period: Duration) -> VirtualTime {
        if period.0 == 0 {
            return *self;
        }
        let rem = self.0 % period.0;
        if rem == 0 {
            *self
        } else {
            VirtualTime(self.0 - rem + period.0)
        }
    }
}

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub fn from_picos(picos: u64) -> Self {
        Duration(picos)
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Duration(nanos * 1_000)
    }

    pub fn as_picos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 * 1e-12
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add<Duration> for VirtualTime {
    type Output = VirtualTime;

    fn add(self, rhs: Duration) -> Self::Output {
        VirtualTime(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for VirtualTime {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub<VirtualTime> for VirtualTime {
    type Output = Duration;

    fn sub(self, rhs: VirtualTime) -> Self::Output {
        Duration(self.0 - rhs.0)
    }
}

impl Add<Duration> for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Self::Output {
        Duration(self.0 + rhs.0)
    }
}

impl Mul<u64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: u64) -> Self::Output {
        Duration(self.0 * rhs)
    }
}

impl Div<u64> for Duration {
    type Output = Duration;

    fn div(self, rhs: u64) -> Self::Output {
        Duration(self.0 / rhs)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ps", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let t = VirtualTime::from_nanos(2);
        let d = Duration::from_picos(500);
        assert_eq!(t + d, VirtualTime(2_500));
        assert_eq!((t + d) - t, d);
        assert_eq!(d * 4, Duration(2_000));
        assert_eq!(d / 2, Duration(250));
    }

    #[test]
    fn test_ceil_to_boundary() {
        let clock = Duration(1_000);
        assert_eq!(VirtualTime(0).ceil_to(clock), VirtualTime(0));
        assert_eq!(VirtualTime(1).ceil_to(clock), VirtualTime(1_000));
        assert_eq!(VirtualTime(1_000).ceil_to(clock), VirtualTime(1_000));
        assert_eq!(VirtualTime(1_001).ceil_to(clock), VirtualTime(2_000));
    }

    #[test]
    fn test_seconds_conversion() {
        let t = VirtualTime::from_picos(1_000_000_000_000);
        assert!((t.as_secs_f64() - 1.0).abs() < 1e-12);
    }
}

//! An absolute point in time, as read from HW-CLOCK.

use core::{fmt, ops::{Add, Sub}};

use super::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in time on the node's local clock, unsigned seconds+nanoseconds
/// since whatever epoch HW-CLOCK uses (Unix epoch on the Linux daemon).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Time {
    seconds: u64,
    nanos: u32,
}

impl Time {
    pub const EPOCH: Self = Self { seconds: 0, nanos: 0 };

    pub fn new(seconds: u64, nanos: u32) -> Self {
        Self {
            seconds: seconds + (nanos / NANOS_PER_SEC as u32) as u64,
            nanos: nanos % NANOS_PER_SEC as u32,
        }
    }

    pub const fn seconds(self) -> u64 {
        self.seconds
    }

    pub const fn subsec_nanos(self) -> u32 {
        self.nanos
    }

    fn total_nanos(self) -> i128 {
        self.seconds as i128 * NANOS_PER_SEC as i128 + self.nanos as i128
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl Sub for Time {
    type Output = Duration;
    fn sub(self, rhs: Self) -> Duration {
        Duration::from_nanos((self.total_nanos() - rhs.total_nanos()) as i64)
    }
}

impl Add<Duration> for Time {
    type Output = Time;
    fn add(self, rhs: Duration) -> Time {
        let total = self.total_nanos() + rhs.total_nanos() as i128;
        let seconds = (total.div_euclid(NANOS_PER_SEC as i128)) as u64;
        let nanos = total.rem_euclid(NANOS_PER_SEC as i128) as u32;
        Time { seconds, nanos }
    }
}

impl Sub<Duration> for Time {
    type Output = Time;
    fn sub(self, rhs: Duration) -> Time {
        self + (-rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_self_is_zero() {
        let t = Time::new(1000, 2000);
        assert_eq!(t - t, Duration::ZERO);
    }

    #[test]
    fn add_then_sub_roundtrips() {
        let t = Time::new(1000, 2000);
        let d = Duration::new(5, -3000);
        assert_eq!((t + d) - d, t);
    }
}

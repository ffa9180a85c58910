//! HW-CLOCK (§4.1) on Linux: a `ptp_core::clock::Clock` built on the
//! `clock-steering` crate's `UnixClock`, which wraps `clock_gettime(2)` /
//! `clock_adjtime(2)` against either `CLOCK_REALTIME` or a PTP hardware
//! clock device (`/dev/ptpN`).

use clock_steering::{unix::UnixClock, Clock as SteeringClock, Timestamp};
use ptp_core::time::Time;

/// Disciplines either the system clock or a PHC identified by its
/// `/dev/ptpN` index (§6.4 `hardware_clock`).
#[derive(Debug, Clone)]
pub struct LinuxClock {
    inner: UnixClock,
}

impl LinuxClock {
    /// The system real-time clock.
    pub fn system() -> Self {
        Self {
            inner: UnixClock::CLOCK_REALTIME,
        }
    }

    /// The PTP hardware clock at `/dev/ptp{index}`.
    pub fn phc(index: u32) -> Result<Self, ClockError> {
        let path = format!("/dev/ptp{index}");
        Ok(Self {
            inner: UnixClock::open(path)?,
        })
    }
}

fn time_to_timestamp(time: Time) -> Timestamp {
    Timestamp {
        seconds: time.seconds() as i64,
        nanos: time.subsec_nanos(),
    }
}

fn timestamp_to_time(ts: Timestamp) -> Time {
    Time::new(ts.seconds.max(0) as u64, ts.nanos)
}

impl ptp_core::clock::Clock for LinuxClock {
    type Error = ClockError;

    fn get(&self) -> Result<Time, Self::Error> {
        Ok(timestamp_to_time(self.inner.now()?))
    }

    fn set(&mut self, time: Time) -> Result<(), Self::Error> {
        self.inner.set_time(time_to_timestamp(time))?;
        Ok(())
    }

    fn adjust_freq(&mut self, ppb: i32) -> Result<(), Self::Error> {
        // clock-steering steers in parts-per-million; the servo (§4.4) hands
        // us parts-per-billion already clamped to ADJ_FREQ_MAX.
        self.inner.adjust_frequency(ppb as f64 / 1_000.0)?;
        Ok(())
    }
}

/// Errors talking to the underlying hardware or system clock.
#[derive(Debug)]
pub struct ClockError(clock_steering::unix::Error);

impl std::fmt::Display for ClockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "clock access failed: {:?}", self.0)
    }
}

impl std::error::Error for ClockError {}

impl From<clock_steering::unix::Error> for ClockError {
    fn from(e: clock_steering::unix::Error) -> Self {
        Self(e)
    }
}

//! PTP-SERVO (§4.4): turns offset-from-master and mean-path-delay samples
//! into HW-CLOCK adjustments. Grounded on `ptpd_servo.c`'s PI controller
//! together with `ptpd_servo_filter`'s exponential smoother.

pub mod filter;

use filter::Filter;

use crate::{clock::Clock, time::Duration};

/// Clamp on the frequency adjustment the servo will ever request, in
/// parts-per-billion (§4.4.1). Matches the Linux `adjtimex` ppb range.
pub const ADJ_FREQ_MAX: i32 = 5_120_000;

/// Offsets at or above this magnitude are stepped rather than slewed
/// (§4.4.2) — slewing them would take too long and risks the integral
/// windup of the PI controller.
pub const STEP_THRESHOLD: Duration = Duration::from_nanos(100_000_000);

/// Tunable servo gains (§6.4). `ap`/`ai` are the proportional/integral gain
/// divisors: a *larger* divisor means a *gentler* response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoConfig {
    pub ap: i32,
    pub ai: i32,
    pub s_offset: i32,
    pub s_delay: i32,
    pub no_adjust: bool,
    pub no_reset_clock: bool,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            ap: 2,
            ai: 16,
            s_offset: 8,
            s_delay: 8,
            no_adjust: false,
            no_reset_clock: false,
        }
    }
}

/// What the most recent [`Servo::update_offset`] call did to the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoUpdate {
    Stepped,
    Slewed { freq_adjustment_ppb: i32 },
    Suppressed,
}

/// The offset/delay filters and PI integrator that discipline a [`Clock`]
/// (§4.4.1-4.4.3).
#[derive(Debug, Clone)]
pub struct Servo {
    config: ServoConfig,
    offset_filter: Filter,
    delay_filter: Filter,
    peer_delay_filter: Filter,
    integral: f64,
}

impl Servo {
    pub fn new(config: ServoConfig) -> Self {
        Self {
            offset_filter: Filter::new(config.s_offset),
            delay_filter: Filter::new(config.s_delay),
            peer_delay_filter: Filter::new(config.s_delay),
            integral: 0.0,
            config,
        }
    }

    /// Smooth a new E2E one-way-delay sample (§4.4.1). Returns the filtered
    /// delay to be stored in Current-DS' `meanPathDelay`.
    pub fn update_delay(&mut self, raw: Duration) -> Duration {
        Duration::from_nanos(self.delay_filter.sample(raw.total_nanos()) as i64)
    }

    /// Smooth a new P2P peer mean-path-delay sample (§4.4.1).
    pub fn update_peer_delay(&mut self, raw: Duration) -> Duration {
        Duration::from_nanos(self.peer_delay_filter.sample(raw.total_nanos()) as i64)
    }

    /// Feed a new offset-from-master sample and steer `clock` (§4.4.2,
    /// §4.4.5). `mean_path_delay` is *not* applied here: the caller is
    /// expected to have already folded it (and the correction field) into
    /// `offset` before calling.
    pub fn update_offset<C: Clock>(
        &mut self,
        clock: &mut C,
        offset: Duration,
    ) -> Result<ServoUpdate, C::Error> {
        if self.config.no_adjust {
            return Ok(ServoUpdate::Suppressed);
        }

        if !self.config.no_reset_clock && offset.abs() >= STEP_THRESHOLD {
            let now = clock.get()?;
            clock.set(now - offset)?;
            self.offset_filter.reset();
            self.integral = 0.0;
            return Ok(ServoUpdate::Stepped);
        }

        let smoothed = self.offset_filter.sample(offset.total_nanos());
        self.integral += smoothed;

        let proportional = smoothed / self.config.ap as f64;
        let integral_term = self.integral / self.config.ai as f64;
        let freq_adjustment_ppb = (-(proportional + integral_term) as i32)
            .clamp(-ADJ_FREQ_MAX, ADJ_FREQ_MAX);

        clock.adjust_freq(freq_adjustment_ppb)?;

        Ok(ServoUpdate::Slewed {
            freq_adjustment_ppb,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TestClock {
        time: crate::time::Time,
        last_ppb: Option<i32>,
        steps: u32,
    }

    impl Clock for TestClock {
        type Error = core::convert::Infallible;

        fn get(&self) -> Result<crate::time::Time, Self::Error> {
            Ok(self.time)
        }

        fn set(&mut self, time: crate::time::Time) -> Result<(), Self::Error> {
            self.time = time;
            self.steps += 1;
            Ok(())
        }

        fn adjust_freq(&mut self, ppb: i32) -> Result<(), Self::Error> {
            self.last_ppb = Some(ppb);
            Ok(())
        }
    }

    #[test]
    fn large_offset_steps_rather_than_slews() {
        let mut servo = Servo::new(ServoConfig::default());
        let mut clock = TestClock::default();

        let update = servo
            .update_offset(&mut clock, Duration::from_secs(1))
            .unwrap();

        assert_eq!(update, ServoUpdate::Stepped);
        assert_eq!(clock.steps, 1);
    }

    #[test]
    fn small_offset_slews_with_opposite_sign() {
        let mut servo = Servo::new(ServoConfig::default());
        let mut clock = TestClock::default();

        let update = servo
            .update_offset(&mut clock, Duration::from_nanos(1_000_000))
            .unwrap();

        match update {
            ServoUpdate::Slewed {
                freq_adjustment_ppb,
            } => assert!(freq_adjustment_ppb < 0),
            other => panic!("expected a slew, got {other:?}"),
        }
    }

    #[test]
    fn suppressed_when_no_adjust_is_set() {
        let mut servo = Servo::new(ServoConfig {
            no_adjust: true,
            ..ServoConfig::default()
        });
        let mut clock = TestClock::default();

        let update = servo
            .update_offset(&mut clock, Duration::from_nanos(1_000_000))
            .unwrap();

        assert_eq!(update, ServoUpdate::Suppressed);
        assert_eq!(clock.last_ppb, None);
    }
}

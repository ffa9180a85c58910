//! EXT-REF (§4.7): coarse clock discipline from a GPS receiver's NMEA
//! `$GPZDA` sentence plus its 1PPS output, used to bring the clock close
//! enough for PTP to take over, or to hold position when no PTP master is
//! present. Grounded on `gps_time_init`/`gps_time_sync`/`gps_process_timer`.

pub mod binary;
pub mod nmea;

use ptp_core::{clock::Clock, time::Time};

use binary::{ConfigAction, ConfigState, Frame, FrameParser};
use nmea::{parse_gpzda, NextPpsTime};

/// Matches the PI controller gains `gps_sync_pgain`/`gps_sync_igain` and the
/// frequency clamp `GPS_ADJ_FREQ_MAX`.
const SYNC_PGAIN: i64 = 2;
const SYNC_IGAIN: i64 = 16;
const ADJ_FREQ_MAX: i32 = 5_120_000;

/// Offsets at or beyond this magnitude are stepped rather than disciplined
/// by the PI loop (`gps_time_sync`'s hundred-millisecond threshold).
const STEP_THRESHOLD_NANOS: i64 = 100_000_000;

/// Drives a [`Clock`] from a GPS receiver's `$GPZDA` sentences and 1PPS
/// edges. Owns the receiver's configuration handshake and byte framing;
/// the caller only needs to hand it received bytes and PPS edge timestamps.
pub struct GpsDiscipline {
    parser: FrameParser,
    config: ConfigState,
    last_parsed: Option<NextPpsTime>,
    system_initialized: bool,
    drift: i64,
}

impl Default for GpsDiscipline {
    fn default() -> Self {
        Self {
            parser: FrameParser::new(),
            config: ConfigState::default(),
            last_parsed: None,
            system_initialized: false,
            drift: 0,
        }
    }
}

impl GpsDiscipline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Called once per configuration timer tick (`gps_process_timer`).
    /// Returns a message to write to the device, if the handshake has a
    /// pending step.
    pub fn on_config_tick(&mut self) -> Option<Vec<u8>> {
        match self.config.on_tick() {
            ConfigAction::Send(message) => Some(message),
            ConfigAction::Wait | ConfigAction::Done => None,
        }
    }

    /// Feed a byte read from the device's serial line. Updates the
    /// configuration handshake and records parsed `$GPZDA` times
    /// (`gps_process_data`/`gps_process_nmea_sentence`).
    pub fn on_byte(&mut self, byte: u8) {
        let Some(frame) = self.parser.push(byte) else {
            return;
        };

        match &frame {
            Frame::Nmea(sentence) => {
                if let Some(parsed) = parse_gpzda(sentence) {
                    self.last_parsed = Some(parsed);
                }
            }
            Frame::Binary(_) => self.config.on_frame(&frame),
        }
    }

    /// Coarse initialization from the most recent parsed time, run while no
    /// PPS edge has arrived yet (`gps_time_init`). `clock_read_at_start` is
    /// the clock's reading taken when receiver data first started flowing;
    /// `now` is the clock's current reading.
    pub fn coarse_init<C: Clock>(
        &mut self,
        clock: &mut C,
        clock_read_at_start: Time,
        now: Time,
    ) -> Result<(), C::Error> {
        if self.system_initialized {
            return Ok(());
        }

        let Some(NextPpsTime(parsed)) = self.last_parsed else {
            return Ok(());
        };

        let delta = now - clock_read_at_start;
        if delta.total_nanos() >= 1_000_000_000 {
            // Too much time has passed since the parse to trust it; try
            // again on the next sentence.
            return Ok(());
        }

        clock.set(parsed + delta)?;
        self.system_initialized = true;
        Ok(())
    }

    /// Discipline the clock against a 1PPS rising edge timestamped at
    /// `clock_at_pps` by HW-CLOCK (`gps_time_sync`). The edge is understood
    /// to coincide with the most recently parsed `$GPZDA` time.
    pub fn on_pps_edge<C: Clock>(
        &mut self,
        clock: &mut C,
        clock_at_pps: Time,
    ) -> Result<(), C::Error> {
        let Some(NextPpsTime(pps_time)) = self.last_parsed.take() else {
            return Ok(());
        };

        let offset = pps_time - clock_at_pps;
        let offset_nanos = offset.total_nanos();

        if offset.seconds() != 0 || offset_nanos.abs() > STEP_THRESHOLD_NANOS {
            let now = clock.get()?;
            let delta = now - clock_at_pps;
            clock.set(pps_time + delta)?;
            self.system_initialized = true;
            return Ok(());
        }

        self.drift = (self.drift + offset_nanos / SYNC_IGAIN).clamp(-ADJ_FREQ_MAX as i64, ADJ_FREQ_MAX as i64);
        let adjust = (offset_nanos / SYNC_PGAIN + self.drift).clamp(-(ADJ_FREQ_MAX as i64), ADJ_FREQ_MAX as i64);
        clock.adjust_freq(adjust as i32)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptp_core::time::Duration;

    #[derive(Default)]
    struct TestClock {
        time: Time,
        last_ppb: Option<i32>,
        steps: u32,
    }

    impl Clock for TestClock {
        type Error = core::convert::Infallible;

        fn get(&self) -> Result<Time, Self::Error> {
            Ok(self.time)
        }

        fn set(&mut self, time: Time) -> Result<(), Self::Error> {
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
    fn small_pps_offset_disciplines_via_pi_loop() {
        let mut discipline = GpsDiscipline::new();
        discipline.last_parsed = Some(NextPpsTime(Time::new(1000, 0)));

        let mut clock = TestClock {
            time: Time::new(999, 990_000_000),
            ..Default::default()
        };
        let clock_at_pps = clock.time;

        discipline.on_pps_edge(&mut clock, clock_at_pps).unwrap();

        assert_eq!(clock.steps, 0);
        assert!(clock.last_ppb.is_some());
    }

    #[test]
    fn large_pps_offset_steps_the_clock() {
        let mut discipline = GpsDiscipline::new();
        discipline.last_parsed = Some(NextPpsTime(Time::new(1005, 0)));

        let mut clock = TestClock {
            time: Time::new(1000, 0),
            ..Default::default()
        };
        let clock_at_pps = clock.time;

        discipline.on_pps_edge(&mut clock, clock_at_pps).unwrap();

        assert_eq!(clock.steps, 1);
        assert_eq!(clock.time, Time::new(1005, 0));
    }

    #[test]
    fn coarse_init_sets_clock_once() {
        let mut discipline = GpsDiscipline::new();
        discipline.last_parsed = Some(NextPpsTime(Time::new(500, 0)));

        let mut clock = TestClock::default();
        let start = Time::new(0, 0);
        let now = start + Duration::from_nanos(10_000_000);

        discipline.coarse_init(&mut clock, start, now).unwrap();
        assert_eq!(clock.steps, 1);
        assert!(discipline.system_initialized);
    }
}

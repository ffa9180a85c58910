//! HW-CLOCK (§4.1): the node's local oscillator, steerable in both phase
//! (step) and frequency (ppb).

use crate::time::Time;

/// The clock the servo disciplines. A caller of the engine (the daemon on
/// Linux, a test fixture elsewhere) provides the implementation; this crate
/// only ever asks it for the current time or to adjust it (§4.1, §4.4.5).
pub trait Clock {
    type Error: core::fmt::Debug;

    /// The current reading of the clock.
    fn get(&self) -> Result<Time, Self::Error>;

    /// Step the clock directly to `time`, discarding whatever offset existed
    /// before. Used for corrections too large to slew (§4.4.2).
    fn set(&mut self, time: Time) -> Result<(), Self::Error>;

    /// Steer the clock's rate by `ppb` parts-per-billion relative to its
    /// nominal frequency. Called on every servo update while slewing
    /// (§4.4.1, §4.4.5); `ppb` is already clamped to `ADJ_FREQ_MAX` by the
    /// servo.
    fn adjust_freq(&mut self, ppb: i32) -> Result<(), Self::Error>;
}

#[cfg(feature = "std")]
impl<T: Clock + ?Sized> Clock for std::boxed::Box<T> {
    type Error = T::Error;

    fn get(&self) -> Result<Time, Self::Error> {
        self.as_ref().get()
    }

    fn set(&mut self, time: Time) -> Result<(), Self::Error> {
        self.as_mut().set(time)
    }

    fn adjust_freq(&mut self, ppb: i32) -> Result<(), Self::Error> {
        self.as_mut().adjust_freq(ppb)
    }
}

use std::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// The single open-drain wire the controller talks over.
///
/// The line is only ever pulled low by the host; releasing it lets the
/// pull-up (or the controller) decide the level.
pub trait DataLine {
    /// Actively pull the line low.
    fn set_line_low(&mut self);
    /// Release the line so it floats high.
    fn set_line_high(&mut self);
    /// Sample the current line level, `true` when high.
    fn read_line(&mut self) -> bool;
    /// Busy-wait for the given number of microseconds.
    fn delay_micros(&mut self, us: u32);
    /// Busy-wait for the given number of nanoseconds.
    fn delay_nanos(&mut self, ns: u32);
}

/// [`DataLine`] on top of an `embedded-hal` open-drain pin and a delay source.
///
/// Setting an open-drain output high releases the line, which is exactly
/// what the protocol needs, so the pin is never reconfigured.
pub struct HalLine<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> HalLine<P, D>
where
    P: ErrorType<Error = Infallible> + InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(mut pin: P, delay: D) -> Self {
        unwrap_infallible(pin.set_high());
        Self { pin, delay }
    }

    pub fn free(self) -> (P, D) {
        (self.pin, self.delay)
    }
}

impl<P, D> DataLine for HalLine<P, D>
where
    P: ErrorType<Error = Infallible> + InputPin + OutputPin,
    D: DelayNs,
{
    fn set_line_low(&mut self) {
        unwrap_infallible(self.pin.set_low());
    }

    fn set_line_high(&mut self) {
        unwrap_infallible(self.pin.set_high());
    }

    fn read_line(&mut self) -> bool {
        unwrap_infallible(self.pin.is_high())
    }

    fn delay_micros(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn delay_nanos(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }
}

fn unwrap_infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

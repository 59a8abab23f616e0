use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::n64_state::{ButtonEvent, N64State, StickEvent, RAW_SLOTS, REPORT_BITS};
use crate::data_line::DataLine;

/// Command byte asking the controller for its button and stick status.
pub const POLL_COMMAND: u8 = 0x01;

/// Pulse widths and sampling budget for the single-wire protocol.
///
/// A bit cell is `short_pulse_us + long_pulse_us` wide. A one is a short low
/// pulse followed by a long high period, a zero is the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub short_pulse_us: u32,
    pub long_pulse_us: u32,
    /// Delay between seeing the falling edge of a data cell and sampling it.
    pub sample_delay_us: u32,
    /// Pause between line reads while waiting for an edge.
    pub polling_delay_ns: u32,
    /// How long to wait for an edge before giving up on the reply.
    pub edge_timeout_us: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            short_pulse_us: 1,
            long_pulse_us: 3,
            sample_delay_us: 2,
            polling_delay_ns: 25,
            edge_timeout_us: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timing: {0}")]
pub struct InvalidTiming(pub String);

impl Timing {
    /// Width of one bit cell in nanoseconds.
    pub fn cell_ns(&self) -> u64 {
        (u64::from(self.short_pulse_us) + u64::from(self.long_pulse_us)) * 1_000
    }

    pub fn validate(&self) -> Result<(), InvalidTiming> {
        if self.short_pulse_us == 0 || self.short_pulse_us >= self.long_pulse_us {
            return Err(InvalidTiming(format!(
                "short pulse ({}us) must be non-zero and shorter than the long pulse ({}us)",
                self.short_pulse_us, self.long_pulse_us
            )));
        }
        if self.sample_delay_us <= self.short_pulse_us
            || self.sample_delay_us >= self.long_pulse_us
        {
            return Err(InvalidTiming(format!(
                "sample delay ({}us) must fall between the short and long pulse",
                self.sample_delay_us
            )));
        }
        if self.polling_delay_ns == 0
            || u64::from(self.polling_delay_ns) >= u64::from(self.short_pulse_us) * 1_000
        {
            return Err(InvalidTiming(format!(
                "polling delay ({}ns) must be non-zero and shorter than the short pulse",
                self.polling_delay_ns
            )));
        }
        if u64::from(self.edge_timeout_us) * 1_000 < self.cell_ns() {
            return Err(InvalidTiming(format!(
                "edge timeout ({}us) must cover at least one bit cell",
                self.edge_timeout_us
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PollError {
    /// No edge showed up within `edge_timeout_us` while inside bit cell `bit`.
    #[error("controller did not respond in time (bit {bit})")]
    Timeout { bit: usize },
    /// The frame was captured but the stop cell was still low `long_pulse_us`
    /// after its falling edge. Any release before that counts as a stop bit.
    #[error("controller response failed frame validation")]
    ChecksumMismatch,
}

type ButtonCallback = Box<dyn FnMut(&N64State, ButtonEvent) + Send + 'static>;
type StickCallback = Box<dyn FnMut(&N64State, StickEvent) + Send + 'static>;

/// Bit-banged link to one N64 controller on one data line.
///
/// Each [`poll`](Self::poll) sends the status command, captures the reply
/// into a raw per-bit buffer, and decodes it into the last known state.
/// Queries always answer from the last good poll.
pub struct ControllerLink<L: DataLine> {
    line: L,
    timing: Timing,
    raw: [u8; RAW_SLOTS],
    state: N64State,
    initialized: bool,
    button_callback: Option<ButtonCallback>,
    stick_callback: Option<StickCallback>,
}

impl<L: DataLine> ControllerLink<L> {
    pub fn new(line: L) -> Self {
        Self::with_timing(line, Timing::default())
    }

    pub fn with_timing(mut line: L, timing: Timing) -> Self {
        line.set_line_high();
        Self {
            line,
            timing,
            raw: [0; RAW_SLOTS],
            state: N64State::default(),
            initialized: false,
            button_callback: None,
            stick_callback: None,
        }
    }

    /// Run one request / capture / decode cycle.
    ///
    /// On error the previous state is kept and the raw buffer holds whatever
    /// was captured before the failure, with the remaining slots zeroed.
    pub fn poll(&mut self) -> Result<N64State, PollError> {
        self.send_command(POLL_COMMAND);

        if let Err(err) = self.capture() {
            warn!("n64 poll failed: {err}");
            return Err(err);
        }
        trace!("n64 raw capture: {:?}", self.raw);

        if self.raw[REPORT_BITS] != 1 {
            warn!("n64 poll failed: missing stop bit");
            return Err(PollError::ChecksumMismatch);
        }

        let state = N64State::from_raw(&self.raw);
        debug!("n64 state: {:?}", state);

        if self.initialized {
            self.emit_changes(&state);
        }
        self.initialized = true;
        self.state = state;
        Ok(state)
    }

    /// Install a callback to be notified about button state transitions.
    pub fn set_button_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&N64State, ButtonEvent) + Send + 'static,
    {
        self.button_callback = Some(Box::new(callback));
    }

    pub fn set_stick_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&N64State, StickEvent) + Send + 'static,
    {
        self.stick_callback = Some(Box::new(callback));
    }

    pub fn clear_callbacks(&mut self) {
        self.button_callback = None;
        self.stick_callback = None;
    }

    pub fn state(&self) -> &N64State {
        &self.state
    }

    /// Raw slots of the most recent capture, successful or not.
    pub fn raw(&self) -> &[u8; RAW_SLOTS] {
        &self.raw
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    pub fn into_line(self) -> L {
        self.line
    }

    pub fn start_down(&self) -> bool {
        self.state.start_down()
    }

    pub fn z_down(&self) -> bool {
        self.state.z_down()
    }

    pub fn b_down(&self) -> bool {
        self.state.b_down()
    }

    pub fn a_down(&self) -> bool {
        self.state.a_down()
    }

    pub fn l_bumper_down(&self) -> bool {
        self.state.l_bumper_down()
    }

    pub fn r_bumper_down(&self) -> bool {
        self.state.r_bumper_down()
    }

    pub fn c_up_down(&self) -> bool {
        self.state.c_up_down()
    }

    pub fn c_down_down(&self) -> bool {
        self.state.c_down_down()
    }

    pub fn c_left_down(&self) -> bool {
        self.state.c_left_down()
    }

    pub fn c_right_down(&self) -> bool {
        self.state.c_right_down()
    }

    pub fn d_up_down(&self) -> bool {
        self.state.d_up_down()
    }

    pub fn d_down_down(&self) -> bool {
        self.state.d_down_down()
    }

    pub fn d_left_down(&self) -> bool {
        self.state.d_left_down()
    }

    pub fn d_right_down(&self) -> bool {
        self.state.d_right_down()
    }

    pub fn stick_x(&self) -> i8 {
        self.state.stick_x()
    }

    pub fn stick_y(&self) -> i8 {
        self.state.stick_y()
    }

    fn send_command(&mut self, command: u8) {
        let Timing {
            short_pulse_us,
            long_pulse_us,
            ..
        } = self.timing;

        for shift in (0..8).rev() {
            let (low, high) = if (command >> shift) & 1 == 1 {
                (short_pulse_us, long_pulse_us)
            } else {
                (long_pulse_us, short_pulse_us)
            };
            self.line.set_line_low();
            self.line.delay_micros(low);
            self.line.set_line_high();
            self.line.delay_micros(high);
        }

        // Stop bit, then hand the line over to the controller.
        self.line.set_line_low();
        self.line.delay_micros(short_pulse_us);
        self.line.set_line_high();
    }

    fn capture(&mut self) -> Result<(), PollError> {
        self.raw = [0; RAW_SLOTS];

        for bit in 0..RAW_SLOTS {
            if !self.wait_for_level(false) {
                return Err(PollError::Timeout { bit });
            }
            // The stop cell is only checked for having been released.
            let sample_us = if bit == REPORT_BITS {
                self.timing.long_pulse_us
            } else {
                self.timing.sample_delay_us
            };
            self.line.delay_micros(sample_us);
            self.raw[bit] = u8::from(self.line.read_line());
            if !self.wait_for_level(true) {
                return Err(PollError::Timeout { bit });
            }
        }
        Ok(())
    }

    /// Read the line until it shows `high`, pausing `polling_delay_ns`
    /// between reads, for at least `edge_timeout_us`.
    fn wait_for_level(&mut self, high: bool) -> bool {
        let step = self.timing.polling_delay_ns.max(1);
        let budget_ns = u64::from(self.timing.edge_timeout_us) * 1_000;
        let mut waited_ns = 0u64;

        loop {
            if self.line.read_line() == high {
                return true;
            }
            if waited_ns >= budget_ns {
                return false;
            }
            self.line.delay_nanos(step);
            waited_ns += u64::from(step);
        }
    }

    fn emit_changes(&mut self, state: &N64State) {
        if let Some(cb) = self.button_callback.as_mut() {
            for event in state.button_changes(&self.state) {
                cb(state, event);
            }
        }
        if let Some(cb) = self.stick_callback.as_mut() {
            for event in state.stick_changes(&self.state) {
                cb(state, event);
            }
        }
    }
}

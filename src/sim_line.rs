use std::collections::VecDeque;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::data_line::DataLine;
use crate::n64_controller::{N64State, Timing, POLL_COMMAND};

const COMMAND_BITS: usize = 8;

/// How the simulated controller answers one status request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    /// A well-formed report followed by a stop bit.
    Report { state: N64State },
    /// No answer at all, as with an unplugged controller.
    Silent,
    /// Only the first `bits` report bits, then the line stays idle.
    Truncated { state: N64State, bits: usize },
    /// A full report whose stop cell keeps the line low for two cells.
    BadStop { state: N64State },
    /// The controller pulls the line low and never lets go.
    HeldLow,
}

/// One transmitted cell: low for `low_ns`, then high until `len_ns`.
#[derive(Debug, Clone, Copy)]
struct Cell {
    low_ns: u64,
    len_ns: u64,
}

#[derive(Debug, Clone)]
struct Waveform {
    start_ns: u64,
    cells: Vec<Cell>,
    held_low: bool,
}

/// A [`DataLine`] with a controller attached, running on a virtual clock.
///
/// Every read costs `read_cost_ns` and delays advance the clock, so the
/// protocol code sees the same edges it would see on real hardware.
#[derive(Debug, Clone)]
pub struct SimulatedLine {
    timing: Timing,
    now_ns: u64,
    read_cost_ns: u64,
    reply_delay_ns: u64,
    host_low: bool,
    low_since_ns: u64,
    pulses: Vec<bool>,
    replies: VecDeque<Reply>,
    waveform: Option<Waveform>,
    last_command: Option<u8>,
    polls_seen: usize,
}

impl SimulatedLine {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            now_ns: 0,
            read_cost_ns: 250,
            reply_delay_ns: 2_000,
            host_low: false,
            low_since_ns: 0,
            pulses: Vec::with_capacity(COMMAND_BITS + 1),
            replies: VecDeque::new(),
            waveform: None,
            last_command: None,
            polls_seen: 0,
        }
    }

    pub fn with_read_cost_ns(mut self, read_cost_ns: u64) -> Self {
        self.read_cost_ns = read_cost_ns;
        self
    }

    pub fn with_reply_delay_us(mut self, reply_delay_us: u32) -> Self {
        self.reply_delay_ns = u64::from(reply_delay_us) * 1_000;
        self
    }

    /// Queue the answer to the next status request. An empty queue means silence.
    pub fn push_reply(&mut self, reply: Reply) {
        self.replies.push_back(reply);
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }

    /// The last complete command byte the host sent.
    pub fn last_command(&self) -> Option<u8> {
        self.last_command
    }

    pub fn polls_seen(&self) -> usize {
        self.polls_seen
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    fn cell_ns(&self) -> u64 {
        self.timing.cell_ns().max(1)
    }

    fn data_cell(&self, one: bool) -> Cell {
        let low_us = if one {
            self.timing.short_pulse_us
        } else {
            self.timing.long_pulse_us
        };
        Cell {
            low_ns: u64::from(low_us) * 1_000,
            len_ns: self.cell_ns(),
        }
    }

    fn finish_pulse(&mut self) {
        let width = self.now_ns.saturating_sub(self.low_since_ns);
        self.pulses.push(width.saturating_mul(2) < self.cell_ns());

        if self.pulses.len() < COMMAND_BITS + 1 {
            return;
        }

        let command = self.pulses[..COMMAND_BITS]
            .iter()
            .fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit));
        let stop_ok = self.pulses[COMMAND_BITS];
        self.pulses.clear();
        trace!("sim: host sent command {command:#04x} (stop ok: {stop_ok})");

        self.last_command = Some(command);
        if command == POLL_COMMAND && stop_ok {
            self.polls_seen += 1;
            let reply = self.replies.pop_front().unwrap_or(Reply::Silent);
            self.waveform = self.waveform_for(reply);
        }
    }

    fn waveform_for(&self, reply: Reply) -> Option<Waveform> {
        let start_ns = self.now_ns.saturating_add(self.reply_delay_ns);
        let report = |state: &N64State| -> Vec<Cell> {
            state.to_bits().iter().map(|bit| self.data_cell(*bit == 1)).collect()
        };
        // Controllers hold their stop bit low for about half a cell.
        let stop = Cell {
            low_ns: self.cell_ns() / 2,
            len_ns: self.cell_ns(),
        };

        let (cells, held_low) = match reply {
            Reply::Silent => return None,
            Reply::HeldLow => (Vec::new(), true),
            Reply::Report { state } => {
                let mut cells = report(&state);
                cells.push(stop);
                (cells, false)
            }
            Reply::Truncated { state, bits } => {
                let mut cells = report(&state);
                cells.truncate(bits);
                (cells, false)
            }
            Reply::BadStop { state } => {
                let mut cells = report(&state);
                cells.push(Cell {
                    low_ns: self.cell_ns() * 2,
                    len_ns: self.cell_ns() * 2,
                });
                (cells, false)
            }
        };

        Some(Waveform {
            start_ns,
            cells,
            held_low,
        })
    }

    fn level(&self) -> bool {
        if self.host_low {
            return false;
        }
        let Some(waveform) = &self.waveform else {
            return true;
        };
        if self.now_ns < waveform.start_ns {
            return true;
        }
        if waveform.held_low {
            return false;
        }

        let mut offset = self.now_ns - waveform.start_ns;
        for cell in &waveform.cells {
            if offset < cell.len_ns {
                return offset >= cell.low_ns;
            }
            offset -= cell.len_ns;
        }
        true
    }
}

impl DataLine for SimulatedLine {
    fn set_line_low(&mut self) {
        if !self.host_low {
            self.host_low = true;
            self.low_since_ns = self.now_ns;
            self.waveform = None;
        }
    }

    fn set_line_high(&mut self) {
        if self.host_low {
            self.host_low = false;
            self.finish_pulse();
        }
    }

    fn read_line(&mut self) -> bool {
        let level = self.level();
        self.now_ns = self.now_ns.saturating_add(self.read_cost_ns);
        level
    }

    fn delay_micros(&mut self, us: u32) {
        self.now_ns = self.now_ns.saturating_add(u64::from(us) * 1_000);
    }

    fn delay_nanos(&mut self, ns: u32) {
        self.now_ns = self.now_ns.saturating_add(u64::from(ns));
    }
}

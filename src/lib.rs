//! Bit-banged driver for a Nintendo 64 controller on a single open-drain line.
//!
//! [`ControllerLink`] sends the status request, captures the 32-bit reply
//! and exposes the decoded buttons and stick through [`N64State`]. The
//! protocol only talks to a [`DataLine`], so it runs against real pins
//! through [`HalLine`] or against [`SimulatedLine`] on the host.

pub mod data_line;
pub mod link_config;
pub mod n64_controller;
pub mod sim_line;

pub use data_line::{DataLine, HalLine};
pub use link_config::{ConfigError, LinkConfig, SimulationConfig};
pub use n64_controller::{
    ButtonEvent, ButtonEventKind, ButtonId, ControllerLink, InvalidTiming, N64State, PollError,
    StickAxis, StickEvent, Timing,
};
pub use sim_line::{Reply, SimulatedLine};

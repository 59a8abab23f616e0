mod controller_link;
mod n64_state;

pub use controller_link::{ControllerLink, InvalidTiming, PollError, Timing, POLL_COMMAND};
pub use n64_state::{
    ButtonByte, ButtonEvent, ButtonEventKind, ButtonId, N64State, StickAxis, StickEvent,
    RAW_SLOTS, REPORT_BITS,
};

use serde::{Deserialize, Serialize};

/// Number of data bits in a status report.
pub const REPORT_BITS: usize = 32;
/// Raw capture slots: the report bits plus the trailing stop bit.
pub const RAW_SLOTS: usize = REPORT_BITS + 1;

/// Last known controller state, as reported by the status command.
///
/// `data1` and `data2` carry the button flags, the stick axes are signed
/// with the rest position near zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct N64State {
    pub data1: u8,
    pub data2: u8,
    pub stick_x: i8,
    pub stick_y: i8,
}

/// Which of the two button bytes a flag lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonByte {
    Data1,
    Data2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    A,
    B,
    Z,
    Start,
    DUp,
    DDown,
    DLeft,
    DRight,
    L,
    R,
    CUp,
    CDown,
    CLeft,
    CRight,
}

impl ButtonId {
    pub const ALL: [ButtonId; 14] = [
        ButtonId::A,
        ButtonId::B,
        ButtonId::Z,
        ButtonId::Start,
        ButtonId::DUp,
        ButtonId::DDown,
        ButtonId::DLeft,
        ButtonId::DRight,
        ButtonId::L,
        ButtonId::R,
        ButtonId::CUp,
        ButtonId::CDown,
        ButtonId::CLeft,
        ButtonId::CRight,
    ];

    /// Location of the button flag inside the report. Fixed by the controller.
    pub const fn mask(self) -> (ButtonByte, u8) {
        match self {
            ButtonId::A => (ButtonByte::Data1, 0x80),
            ButtonId::B => (ButtonByte::Data1, 0x40),
            ButtonId::Z => (ButtonByte::Data1, 0x20),
            ButtonId::Start => (ButtonByte::Data1, 0x10),
            ButtonId::DUp => (ButtonByte::Data1, 0x08),
            ButtonId::DDown => (ButtonByte::Data1, 0x04),
            ButtonId::DLeft => (ButtonByte::Data1, 0x02),
            ButtonId::DRight => (ButtonByte::Data1, 0x01),
            ButtonId::L => (ButtonByte::Data2, 0x20),
            ButtonId::R => (ButtonByte::Data2, 0x10),
            ButtonId::CUp => (ButtonByte::Data2, 0x08),
            ButtonId::CDown => (ButtonByte::Data2, 0x04),
            ButtonId::CLeft => (ButtonByte::Data2, 0x02),
            ButtonId::CRight => (ButtonByte::Data2, 0x01),
        }
    }
}

/// Classification for button state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEventKind {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub id: ButtonId,
    pub kind: ButtonEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickAxis {
    X,
    Y,
}

/// Information about an analog stick movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickEvent {
    pub axis: StickAxis,
    pub value: i8,
    pub previous: i8,
}

impl N64State {
    /// Decode a capture buffer, ignoring the stop slot.
    pub fn from_raw(raw: &[u8; RAW_SLOTS]) -> Self {
        let mut bits = [0u8; REPORT_BITS];
        bits.copy_from_slice(&raw[..REPORT_BITS]);
        Self::from_bits(&bits)
    }

    /// Pack 32 bit slots (transmission order, MSB first) into the four report fields.
    ///
    /// Any non-zero slot counts as a one. No validation is done here.
    pub fn from_bits(bits: &[u8; REPORT_BITS]) -> Self {
        let byte = |index: usize| -> u8 {
            bits[index * 8..index * 8 + 8]
                .iter()
                .fold(0u8, |acc, &slot| (acc << 1) | u8::from(slot != 0))
        };

        Self {
            data1: byte(0),
            data2: byte(1),
            stick_x: byte(2) as i8,
            stick_y: byte(3) as i8,
        }
    }

    /// Expand the state into the bit slots a controller would transmit.
    pub fn to_bits(&self) -> [u8; REPORT_BITS] {
        let bytes = [
            self.data1,
            self.data2,
            self.stick_x as u8,
            self.stick_y as u8,
        ];
        let mut bits = [0u8; REPORT_BITS];
        for (i, slot) in bits.iter_mut().enumerate() {
            *slot = (bytes[i / 8] >> (7 - i % 8)) & 1;
        }
        bits
    }

    pub fn is_down(&self, id: ButtonId) -> bool {
        let (byte, mask) = id.mask();
        let value = match byte {
            ButtonByte::Data1 => self.data1,
            ButtonByte::Data2 => self.data2,
        };
        value & mask != 0
    }

    pub fn start_down(&self) -> bool {
        self.is_down(ButtonId::Start)
    }

    pub fn z_down(&self) -> bool {
        self.is_down(ButtonId::Z)
    }

    pub fn b_down(&self) -> bool {
        self.is_down(ButtonId::B)
    }

    pub fn a_down(&self) -> bool {
        self.is_down(ButtonId::A)
    }

    pub fn l_bumper_down(&self) -> bool {
        self.is_down(ButtonId::L)
    }

    pub fn r_bumper_down(&self) -> bool {
        self.is_down(ButtonId::R)
    }

    pub fn c_up_down(&self) -> bool {
        self.is_down(ButtonId::CUp)
    }

    pub fn c_down_down(&self) -> bool {
        self.is_down(ButtonId::CDown)
    }

    pub fn c_left_down(&self) -> bool {
        self.is_down(ButtonId::CLeft)
    }

    pub fn c_right_down(&self) -> bool {
        self.is_down(ButtonId::CRight)
    }

    pub fn d_up_down(&self) -> bool {
        self.is_down(ButtonId::DUp)
    }

    pub fn d_down_down(&self) -> bool {
        self.is_down(ButtonId::DDown)
    }

    pub fn d_left_down(&self) -> bool {
        self.is_down(ButtonId::DLeft)
    }

    pub fn d_right_down(&self) -> bool {
        self.is_down(ButtonId::DRight)
    }

    pub fn stick_x(&self) -> i8 {
        self.stick_x
    }

    pub fn stick_y(&self) -> i8 {
        self.stick_y
    }

    /// Buttons whose state differs from `previous`, in `ButtonId::ALL` order.
    pub fn button_changes<'a>(
        &'a self,
        previous: &'a N64State,
    ) -> impl Iterator<Item = ButtonEvent> + 'a {
        ButtonId::ALL.into_iter().filter_map(move |id| {
            let new = self.is_down(id);
            if new == previous.is_down(id) {
                return None;
            }
            let kind = if new {
                ButtonEventKind::Pressed
            } else {
                ButtonEventKind::Released
            };
            Some(ButtonEvent { id, kind })
        })
    }

    pub fn stick_changes(&self, previous: &N64State) -> impl Iterator<Item = StickEvent> {
        let axes = [
            (StickAxis::X, self.stick_x, previous.stick_x),
            (StickAxis::Y, self.stick_y, previous.stick_y),
        ];
        axes.into_iter()
            .filter(|(_, value, previous)| value != previous)
            .map(|(axis, value, previous)| StickEvent {
                axis,
                value,
                previous,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_from_str(pattern: &str) -> [u8; REPORT_BITS] {
        let mut bits = [0u8; REPORT_BITS];
        for (slot, ch) in bits.iter_mut().zip(pattern.chars().filter(|c| !c.is_whitespace())) {
            *slot = u8::from(ch == '1');
        }
        bits
    }

    fn predicates(state: &N64State) -> [bool; 14] {
        [
            state.start_down(),
            state.z_down(),
            state.b_down(),
            state.a_down(),
            state.l_bumper_down(),
            state.r_bumper_down(),
            state.c_up_down(),
            state.c_down_down(),
            state.c_left_down(),
            state.c_right_down(),
            state.d_up_down(),
            state.d_down_down(),
            state.d_left_down(),
            state.d_right_down(),
        ]
    }

    #[test]
    fn first_slot_is_msb_of_data1() {
        let bits = bits_from_str("10000000 00000000 00000000 00000000");
        let state = N64State::from_bits(&bits);
        assert_eq!(state.data1, 0x80);
        assert_eq!(state.data2, 0);
    }

    #[test]
    fn every_slot_lands_in_its_field_and_mask() {
        for slot in 0..REPORT_BITS {
            let mut bits = [0u8; REPORT_BITS];
            bits[slot] = 1;
            let state = N64State::from_bits(&bits);

            let mask = 0x80u8 >> (slot % 8);
            let expected = [
                if slot / 8 == 0 { mask } else { 0 },
                if slot / 8 == 1 { mask } else { 0 },
                if slot / 8 == 2 { mask } else { 0 },
                if slot / 8 == 3 { mask } else { 0 },
            ];
            let decoded = [
                state.data1,
                state.data2,
                state.stick_x as u8,
                state.stick_y as u8,
            ];
            assert_eq!(decoded, expected, "slot {slot}");
            assert_eq!(state.to_bits(), bits, "slot {slot}");
        }
    }

    #[test]
    fn non_zero_slots_count_as_ones() {
        let mut bits = [0u8; REPORT_BITS];
        bits[0] = 7;
        bits[15] = 0xFF;
        let state = N64State::from_bits(&bits);
        assert_eq!(state.data1, 0x80);
        assert_eq!(state.data2, 0x01);
    }

    #[test]
    fn start_and_a_from_first_byte() {
        let bits = bits_from_str("10010000 00000000 00000000 00000000");
        let state = N64State::from_bits(&bits);

        assert_eq!(state.data1, 0x90);
        assert!(state.start_down());
        assert!(state.a_down());
        assert!(!state.z_down());
        assert!(!state.b_down());
        assert!(!state.d_up_down());
        assert!(!state.d_down_down());
        assert!(!state.d_left_down());
        assert!(!state.d_right_down());
    }

    #[test]
    fn all_zero_capture_is_idle() {
        let state = N64State::from_raw(&[0u8; RAW_SLOTS]);
        assert_eq!(predicates(&state), [false; 14]);
        assert_eq!(state.stick_x(), 0);
        assert_eq!(state.stick_y(), 0);
    }

    #[test]
    fn stop_slot_does_not_leak_into_report() {
        let mut raw = [0u8; RAW_SLOTS];
        raw[REPORT_BITS] = 1;
        assert_eq!(N64State::from_raw(&raw), N64State::default());
    }

    #[test]
    fn stick_axes_are_signed() {
        let bits = bits_from_str("00000000 00000000 11111111 10000000");
        let state = N64State::from_bits(&bits);
        assert_eq!(state.stick_x(), -1);
        assert_eq!(state.stick_y(), -128);
    }

    #[test]
    fn encode_then_decode_recovers_state() {
        let states = [
            (0x00, 0x00, 0, 0),
            (0xFF, 0xFF, -1, -1),
            (0xA5, 0x3C, -72, 81),
            (0x90, 0x20, 127, -128),
            (0x01, 0x80, -128, 127),
            (0x5A, 0x0F, 1, -2),
        ];

        for (data1, data2, stick_x, stick_y) in states {
            let state = N64State {
                data1,
                data2,
                stick_x,
                stick_y,
            };
            assert_eq!(N64State::from_bits(&state.to_bits()), state);

            let mut raw = [0u8; RAW_SLOTS];
            raw[..REPORT_BITS].copy_from_slice(&state.to_bits());
            raw[REPORT_BITS] = 1;
            assert_eq!(N64State::from_raw(&raw), state);
        }
    }

    #[test]
    fn predicates_match_bit_map() {
        let cases = [
            (ButtonId::Start, 0x10, 0x00),
            (ButtonId::Z, 0x20, 0x00),
            (ButtonId::B, 0x40, 0x00),
            (ButtonId::A, 0x80, 0x00),
            (ButtonId::DUp, 0x08, 0x00),
            (ButtonId::DDown, 0x04, 0x00),
            (ButtonId::DRight, 0x01, 0x00),
            (ButtonId::DLeft, 0x02, 0x00),
            (ButtonId::L, 0x00, 0x20),
            (ButtonId::R, 0x00, 0x10),
            (ButtonId::CUp, 0x00, 0x08),
            (ButtonId::CDown, 0x00, 0x04),
            (ButtonId::CRight, 0x00, 0x01),
            (ButtonId::CLeft, 0x00, 0x02),
        ];

        for (id, data1, data2) in cases {
            let state = N64State {
                data1,
                data2,
                ..N64State::default()
            };
            for other in ButtonId::ALL {
                assert_eq!(state.is_down(other), other == id, "{other:?} with {id:?}");
            }
            assert_eq!(predicates(&state).iter().filter(|down| **down).count(), 1);
        }
    }

    #[test]
    fn queries_do_not_mutate() {
        let state = N64State {
            data1: 0x5A,
            data2: 0x2D,
            stick_x: 12,
            stick_y: -40,
        };
        let first = (predicates(&state), state.stick_x(), state.stick_y());
        let second = (predicates(&state), state.stick_x(), state.stick_y());
        assert_eq!(first, second);
    }

    #[test]
    fn reports_button_transitions() {
        let previous = N64State {
            data1: 0x80,
            ..N64State::default()
        };
        let current = N64State {
            data1: 0x10,
            data2: 0x20,
            ..N64State::default()
        };

        let events: Vec<_> = current.button_changes(&previous).collect();
        assert_eq!(
            events,
            vec![
                ButtonEvent {
                    id: ButtonId::A,
                    kind: ButtonEventKind::Released
                },
                ButtonEvent {
                    id: ButtonId::Start,
                    kind: ButtonEventKind::Pressed
                },
                ButtonEvent {
                    id: ButtonId::L,
                    kind: ButtonEventKind::Pressed
                },
            ]
        );
    }

    #[test]
    fn reports_only_moved_axes() {
        let previous = N64State::default();
        let current = N64State {
            stick_y: 64,
            ..N64State::default()
        };

        let events: Vec<_> = current.stick_changes(&previous).collect();
        assert_eq!(
            events,
            vec![StickEvent {
                axis: StickAxis::Y,
                value: 64,
                previous: 0
            }]
        );
    }
}

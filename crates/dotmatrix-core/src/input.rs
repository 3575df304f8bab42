/// Snapshot of the eight keys as reported by the host. `true` is pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoypadState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub start: bool,
    pub select: bool,
}

/// Joypad register (0xFF00).
///
/// Writes to bits 4/5 set the d-pad/button select latches; reads return the
/// selected nibble with 0 meaning pressed. A not-pressed to pressed edge in a
/// selected group raises the joypad interrupt.
pub struct Input {
    state: JoypadState,
    select_buttons: bool,
    select_dpad: bool,
}

impl Input {
    pub fn new() -> Self {
        Self {
            state: JoypadState::default(),
            select_buttons: false,
            select_dpad: false,
        }
    }

    /// Replace the key state, setting IF bit 4 when a selected key goes down.
    pub fn set_state(&mut self, state: JoypadState, if_reg: &mut u8) {
        let old = self.state;
        self.state = state;

        let button_edge = (!old.a && state.a)
            || (!old.b && state.b)
            || (!old.start && state.start)
            || (!old.select && state.select);
        let dpad_edge = (!old.up && state.up)
            || (!old.down && state.down)
            || (!old.left && state.left)
            || (!old.right && state.right);

        if (self.select_buttons && button_edge) || (self.select_dpad && dpad_edge) {
            *if_reg |= 0x10;
        }
    }

    pub fn write(&mut self, val: u8) {
        self.select_dpad = val & 0x10 != 0;
        self.select_buttons = val & 0x20 != 0;
    }

    pub fn read(&self) -> u8 {
        let mut out = 0xC0;
        if self.select_dpad {
            out |= 0x10;
        }
        if self.select_buttons {
            out |= 0x20;
        }
        out | self.selected_nibble()
    }

    fn selected_nibble(&self) -> u8 {
        if self.select_buttons {
            self.button_bits()
        } else if self.select_dpad {
            self.dpad_bits()
        } else {
            0x0F
        }
    }

    fn button_bits(&self) -> u8 {
        let mut bits = 0x0F;
        if self.state.a {
            bits &= !0x01;
        }
        if self.state.b {
            bits &= !0x02;
        }
        if self.state.select {
            bits &= !0x04;
        }
        if self.state.start {
            bits &= !0x08;
        }
        bits
    }

    fn dpad_bits(&self) -> u8 {
        let mut bits = 0x0F;
        if self.state.right {
            bits &= !0x01;
        }
        if self.state.left {
            bits &= !0x02;
        }
        if self.state.up {
            bits &= !0x04;
        }
        if self.state.down {
            bits &= !0x08;
        }
        bits
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

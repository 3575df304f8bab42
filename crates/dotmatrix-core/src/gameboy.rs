use std::sync::Arc;

use crate::{
    audio_ring::AudioRing,
    cartridge::Cartridge,
    cpu::Cpu,
    error::Error,
    input::JoypadState,
    inst,
    mmu::Mmu,
};

/// The assembled machine and the host boundary.
///
/// Ownership is single-rooted: the `GameBoy` owns the CPU and the MMU, and
/// the MMU owns every bus-addressable subsystem. The host drives the
/// simulation with [`GameBoy::step`] from its frame tick, presents
/// [`GameBoy::framebuffer`] when [`GameBoy::frame_ready`] fires, and drains
/// audio from the shared ring on its callback thread.
pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    /// A machine in the post-boot DMG state with no cartridge loaded.
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            mmu: Mmu::new(),
        }
    }

    /// Parse, validate and insert a cartridge image.
    pub fn load_rom(&mut self, bytes: Vec<u8>) -> Result<(), Error> {
        let cart = Cartridge::new(bytes)?;
        self.mmu.load_cart(cart);
        Ok(())
    }

    /// Run until at least `t_cycles` T-cycles have been consumed.
    ///
    /// Instructions are atomic: the budget may be overshot by the tail of the
    /// last instruction, never undershot.
    pub fn step(&mut self, t_cycles: u64) {
        let mut budget = t_cycles as i64;
        while budget > 0 {
            budget -= self.step_instruction() as i64;
        }
    }

    /// Service interrupts and run one instruction (or one idle machine cycle
    /// when halted/stopped), then feed the consumed T-cycles to the PPU, APU,
    /// timer and cartridge clock. Returns the T-cycles consumed.
    pub fn step_instruction(&mut self) -> u16 {
        // STOP ends when a joypad press has been flagged.
        if self.cpu.stopped && self.mmu.if_reg & 0x10 != 0 {
            self.cpu.stopped = false;
        }

        let mut m_cycles = self.cpu.handle_interrupts(&mut self.mmu) as u16;

        if self.cpu.halted || self.cpu.stopped {
            self.cpu.cycles += 1;
            m_cycles += 1;
        } else {
            let (inst, _len) = inst::decode(&self.mmu, self.cpu.pc);
            m_cycles += self.cpu.execute(&mut self.mmu, inst) as u16;
        }

        let dots = m_cycles * 4;
        self.mmu.tick(dots);
        dots
    }

    /// Consume the "frame ready" edge raised on entry to V-blank.
    pub fn frame_ready(&mut self) -> bool {
        self.mmu.ppu.take_frame_ready()
    }

    /// 160x144 DMG shade indices (0..3), row-major. [`crate::ppu::DMG_COLORS`]
    /// maps them to grayscale RGBA.
    pub fn framebuffer(&self) -> &[u8] {
        &self.mmu.ppu.framebuffer
    }

    /// Shared handle to the stereo sample ring for the audio callback thread.
    pub fn audio(&self) -> Arc<AudioRing> {
        self.mmu.apu.ring()
    }

    /// Drain buffered audio as little-endian f32 stereo interleaved bytes.
    pub fn audio_read(&self, out: &mut [u8]) -> usize {
        self.mmu.apu.ring().read_bytes(out)
    }

    pub fn set_sample_rate(&mut self, rate: u32) {
        self.mmu.apu.set_sample_rate(rate);
    }

    /// Update the joypad state; select-edge presses raise the joypad
    /// interrupt (and wake a stopped CPU).
    pub fn joypad_set(&mut self, state: JoypadState) {
        self.mmu.input.set_state(state, &mut self.mmu.if_reg);
    }

    /// Number of unknown opcodes the guest has executed.
    pub fn unknown_opcode_count(&self) -> u64 {
        self.cpu.unknown_opcode_count()
    }

    /// Reset to the post-boot state, keeping the loaded cartridge (battery
    /// RAM included) and the host's audio ring binding.
    pub fn restart(&mut self) {
        self.cpu = Cpu::new();
        self.mmu.reset();
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}

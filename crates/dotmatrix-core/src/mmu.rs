use crate::{apu::Apu, cartridge::Cartridge, input::Input, ppu::Ppu, timer::Timer};

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;

/// The 16-bit guest address space: arbitration between the cartridge, VRAM,
/// WRAM, OAM, HRAM, the I/O register table and IE.
///
/// Out-of-range reads return 0xFF and out-of-range writes are dropped; both
/// are reported through diagnostics so nothing the guest does can fault the
/// emulator.
pub struct Mmu {
    pub wram: [u8; WRAM_SIZE],
    pub hram: [u8; HRAM_SIZE],
    pub cart: Option<Cartridge>,
    pub if_reg: u8,
    pub ie_reg: u8,
    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub input: Input,
    /// Inert serial registers: link-cable transfer is out of scope, but games
    /// poke these and expect the bytes to read back stably.
    serial_data: u8,
    serial_control: u8,
}

impl Mmu {
    pub fn new() -> Self {
        let mut timer = Timer::new();
        // Power-on DIV phase; DIV reads 0xAB immediately after boot.
        timer.div = 0xABCC;

        Self {
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            cart: None,
            if_reg: 0xE1,
            ie_reg: 0,
            ppu: Ppu::new(),
            apu: Apu::new(),
            timer,
            input: Input::new(),
            serial_data: 0x00,
            serial_control: 0x7E,
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                self.cart.as_ref().map(|c| c.read(addr)).unwrap_or(0xFF)
            }
            0x8000..=0x9FFF => self.ppu.vram[(addr - 0x8000) as usize],
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.input.read(),
            0xFF01 => self.serial_data,
            0xFF02 => self.serial_control | 0x7E,
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg | 0xE0,
            0xFF10..=0xFF3F => self.apu.read_reg(addr),
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
            _ => {
                core_trace!(target: "dotmatrix_core::mmu",
                    "unhandled read at {addr:#06x}");
                0xFF
            }
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write(addr, val);
                }
            }
            0x8000..=0x9FFF => self.ppu.vram[(addr - 0x8000) as usize] = val,
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.input.write(val),
            0xFF01 => self.serial_data = val,
            0xFF02 => self.serial_control = val,
            0xFF04..=0xFF07 => self.timer.write(addr, val, &mut self.if_reg),
            0xFF0F => self.if_reg = 0xE0 | (val & 0x1F),
            0xFF10..=0xFF3F => self.apu.write_reg(addr, val),
            0xFF46 => self.oam_dma(val),
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val,
            _ => {
                core_trace!(target: "dotmatrix_core::mmu",
                    "ignored write {val:#04x} at {addr:#06x}");
            }
        }
    }

    /// OAM DMA: copy 160 bytes from `(val << 8)` into OAM.
    ///
    /// The copy is modeled as instantaneous inside the 160-cycle window the
    /// guest is expected to idle through (it busy-waits in HRAM on hardware).
    fn oam_dma(&mut self, val: u8) {
        self.ppu.dma = val;
        let source = (val as u16) << 8;
        for i in 0..0xA0u16 {
            let byte = self.read_byte(source.wrapping_add(i));
            self.ppu.oam[i as usize] = byte;
        }
    }

    /// Reset every subsystem to the post-boot state, keeping the loaded
    /// cartridge (banking registers cleared, RAM contents kept) and the
    /// APU's host-facing audio ring.
    pub fn reset(&mut self) {
        self.wram = [0; WRAM_SIZE];
        self.hram = [0; HRAM_SIZE];
        self.if_reg = 0xE1;
        self.ie_reg = 0;
        self.ppu = Ppu::new();
        self.timer = Timer::new();
        self.timer.div = 0xABCC;
        self.input = Input::new();
        self.serial_data = 0x00;
        self.serial_control = 0x7E;
        self.apu.reset();
        if let Some(cart) = self.cart.as_mut() {
            cart.reset();
        }
    }

    /// Advance every clocked subsystem by `dots` T-cycles.
    pub fn tick(&mut self, dots: u16) {
        if let Some(cart) = self.cart.as_mut() {
            cart.step_rtc(dots as u64);
        }

        self.timer.step(dots, &mut self.if_reg);
        self.apu.step(dots);
        self.ppu.step(dots, &mut self.if_reg);
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}

use crate::error::Error;

const HEADER_END: usize = 0x150;
const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

const RTC_CYCLES_PER_SECOND: u32 = 4_194_304;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc3,
}

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub title: String,
    /// Header CGB flag (0x143 bit 7). Informational: this core always runs
    /// the DMG feature set.
    pub cgb: bool,
    cart_type: u8,
    mbc_state: MbcState,
}

#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        /// Low 5 bits of the ROM bank number (0 is forced to 1 on write).
        rom_bank: u8,
        /// 2-bit upper selector: ROM bank bits 5-6 in mode 0, RAM bank in mode 1.
        bank_hi: u8,
        mode: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        /// RAM bank 0..3 or RTC register select 0x08..0x0C.
        ram_select: u8,
        ram_enable: bool,
        rtc: Option<Rtc>,
        latch_pending: bool,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct RtcRegisters {
    seconds: u8,
    minutes: u8,
    hours: u8,
    /// 9-bit day counter; overflow sets `carry`.
    days: u16,
    halt: bool,
    carry: bool,
}

impl RtcRegisters {
    fn control_byte(&self) -> u8 {
        let mut out = ((self.days >> 8) as u8) & 0x01;
        if self.halt {
            out |= 0x40;
        }
        if self.carry {
            out |= 0x80;
        }
        out
    }
}

/// MBC3 real-time clock, advanced from emulated CPU cycles.
///
/// Wall-clock resynchronization and persistence are host concerns; the core
/// only guarantees that a running guest observes a clock ticking at one
/// second per 4194304 cycles.
#[derive(Debug, Clone, Default)]
struct Rtc {
    regs: RtcRegisters,
    latched: RtcRegisters,
    subsecond_cycles: u32,
}

impl Rtc {
    fn latch(&mut self) {
        self.latched = self.regs;
    }

    fn read_latched(&self, reg: u8) -> u8 {
        match reg {
            0x08 => self.latched.seconds & 0x3F,
            0x09 => self.latched.minutes & 0x3F,
            0x0A => self.latched.hours & 0x1F,
            0x0B => (self.latched.days & 0x00FF) as u8,
            0x0C => self.latched.control_byte(),
            _ => 0xFF,
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        match reg {
            0x08 => {
                self.regs.seconds = value & 0x3F;
                // A seconds write also resets the sub-second phase.
                self.subsecond_cycles = 0;
            }
            0x09 => self.regs.minutes = value & 0x3F,
            0x0A => self.regs.hours = value & 0x1F,
            0x0B => self.regs.days = (self.regs.days & 0x0100) | value as u16,
            0x0C => {
                self.regs.days = (self.regs.days & 0x00FF) | (((value & 0x01) as u16) << 8);
                self.regs.halt = value & 0x40 != 0;
                self.regs.carry = value & 0x80 != 0;
            }
            _ => {}
        }
    }

    fn step(&mut self, cycles: u64) {
        if self.regs.halt {
            return;
        }

        let mut seconds = cycles / RTC_CYCLES_PER_SECOND as u64;
        let rem = (cycles % RTC_CYCLES_PER_SECOND as u64) as u32;

        let mut sub = self.subsecond_cycles + rem;
        if sub >= RTC_CYCLES_PER_SECOND {
            sub -= RTC_CYCLES_PER_SECOND;
            seconds += 1;
        }
        self.subsecond_cycles = sub;

        for _ in 0..seconds {
            self.second_tick();
        }
    }

    fn second_tick(&mut self) {
        self.regs.seconds = (self.regs.seconds + 1) & 0x3F;
        if self.regs.seconds == 60 {
            self.regs.seconds = 0;
            self.minute_tick();
        }
    }

    fn minute_tick(&mut self) {
        self.regs.minutes = (self.regs.minutes + 1) & 0x3F;
        if self.regs.minutes == 60 {
            self.regs.minutes = 0;
            self.hour_tick();
        }
    }

    fn hour_tick(&mut self) {
        self.regs.hours = (self.regs.hours + 1) & 0x1F;
        if self.regs.hours == 24 {
            self.regs.hours = 0;
            self.day_tick();
        }
    }

    fn day_tick(&mut self) {
        if self.regs.days >= 0x01FF {
            self.regs.days = 0;
            self.regs.carry = true;
        } else {
            self.regs.days += 1;
        }
    }
}

impl Cartridge {
    /// Parse and validate a ROM image.
    ///
    /// Fatal faults: image shorter than the header, wrong header checksum,
    /// or a cartridge type byte outside the implemented MBC set.
    pub fn new(data: Vec<u8>) -> Result<Self, Error> {
        if data.len() < HEADER_END {
            return Err(Error::InvalidCartridge(format!(
                "image is {} bytes, smaller than the {HEADER_END}-byte header",
                data.len()
            )));
        }

        let header = Header::parse(&data);
        let computed = header.compute_checksum();
        let stored = header.checksum();
        if computed != stored {
            return Err(Error::InvalidCartridge(format!(
                "header checksum mismatch: computed {computed:#04x}, stored {stored:#04x}"
            )));
        }

        let cart_type = header.cart_type();
        let mbc = match cart_type {
            0x00 | 0x08 | 0x09 => MbcType::NoMbc,
            0x01..=0x03 => MbcType::Mbc1,
            0x0F..=0x13 => MbcType::Mbc3,
            other => return Err(Error::UnsupportedMbc(other)),
        };

        let has_rtc = matches!(cart_type, 0x0F | 0x10 | 0x13);
        let mbc_state = match mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                bank_hi: 0,
                mode: 0,
                ram_enable: false,
            },
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_select: 0,
                ram_enable: false,
                rtc: has_rtc.then(Rtc::default),
                latch_pending: false,
            },
        };

        if header.rom_size() != data.len() {
            core_trace!(target: "dotmatrix_core::cartridge",
                "header declares {} ROM bytes, image has {}", header.rom_size(), data.len());
        }

        let ram_size = header.ram_size();
        let title = header.title();
        let cgb = header.cgb_flag();

        Ok(Self {
            rom: data,
            ram: vec![0; ram_size],
            mbc,
            title,
            cgb,
            cart_type,
            mbc_state,
        })
    }

    /// Advance the RTC (if any) by the given number of T-cycles.
    pub fn step_rtc(&mut self, cycles: u64) {
        if let MbcState::Mbc3 { rtc: Some(rtc), .. } = &mut self.mbc_state {
            rtc.step(cycles);
        }
    }

    /// Reset banking registers to their power-on values, keeping ROM and RAM
    /// contents.
    pub fn reset(&mut self) {
        match &mut self.mbc_state {
            MbcState::NoMbc => {}
            MbcState::Mbc1 {
                rom_bank,
                bank_hi,
                mode,
                ram_enable,
            } => {
                *rom_bank = 1;
                *bank_hi = 0;
                *mode = 0;
                *ram_enable = false;
            }
            MbcState::Mbc3 {
                rom_bank,
                ram_select,
                ram_enable,
                latch_pending,
                ..
            } => {
                *rom_bank = 1;
                *ram_select = 0;
                *ram_enable = false;
                *latch_pending = false;
            }
        }
    }

    fn rom_bank_count(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    fn ram_bank_count(&self) -> usize {
        self.ram.len() / RAM_BANK_SIZE
    }

    pub fn read(&self, addr: u16) -> u8 {
        let rom_banks = self.rom_bank_count();
        match (&self.mbc_state, addr) {
            (MbcState::NoMbc, 0x0000..=0x7FFF) => {
                self.rom.get(addr as usize).copied().unwrap_or(0xFF)
            }
            (MbcState::Mbc1 { bank_hi, mode, .. }, 0x0000..=0x3FFF) => {
                // In mode 1 the fixed window follows the upper selector.
                let bank = if *mode == 0 {
                    0
                } else {
                    (((*bank_hi as usize) & 0x03) << 5) % rom_banks
                };
                let offset = bank * ROM_BANK_SIZE + addr as usize;
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            (
                MbcState::Mbc1 {
                    rom_bank, bank_hi, ..
                },
                0x4000..=0x7FFF,
            ) => {
                // Hardware concatenates the 2-bit upper selector with the
                // 5-bit low bank register.
                let mut bank = (((*bank_hi as usize) & 0x03) << 5) | (*rom_bank as usize & 0x1F);
                if bank & 0x1F == 0 {
                    bank += 1;
                }
                bank %= rom_banks;
                let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            (MbcState::Mbc3 { .. }, 0x0000..=0x3FFF) => {
                self.rom.get(addr as usize).copied().unwrap_or(0xFF)
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x4000..=0x7FFF) => {
                let bank = if *rom_bank == 0 { 1 } else { *rom_bank } as usize % rom_banks;
                let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            (MbcState::NoMbc, 0xA000..=0xBFFF) => self
                .ram
                .get(addr as usize - 0xA000)
                .copied()
                .unwrap_or(0xFF),
            (MbcState::Mbc1 { ram_enable, .. }, 0xA000..=0xBFFF) => {
                if !*ram_enable {
                    0xFF
                } else {
                    let idx = self.mbc1_ram_index(addr);
                    self.ram.get(idx).copied().unwrap_or(0xFF)
                }
            }
            (
                MbcState::Mbc3 {
                    ram_enable,
                    ram_select,
                    rtc,
                    ..
                },
                0xA000..=0xBFFF,
            ) => {
                if !*ram_enable {
                    0xFF
                } else {
                    match *ram_select {
                        0x00..=0x03 => {
                            let idx =
                                (*ram_select as usize) * RAM_BANK_SIZE + addr as usize - 0xA000;
                            self.ram.get(idx).copied().unwrap_or(0xFF)
                        }
                        0x08..=0x0C => rtc
                            .as_ref()
                            .map(|r| r.read_latched(*ram_select))
                            .unwrap_or(0xFF),
                        _ => 0xFF,
                    }
                }
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match (&mut self.mbc_state, addr) {
            (MbcState::NoMbc, 0x0000..=0x7FFF) => {
                core_trace!(target: "dotmatrix_core::cartridge",
                    "ignored ROM write {val:#04x} at {addr:#06x}");
            }
            (MbcState::NoMbc, 0xA000..=0xBFFF) => {
                if let Some(b) = self.ram.get_mut(addr as usize - 0xA000) {
                    *b = val;
                }
            }
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc1 { bank_hi, .. }, 0x4000..=0x5FFF) => {
                *bank_hi = val & 0x03;
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }
            (MbcState::Mbc1 { ram_enable, .. }, 0xA000..=0xBFFF) => {
                if *ram_enable {
                    let idx = self.mbc1_ram_index(addr);
                    if let Some(b) = self.ram.get_mut(idx) {
                        *b = val;
                    }
                }
            }
            (MbcState::Mbc3 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc3 { ram_select, .. }, 0x4000..=0x5FFF) => {
                *ram_select = val;
            }
            (
                MbcState::Mbc3 {
                    latch_pending, rtc, ..
                },
                0x6000..=0x7FFF,
            ) => {
                // Writing 0 then 1 latches the live clock into the latched
                // registers.
                if val == 0 {
                    *latch_pending = true;
                } else {
                    if val == 1 && *latch_pending {
                        if let Some(rtc) = rtc {
                            rtc.latch();
                        }
                    }
                    *latch_pending = false;
                }
            }
            (
                MbcState::Mbc3 {
                    ram_enable,
                    ram_select,
                    rtc,
                    ..
                },
                0xA000..=0xBFFF,
            ) => {
                if *ram_enable {
                    match *ram_select {
                        0x00..=0x03 => {
                            let idx =
                                (*ram_select as usize) * RAM_BANK_SIZE + addr as usize - 0xA000;
                            if let Some(b) = self.ram.get_mut(idx) {
                                *b = val;
                            }
                        }
                        0x08..=0x0C => {
                            if let Some(rtc) = rtc.as_mut() {
                                rtc.write_register(*ram_select, val);
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn mbc1_ram_index(&self, addr: u16) -> usize {
        match &self.mbc_state {
            MbcState::Mbc1 { bank_hi, mode, .. } => {
                if *mode == 0 {
                    addr as usize - 0xA000
                } else {
                    let banks = self.ram_bank_count();
                    let bank = if banks == 0 {
                        0
                    } else {
                        (*bank_hi as usize) % banks
                    };
                    bank * RAM_BANK_SIZE + addr as usize - 0xA000
                }
            }
            _ => addr as usize - 0xA000,
        }
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn title(&self) -> String {
        let mut slice = &self.data[0x0134..0x0143];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn cgb_flag(&self) -> bool {
        self.data[0x0143] & 0x80 != 0
    }

    fn cart_type(&self) -> u8 {
        self.data[0x0147]
    }

    /// ROM size in bytes: `(32 KiB) << code`.
    fn rom_size(&self) -> usize {
        0x8000usize << (self.data[0x0148] & 0x0F).min(8)
    }

    fn checksum(&self) -> u8 {
        self.data[0x014D]
    }

    /// Header checksum over 0x134..=0x14C as computed by the boot ROM.
    fn compute_checksum(&self) -> u8 {
        self.data[0x0134..=0x014C]
            .iter()
            .fold(0u8, |sum, &b| sum.wrapping_sub(b).wrapping_sub(1))
    }

    fn ram_size(&self) -> usize {
        match self.data[0x0149] {
            0x02 => 0x2000,  // 8 KiB
            0x03 => 0x8000,  // 32 KiB (4 banks)
            0x04 => 0x20000, // 128 KiB (16 banks)
            0x05 => 0x10000, // 64 KiB (8 banks)
            _ => 0,
        }
    }
}

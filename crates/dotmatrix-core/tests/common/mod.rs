//! Helpers for building in-memory ROM images with valid headers.

#![allow(dead_code)]

use dotmatrix_core::gameboy::GameBoy;

pub const ENTRY: u16 = 0x0100;

/// A blank ROM of `banks` 16 KiB banks with a valid header. The ROM size
/// code is derived from the bank count; RAM size and cartridge type are the
/// caller's.
pub fn blank_rom(cart_type: u8, ram_size_code: u8, banks: usize) -> Vec<u8> {
    assert!(banks >= 2 && banks.is_power_of_two());
    let mut rom = vec![0u8; banks * 0x4000];
    rom[0x134..0x138].copy_from_slice(b"TEST");
    rom[0x147] = cart_type;
    rom[0x148] = (banks / 2).trailing_zeros() as u8;
    rom[0x149] = ram_size_code;
    fix_checksum(&mut rom);
    rom
}

/// Recompute the header checksum over 0x134..=0x14C and store it at 0x14D.
pub fn fix_checksum(rom: &mut [u8]) {
    let sum = rom[0x134..=0x14C]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_sub(b).wrapping_sub(1));
    rom[0x14D] = sum;
}

/// A 32 KiB MBC-less ROM with `program` placed at the entry point 0x100.
/// The program must fit in the 0x34 bytes before the header logo area.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    assert!(program.len() <= 0x34, "program overlaps the cartridge header");
    let mut rom = blank_rom(0x00, 0x00, 2);
    rom[0x100..0x100 + program.len()].copy_from_slice(program);
    rom
}

/// A machine with `program` loaded at 0x100 and PC sitting on it.
pub fn gameboy_with_program(program: &[u8]) -> GameBoy {
    let mut gb = GameBoy::new();
    gb.load_rom(rom_with_program(program)).expect("valid test rom");
    gb
}

/// A cartridge-less machine with `program` copied into WRAM at 0xC000 and PC
/// pointed there. Convenient for programs longer than the header gap.
pub fn gameboy_with_wram_program(program: &[u8]) -> GameBoy {
    let mut gb = GameBoy::new();
    for (i, &byte) in program.iter().enumerate() {
        gb.mmu.write_byte(0xC000 + i as u16, byte);
    }
    gb.cpu.pc = 0xC000;
    gb
}

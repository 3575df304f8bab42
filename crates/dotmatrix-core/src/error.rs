use thiserror::Error;

/// Faults that are fatal to system construction.
///
/// Guest-observable faults (unknown opcodes, out-of-range accesses) are not
/// errors: they degrade to benign defaults and a diagnostics line so the
/// guest program can never terminate the emulator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid cartridge: {0}")]
    InvalidCartridge(String),

    #[error("unsupported MBC (cartridge type {0:#04x})")]
    UnsupportedMbc(u8),
}

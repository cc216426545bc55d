use crate::errors::LoadProgramError;
use crate::host::HostIo;
use std::fmt::{Debug, Formatter};
use std::io;
use std::ops::{Index, IndexMut};

pub const PROGRAM_SECTION_START: u16 = 0x3000;
pub const PROGRAM_SECTION_END: u16 = 0xFDFF;
pub const DEVICE_SECTION_START: u16 = 0xFE00;
const MEMORY_SIZE_U16: usize = 1 << u16::BITS;

/// Memory regions mapped to IO functionality.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, enumn::N)]
pub enum MemoryMappedIOLocations {
    /// Keyboard Status Register
    Kbsr = 0xFE00,
    /// Keyboard Data Register
    Kbdr = 0xFE02,
}

/// The full 16 bit address space of the LC-3, one `u16` per address.
///
/// Indexing gives raw access without device side effects, [`Memory::read`] and
/// [`Memory::write`] are what the CPU uses.
pub struct Memory {
    /// Index equals memory address
    data: Vec<u16>,
    /// A key waits in the keyboard data register, independent of the RAM cell at `Kbsr`
    key_latched: bool,
}

impl Debug for Memory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let used = self.data.iter().filter(|w| **w != 0).count();
        write!(
            f,
            "Memory {{ non_zero_cells: {used}, key_latched: {}, kbdr: {:#06X} }}",
            self.key_latched,
            self[MemoryMappedIOLocations::Kbdr as u16]
        )
    }
}
impl Index<u16> for Memory {
    type Output = u16;
    fn index(&self, index: u16) -> &Self::Output {
        &self.data[usize::from(index)]
    }
}
impl IndexMut<u16> for Memory {
    fn index_mut(&mut self, index: u16) -> &mut Self::Output {
        &mut self.data[usize::from(index)]
    }
}
impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
impl Memory {
    const KEYBOARD_STATUS_REGISTER_SET: u16 = 1 << 15;
    const KEYBOARD_STATUS_REGISTER_UNSET: u16 = 0;

    #[must_use]
    pub fn new() -> Self {
        Self {
            data: vec![0x0u16; MEMORY_SIZE_U16],
            key_latched: false,
        }
    }

    /// Reads the word at `address` as the CPU sees it.
    ///
    /// Reading the keyboard status register polls the host and latches a ready key into the
    /// keyboard data register. The status stays set until the data register is read.
    ///
    /// # Errors
    /// - the host failed to report or deliver keyboard input
    pub fn read<H: HostIo + ?Sized>(&mut self, address: u16, host: &mut H) -> io::Result<u16> {
        match MemoryMappedIOLocations::n(address) {
            None => Ok(self[address]),
            Some(MemoryMappedIOLocations::Kbsr) => {
                if !self.key_latched && host.key_ready()? {
                    self[MemoryMappedIOLocations::Kbdr as u16] = u16::from(host.getc()?);
                    self.key_latched = true;
                }
                Ok(self.keyboard_status())
            }
            Some(MemoryMappedIOLocations::Kbdr) => {
                self.key_latched = false;
                Ok(self[MemoryMappedIOLocations::Kbdr as u16] & 0x00FF)
            }
        }
    }

    const fn keyboard_status(&self) -> u16 {
        if self.key_latched {
            Self::KEYBOARD_STATUS_REGISTER_SET
        } else {
            Self::KEYBOARD_STATUS_REGISTER_UNSET
        }
    }

    /// Writes `value` to `address`. Device registers are stored like plain RAM, a write to the
    /// keyboard status register does not change what reading it reports.
    pub fn write(&mut self, address: u16, value: u16) {
        self[address] = value;
    }

    /// Copies `data` to consecutive addresses starting at `origin`.
    ///
    /// # Errors
    /// - Program too long to fit between `origin` and the end of memory
    pub fn load_program(&mut self, origin: u16, data: &[u16]) -> Result<(), LoadProgramError> {
        let start = usize::from(origin);
        let maximum_instructions = MEMORY_SIZE_U16 - start;
        if data.len() > maximum_instructions {
            return Err(LoadProgramError::ProgramTooLong {
                actual_instructions: data.len(),
                maximum_instructions,
            });
        }
        self.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Raw view of `len` cells starting at `origin`, clamped to the end of memory.
    #[cfg(test)]
    fn slice(&self, origin: u16, len: usize) -> &[u16] {
        let start = usize::from(origin);
        let end = start.saturating_add(len).min(MEMORY_SIZE_U16);
        &self.data[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BufferedHost;
    use googletest::prelude::*;

    const KBSR: u16 = MemoryMappedIOLocations::Kbsr as u16;
    const KBDR: u16 = MemoryMappedIOLocations::Kbdr as u16;

    #[gtest]
    fn test_plain_read_write() {
        let mut mem = Memory::new();
        let mut host = BufferedHost::new();
        mem.write(0x3000, 0x1234);
        mem.write(0xFFFF, 0xBEEF);
        expect_that!(mem.read(0x3000, &mut host).unwrap(), eq(0x1234));
        expect_that!(mem.read(0xFFFF, &mut host).unwrap(), eq(0xBEEF));
        expect_that!(mem[0x0000], eq(0));
    }

    #[gtest]
    fn test_keyboard_status_without_input() {
        let mut mem = Memory::new();
        let mut host = BufferedHost::new();
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0));
    }

    #[gtest]
    fn test_keyboard_status_latches_key() {
        let mut mem = Memory::new();
        let mut host = BufferedHost::with_input(b"xy");
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0x8000));
        // second poll must not consume another key before KBDR was read
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0x8000));
        expect_that!(host.remaining_input(), eq(1));
        expect_that!(mem.read(KBDR, &mut host).unwrap(), eq(u16::from(b'x')));
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0x8000));
        expect_that!(mem.read(KBDR, &mut host).unwrap(), eq(u16::from(b'y')));
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0));
    }

    #[gtest]
    fn test_keyboard_data_keeps_last_key() {
        let mut mem = Memory::new();
        let mut host = BufferedHost::with_input(b"q");
        let _ = mem.read(KBSR, &mut host).unwrap();
        expect_that!(mem.read(KBDR, &mut host).unwrap(), eq(u16::from(b'q')));
        expect_that!(mem.read(KBDR, &mut host).unwrap(), eq(u16::from(b'q')));
    }

    #[gtest]
    fn test_keyboard_status_ignores_stored_value() {
        let mut mem = Memory::new();
        let mut host = BufferedHost::new();
        mem.write(KBSR, 0xFFFF);
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0));
        host.push_input(b"k");
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0x8000));
        mem.write(KBSR, 0);
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0x8000));
        expect_that!(mem.read(KBDR, &mut host).unwrap(), eq(u16::from(b'k')));
        expect_that!(mem.read(KBSR, &mut host).unwrap(), eq(0));
    }

    #[gtest]
    fn test_keyboard_data_high_byte_is_zero() {
        let mut mem = Memory::new();
        let mut host = BufferedHost::new();
        mem.write(KBDR, 0xAB41);
        expect_that!(mem.read(KBDR, &mut host).unwrap(), eq(0x0041));
    }

    #[gtest]
    fn test_load_program() {
        let mut mem = Memory::new();
        mem.load_program(0x3000, &[1, 2, 3]).unwrap();
        assert_eq!(mem.slice(0x3000, 4), &[1, 2, 3, 0]);
    }

    #[gtest]
    fn test_load_program_up_to_end_of_memory() {
        let mut mem = Memory::new();
        mem.load_program(0xFFFE, &[7, 8]).unwrap();
        expect_that!(mem[0xFFFF], eq(8));
    }

    #[gtest]
    fn test_load_program_too_long() {
        let mut mem = Memory::new();
        let err = mem.load_program(0xFFFE, &[7, 8, 9]).unwrap_err();
        expect_that!(
            err.to_string(),
            eq("Program too long, got 3 u16 instructions while limit is 2")
        );
    }
}

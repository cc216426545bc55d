//! The virtual machine: registers, memory and the fetch-decode-execute loop.
mod diagnostics;
pub mod instruction;
mod loader;
mod opcodes;
mod trap_routines;

#[cfg(test)]
mod test_helpers;

pub use diagnostics::Diagnostic;
pub use loader::ProgramImage;
pub use trap_routines::{HALT_MESSAGE, IN_PROMPT, TrapVector};

use crate::errors::{ExecutionError, LoadProgramError};
use crate::hardware::memory::{
    DEVICE_SECTION_START, Memory, PROGRAM_SECTION_END, PROGRAM_SECTION_START,
};
use crate::hardware::registers::{ConditionFlag, Register, Registers};
use crate::host::HostIo;
use instruction::{Instruction, Opcode};
use std::fmt::{Debug, Formatter};
use std::ops::{ControlFlow, Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use trap_routines::io_to_cf;

/// Loads an object file with `.ORIG` header and returns an emulator ready to execute it.
///
/// # Errors
/// - See [`ProgramImage::from_file`] and [`Emulator::load`]
pub fn from_program(path: impl AsRef<Path>) -> Result<Emulator, LoadProgramError> {
    let image = ProgramImage::from_file(path)?;
    from_image(&image)
}

/// Like [`from_program`] but with the object file content already in memory.
///
/// # Errors
/// - See [`ProgramImage::from_bytes`] and [`Emulator::load`]
pub fn from_program_bytes(bytes: &[u8]) -> Result<Emulator, LoadProgramError> {
    let image = ProgramImage::from_bytes(bytes)?;
    from_image(&image)
}

fn from_image(image: &ProgramImage) -> Result<Emulator, LoadProgramError> {
    let mut emu = Emulator::new();
    emu.load_image(image)?;
    Ok(emu)
}

/// Requests an [`Emulator`] to stop from anywhere, e.g. another thread.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Execution ends before the next instruction is fetched.
    /// A trap blocking on input is not interrupted.
    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Keeps the host in raw mode while alive and restores it on every exit path.
struct RawModeGuard<'a, H: HostIo + ?Sized> {
    host: &'a mut H,
}

impl<'a, H: HostIo + ?Sized> RawModeGuard<'a, H> {
    /// Set raw mode in best-effort mode, only log on failure, since there is no terminal in
    /// doc tests or when input is piped.
    fn acquire(host: &'a mut H) -> Self {
        if let Err(e) = host.set_raw_mode() {
            log::warn!("Could not set terminal to raw mode: {e}");
        }
        Self { host }
    }
}

impl<H: HostIo + ?Sized> Drop for RawModeGuard<'_, H> {
    fn drop(&mut self) {
        // terminal stays in raw mode but no means to repair
        if let Err(e) = self.host.restore_mode() {
            log::error!("Error resetting terminal {e}");
        }
    }
}

impl<H: HostIo + ?Sized> Deref for RawModeGuard<'_, H> {
    type Target = H;
    fn deref(&self) -> &H {
        &*self.host
    }
}

impl<H: HostIo + ?Sized> DerefMut for RawModeGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut *self.host
    }
}

/// Diagnostics recorded before further ones are only counted.
pub const MAX_DIAGNOSTICS: usize = 256;

/// The public facing emulator used to run LC-3 programs.
pub struct Emulator {
    memory: Memory,
    registers: Registers,
    entry_point: u16,
    running: Arc<AtomicBool>,
    current_instruction: Option<Instruction>,
    diagnostics: Vec<Diagnostic>,
    dropped_diagnostics: u64,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Emulator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("registers", &self.registers)
            .field("entry_point", &format_args!("{:#06X}", self.entry_point))
            .field("running", &self.is_running())
            .field("current_instruction", &self.current_instruction)
            .field("diagnostics", &self.diagnostics)
            .field("dropped_diagnostics", &self.dropped_diagnostics)
            .field("memory", &self.memory)
            .finish()
    }
}

impl Emulator {
    /// Creates an emulator with empty memory, zeroed registers and the entry point at `0x3000`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: Memory::new(),
            registers: Registers::new(),
            entry_point: PROGRAM_SECTION_START,
            running: Arc::new(AtomicBool::new(false)),
            current_instruction: None,
            diagnostics: Vec::new(),
            dropped_diagnostics: 0,
        }
    }

    /// Zeroes all registers and moves the entry point back to `0x3000`.
    /// Memory is kept, so a loaded program can be executed again.
    pub fn reset(&mut self) {
        self.registers = Registers::new();
        self.running.store(false, Ordering::Release);
        self.entry_point = PROGRAM_SECTION_START;
        self.current_instruction = None;
        self.diagnostics.clear();
        self.dropped_diagnostics = 0;
    }

    /// Places `words` at `origin..origin + words.len()`.
    ///
    /// # Errors
    /// - Program too long to fit between `origin` and the end of memory
    pub fn load(&mut self, origin: u16, words: &[u16]) -> Result<(), LoadProgramError> {
        self.memory.load_program(origin, words)?;
        if !(PROGRAM_SECTION_START..=PROGRAM_SECTION_END).contains(&origin) {
            log::warn!("Program origin {origin:#06X} is outside of the user program section");
        } else if usize::from(origin) + words.len() > usize::from(DEVICE_SECTION_START) {
            log::warn!("Program loaded at {origin:#06X} overlaps the device register section");
        }
        log::debug!("Loaded {} words at {origin:#06X}", words.len());
        Ok(())
    }

    /// Loads a program and makes its origin the entry point.
    ///
    /// # Errors
    /// - See [`Emulator::load`]
    pub fn load_image(&mut self, image: &ProgramImage) -> Result<(), LoadProgramError> {
        self.load(image.origin, &image.words)?;
        self.entry_point = image.origin;
        Ok(())
    }

    /// Loads a program given as words with `.ORIG` header, see [`Emulator::load_image`].
    ///
    /// # Errors
    /// - Program is missing valid .ORIG header
    /// - See [`Emulator::load`]
    pub fn load_program(&mut self, program: &[u16]) -> Result<(), LoadProgramError> {
        self.load_image(&ProgramImage::from_words(program)?)
    }

    /// Runs from the entry point until `HALT`, [`Emulator::stop`] or a host I/O error.
    ///
    /// The host is put into raw mode for the duration of the call.
    ///
    /// # Errors
    /// - reading from or writing to the host failed
    pub fn execute<H: HostIo + ?Sized>(&mut self, host: &mut H) -> Result<(), ExecutionError> {
        self.registers.set_pc(self.entry_point);
        self.registers.set_conditional_register(ConditionFlag::Zero);
        self.running.store(true, Ordering::Release);
        log::debug!("Executing from {:#06X}", self.entry_point);
        let mut host = RawModeGuard::acquire(host);
        let result = self.run(&mut *host);
        self.running.store(false, Ordering::Release);
        match &result {
            Ok(()) => log::debug!("Execution ended at {:#06X}", self.registers.pc().as_binary()),
            Err(e) => log::error!("Execution stopped: {e}"),
        }
        result
    }

    fn run<H: HostIo + ?Sized>(&mut self, host: &mut H) -> Result<(), ExecutionError> {
        while self.running.load(Ordering::Acquire) {
            let address = self.registers.pc().as_binary();
            let instruction = Instruction::from(self.memory.read(address, host)?);
            self.current_instruction = Some(instruction);
            self.registers.increment_pc();
            log::trace!("{address:#06X}: {instruction:?}");
            if let ControlFlow::Break(result) = self.execute_instruction(instruction, address, host)
            {
                return result;
            }
        }
        Ok(())
    }

    fn execute_instruction<H: HostIo + ?Sized>(
        &mut self,
        i: Instruction,
        address: u16,
        host: &mut H,
    ) -> ControlFlow<Result<(), ExecutionError>> {
        let Some(opcode) = i.opcode() else {
            self.diagnose(Diagnostic::UnusedOpcode {
                opcode: i.op_code(),
                instruction: i.bits(),
                address,
            });
            return ControlFlow::Continue(());
        };
        let regs = &mut self.registers;
        let mem = &mut self.memory;
        match opcode {
            Opcode::Br => opcodes::br(i, regs),
            Opcode::Add => opcodes::add(i, regs),
            Opcode::Ld => io_to_cf(opcodes::ld(i, regs, mem, host))?,
            Opcode::St => opcodes::st(i, regs, mem),
            Opcode::Jsr => opcodes::jsr(i, regs),
            Opcode::And => opcodes::and(i, regs),
            Opcode::Ldr => io_to_cf(opcodes::ldr(i, regs, mem, host))?,
            Opcode::Str => opcodes::str(i, regs, mem),
            Opcode::Not => opcodes::not(i, regs),
            Opcode::Ldi => io_to_cf(opcodes::ldi(i, regs, mem, host))?,
            Opcode::Sti => io_to_cf(opcodes::sti(i, regs, mem, host))?,
            Opcode::JmpOrRet => opcodes::jmp_or_ret(i, regs),
            Opcode::Lea => opcodes::lea(i, regs),
            Opcode::Trap => return self.trap(i, address, host),
            Opcode::Rti | Opcode::Res => self.diagnose(Diagnostic::UnusedOpcode {
                opcode: i.op_code(),
                instruction: i.bits(),
                address,
            }),
        }
        ControlFlow::Continue(())
    }

    fn trap<H: HostIo + ?Sized>(
        &mut self,
        i: Instruction,
        address: u16,
        host: &mut H,
    ) -> ControlFlow<Result<(), ExecutionError>> {
        let regs = &mut self.registers;
        regs.set(7, regs.pc());
        let Some(vector) = TrapVector::n(i.trap_vector()) else {
            self.diagnose(Diagnostic::UnknownTrapVector {
                vector: i.trap_vector(),
                address,
            });
            return ControlFlow::Continue(());
        };
        match vector {
            TrapVector::GetC => trap_routines::get_c(regs, host),
            TrapVector::Out => trap_routines::out(regs, host),
            TrapVector::PutS => trap_routines::put_s(regs, &mut self.memory, host),
            TrapVector::In => trap_routines::in_trap(regs, host),
            TrapVector::PutSp => trap_routines::put_sp(regs, &mut self.memory, host),
            TrapVector::Halt => trap_routines::halt(host),
        }
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        if self.diagnostics.len() < MAX_DIAGNOSTICS {
            log::warn!("{diagnostic}");
            self.diagnostics.push(diagnostic);
            return;
        }
        if self.dropped_diagnostics == 0 {
            log::warn!("More than {MAX_DIAGNOSTICS} diagnostics, only counting from now on");
        }
        log::trace!("{diagnostic}");
        self.dropped_diagnostics = self.dropped_diagnostics.saturating_add(1);
    }

    /// Requests termination before the next instruction is fetched.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// A handle to call [`Emulator::stop`] from another thread while [`Emulator::execute`] runs.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.running))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// # Panics
    /// - `r` is not in `0..8`
    #[must_use]
    pub fn read_reg(&self, r: u8) -> u16 {
        self.registers.get(r).as_binary()
    }

    /// # Panics
    /// - `r` is not in `0..8`
    pub fn write_reg(&mut self, r: u8, value: u16) {
        self.registers.set(r, Register::from_binary(value));
    }

    /// Memory content at `address`, without triggering device side effects.
    #[must_use]
    pub fn read_mem(&self, address: u16) -> u16 {
        self.memory[address]
    }

    pub fn write_mem(&mut self, address: u16, value: u16) {
        self.memory.write(address, value);
    }

    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Current value of the PC register.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.registers.pc().as_binary()
    }

    #[must_use]
    pub const fn cond(&self) -> ConditionFlag {
        self.registers.get_conditional_register()
    }

    /// Address [`Emulator::execute`] starts from.
    #[must_use]
    pub const fn entry_point(&self) -> u16 {
        self.entry_point
    }

    pub const fn set_entry_point(&mut self, address: u16) {
        self.entry_point = address;
    }

    /// The instruction fetched last, `None` after [`Emulator::reset`].
    #[must_use]
    pub const fn current_instruction(&self) -> Option<Instruction> {
        self.current_instruction
    }

    /// Non-fatal anomalies since construction or the last [`Emulator::reset`].
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics beyond [`MAX_DIAGNOSTICS`] that were counted but not kept.
    #[must_use]
    pub const fn dropped_diagnostics(&self) -> u64 {
        self.dropped_diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::test_helpers::FakeEmulator;
    use crate::host::{BufferedHost, HostEvent};
    use googletest::prelude::*;

    #[gtest]
    pub fn test_load_program_empty() {
        let mut emu = Emulator::new();
        expect_that!(
            emu.load_program(&[]).unwrap_err().to_string(),
            eq("Program is missing valid .ORIG header")
        );
    }
    #[gtest]
    pub fn test_load_program_sets_entry_point() {
        let mut emu = Emulator::new();
        emu.load_program(&[0x4000, 0xF025]).unwrap();
        expect_that!(emu.entry_point(), eq(0x4000));
        expect_that!(emu.read_mem(0x4000), eq(0xF025));
    }
    #[gtest]
    pub fn test_load_program_max_size() {
        let mut emu = Emulator::new();
        let mut program = vec![0x0u16; 0x1_0000 - 0x3000 + 1];
        program[0] = 0x3000;
        emu.load_program(&program).unwrap();
    }
    #[gtest]
    pub fn test_load_program_too_large() {
        let mut emu = Emulator::new();
        let mut program = vec![0x0u16; 0x1_0000 - 0x3000 + 2];
        program[0] = 0x3000;
        expect_that!(
            emu.load_program(&program).unwrap_err().to_string(),
            eq("Program too long, got 53249 u16 instructions while limit is 53248")
        );
    }
    #[gtest]
    pub fn test_from_program_bytes() {
        let emu = from_program_bytes(&[0x30, 0x00, 0x12, 0x25, 0xF0, 0x25]).unwrap();
        expect_that!(emu.read_mem(0x3000), eq(0x1225));
        expect_that!(emu.read_mem(0x3001), eq(0xF025));
    }
    #[gtest]
    pub fn test_execute_add_immediate() {
        let mut fake = FakeEmulator::new(&[0x1225, 0xF025]);
        fake.emulator().write_reg(0, 10);
        fake.run().unwrap();
        let emu = fake.emulator();
        expect_that!(emu.read_reg(1), eq(15));
        expect_that!(emu.cond(), eq(ConditionFlag::Pos));
        expect_that!(emu.is_running(), eq(false));
    }
    #[gtest]
    pub fn test_execute_sets_raw_mode_around_run() {
        let mut fake = FakeEmulator::new(&[0xF025]);
        fake.run().unwrap();
        let events = fake.host().events();
        assert_eq!(events.first(), Some(&HostEvent::RawMode));
        assert_eq!(events.last(), Some(&HostEvent::RestoreMode));
    }
    #[gtest]
    pub fn test_execute_restores_mode_on_error() {
        let mut emu = Emulator::new();
        emu.load(0x3000, &[0xF020]).unwrap(); // GETC without input
        let mut host = BufferedHost::new();
        let res = emu.execute(&mut host);
        assert!(res.is_err());
        assert_eq!(host.events(), &[HostEvent::RawMode, HostEvent::RestoreMode]);
        expect_that!(emu.is_running(), eq(false));
    }
    #[gtest]
    pub fn test_execute_in_and_out() {
        // IN, OUT, HALT
        let mut fake = FakeEmulator::new(&[0xF023, 0xF021, 0xF025]);
        fake.add_stdin_input(b"z");
        fake.run().unwrap();
        expect_that!(
            fake.host().output_string(),
            eq("Enter a character: zz\nHALT\n")
        );
        expect_that!(fake.emulator().read_reg(0), eq(u16::from(b'z')));
    }
    #[gtest]
    pub fn test_trap_saves_return_address() {
        let mut fake = FakeEmulator::new(&[0xF025]);
        fake.run().unwrap();
        expect_that!(fake.emulator().read_reg(7), eq(0x3001));
    }
    #[gtest]
    pub fn test_unused_opcodes_are_reported() {
        // RTI, RES, HALT
        let mut fake = FakeEmulator::new(&[0x8000, 0xD123, 0xF025]);
        fake.run().unwrap();
        let emu = fake.emulator();
        assert_eq!(
            emu.diagnostics(),
            &[
                Diagnostic::UnusedOpcode {
                    opcode: 0x8,
                    instruction: 0x8000,
                    address: 0x3000
                },
                Diagnostic::UnusedOpcode {
                    opcode: 0xD,
                    instruction: 0xD123,
                    address: 0x3001
                },
            ]
        );
        expect_that!(emu.pc(), eq(0x3003));
    }
    #[gtest]
    pub fn test_unknown_trap_is_reported() {
        let mut fake = FakeEmulator::new(&[0xF0FF, 0xF025]);
        fake.run().unwrap();
        assert_eq!(
            fake.emulator().diagnostics(),
            &[Diagnostic::UnknownTrapVector {
                vector: 0xFF,
                address: 0x3000
            }]
        );
    }
    #[gtest]
    pub fn test_diagnostics_are_capped() {
        // a run of RES words followed by HALT
        let mut emu = Emulator::new();
        let rounds = MAX_DIAGNOSTICS + 10;
        let mut program = vec![0xD000u16; rounds];
        program.push(0xF025);
        emu.load(0x3000, &program).unwrap();
        emu.execute(&mut BufferedHost::new()).unwrap();
        expect_that!(emu.diagnostics().len(), eq(MAX_DIAGNOSTICS));
        expect_that!(emu.dropped_diagnostics(), eq(10));
        assert_eq!(
            emu.diagnostics().last(),
            Some(&Diagnostic::UnusedOpcode {
                opcode: 0xD,
                instruction: 0xD000,
                address: 0x3000 + 255
            })
        );
        emu.reset();
        expect_that!(emu.dropped_diagnostics(), eq(0));
    }
    #[gtest]
    pub fn test_reset_keeps_memory() {
        let mut fake = FakeEmulator::new(&[0x1225, 0xF025]);
        fake.emulator().write_reg(0, 10);
        fake.emulator().set_entry_point(0x4000);
        fake.run().unwrap();
        let emu = fake.emulator();
        emu.reset();
        expect_that!(emu.read_reg(1), eq(0));
        expect_that!(emu.entry_point(), eq(0x3000));
        expect_that!(emu.read_mem(0x3000), eq(0x1225));
        expect_that!(emu.current_instruction().is_none(), eq(true));
        expect_that!(emu.diagnostics().len(), eq(0));
    }
    #[gtest]
    pub fn test_stop_before_execute_is_overridden() {
        let mut fake = FakeEmulator::new(&[0xF025]);
        fake.emulator().stop();
        fake.run().unwrap();
        expect_that!(fake.host().output_string(), eq(HALT_MESSAGE));
    }
    #[gtest]
    pub fn test_stop_handle_ends_loop() {
        // BRnzp -1: endless loop, polls the keyboard status each round through LDI
        let mut emu = Emulator::new();
        emu.load(0x3000, &[0xA001, 0x0FFE, 0xFE00]).unwrap();
        let handle = emu.stop_handle();
        let worker = std::thread::spawn(move || {
            let mut host = BufferedHost::new();
            let res = emu.execute(&mut host);
            (emu, res)
        });
        while !worker.is_finished() {
            std::thread::sleep(std::time::Duration::from_millis(5));
            handle.stop();
        }
        let (emu, res) = worker.join().unwrap();
        assert!(res.is_ok());
        expect_that!(emu.is_running(), eq(false));
    }
}

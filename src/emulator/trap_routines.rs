//! Service routines selected by the `TRAP` instruction, run directly on the host.
use crate::errors::ExecutionError;
use crate::hardware::memory::Memory;
use crate::hardware::registers::{Registers, from_binary};
use crate::host::HostIo;
use std::io;
use std::ops::ControlFlow;

/// Trap vectors of the standard service routines.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, enumn::N)]
pub enum TrapVector {
    GetC = 0x20,
    Out = 0x21,
    PutS = 0x22,
    In = 0x23,
    PutSp = 0x24,
    Halt = 0x25,
}

pub const IN_PROMPT: &str = "Enter a character: ";
pub const HALT_MESSAGE: &str = "\nHALT\n";

type TrapResult = ControlFlow<Result<(), ExecutionError>>;

/// GETC: Read a single character from the keyboard. The character is not echoed onto the console.
///
/// Its ASCII code is copied into R0. The high eight bits of R0 are cleared.
/// The condition flags are left unchanged.
pub fn get_c<H: HostIo + ?Sized>(regs: &mut Registers, host: &mut H) -> TrapResult {
    match host.getc() {
        Ok(b) => {
            regs.set(0, from_binary(u16::from(b)));
            ControlFlow::Continue(())
        }
        Err(e) => wrap_io_error_in_cf(e),
    }
}

/// IN: Print a prompt on the screen and read a single character echoed back from the keyboard.
///
/// Otherwise, like 0x20 GETC.
pub fn in_trap<H: HostIo + ?Sized>(regs: &mut Registers, host: &mut H) -> TrapResult {
    write_str_out(IN_PROMPT, host)?;
    get_c(regs, host)?;
    #[expect(
        clippy::cast_possible_truncation,
        reason = "R0 holds the byte just read"
    )]
    let echo = regs.get(0).as_binary() as u8;
    io_to_cf(host.putc(echo).and_then(|()| host.flush()))
}

/// OUT: Write a character in R0[7:0] to the console display.
pub fn out<H: HostIo + ?Sized>(regs: &Registers, host: &mut H) -> TrapResult {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "Truncation is what is expected here"
    )]
    let c = regs.get(0).as_binary() as u8;
    io_to_cf(host.putc(c).and_then(|()| host.flush()))
}

fn put_one_char_per_u16<H: HostIo + ?Sized>(
    input: u16,
    host: &mut H,
) -> io::Result<ControlFlow<()>> {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "Truncation is what is expected here"
    )]
    let c = input as u8;
    host.putc(c)?;
    Ok(ControlFlow::Continue(()))
}

fn put_two_chars_per_u16<H: HostIo + ?Sized>(
    input: u16,
    host: &mut H,
) -> io::Result<ControlFlow<()>> {
    let [high, low] = input.to_be_bytes();
    host.putc(low)?;
    if high == 0 {
        return Ok(ControlFlow::Break(()));
    }
    host.putc(high)?;
    Ok(ControlFlow::Continue(()))
}

fn put<H: HostIo + ?Sized>(
    regs: &Registers,
    mem: &mut Memory,
    host: &mut H,
    handle_word: fn(u16, &mut H) -> io::Result<ControlFlow<()>>,
) -> TrapResult {
    let result = (|| {
        let mut address = regs.get(0).as_binary();
        // at most one pass over the whole address space
        for _ in 0..=u16::MAX {
            let word = mem.read(address, host)?;
            if word == 0 || handle_word(word, host)?.is_break() {
                break;
            }
            address = address.wrapping_add(1);
        }
        host.flush()
    })();
    io_to_cf(result)
}

/// PUTS: print null-delimited char* from register 0's address
pub fn put_s<H: HostIo + ?Sized>(regs: &Registers, mem: &mut Memory, host: &mut H) -> TrapResult {
    put(regs, mem, host, put_one_char_per_u16)
}

/// PUTSP: Packed version of PUTS
///
/// The ASCII code contained in bits [7:0] of a memory location is written to the console first.
/// The second character of the last memory location can be 0x00, which ends the output.
/// Writing also terminates with a 0x0000 word.
pub fn put_sp<H: HostIo + ?Sized>(
    regs: &Registers,
    mem: &mut Memory,
    host: &mut H,
) -> TrapResult {
    put(regs, mem, host, put_two_chars_per_u16)
}

/// HALT: End program and print a message
pub fn halt<H: HostIo + ?Sized>(host: &mut H) -> TrapResult {
    write_str_out(HALT_MESSAGE, host)?;
    ControlFlow::Break(Ok(()))
}

fn write_str_out<H: HostIo + ?Sized>(message: &str, host: &mut H) -> TrapResult {
    io_to_cf(host.write_str(message).and_then(|()| host.flush()))
}

pub(super) fn io_to_cf(result: io::Result<()>) -> TrapResult {
    match result {
        Ok(()) => ControlFlow::Continue(()),
        Err(e) => wrap_io_error_in_cf(e),
    }
}

fn wrap_io_error_in_cf(error: io::Error) -> TrapResult {
    ControlFlow::Break(Err(ExecutionError::from(error)))
}

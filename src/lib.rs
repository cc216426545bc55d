//! # LC-3 Virtual Machine.
//!
//! `lc3-vm` executes programs for the LC-3 (Little Computer 3).
//! Usage starts with loading a program, e.g. via [`emulator::from_program`], and running it with
//! a [`host::HostIo`] implementation providing console I/O.
//!
//!  # Example
//! ```
//! use lc3_vm::emulator::Emulator;
//! use lc3_vm::host::BufferedHost;
//!
//! let mut emu = Emulator::new();
//! // ADD R1, R0, #5; HALT
//! emu.load_program(&[0x3000, 0x1225, 0xF025]).unwrap();
//! emu.write_reg(0, 10);
//! let mut host = BufferedHost::new();
//! emu.execute(&mut host).unwrap();
//! assert_eq!(emu.read_reg(1), 15);
//! ```
//! # Errors
//! - Program is missing valid .ORIG header (because it is shorter than one `u16` instruction)
//! - Program too long to fit into memory from its origin
//! - Reading from or writing to the console failed while executing

pub mod emulator;
pub mod errors;
pub mod hardware;
pub mod host;
pub(crate) mod numbers;
pub mod terminal;

pub use numbers::sign_extend;

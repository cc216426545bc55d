//! The contract between the virtual machine and whatever provides console I/O.
//!
//! The machine only borrows a [`HostIo`] for the duration of
//! [`Emulator::execute`](crate::emulator::Emulator::execute) and never keeps it.
use std::collections::VecDeque;
use std::io;

/// Console I/O as needed by the trap routines and the memory mapped keyboard registers.
pub trait HostIo {
    /// Checks if input is available, does not block.
    ///
    /// # Errors
    /// - reading from the underlying input failed
    fn key_ready(&mut self) -> io::Result<bool>;
    /// Reads one byte, blocking until one is available.
    ///
    /// # Errors
    /// - reading from the underlying input failed or input is exhausted
    fn getc(&mut self) -> io::Result<u8>;
    /// Writes one byte, which may be buffered until [`HostIo::flush`].
    ///
    /// # Errors
    /// - writing to the underlying output failed
    fn putc(&mut self, byte: u8) -> io::Result<()>;
    /// # Errors
    /// - writing to the underlying output failed
    fn flush(&mut self) -> io::Result<()>;
    /// Writes a message from the machine itself, e.g. prompts.
    ///
    /// # Errors
    /// - writing to the underlying output failed
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        s.bytes().try_for_each(|b| self.putc(b))
    }
    /// Switches the console to unbuffered input without echo.
    ///
    /// # Errors
    /// - the console mode could not be changed
    fn set_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }
    /// Undoes [`HostIo::set_raw_mode`].
    ///
    /// # Errors
    /// - the console mode could not be changed
    fn restore_mode(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Everything a [`BufferedHost`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Put(u8),
    Flush,
    RawMode,
    RestoreMode,
}

/// In-memory host with scripted input, recording all output.
///
/// Meant for harnesses and tests where no terminal is available.
#[derive(Debug, Default)]
pub struct BufferedHost {
    input: VecDeque<u8>,
    events: Vec<HostEvent>,
    fail_output: bool,
}

impl BufferedHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }
    /// Makes every following output operation fail.
    #[must_use]
    pub const fn failing_output(mut self) -> Self {
        self.fail_output = true;
        self
    }
    pub fn push_input(&mut self, input: &[u8]) {
        self.input.extend(input);
    }
    /// All bytes written so far.
    #[must_use]
    pub fn output(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Put(b) => Some(*b),
                _ => None,
            })
            .collect()
    }
    /// All bytes written so far, lossily decoded.
    #[must_use]
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }
    #[must_use]
    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }
    #[must_use]
    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
    fn check_output(&self) -> io::Result<()> {
        if self.fail_output {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "output closed"))
        } else {
            Ok(())
        }
    }
}

impl HostIo for BufferedHost {
    fn key_ready(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }
    fn getc(&mut self) -> io::Result<u8> {
        self.input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"))
    }
    fn putc(&mut self, byte: u8) -> io::Result<()> {
        self.check_output()?;
        self.events.push(HostEvent::Put(byte));
        Ok(())
    }
    fn flush(&mut self) -> io::Result<()> {
        self.check_output()?;
        self.events.push(HostEvent::Flush);
        Ok(())
    }
    fn set_raw_mode(&mut self) -> io::Result<()> {
        self.events.push(HostEvent::RawMode);
        Ok(())
    }
    fn restore_mode(&mut self) -> io::Result<()> {
        self.events.push(HostEvent::RestoreMode);
        Ok(())
    }
}

//! [`HostIo`] on the real terminal, using crossterm for raw mode and key events.
use crate::host::HostIo;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use std::io;
use std::io::{Stdout, Write, stdout};
use std::time::Duration;

/// Keyboard from crossterm key events, display on a writer, usually stdout.
pub struct TerminalHost<W: Write = Stdout> {
    out: W,
    pending: Option<u8>,
    is_raw: bool,
}

impl Default for TerminalHost<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalHost<Stdout> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(stdout())
    }
}

impl<W: Write> TerminalHost<W> {
    pub const fn with_writer(out: W) -> Self {
        Self {
            out,
            pending: None,
            is_raw: false,
        }
    }

    /// Translates a key press into the byte an LC-3 program expects.
    ///
    /// # Errors
    /// - `Interrupted` for CTRL-C, which in raw mode does not raise a signal
    fn byte_from_event(event: &Event) -> io::Result<Option<u8>> {
        let Some(key) = event.as_key_press_event() else {
            return Ok(None);
        };
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "CTRL-C pressed"));
        }
        Ok(match key.code {
            KeyCode::Enter => Some(b'\n'),
            KeyCode::Tab => Some(b'\t'),
            KeyCode::Backspace => Some(0x08),
            KeyCode::Esc => Some(0x1B),
            KeyCode::Char(c) => u8::try_from(c).ok().filter(u8::is_ascii),
            _ => None,
        })
    }
}

impl<W: Write> HostIo for TerminalHost<W> {
    fn key_ready(&mut self) -> io::Result<bool> {
        while self.pending.is_none() && event::poll(Duration::from_secs(0))? {
            self.pending = Self::byte_from_event(&event::read()?)?;
        }
        Ok(self.pending.is_some())
    }
    fn getc(&mut self) -> io::Result<u8> {
        if let Some(b) = self.pending.take() {
            return Ok(b);
        }
        self.out.flush()?;
        loop {
            if let Some(b) = Self::byte_from_event(&event::read()?)? {
                return Ok(b);
            }
        }
    }
    fn putc(&mut self, byte: u8) -> io::Result<()> {
        if byte == b'\n' && self.is_raw {
            // raw mode does not return the carriage on its own
            self.out.write_all(b"\r\n")
        } else {
            self.out.write_all(&[byte])
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
    fn set_raw_mode(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.is_raw = true;
        Ok(())
    }
    fn restore_mode(&mut self) -> io::Result<()> {
        if self.is_raw {
            self.is_raw = false;
            terminal::disable_raw_mode()?;
        }
        self.out.flush()
    }
}

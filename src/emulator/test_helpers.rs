use crate::emulator::Emulator;
use crate::errors::ExecutionError;
use crate::host::BufferedHost;

/// An emulator with a program at `0x3000` and an in-memory host.
pub struct FakeEmulator {
    inner: Emulator,
    host: BufferedHost,
}
impl FakeEmulator {
    pub fn new(program_no_header: &[u16]) -> Self {
        let mut program = Vec::with_capacity(program_no_header.len() + 1);
        program.push(0x3000u16);
        program.extend_from_slice(program_no_header);

        let mut emu = Emulator::new();
        emu.load_program(&program).unwrap();
        Self {
            inner: emu,
            host: BufferedHost::new(),
        }
    }
    pub fn add_stdin_input(&mut self, input: &[u8]) -> &mut Self {
        self.host.push_input(input);
        self
    }
    pub const fn emulator(&mut self) -> &mut Emulator {
        &mut self.inner
    }
    pub const fn host(&self) -> &BufferedHost {
        &self.host
    }
    pub fn run(&mut self) -> Result<(), ExecutionError> {
        self.inner.execute(&mut self.host)
    }
}

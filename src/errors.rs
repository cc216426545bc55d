use displaydoc::Display;
use std::error::Error;
use std::io;

/// Errors while turning an object file into memory contents.
#[derive(Display, Debug, PartialEq, Eq)]
pub enum LoadProgramError {
    /// Program too long, got {actual_instructions:?} u16 instructions while limit is {maximum_instructions:?}
    ProgramTooLong {
        actual_instructions: usize,
        maximum_instructions: usize,
    },
    /// Program is missing valid .ORIG header
    ProgramMissingOrigHeader,
    /// Program has an odd number of bytes ({0}), it must consist of big-endian u16 words
    ProgramNotWordAligned(usize),
    /// Error reading program file {file}: {message}
    ProgramFileReadError { file: String, message: String },
}
impl Error for LoadProgramError {}

/// Fatal errors while running a program.
#[derive(Display, Debug, PartialEq, Eq)]
pub enum ExecutionError {
    /// Error during reading Stdin or writing program output to Stdout: {0}
    IOInputOutputError(String),
    /// Execution interrupted by user
    Interrupted,
}
impl Error for ExecutionError {}

impl From<io::Error> for ExecutionError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::Interrupted {
            Self::Interrupted
        } else {
            Self::IOInputOutputError(error.to_string())
        }
    }
}

//! Reading LC-3 object files: big-endian `u16` words, the first one is the `.ORIG` address.
use crate::errors::LoadProgramError;
use std::fs;
use std::path::Path;

/// A program split into its origin and the words to place there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub origin: u16,
    pub words: Vec<u16>,
}

impl ProgramImage {
    /// Splits a program with `.ORIG` header into origin and content.
    ///
    /// # Errors
    /// - Program is missing valid .ORIG header
    pub fn from_words(program: &[u16]) -> Result<Self, LoadProgramError> {
        let (origin, rest) = program
            .split_first()
            .ok_or(LoadProgramError::ProgramMissingOrigHeader)?;
        Ok(Self {
            origin: *origin,
            words: rest.to_vec(),
        })
    }

    /// Parses the content of an object file.
    ///
    /// # Errors
    /// - Program has an odd number of bytes
    /// - Program is missing valid .ORIG header
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadProgramError> {
        if bytes.len() % 2 != 0 {
            return Err(LoadProgramError::ProgramNotWordAligned(bytes.len()));
        }
        let words: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        Self::from_words(&words)
    }

    /// Reads and parses an object file.
    ///
    /// # Errors
    /// - File cannot be read
    /// - See [`ProgramImage::from_bytes`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadProgramError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| LoadProgramError::ProgramFileReadError {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;
        log::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_from_bytes() {
        let image = ProgramImage::from_bytes(&[0x30, 0x00, 0xF0, 0x25, 0x12, 0x34]).unwrap();
        expect_that!(image.origin, eq(0x3000));
        assert_eq!(image.words, vec![0xF025, 0x1234]);
    }

    #[gtest]
    fn test_from_bytes_header_only() {
        let image = ProgramImage::from_bytes(&[0x40, 0x00]).unwrap();
        expect_that!(image.origin, eq(0x4000));
        expect_that!(image.words.len(), eq(0));
    }

    #[gtest]
    fn test_from_bytes_empty() {
        let err = ProgramImage::from_bytes(&[]).unwrap_err();
        assert_eq!(err, LoadProgramError::ProgramMissingOrigHeader);
    }

    #[gtest]
    fn test_from_bytes_odd_length() {
        let err = ProgramImage::from_bytes(&[0x30, 0x00, 0xF0]).unwrap_err();
        assert_eq!(err, LoadProgramError::ProgramNotWordAligned(3));
    }

    #[gtest]
    fn test_from_missing_file() {
        let err = ProgramImage::from_file("does/not/exist.obj").unwrap_err();
        expect_that!(
            err.to_string(),
            starts_with("Error reading program file does/not/exist.obj: ")
        );
    }
}

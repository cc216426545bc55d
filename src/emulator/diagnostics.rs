use displaydoc::Display;

/// Non-fatal anomalies seen while executing. Execution continues after each of them.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// Unused opcode {opcode:#X} in instruction {instruction:#06X} at {address:#06X} ignored
    UnusedOpcode {
        opcode: u8,
        instruction: u16,
        address: u16,
    },
    /// Unknown trap vector {vector:#04X} at {address:#06X} ignored
    UnknownTrapVector { vector: u8, address: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_diagnostic_messages() {
        let d = Diagnostic::UnusedOpcode {
            opcode: 0xD,
            instruction: 0xD000,
            address: 0x3000,
        };
        expect_that!(
            d.to_string(),
            eq("Unused opcode 0xD in instruction 0xD000 at 0x3000 ignored")
        );
        let d = Diagnostic::UnknownTrapVector {
            vector: 0x30,
            address: 0x3001,
        };
        expect_that!(
            d.to_string(),
            eq("Unknown trap vector 0x30 at 0x3001 ignored")
        );
    }
}

use crate::hardware::memory::PROGRAM_SECTION_START;
use crate::numbers;
use std::fmt::{Debug, Formatter};

/// Number of general purpose registers `R0` to `R7`.
pub const GENERAL_PURPOSE_REGISTER_COUNT: u8 = 8;

/// Content of one 16 bit register, viewable as raw bits or as two's complement number.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct Register(u16);

impl Register {
    #[must_use]
    pub const fn from_binary(value: u16) -> Self {
        Self(value)
    }
    #[must_use]
    pub const fn from_decimal(value: i16) -> Self {
        Self(value.cast_unsigned())
    }
    #[must_use]
    pub const fn as_binary(self) -> u16 {
        self.0
    }
    #[must_use]
    pub const fn as_decimal(self) -> i16 {
        numbers::twos_complement_to_decimal(self.0)
    }
}

impl Debug for Register {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X} ({})", self.0, self.as_decimal())
    }
}

#[must_use]
pub const fn from_binary(value: u16) -> Register {
    Register::from_binary(value)
}
#[must_use]
pub const fn from_decimal(value: i16) -> Register {
    Register::from_decimal(value)
}

/// Register file of the LC-3: `R0` to `R7`, the program counter and the condition register.
#[derive(Clone, PartialEq, Eq)]
pub struct Registers {
    general_purpose: [Register; GENERAL_PURPOSE_REGISTER_COUNT as usize],
    pc: Register,
    cond: ConditionFlag,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            general_purpose: [Register(0); GENERAL_PURPOSE_REGISTER_COUNT as usize],
            pc: Register(PROGRAM_SECTION_START),
            cond: ConditionFlag::Zero,
        }
    }

    /// # Panics
    /// - `r` is not a general purpose register number
    #[must_use]
    pub fn get(&self, r: u8) -> Register {
        assert!(
            r < GENERAL_PURPOSE_REGISTER_COUNT,
            "Invalid general purpose register get: R{r}"
        );
        self.general_purpose[usize::from(r)]
    }
    /// # Panics
    /// - `r` is not a general purpose register number
    pub fn set(&mut self, r: u8, value: Register) {
        assert!(
            r < GENERAL_PURPOSE_REGISTER_COUNT,
            "Invalid general purpose register set: R{r}"
        );
        self.general_purpose[usize::from(r)] = value;
    }
    #[must_use]
    pub const fn pc(&self) -> Register {
        self.pc
    }
    pub const fn set_pc(&mut self, value: u16) {
        self.pc = Register(value);
    }
    /// Advances the PC past the fetched instruction, wrapping at the end of memory.
    pub const fn increment_pc(&mut self) {
        self.pc = Register(self.pc.0.wrapping_add(1));
    }

    #[must_use]
    pub const fn get_conditional_register(&self) -> ConditionFlag {
        self.cond
    }
    pub const fn set_conditional_register(&mut self, cond: ConditionFlag) {
        self.cond = cond;
    }
    /// Sets the condition register from the sign of the value now held in `r`.
    pub fn update_conditional_register(&mut self, r: u8) {
        self.cond = ConditionFlag::from(self.get(r).as_binary());
    }
}

impl Debug for Registers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registers")
            .field("r", &self.general_purpose)
            .field("pc", &self.pc)
            .field("cond", &self.cond)
            .finish()
    }
}

/// Condition flags, exactly one of them is set at any time.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, enumn::N)]
pub enum ConditionFlag {
    Pos = 1 << 0, // Positive
    Zero = 1 << 1,
    Neg = 1 << 2, // Negative
}

impl ConditionFlag {
    /// Bit pattern as used by the `nzp` field of `BR`.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self as u16
    }
}

impl From<u16> for ConditionFlag {
    fn from(value: u16) -> Self {
        if value == 0 {
            Self::Zero
        } else if value >> 15 == 1 {
            // leftmost bit is 1 for negative numbers
            Self::Neg
        } else {
            Self::Pos
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_new_registers() {
        let regs = Registers::new();
        for r in 0..GENERAL_PURPOSE_REGISTER_COUNT {
            expect_that!(regs.get(r), eq(from_binary(0)));
        }
        expect_that!(regs.pc(), eq(from_binary(0x3000)));
        expect_that!(regs.get_conditional_register(), eq(ConditionFlag::Zero));
    }

    #[yare::parameterized(
        zero = { 0, ConditionFlag::Zero },
        one = { 1, ConditionFlag::Pos },
        largest_positive = { 0x7FFF, ConditionFlag::Pos },
        smallest_negative = { 0x8000, ConditionFlag::Neg },
        minus_one = { 0xFFFF, ConditionFlag::Neg },
    )]
    fn test_update_conditional_register(value: u16, expected: ConditionFlag) {
        let mut regs = Registers::new();
        regs.set(3, from_binary(value));
        regs.update_conditional_register(3);
        assert_that!(regs.get_conditional_register(), eq(expected));
        assert_that!(regs.get_conditional_register().bits().count_ones(), eq(1));
    }

    #[gtest]
    fn test_condition_flag_bits() {
        expect_that!(ConditionFlag::Pos.bits(), eq(1));
        expect_that!(ConditionFlag::Zero.bits(), eq(2));
        expect_that!(ConditionFlag::Neg.bits(), eq(4));
        expect_that!(ConditionFlag::n(4), eq(Some(ConditionFlag::Neg)));
        expect_that!(ConditionFlag::n(3), eq(None));
    }

    #[gtest]
    fn test_increment_pc_wraps() {
        let mut regs = Registers::new();
        regs.set_pc(0xFFFF);
        regs.increment_pc();
        expect_that!(regs.pc().as_binary(), eq(0));
    }

    #[gtest]
    fn test_register_views() {
        let r = from_decimal(-128);
        expect_that!(r.as_binary(), eq(0b1111_1111_1000_0000));
        expect_that!(r.as_decimal(), eq(-128));
        expect_that!(format!("{r:?}"), eq("0xFF80 (-128)"));
    }

    #[gtest]
    #[should_panic(expected = "Invalid general purpose register get: R8")]
    fn test_get_invalid_register() {
        let _ = Registers::new().get(8);
    }
}

//! Machine state of the LC-3: the register file and the 16 bit address space.
pub mod memory;
pub mod registers;

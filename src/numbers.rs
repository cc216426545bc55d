//! Bit level helpers shared by the decoder and the executor.

/// Implements sign extension as described at [Sign extension](https://en.wikipedia.org/wiki/Sign_extension).
///
/// The low `valid_bits` bits of `bits` are kept, bit `valid_bits - 1` is replicated into
/// all higher bits. Bits above `valid_bits` in the input are ignored.
///
/// # Panics
/// - debug asserts that `valid_bits` is in `1..=16`
#[must_use]
pub const fn sign_extend(bits: u16, valid_bits: u8) -> u16 {
    debug_assert!(valid_bits >= 1 && valid_bits <= 16);
    if valid_bits >= 16 {
        return bits;
    }
    let bits = bits & ((1 << valid_bits) - 1);
    if (bits >> (valid_bits - 1)) & 1 == 1 {
        // negative: 1-extend
        bits | (0xFFFF << valid_bits)
    } else {
        // positive, already 0-extended
        bits
    }
}

/// Gives the value of only the bits `from..=to` of `bits`, shifted down to bit 0.
///
/// # Panics
/// - debug asserts that `to` is greater or equal `from` and both are valid indexes
#[must_use]
pub fn bit_range(bits: u16, from: u8, to: u8) -> u16 {
    debug_assert!(
        to >= from,
        "wrong direction of from: {from:?} and to: {to:?}"
    );
    debug_assert!(
        (0..u16::BITS).contains(&u32::from(to)),
        "index: {to:?} to u16 is greater than maximum value {:?}",
        u16::BITS - 1
    );
    let width = u32::from(to - from) + 1;
    let mask = if width >= u16::BITS {
        0xFFFF
    } else {
        (1u16 << width) - 1
    };
    (bits >> from) & mask
}

/// Interprets a 16 bit word as two's complement number.
#[must_use]
pub const fn twos_complement_to_decimal(bin_rep: u16) -> i16 {
    bin_rep.cast_signed()
}

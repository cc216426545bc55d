use lc3_vm::emulator::Emulator;
use lc3_vm::host::BufferedHost;
use lc3_vm::sign_extend;
use proptest::prelude::*;

const HALT: u16 = 0xF025;

fn execute(program: &[u16], registers: &[(u8, u16)]) -> Emulator {
    let mut emu = Emulator::new();
    emu.load(0x3000, program).unwrap();
    for (r, value) in registers {
        emu.write_reg(*r, *value);
    }
    emu.execute(&mut BufferedHost::new()).unwrap();
    emu
}

proptest! {
    #[test]
    fn add_registers_is_modular(a in any::<u16>(), b in any::<u16>()) {
        // ADD R3, R1, R2
        let emu = execute(&[0x1642, HALT], &[(1, a), (2, b)]);
        prop_assert_eq!(emu.read_reg(3), a.wrapping_add(b));
    }

    #[test]
    fn flags_are_exclusive(
        value in any::<u16>(),
        opcode in prop::sample::select(vec![0x1220u16, 0x5260, 0x927F]),
    ) {
        // ADD R1, R0, #0 / AND R1, R1, #0 / NOT R1, R1
        let emu = execute(&[opcode, HALT], &[(0, value), (1, value)]);
        prop_assert_eq!(emu.cond().bits().count_ones(), 1);
    }

    #[test]
    fn add_immediate_matches_sign_extension(a in any::<u16>(), imm5 in 0u16..32) {
        // ADD R1, R0, #imm5
        let emu = execute(&[0x1220 | imm5, HALT], &[(0, a)]);
        prop_assert_eq!(emu.read_reg(1), a.wrapping_add(sign_extend(imm5, 5)));
    }
}

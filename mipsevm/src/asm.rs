//! A tiny MIPS32 encoder for writing test programs by hand.
//!
//! Operands follow assembler order, e.g. `addiu(rt, rs, imm)` is
//! `addiu $rt, $rs, imm`.

/// A register number.
pub type Reg = u32;

/// `$zero`.
pub const ZERO: Reg = 0;
/// `$v0`.
pub const V0: Reg = 2;
/// `$a0`.
pub const A0: Reg = 4;
/// `$a1`.
pub const A1: Reg = 5;
/// `$a2`.
pub const A2: Reg = 6;
/// `$t0`.
pub const T0: Reg = 8;
/// `$t1`.
pub const T1: Reg = 9;
/// `$t2`.
pub const T2: Reg = 10;
/// `$s0`.
pub const S0: Reg = 16;
/// `$ra`.
pub const RA: Reg = 31;

/// Encodes an R-type (SPECIAL) instruction.
pub const fn special(funct: u32, rs: Reg, rt: Reg, rd: Reg, shamt: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | funct
}

/// Encodes a SPECIAL2 instruction.
pub const fn special2(funct: u32, rs: Reg, rt: Reg, rd: Reg) -> u32 {
    (0x1c << 26) | special(funct, rs, rt, rd, 0)
}

/// Encodes an I-type instruction.
pub const fn itype(op: u32, rs: Reg, rt: Reg, imm: u16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | imm as u32
}

#[allow(missing_docs)]
pub mod ops {
    use super::{itype, special, special2, Reg};

    pub const fn nop() -> u32 {
        0
    }
    pub const fn sll(rd: Reg, rt: Reg, sa: u32) -> u32 {
        special(0x00, 0, rt, rd, sa)
    }
    pub const fn srl(rd: Reg, rt: Reg, sa: u32) -> u32 {
        special(0x02, 0, rt, rd, sa)
    }
    pub const fn sra(rd: Reg, rt: Reg, sa: u32) -> u32 {
        special(0x03, 0, rt, rd, sa)
    }
    pub const fn sllv(rd: Reg, rt: Reg, rs: Reg) -> u32 {
        special(0x04, rs, rt, rd, 0)
    }
    pub const fn jr(rs: Reg) -> u32 {
        special(0x08, rs, 0, 0, 0)
    }
    pub const fn jalr(rd: Reg, rs: Reg) -> u32 {
        special(0x09, rs, 0, rd, 0)
    }
    pub const fn movz(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x0a, rs, rt, rd, 0)
    }
    pub const fn movn(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x0b, rs, rt, rd, 0)
    }
    pub const fn syscall() -> u32 {
        special(0x0c, 0, 0, 0, 0)
    }
    pub const fn mfhi(rd: Reg) -> u32 {
        special(0x10, 0, 0, rd, 0)
    }
    pub const fn mflo(rd: Reg) -> u32 {
        special(0x12, 0, 0, rd, 0)
    }
    pub const fn mult(rs: Reg, rt: Reg) -> u32 {
        special(0x18, rs, rt, 0, 0)
    }
    pub const fn multu(rs: Reg, rt: Reg) -> u32 {
        special(0x19, rs, rt, 0, 0)
    }
    pub const fn div(rs: Reg, rt: Reg) -> u32 {
        special(0x1a, rs, rt, 0, 0)
    }
    pub const fn divu(rs: Reg, rt: Reg) -> u32 {
        special(0x1b, rs, rt, 0, 0)
    }
    pub const fn add(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x20, rs, rt, rd, 0)
    }
    pub const fn addu(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x21, rs, rt, rd, 0)
    }
    pub const fn subu(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x23, rs, rt, rd, 0)
    }
    pub const fn and(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x24, rs, rt, rd, 0)
    }
    pub const fn or(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x25, rs, rt, rd, 0)
    }
    pub const fn xor(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x26, rs, rt, rd, 0)
    }
    pub const fn nor(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x27, rs, rt, rd, 0)
    }
    pub const fn slt(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x2a, rs, rt, rd, 0)
    }
    pub const fn sltu(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special(0x2b, rs, rt, rd, 0)
    }
    pub const fn bltz(rs: Reg, offset: i16) -> u32 {
        itype(0x01, rs, 0x00, offset as u16)
    }
    pub const fn bgezal(rs: Reg, offset: i16) -> u32 {
        itype(0x01, rs, 0x11, offset as u16)
    }
    pub const fn j(target: u32) -> u32 {
        (0x02 << 26) | ((target >> 2) & 0x03ff_ffff)
    }
    pub const fn jal(target: u32) -> u32 {
        (0x03 << 26) | ((target >> 2) & 0x03ff_ffff)
    }
    pub const fn beq(rs: Reg, rt: Reg, offset: i16) -> u32 {
        itype(0x04, rs, rt, offset as u16)
    }
    pub const fn bne(rs: Reg, rt: Reg, offset: i16) -> u32 {
        itype(0x05, rs, rt, offset as u16)
    }
    pub const fn blez(rs: Reg, offset: i16) -> u32 {
        itype(0x06, rs, 0, offset as u16)
    }
    pub const fn bgtz(rs: Reg, offset: i16) -> u32 {
        itype(0x07, rs, 0, offset as u16)
    }
    pub const fn addi(rt: Reg, rs: Reg, imm: i16) -> u32 {
        itype(0x08, rs, rt, imm as u16)
    }
    pub const fn addiu(rt: Reg, rs: Reg, imm: i16) -> u32 {
        itype(0x09, rs, rt, imm as u16)
    }
    pub const fn slti(rt: Reg, rs: Reg, imm: i16) -> u32 {
        itype(0x0a, rs, rt, imm as u16)
    }
    pub const fn sltiu(rt: Reg, rs: Reg, imm: i16) -> u32 {
        itype(0x0b, rs, rt, imm as u16)
    }
    pub const fn andi(rt: Reg, rs: Reg, imm: u16) -> u32 {
        itype(0x0c, rs, rt, imm)
    }
    pub const fn ori(rt: Reg, rs: Reg, imm: u16) -> u32 {
        itype(0x0d, rs, rt, imm)
    }
    pub const fn xori(rt: Reg, rs: Reg, imm: u16) -> u32 {
        itype(0x0e, rs, rt, imm)
    }
    pub const fn lui(rt: Reg, imm: u16) -> u32 {
        itype(0x0f, 0, rt, imm)
    }
    pub const fn mul(rd: Reg, rs: Reg, rt: Reg) -> u32 {
        special2(0x02, rs, rt, rd)
    }
    pub const fn clz(rd: Reg, rs: Reg) -> u32 {
        special2(0x20, rs, 0, rd)
    }
    pub const fn clo(rd: Reg, rs: Reg) -> u32 {
        special2(0x21, rs, 0, rd)
    }
    pub const fn lb(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x20, base, rt, offset as u16)
    }
    pub const fn lh(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x21, base, rt, offset as u16)
    }
    pub const fn lwl(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x22, base, rt, offset as u16)
    }
    pub const fn lw(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x23, base, rt, offset as u16)
    }
    pub const fn lbu(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x24, base, rt, offset as u16)
    }
    pub const fn lhu(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x25, base, rt, offset as u16)
    }
    pub const fn lwr(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x26, base, rt, offset as u16)
    }
    pub const fn sb(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x28, base, rt, offset as u16)
    }
    pub const fn sh(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x29, base, rt, offset as u16)
    }
    pub const fn swl(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x2a, base, rt, offset as u16)
    }
    pub const fn sw(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x2b, base, rt, offset as u16)
    }
    pub const fn swr(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x2e, base, rt, offset as u16)
    }
    pub const fn ll(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x30, base, rt, offset as u16)
    }
    pub const fn sc(rt: Reg, offset: i16, base: Reg) -> u32 {
        itype(0x38, base, rt, offset as u16)
    }
}

/// Loads a full 32 bit constant into `rt` (`lui` + `ori`).
pub const fn li(rt: Reg, value: u32) -> [u32; 2] {
    [
        ops::lui(rt, (value >> 16) as u16),
        ops::ori(rt, rt, value as u16),
    ]
}

/// Turns instruction words into a big endian program image.
pub fn assemble<I: IntoIterator<Item = u32>>(words: I) -> Vec<u8> {
    words.into_iter().flat_map(u32::to_be_bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::{assemble, li, ops::*, A0, RA, T0, V0};

    #[test]
    fn encodings_match_a_reference_assembler() {
        assert_eq!(addiu(V0, 0, 4246), 0x2402_1096);
        assert_eq!(syscall(), 0x0000_000c);
        assert_eq!(lw(T0, 4, A0), 0x8c88_0004);
        assert_eq!(jr(RA), 0x03e0_0008);
        assert_eq!(jal(0x100), 0x0c00_0040);
        assert_eq!(li(T0, 0xdead_beef), [0x3c08_dead, 0x3508_beef]);
    }

    #[test]
    fn assemble_is_big_endian() {
        assert_eq!(assemble([0x0102_0304, 0x0a0b_0c0d]), vec![1, 2, 3, 4, 10, 11, 12, 13]);
    }
}

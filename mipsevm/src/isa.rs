//! Instruction semantics.
//!
//! Branches and jumps take effect after their delay slot: the slot runs
//! with `next_pc` already pointing at the target. Arithmetic never traps,
//! so `add`/`addi`/`sub` behave like their unsigned counterparts.

use dispute_common::DIGEST_LEN;
use ethereum_types::H256;
use log::{debug, trace};

use crate::{
    error::{FaultKind, StepError, StepResult},
    memory::Memory,
    state::State,
};

/// Register numbers used by the syscall interface.
pub mod reg {
    /// Syscall number and return value.
    pub const V0: usize = 2;
    /// First argument.
    pub const A0: usize = 4;
    /// Second argument.
    pub const A1: usize = 5;
    /// Third argument.
    pub const A2: usize = 6;
    /// Error flag returned by syscalls.
    pub const A3: usize = 7;
    /// Return address written by linking branches and jumps.
    pub const RA: usize = 31;
}

/// Syscall numbers understood by the emulator.
pub mod syscall {
    /// Writes to a file descriptor. Returns the byte count without writing.
    pub const WRITE: u32 = 4004;
    /// Fetches a preimage into the oracle window.
    pub const PREIMAGE_ORACLE: u32 = 4020;
    /// Always reports the program break at [`super::BRK_ADDR`].
    pub const BRK: u32 = 4045;
    /// Bump allocates from the heap when called with a null hint.
    pub const MMAP: u32 = 4090;
    /// Pretends a thread was created.
    pub const CLONE: u32 = 4120;
    /// Stops the machine.
    pub const EXIT_GROUP: u32 = 4246;
}

/// Program break reported by `brk`.
pub const BRK_ADDR: u32 = 0x4000_0000;

/// Where the program leaves the digest it wants from the preimage oracle.
pub const ORACLE_KEY_ADDR: u32 = 0x3000_1000;

/// Where the preimage oracle writes the length of the preimage. The bytes
/// themselves follow right after.
pub const ORACLE_DATA_ADDR: u32 = 0x3100_0000;

#[derive(Clone, Copy, Debug)]
struct Insn(u32);

impl Insn {
    const fn opcode(self) -> u32 {
        self.0 >> 26
    }

    const fn rs(self) -> usize {
        ((self.0 >> 21) & 0x1f) as usize
    }

    const fn rt(self) -> usize {
        ((self.0 >> 16) & 0x1f) as usize
    }

    const fn rd(self) -> usize {
        ((self.0 >> 11) & 0x1f) as usize
    }

    const fn shamt(self) -> u32 {
        (self.0 >> 6) & 0x1f
    }

    const fn funct(self) -> u32 {
        self.0 & 0x3f
    }

    /// The zero extended immediate.
    const fn zimm(self) -> u32 {
        self.0 & 0xffff
    }

    /// The sign extended immediate.
    const fn simm(self) -> u32 {
        self.0 as u16 as i16 as i32 as u32
    }

    const fn target(self) -> u32 {
        self.0 & 0x03ff_ffff
    }
}

/// How `pc`/`next_pc` move after an instruction.
enum Flow {
    Next,
    Branch { target: u32, taken: bool },
    Halt,
}

/// Executes the instruction at `state.pc`. `state.step` is left alone.
///
/// On error `state` may be partially updated; callers execute on a copy.
pub(crate) fn execute(state: &mut State, mem: &mut Memory) -> StepResult<()> {
    let pc = state.pc;
    if pc & 3 != 0 {
        return Err(fault(pc, 0, FaultKind::UnalignedPc));
    }

    let insn = Insn(mem.read_word(pc)?);
    trace!("step {} pc {:#010x} insn {:#010x}", state.step, pc, insn.0);

    let flow = match insn.opcode() {
        0x00 => special(state, mem, insn)?,
        0x01 => regimm(state, insn)?,
        0x02 | 0x03 => {
            let target = (pc.wrapping_add(4) & 0xf000_0000) | (insn.target() << 2);
            if insn.opcode() == 0x03 {
                set_reg(state, reg::RA, pc.wrapping_add(8));
            }
            Flow::Branch {
                target,
                taken: true,
            }
        }
        0x04..=0x07 => {
            let rs = state.registers[insn.rs()];
            let rt = state.registers[insn.rt()];
            let taken = match insn.opcode() {
                0x04 => rs == rt,
                0x05 => rs != rt,
                0x06 => rs as i32 <= 0,
                _ => rs as i32 > 0,
            };
            branch(pc, insn, taken)
        }
        0x08..=0x0f => {
            let rs = state.registers[insn.rs()];
            let v = match insn.opcode() {
                0x08 | 0x09 => rs.wrapping_add(insn.simm()),
                0x0a => ((rs as i32) < (insn.simm() as i32)) as u32,
                0x0b => (rs < insn.simm()) as u32,
                0x0c => rs & insn.zimm(),
                0x0d => rs | insn.zimm(),
                0x0e => rs ^ insn.zimm(),
                _ => insn.zimm() << 16,
            };
            set_reg(state, insn.rt(), v);
            Flow::Next
        }
        0x1c => {
            let rs = state.registers[insn.rs()];
            let rt = state.registers[insn.rt()];
            let v = match insn.funct() {
                0x02 => (rs as i32).wrapping_mul(rt as i32) as u32,
                0x20 => rs.leading_zeros(),
                0x21 => rs.leading_ones(),
                _ => return Err(fault(pc, insn.0, FaultKind::UnknownInstruction)),
            };
            set_reg(state, insn.rd(), v);
            Flow::Next
        }
        0x20..=0x26 | 0x30 => {
            load(state, mem, insn)?;
            Flow::Next
        }
        0x28..=0x2b | 0x2e | 0x38 => {
            store(state, mem, insn)?;
            Flow::Next
        }
        _ => return Err(fault(pc, insn.0, FaultKind::UnknownInstruction)),
    };

    match flow {
        Flow::Next => {
            state.pc = state.next_pc;
            state.next_pc = state.next_pc.wrapping_add(4);
        }
        Flow::Branch { target, taken } => {
            if state.next_pc != pc.wrapping_add(4) {
                return Err(fault(pc, insn.0, FaultKind::BranchInDelaySlot));
            }

            state.pc = state.next_pc;
            state.next_pc = match taken {
                true => target,
                false => state.next_pc.wrapping_add(4),
            };
        }
        Flow::Halt => (),
    }

    Ok(())
}

fn special(state: &mut State, mem: &mut Memory, insn: Insn) -> StepResult<Flow> {
    let pc = state.pc;
    let rs = state.registers[insn.rs()];
    let rt = state.registers[insn.rt()];

    let v = match insn.funct() {
        0x00 => rt << insn.shamt(),
        0x02 => rt >> insn.shamt(),
        0x03 => ((rt as i32) >> insn.shamt()) as u32,
        0x04 => rt << (rs & 0x1f),
        0x06 => rt >> (rs & 0x1f),
        0x07 => ((rt as i32) >> (rs & 0x1f)) as u32,
        0x08 => {
            return Ok(Flow::Branch {
                target: rs,
                taken: true,
            })
        }
        0x09 => {
            set_reg(state, insn.rd(), pc.wrapping_add(8));
            return Ok(Flow::Branch {
                target: rs,
                taken: true,
            });
        }
        0x0a | 0x0b => {
            if (insn.funct() == 0x0a) == (rt == 0) {
                set_reg(state, insn.rd(), rs);
            }
            return Ok(Flow::Next);
        }
        0x0c => return handle_syscall(state, mem),
        0x0f => return Ok(Flow::Next),
        0x10 => state.hi,
        0x11 => {
            state.hi = rs;
            return Ok(Flow::Next);
        }
        0x12 => state.lo,
        0x13 => {
            state.lo = rs;
            return Ok(Flow::Next);
        }
        0x18..=0x1b => {
            mul_div(state, insn, rs, rt)?;
            return Ok(Flow::Next);
        }
        0x20 | 0x21 => rs.wrapping_add(rt),
        0x22 | 0x23 => rs.wrapping_sub(rt),
        0x24 => rs & rt,
        0x25 => rs | rt,
        0x26 => rs ^ rt,
        0x27 => !(rs | rt),
        0x2a => ((rs as i32) < (rt as i32)) as u32,
        0x2b => (rs < rt) as u32,
        _ => return Err(fault(pc, insn.0, FaultKind::UnknownInstruction)),
    };
    set_reg(state, insn.rd(), v);

    Ok(Flow::Next)
}

fn mul_div(state: &mut State, insn: Insn, rs: u32, rt: u32) -> StepResult<()> {
    let (hi, lo) = match insn.funct() {
        0x18 => {
            let p = (rs as i32 as i64).wrapping_mul(rt as i32 as i64) as u64;
            ((p >> 32) as u32, p as u32)
        }
        0x19 => {
            let p = rs as u64 * rt as u64;
            ((p >> 32) as u32, p as u32)
        }
        _ if rt == 0 => return Err(fault(state.pc, insn.0, FaultKind::DivisionByZero)),
        0x1a => {
            let (a, b) = (rs as i32, rt as i32);
            (a.wrapping_rem(b) as u32, a.wrapping_div(b) as u32)
        }
        _ => (rs % rt, rs / rt),
    };
    state.hi = hi;
    state.lo = lo;

    Ok(())
}

fn regimm(state: &mut State, insn: Insn) -> StepResult<Flow> {
    let pc = state.pc;
    let rs = state.registers[insn.rs()] as i32;

    let (taken, link) = match insn.rt() {
        0x00 => (rs < 0, false),
        0x01 => (rs >= 0, false),
        0x10 => (rs < 0, true),
        0x11 => (rs >= 0, true),
        _ => return Err(fault(pc, insn.0, FaultKind::UnknownInstruction)),
    };
    if link {
        set_reg(state, reg::RA, pc.wrapping_add(8));
    }

    Ok(branch(pc, insn, taken))
}

fn branch(pc: u32, insn: Insn, taken: bool) -> Flow {
    Flow::Branch {
        target: pc.wrapping_add(4).wrapping_add(insn.simm() << 2),
        taken,
    }
}

fn load(state: &mut State, mem: &Memory, insn: Insn) -> StepResult<()> {
    let addr = state.registers[insn.rs()].wrapping_add(insn.simm());
    let word = mem.read_word(addr)?;
    let rt = state.registers[insn.rt()];
    let byte_shift = (addr & 3) * 8;

    let v = match insn.opcode() {
        0x20 => (word >> (24 - byte_shift)) as u8 as i8 as i32 as u32,
        0x21 => (word >> (16 - (addr & 2) * 8)) as u16 as i16 as i32 as u32,
        0x22 => (rt & !(u32::MAX << byte_shift)) | (word << byte_shift),
        0x24 => (word >> (24 - byte_shift)) & 0xff,
        0x25 => (word >> (16 - (addr & 2) * 8)) & 0xffff,
        0x26 => {
            let shift = 24 - byte_shift;
            (rt & !(u32::MAX >> shift)) | (word >> shift)
        }
        // lw, ll
        _ => word,
    };
    set_reg(state, insn.rt(), v);

    Ok(())
}

fn store(state: &mut State, mem: &mut Memory, insn: Insn) -> StepResult<()> {
    let addr = state.registers[insn.rs()].wrapping_add(insn.simm());
    let rt = state.registers[insn.rt()];
    let byte_shift = (addr & 3) * 8;

    let v = match insn.opcode() {
        0x2b | 0x38 => rt,
        op => {
            let word = mem.read_word(addr)?;
            match op {
                0x28 => {
                    let shift = 24 - byte_shift;
                    (word & !(0xff << shift)) | ((rt & 0xff) << shift)
                }
                0x29 => {
                    let shift = 16 - (addr & 2) * 8;
                    (word & !(0xffff << shift)) | ((rt & 0xffff) << shift)
                }
                0x2a => (word & !(u32::MAX >> byte_shift)) | (rt >> byte_shift),
                _ => {
                    let shift = 24 - byte_shift;
                    (word & !(u32::MAX << shift)) | (rt << shift)
                }
            }
        }
    };
    mem.write_word(addr, v)?;

    // sc always succeeds.
    if insn.opcode() == 0x38 {
        set_reg(state, insn.rt(), 1);
    }

    Ok(())
}

fn handle_syscall(state: &mut State, mem: &mut Memory) -> StepResult<Flow> {
    let regs = state.registers;
    let number = regs[reg::V0];

    let ret = match number {
        syscall::MMAP => match regs[reg::A0] {
            0 => {
                let addr = state.heap;
                state.heap = state.heap.wrapping_add(regs[reg::A1]);
                addr
            }
            hint => hint,
        },
        syscall::BRK => BRK_ADDR,
        syscall::CLONE => 1,
        syscall::EXIT_GROUP => {
            state.exited = true;
            state.exit_code = regs[reg::A0] as u8;
            debug!("Program exited with code {} at step {}", state.exit_code, state.step);
            return Ok(Flow::Halt);
        }
        syscall::WRITE => regs[reg::A2],
        syscall::PREIMAGE_ORACLE => {
            let key = H256::from_slice(&mem.read_bytes(ORACLE_KEY_ADDR, DIGEST_LEN)?);
            let preimage = mem.preimage(key)?;
            debug!("Oracle served {:#x} ({} bytes)", key, preimage.len());

            mem.write_word(ORACLE_DATA_ADDR, preimage.len() as u32)?;
            mem.write_bytes(ORACLE_DATA_ADDR + 4, &preimage)?;
            0
        }
        other => {
            trace!("Ignoring syscall {}", other);
            0
        }
    };
    set_reg(state, reg::V0, ret);
    set_reg(state, reg::A3, 0);

    Ok(Flow::Next)
}

fn set_reg(state: &mut State, idx: usize, value: u32) {
    if idx != 0 {
        state.registers[idx] = value;
    }
}

fn fault(pc: u32, insn: u32, kind: FaultKind) -> StepError {
    StepError::HaltedFault { pc, insn, kind }
}

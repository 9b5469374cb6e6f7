//! MIPS-to-microcode decoder (C2, §4.1): decodes one 32-bit word into
//! a micro-block, recursively inlining branch delay slots.
//!
//! Grounded on the teacher's `cpu/instructions.rs` opcode-table
//! `decode()` and `cpu/disassembler.rs` linear scan, generalized from
//! a flat 6502 opcode table to MIPS's multi-level opcode-family
//! dispatch, and enriched with delay-slot handling modeled on
//! `spillestation`'s `cpu/mod.rs` (`next_pc`/`in_branch_delay`) from
//! the example pack.

mod fields;
mod gte;

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::debug::DebugSource;
use crate::exe::{Executable, LocalAddr};
use crate::micro::{Arg, JumpType, MicroAssemblyBlock, MicroOp, Register, TempAllocator};

use fields::*;

/// Whether the word currently being decoded sits in a delay slot, and
/// whether the branch that owns it lets control fall through after it
/// (most branches) or not (`j`, `jr`, since control never returns to
/// the instruction after their delay slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySlotMode {
    None,
    ContinueControl,
    AbortControl,
}

/// Shared, mutable decode-session state threaded through the
/// recursive decode calls for one disassembly run.
pub struct DecodeSession<'a> {
    pub exe: &'a Executable,
    pub debug: &'a dyn DebugSource,
    pub temps: &'a mut TempAllocator,
    pub callees: &'a mut BTreeSet<LocalAddr>,
}

/// Decodes the word at `block.address`'s continuation, `word`, given
/// that the next sequential word sits at local address `next_local`.
/// Appends micro-ops and `outs` edges to `block`. `delay_slot_mode`
/// indicates whether this call is itself decoding a delay slot.
pub fn decode_instruction(
    session: &mut DecodeSession,
    block: &mut MicroAssemblyBlock,
    word: u32,
    next_local: LocalAddr,
    delay_slot_mode: DelaySlotMode,
) {
    if is_branch_class(word) {
        if delay_slot_mode != DelaySlotMode::None {
            warn!(
                addr = next_local.wrapping_sub(4),
                "branch encountered in a delay slot; skipping (RecursiveDelaySlot)"
            );
            block.push(MicroOp::UnsupportedInsn {
                name: "branch-in-delay-slot",
                args: vec![],
            });
            return;
        }
        decode_branch(session, block, word, next_local);
        return;
    }

    decode_non_branch(session, block, word, next_local);

    if delay_slot_mode != DelaySlotMode::AbortControl {
        block.add_out(next_local, JumpType::Control);
    }
}

fn is_branch_class(word: u32) -> bool {
    let op = primary_op(word);
    match op {
        0x02 | 0x03 => true, // j, jal
        0x04..=0x07 | 0x14..=0x17 => true, // beq/bne/blez/bgtz (+ likely)
        OP_PC_RELATIVE => true, // bltz family
        OP_REGISTER_FORMAT => matches!(funct(word), 0x08 | 0x09), // jr, jalr
        OP_CPU_CONTROL => rs(word) == 0x08, // bc0f/bc0t
        _ => false,
    }
}

fn decode_non_branch(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, _next_local: LocalAddr) {
    let op = primary_op(word);
    match op {
        OP_REGISTER_FORMAT => decode_register_format(session, block, word),
        0x08 | 0x09 => decode_arith_imm(block, word), // addi, addiu
        0x0A => decode_slti(session, block, word, true),
        0x0B => decode_slti(session, block, word, false),
        0x0C => decode_logic_imm(block, word, LogicShape::And),
        0x0D => decode_logic_imm(block, word, LogicShape::Or),
        0x0E => decode_logic_imm(block, word, LogicShape::XOr),
        0x0F => decode_lui(block, word),
        0x20 => decode_load(session, block, word, 8, true),  // lb
        0x21 => decode_load(session, block, word, 16, true), // lh
        0x22 => decode_unaligned(block, "lwl"),
        0x23 => decode_load(session, block, word, 32, true), // lw
        0x24 => decode_load(session, block, word, 8, false), // lbu
        0x25 => decode_load(session, block, word, 16, false), // lhu
        0x26 => decode_unaligned(block, "lwr"),
        0x28 => decode_store(session, block, word, 8),  // sb
        0x29 => decode_store(session, block, word, 16), // sh
        0x2A => decode_unaligned(block, "swl"),
        0x2B => decode_store(session, block, word, 32), // sw
        0x2E => decode_unaligned(block, "swr"),
        OP_CPU_CONTROL => decode_cop0(block, word),
        OP_COP2 => decode_cop2(block, word),
        _ => block.push(MicroOp::Data(Arg::constant(word as u64, 32))),
    }
}

// --- R-type (opcode 0) ---

fn decode_register_format(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32) {
    let rd_arg = || Arg::zero_aware_gpr(word, 11, 32);
    let rt_arg = || Arg::zero_aware_gpr(word, 16, 32);
    let rs_arg = || Arg::zero_aware_gpr(word, 21, 32);
    let sa = Arg::constant(shamt(word) as u64, 5);

    match funct(word) {
        0x00 if rt(word) == 0 && rd(word) == 0 && shamt(word) == 0 => block.push(MicroOp::Nop),
        0x00 => block.push(MicroOp::Shl { dst: rd_arg(), src: rt_arg(), amount: sa }),
        0x02 => block.push(MicroOp::Srl { dst: rd_arg(), src: rt_arg(), amount: sa }),
        0x03 => block.push(MicroOp::Sra { dst: rd_arg(), src: rt_arg(), amount: sa }),
        0x04 => block.push(MicroOp::Shl { dst: rd_arg(), src: rt_arg(), amount: rs_arg() }),
        0x06 => block.push(MicroOp::Srl { dst: rd_arg(), src: rt_arg(), amount: rs_arg() }),
        0x07 => block.push(MicroOp::Sra { dst: rd_arg(), src: rt_arg(), amount: rs_arg() }),
        0x20 | 0x21 => block.push(MicroOp::Add { dst: rd_arg(), lhs: rs_arg(), rhs: rt_arg() }), // add/addu
        0x22 | 0x23 => block.push(MicroOp::Sub { dst: rd_arg(), lhs: rs_arg(), rhs: rt_arg() }), // sub/subu
        0x24 => block.push(MicroOp::And { dst: rd_arg(), lhs: rs_arg(), rhs: rt_arg() }),
        0x25 => block.push(MicroOp::Or { dst: rd_arg(), lhs: rs_arg(), rhs: rt_arg() }),
        0x26 => block.push(MicroOp::XOr { dst: rd_arg(), lhs: rs_arg(), rhs: rt_arg() }),
        0x27 => {
            let tmp = session.temps.alloc();
            block.push(MicroOp::Or { dst: Arg::register(tmp, 32), lhs: rs_arg(), rhs: rt_arg() });
            block.push(MicroOp::Not { dst: Arg::register(tmp, 32), src: Arg::register(tmp, 32) });
            block.push(MicroOp::Copy { dst: rd_arg(), src: Arg::register(tmp, 32) });
        }
        0x2A => block.push(MicroOp::SSetL { dst: rd_arg(), lhs: rs_arg(), rhs: rt_arg() }),
        0x2B => block.push(MicroOp::USetL { dst: rd_arg(), lhs: rs_arg(), rhs: rt_arg() }),
        f @ (0x0C | 0x0D | 0x10 | 0x11 | 0x12 | 0x13 | 0x18 | 0x19 | 0x1A | 0x1B) => {
            block.push(MicroOp::UnsupportedInsn { name: register_funct_name(f), args: vec![rs_arg(), rt_arg(), rd_arg()] })
        }
        _ => block.push(MicroOp::Data(Arg::constant(word as u64, 32))),
    }
}

fn register_funct_name(funct: u32) -> &'static str {
    match funct {
        0x0C => "syscall",
        0x0D => "break",
        0x10 => "mfhi",
        0x11 => "mthi",
        0x12 => "mflo",
        0x13 => "mtlo",
        0x18 => "mult",
        0x19 => "multu",
        0x1A => "div",
        0x1B => "divu",
        _ => "unknown",
    }
}

// --- immediate-form arithmetic/logic ---

enum LogicShape {
    And,
    Or,
    XOr,
}

fn decode_arith_imm(block: &mut MicroAssemblyBlock, word: u32) {
    let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
    let rs_arg = Arg::zero_aware_gpr(word, 21, 32);
    let imm = Arg::constant(imm16(word) as u64, 16);
    block.push(MicroOp::Add { dst: rt_arg, lhs: rs_arg, rhs: imm });
}

fn decode_logic_imm(block: &mut MicroAssemblyBlock, word: u32, shape: LogicShape) {
    let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
    let rs_arg = Arg::zero_aware_gpr(word, 21, 32);
    let imm = Arg::constant(imm16(word) as u64, 16);
    let op = match shape {
        LogicShape::And => MicroOp::And { dst: rt_arg, lhs: rs_arg, rhs: imm },
        LogicShape::Or => MicroOp::Or { dst: rt_arg, lhs: rs_arg, rhs: imm },
        LogicShape::XOr => MicroOp::XOr { dst: rt_arg, lhs: rs_arg, rhs: imm },
    };
    block.push(op);
}

fn decode_slti(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, signed: bool) {
    let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
    let rs_arg = Arg::zero_aware_gpr(word, 21, 32);
    let tmp = session.temps.alloc();
    block.push(MicroOp::Copy {
        dst: Arg::register(tmp, 32),
        src: Arg::constant(imm16_signed(word) as i64 as u64, 32),
    });
    let op = if signed {
        MicroOp::SSetL { dst: rt_arg, lhs: rs_arg, rhs: Arg::register(tmp, 32) }
    } else {
        MicroOp::USetL { dst: rt_arg, lhs: rs_arg, rhs: Arg::register(tmp, 32) }
    };
    block.push(op);
}

fn decode_lui(block: &mut MicroAssemblyBlock, word: u32) {
    let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
    let value = (imm16(word) as u32) << 16;
    block.push(MicroOp::Copy { dst: rt_arg, src: Arg::constant(value as u64, 32) });
}

// --- loads / stores ---

/// Builds the memory operand for a load/store, applying `$gp`-relative
/// rewriting (§4.1) when the base register is `$gp` and a `gpBase` has
/// been discovered via the debug source's `__SN_GP_BASE` label.
fn memory_operand(session: &DecodeSession, word: u32, bits: u8) -> Arg {
    let base_num = rs(word);
    let offset = imm16_signed(word);
    if base_num == 28 {
        if let Some(gp_base) = session.debug.gp_base() {
            let addr = gp_base.wrapping_add(offset as u32);
            let symbol = session.debug.symbol_name(addr).map(str::to_owned);
            return Arg::address(addr, symbol, bits);
        }
    }
    Arg::register_mem(Register::gpr(base_num), offset, bits)
}

fn decode_load(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, width: u8, signed: bool) {
    let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
    let mem = memory_operand(session, word, width);
    if width == 32 {
        block.push(MicroOp::Copy { dst: rt_arg, src: mem });
        return;
    }
    let op = if signed {
        MicroOp::SignedCastInsn { dst: rt_arg, src: mem, from_bits: width }
    } else {
        MicroOp::UnsignedCastInsn { dst: rt_arg, src: mem, from_bits: width }
    };
    block.push(op);
}

fn decode_store(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, width: u8) {
    let mem = memory_operand(session, word, width);
    let rt_num = rt(word);
    let src = if rt_num == 0 {
        Arg::constant(0, width)
    } else {
        Arg::register(Register::gpr(rt_num), 32)
    };
    block.push(MicroOp::CopyInsn { dst: mem, src, width });
}

fn decode_unaligned(block: &mut MicroAssemblyBlock, name: &'static str) {
    block.push(MicroOp::UnsupportedInsn { name, args: vec![] });
}

// --- COP0 / COP2 ---

fn decode_cop0(block: &mut MicroAssemblyBlock, word: u32) {
    let sub = rs(word);
    let name: &'static str = match sub {
        0x00 => "mfc0",
        0x04 => "mtc0",
        0x10 => match funct(word) {
            0x01 => "tlbr",
            0x02 => "tlbwi",
            0x06 => "tlbwr",
            0x08 => "tlbp",
            0x10 => "rfe",
            _ => "cop0",
        },
        _ => "cop0",
    };
    let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
    let rd_arg = Arg::register(Register::Cop0(rd(word) as u8), 32);
    block.push(MicroOp::UnsupportedInsn { name, args: vec![rt_arg, rd_arg] });
}

fn decode_cop2(block: &mut MicroAssemblyBlock, word: u32) {
    match rs(word) {
        0x00 => { // mfc2
            let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
            let src = Arg::register(Register::Cop2Data(rd(word) as u8), 32);
            block.push(MicroOp::Copy { dst: rt_arg, src });
        }
        0x02 => { // cfc2
            let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
            let src = Arg::register(Register::Cop2Control(rd(word) as u8), 32);
            block.push(MicroOp::Copy { dst: rt_arg, src });
        }
        0x04 => { // mtc2
            let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
            let dst = Arg::register(Register::Cop2Data(rd(word) as u8), 32);
            block.push(MicroOp::Copy { dst, src: rt_arg });
        }
        0x06 => { // ctc2
            let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
            let dst = Arg::register(Register::Cop2Control(rd(word) as u8), 32);
            block.push(MicroOp::Copy { dst, src: rt_arg });
        }
        _ => {
            let name = gte::command_name(gte_command(word));
            block.push(MicroOp::UnsupportedInsn { name, args: vec![] });
        }
    }
}

// --- branches ---

fn decode_branch(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, next_local: LocalAddr) {
    let op = primary_op(word);
    match op {
        0x02 => decode_j(session, block, word, next_local),
        0x03 => decode_jal(session, block, word, next_local),
        0x04 | 0x14 => decode_cond_branch(session, block, word, next_local, CondKind::Eq),
        0x05 | 0x15 => decode_cond_branch(session, block, word, next_local, CondKind::NEq),
        0x06 | 0x16 => decode_cond_branch(session, block, word, next_local, CondKind::LeZero),
        0x07 | 0x17 => decode_cond_branch(session, block, word, next_local, CondKind::GtZero),
        OP_PC_RELATIVE => decode_bltz_family(session, block, word, next_local),
        OP_REGISTER_FORMAT => match funct(word) {
            0x08 => decode_jr(session, block, word, next_local),
            0x09 => decode_jalr(session, block, word, next_local),
            _ => unreachable!("is_branch_class only admits jr/jalr for opcode 0"),
        },
        OP_CPU_CONTROL => decode_bc0(session, block, word, next_local),
        _ => unreachable!("is_branch_class only admits the opcodes handled above"),
    }
}

/// Computes the PC-relative branch target in local coordinates:
/// `nextLocal + ((int16)offset) * 4` (§4.1 step 1).
fn pc_relative_target(word: u32, next_local: LocalAddr) -> LocalAddr {
    next_local.wrapping_add((imm16_signed(word) * 4) as u32)
}

/// Computes the pseudo-direct jump target for `j`/`jal`: the low 28
/// bits come from the 26-bit field shifted left 2; the high 4 bits are
/// carried over from the delay slot's own address. Computed in global
/// space since the high-bit carryover is only meaningful there.
fn direct_jump_target(session: &DecodeSession, word: u32, next_local: LocalAddr) -> Option<LocalAddr> {
    let next_global = session.exe.to_global(next_local);
    let global_target = (next_global & 0xF000_0000) | (target26(word) << 2);
    session.exe.to_local(global_target).ok()
}

fn inline_delay_slot(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, next_local: LocalAddr, mode: DelaySlotMode) {
    match session.exe.read_word(next_local) {
        Some(word) => decode_instruction(session, block, word, next_local.wrapping_add(4), mode),
        None => warn!(addr = next_local, "delay slot falls outside the text image"),
    }
}

fn decode_j(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, next_local: LocalAddr) {
    if let Some(target) = direct_jump_target(session, word, next_local) {
        if target != next_local {
            block.add_out(target, JumpType::Jump);
        }
        inline_delay_slot(session, block, next_local, DelaySlotMode::AbortControl);
        block.push(MicroOp::Jmp { target: symbolic_address(session, target) });
    } else {
        inline_delay_slot(session, block, next_local, DelaySlotMode::AbortControl);
        block.push(MicroOp::UnsupportedInsn { name: "j-out-of-range", args: vec![] });
    }
}

fn decode_jal(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, next_local: LocalAddr) {
    let target = direct_jump_target(session, word, next_local);
    if let Some(target) = target {
        block.add_out(target, JumpType::Call);
        session.callees.insert(target);
    }
    inline_delay_slot(session, block, next_local, DelaySlotMode::ContinueControl);
    let target_arg = target
        .map(|t| symbolic_address(session, t))
        .unwrap_or_else(|| Arg::constant(0, 32));
    block.push(MicroOp::Call { link: Arg::register(Register::gpr(31), 32), target: target_arg });
}

fn symbolic_address(session: &DecodeSession, local: LocalAddr) -> Arg {
    let global = session.exe.to_global(local);
    let symbol = session.debug.symbol_name(global).map(str::to_owned);
    Arg::address(global, symbol, 32)
}

enum CondKind {
    Eq,
    NEq,
    LeZero,
    GtZero,
}

fn decode_cond_branch(
    session: &mut DecodeSession,
    block: &mut MicroAssemblyBlock,
    word: u32,
    next_local: LocalAddr,
    kind: CondKind,
) {
    let target = pc_relative_target(word, next_local);
    block.add_out(target, JumpType::JumpConditional);

    let rs_arg = Arg::zero_aware_gpr(word, 21, 32);
    let rt_arg = Arg::zero_aware_gpr(word, 16, 32);
    let tmp = session.temps.alloc();
    let tmp_arg = Arg::register(tmp, 1);

    match kind {
        CondKind::Eq => block.push(MicroOp::SetEq { dst: tmp_arg.clone(), lhs: rs_arg, rhs: rt_arg }),
        CondKind::NEq => block.push(MicroOp::SetNEq { dst: tmp_arg.clone(), lhs: rs_arg, rhs: rt_arg }),
        CondKind::LeZero => {
            block.push(MicroOp::SSetLE { dst: tmp_arg.clone(), lhs: rs_arg, rhs: Arg::constant(0, 32) })
        }
        CondKind::GtZero => {
            let inner = session.temps.alloc();
            let inner_arg = Arg::register(inner, 1);
            block.push(MicroOp::SSetLE { dst: inner_arg.clone(), lhs: rs_arg, rhs: Arg::constant(0, 32) });
            block.push(MicroOp::Not { dst: tmp_arg.clone(), src: inner_arg });
        }
    }

    inline_delay_slot(session, block, next_local, DelaySlotMode::ContinueControl);
    block.push(MicroOp::JmpIf { cond: tmp_arg, target: symbolic_address(session, target) });
}

fn decode_bltz_family(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, next_local: LocalAddr) {
    let sub = rt(word);
    let target = pc_relative_target(word, next_local);
    let is_and_link = sub == 16 || sub == 17; // bltzal / bgezal
    let is_ge = sub == 1 || sub == 17; // bgez / bgezal

    block.add_out(target, if is_and_link { JumpType::CallConditional } else { JumpType::JumpConditional });
    if is_and_link {
        session.callees.insert(target);
    }

    let rs_arg = Arg::zero_aware_gpr(word, 21, 32);
    let tmp = session.temps.alloc();
    let tmp_arg = Arg::register(tmp, 1);

    if is_ge {
        let inner = session.temps.alloc();
        let inner_arg = Arg::register(inner, 1);
        block.push(MicroOp::SSetL { dst: inner_arg.clone(), lhs: rs_arg, rhs: Arg::constant(0, 32) });
        block.push(MicroOp::Not { dst: tmp_arg.clone(), src: inner_arg });
    } else {
        block.push(MicroOp::SSetL { dst: tmp_arg.clone(), lhs: rs_arg, rhs: Arg::constant(0, 32) });
    }

    if is_and_link {
        let link = symbolic_address(session, next_local.wrapping_add(4));
        block.push(MicroOp::Copy { dst: Arg::register(Register::gpr(31), 32), src: link });
    }

    inline_delay_slot(session, block, next_local, DelaySlotMode::ContinueControl);
    block.push(MicroOp::JmpIf { cond: tmp_arg, target: symbolic_address(session, target) });
}

fn decode_bc0(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, next_local: LocalAddr) {
    let target = pc_relative_target(word, next_local);
    block.add_out(target, JumpType::JumpConditional);
    let taken_on_true = rt(word) & 1 == 1; // bc0t vs bc0f
    let tmp = session.temps.alloc();
    let tmp_arg = Arg::register(tmp, 1);
    let cond_reg = Arg::register(Register::Cop0(32), 1); // condition-line pseudo-register
    if taken_on_true {
        block.push(MicroOp::Copy { dst: tmp_arg.clone(), src: cond_reg });
    } else {
        block.push(MicroOp::Not { dst: tmp_arg.clone(), src: cond_reg });
    }
    inline_delay_slot(session, block, next_local, DelaySlotMode::ContinueControl);
    block.push(MicroOp::JmpIf { cond: tmp_arg, target: symbolic_address(session, target) });
}

fn decode_jr(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, next_local: LocalAddr) {
    let rs_num = rs(word);
    inline_delay_slot(session, block, next_local, DelaySlotMode::AbortControl);
    if rs_num == 31 {
        block.push(MicroOp::Return { link: Arg::register(Register::gpr(31), 32) });
    } else {
        info!(register = rs_num, "jr on a non-ra register, possible switch-statement dispatch");
        block.push(MicroOp::Jmp { target: Arg::register(Register::gpr(rs_num), 32) });
    }
}

fn decode_jalr(session: &mut DecodeSession, block: &mut MicroAssemblyBlock, word: u32, next_local: LocalAddr) {
    // Open question (§9): jalr's link-register semantics are not
    // modeled; this emits a plain register jump rather than a call,
    // matching the behavior the spec preserves rather than "fixes".
    let rs_arg = Arg::zero_aware_gpr(word, 21, 32);
    inline_delay_slot(session, block, next_local, DelaySlotMode::AbortControl);
    block.push(MicroOp::Jmp { target: rs_arg });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::StaticDebugSource;
    use std::collections::BTreeSet;

    fn session<'a>(
        exe: &'a Executable,
        debug: &'a StaticDebugSource,
        temps: &'a mut TempAllocator,
        callees: &'a mut BTreeSet<LocalAddr>,
    ) -> DecodeSession<'a> {
        DecodeSession { exe, debug, temps, callees }
    }

    fn exe_with_words(words: &[u32]) -> Executable {
        let mut buf = vec![0u8; crate::exe::header::HEADER_SIZE];
        buf[0..8].copy_from_slice(crate::exe::header::MAGIC);
        buf[0x10..0x14].copy_from_slice(&0x8001_0000u32.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&0x8001_0000u32.to_le_bytes());
        buf[0x1C..0x20].copy_from_slice(&((words.len() * 4) as u32).to_le_bytes());
        for w in words {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        Executable::load(&buf).unwrap()
    }

    #[test]
    fn decodes_nop() {
        let exe = exe_with_words(&[0x0000_0000]);
        let debug = StaticDebugSource::new();
        let mut temps = TempAllocator::new();
        let mut callees = BTreeSet::new();
        let mut session = session(&exe, &debug, &mut temps, &mut callees);
        let mut block = MicroAssemblyBlock::new(0);
        decode_instruction(&mut session, &mut block, 0, 4, DelaySlotMode::None);
        assert_eq!(block.insns, vec![MicroOp::Nop]);
        assert_eq!(block.outs.get(&4), Some(&JumpType::Control));
    }

    #[test]
    fn decodes_unconditional_jump_with_delay_slot() {
        // j 0x80012000 -> target local 0x2000; then nop
        let target_global = 0x8001_2000u32;
        let j_word = (0x02 << 26) | ((target_global >> 2) & 0x03FF_FFFF);
        let exe = exe_with_words(&[j_word, 0x0000_0000]);
        let debug = StaticDebugSource::new();
        let mut temps = TempAllocator::new();
        let mut callees = BTreeSet::new();
        let mut session = session(&exe, &debug, &mut temps, &mut callees);
        let mut block = MicroAssemblyBlock::new(0);
        decode_instruction(&mut session, &mut block, j_word, 4, DelaySlotMode::None);

        assert_eq!(block.insns.len(), 2);
        assert_eq!(block.insns[0], MicroOp::Nop);
        assert!(matches!(block.insns[1], MicroOp::Jmp { .. }));
        assert_eq!(block.outs.get(&0x2000), Some(&JumpType::Jump));
        assert!(!block.outs.values().any(|k| *k == JumpType::Control));
    }

    #[test]
    fn decodes_conditional_branch_with_both_edges() {
        // beq $0, $0, +2 (offset chosen so the taken target doesn't
        // coincide with the not-taken fall-through address at +1)
        let word = (0x04 << 26) | 2u32;
        let exe = exe_with_words(&[word, 0x0000_0000]);
        let debug = StaticDebugSource::new();
        let mut temps = TempAllocator::new();
        let mut callees = BTreeSet::new();
        let mut session = session(&exe, &debug, &mut temps, &mut callees);
        let mut block = MicroAssemblyBlock::new(0);
        decode_instruction(&mut session, &mut block, word, 4, DelaySlotMode::None);

        assert!(matches!(block.insns[0], MicroOp::SetEq { .. }));
        assert_eq!(block.insns[1], MicroOp::Nop);
        assert!(matches!(block.insns.last().unwrap(), MicroOp::JmpIf { .. }));

        let target = 4u32.wrapping_add(2 * 4); // nextLocal + offset(2)*4
        assert_eq!(block.outs.get(&target), Some(&JumpType::JumpConditional));
        assert_eq!(block.outs.get(&8), Some(&JumpType::Control));
    }

    #[test]
    fn addi_with_a_negative_immediate_stores_a_16_bit_constant() {
        // addi $t0, $t1, -1 -> opcode 0x08, rs=$t1(9), rt=$t0(8), imm=0xFFFF
        let word = (0x08 << 26) | (9 << 21) | (8 << 16) | 0xFFFFu32;
        let exe = exe_with_words(&[word, 0x0000_0000]);
        let debug = StaticDebugSource::new();
        let mut temps = TempAllocator::new();
        let mut callees = BTreeSet::new();
        let mut session = session(&exe, &debug, &mut temps, &mut callees);
        let mut block = MicroAssemblyBlock::new(0);
        decode_instruction(&mut session, &mut block, word, 4, DelaySlotMode::None);

        match &block.insns[0] {
            MicroOp::Add { rhs: Arg::Const(c), .. } => {
                assert_eq!(c.value, 0xFFFF);
                assert_eq!(c.bits, 16);
            }
            other => panic!("expected an Add with a Const rhs, got {other:?}"),
        }
    }

    #[test]
    fn recursive_delay_slot_branch_is_skipped() {
        // A branch placed directly where a delay slot decode will look:
        // decoding a branch's delay slot that is itself a branch must bail.
        let beq = (0x04 << 26) | 1u32;
        let exe = exe_with_words(&[beq, beq]);
        let debug = StaticDebugSource::new();
        let mut temps = TempAllocator::new();
        let mut callees = BTreeSet::new();
        let mut session = session(&exe, &debug, &mut temps, &mut callees);
        let mut block = MicroAssemblyBlock::new(0);
        decode_instruction(&mut session, &mut block, beq, 4, DelaySlotMode::None);

        assert!(block
            .insns
            .iter()
            .any(|i| matches!(i, MicroOp::UnsupportedInsn { name, .. } if *name == "branch-in-delay-slot")));
    }
}

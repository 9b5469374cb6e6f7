//! Adapter layer (C5, §4.4): a read-only `(address, text, jump_target)`
//! projection over the post-fusion micro-block map. Operates directly
//! on [`crate::reach::BlockMap`], not the structural graph — §4.4's
//! wording describes the projection in terms of "the post-fusion
//! micro-block map", and the structural graph is exposed separately by
//! [`crate::Analyzer::structural_graph`] for callers who want it.
//!
//! Grounded on the teacher's `cpu/disassembler.rs` `Display` impl,
//! which rendered one human-readable line per decoded instruction;
//! here one line is rendered per fused micro-block instead, since a
//! block (not a single micro-op) is this crate's natural external
//! unit.

use crate::exe::{Executable, LocalAddr};
use crate::micro::{Arg, JumpType, MicroAssemblyBlock, MicroOp, Register};
use crate::reach::BlockMap;

/// One externally-visible row of the projection (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionView {
    pub address: u32,
    pub text: String,
    pub jump_target: Option<u32>,
}

/// Returns the first `length` blocks at *local* address >= `offset`,
/// each rendered as one `InstructionView`. This is the internal-layer
/// projection, keyed the same way `BlockMap` is; the public,
/// global-addressed form of this API is [`crate::Analyzer::instructions`],
/// which converts its caller-facing global `offset` to local before
/// delegating here. `BlockMap`'s `BTreeMap` keys are already in
/// ascending address order, so this is a filter-then-take over it.
pub fn instructions(
    blocks: &BlockMap,
    exe: &Executable,
    offset: LocalAddr,
    length: usize,
) -> Vec<InstructionView> {
    blocks
        .range(offset..)
        .take(length)
        .map(|(&addr, block)| InstructionView {
            address: exe.to_global(addr),
            text: render_block(block),
            jump_target: unconditional_jump_target(block, exe),
        })
        .collect()
}

/// A block's terminator is an unconditional jump to a known address
/// when its only non-`Control` out edge is a bare `Jump` (not
/// `JumpConditional`, `Call`, or `CallConditional`) and it has no other
/// structural successor (§4.4).
fn unconditional_jump_target(block: &MicroAssemblyBlock, exe: &Executable) -> Option<u32> {
    let mut jump_targets = block.outs.iter().filter(|(_, &kind)| kind == JumpType::Jump);
    let (&target, _) = jump_targets.next()?;
    if jump_targets.next().is_some() {
        return None;
    }
    if block.outs.len() != 1 {
        return None;
    }
    Some(exe.to_global(target))
}

/// One human-readable line per block: each micro-op rendered and
/// joined with `"; "`, in address order.
fn render_block(block: &MicroAssemblyBlock) -> String {
    block.insns.iter().map(render_op).collect::<Vec<_>>().join("; ")
}

fn render_op(op: &MicroOp) -> String {
    match op {
        MicroOp::Nop => "nop".to_string(),
        MicroOp::Data(a) => format!("data {}", render_arg(a)),
        MicroOp::Copy { dst, src } => format!("mov {}, {}", render_arg(dst), render_arg(src)),
        MicroOp::Add { dst, lhs, rhs } => render_triop("add", dst, lhs, rhs),
        MicroOp::Sub { dst, lhs, rhs } => render_triop("sub", dst, lhs, rhs),
        MicroOp::And { dst, lhs, rhs } => render_triop("and", dst, lhs, rhs),
        MicroOp::Or { dst, lhs, rhs } => render_triop("or", dst, lhs, rhs),
        MicroOp::XOr { dst, lhs, rhs } => render_triop("xor", dst, lhs, rhs),
        MicroOp::SetEq { dst, lhs, rhs } => render_triop("seq", dst, lhs, rhs),
        MicroOp::SetNEq { dst, lhs, rhs } => render_triop("sne", dst, lhs, rhs),
        MicroOp::SSetL { dst, lhs, rhs } => render_triop("slt", dst, lhs, rhs),
        MicroOp::SSetLE { dst, lhs, rhs } => render_triop("sle", dst, lhs, rhs),
        MicroOp::USetL { dst, lhs, rhs } => render_triop("sltu", dst, lhs, rhs),
        MicroOp::Not { dst, src } => format!("not {}, {}", render_arg(dst), render_arg(src)),
        MicroOp::Shl { dst, src, amount } => render_shift("sll", dst, src, amount),
        MicroOp::Srl { dst, src, amount } => render_shift("srl", dst, src, amount),
        MicroOp::Sra { dst, src, amount } => render_shift("sra", dst, src, amount),
        MicroOp::Jmp { target } => format!("jmp {}", render_arg(target)),
        MicroOp::JmpIf { cond, target } => {
            format!("jmpif {}, {}", render_arg(cond), render_arg(target))
        }
        MicroOp::Call { link, target } => {
            format!("call {}, {}", render_arg(link), render_arg(target))
        }
        MicroOp::Return { link } => format!("ret {}", render_arg(link)),
        MicroOp::CopyInsn { dst, src, width } => {
            format!("mov.{} {}, {}", width, render_arg(dst), render_arg(src))
        }
        MicroOp::SignedCastInsn { dst, src, from_bits } => {
            format!("scast.{} {}, {}", from_bits, render_arg(dst), render_arg(src))
        }
        MicroOp::UnsignedCastInsn { dst, src, from_bits } => {
            format!("ucast.{} {}, {}", from_bits, render_arg(dst), render_arg(src))
        }
        MicroOp::UnsupportedInsn { name, args } => {
            let rendered: Vec<String> = args.iter().map(render_arg).collect();
            if rendered.is_empty() {
                format!("unsupported.{}", name)
            } else {
                format!("unsupported.{} {}", name, rendered.join(", "))
            }
        }
    }
}

fn render_triop(mnemonic: &str, dst: &Arg, lhs: &Arg, rhs: &Arg) -> String {
    format!("{} {}, {}, {}", mnemonic, render_arg(dst), render_arg(lhs), render_arg(rhs))
}

fn render_shift(mnemonic: &str, dst: &Arg, src: &Arg, amount: &Arg) -> String {
    format!("{} {}, {}, {}", mnemonic, render_arg(dst), render_arg(src), render_arg(amount))
}

fn render_arg(arg: &Arg) -> String {
    match arg {
        Arg::Const(c) => format!("{:#x}", c.value),
        Arg::Register(r) => render_register(r.reg),
        Arg::Address(a) => match &a.symbol {
            Some(name) => format!("{}<{:#010x}>", name, a.addr),
            None => format!("{:#010x}", a.addr),
        },
        Arg::RegisterMem(m) => format!("{:#x}({})", m.offset, render_register(m.reg)),
    }
}

fn render_register(reg: Register) -> String {
    match reg {
        Register::Gpr(n) => format!("$r{}", n),
        Register::Cop0(n) => format!("$cop0_{}", n),
        Register::Cop2Data(n) => format!("$cop2d_{}", n),
        Register::Cop2Control(n) => format!("$cop2c_{}", n),
        Register::Temp(n) => format!("$t{}", n),
    }
}

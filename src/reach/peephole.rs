//! Peephole simplification (§4.2, §9 "Peephole opacity"): a small,
//! explicitly non-exhaustive set of local rewrites applied per block.
//! The spec treats the exact rule set as underspecified; this
//! implementation only removes or fuses behavior-preserving micro-ops
//! and never adds a new side effect, and it never changes a block's
//! `outs`/`ins` edges or the set of addresses it represents.

use super::BlockMap;
use crate::debug::DebugSource;
use crate::micro::{Arg, MicroAssemblyBlock, MicroOp};

/// Runs peephole simplification over every block in place.
pub fn run_peephole(blocks: &mut BlockMap, debug: &dyn DebugSource) {
    for block in blocks.values_mut() {
        simplify_block(block, debug);
    }
}

fn simplify_block(block: &mut MicroAssemblyBlock, debug: &dyn DebugSource) {
    drop_padding_nops(block);
    resolve_symbols(block, debug);
}

/// Drops `Nop`s that sit alongside real instructions in the same
/// block (delay-slot padding that turned out to do nothing). A block
/// whose *only* content is a single `Nop` is left alone: that's a
/// legitimate decode, not padding.
fn drop_padding_nops(block: &mut MicroAssemblyBlock) {
    if block.insns.len() <= 1 {
        return;
    }
    block.insns.retain(|op| !matches!(op, MicroOp::Nop));
    if block.insns.is_empty() {
        block.insns.push(MicroOp::Nop);
    }
}

/// Fills in symbol names on `AddressValue` args that were constructed
/// before the relevant label was known. Cosmetic only (§4.1): it never
/// touches control flow or operand shape, only an optional label.
fn resolve_symbols(block: &mut MicroAssemblyBlock, debug: &dyn DebugSource) {
    for op in &mut block.insns {
        for arg in op_args_mut(op) {
            if let Arg::Address(addr) = arg {
                if addr.symbol.is_none() {
                    addr.symbol = debug.symbol_name(addr.addr).map(str::to_owned);
                }
            }
        }
    }
}

fn op_args_mut(op: &mut MicroOp) -> Vec<&mut Arg> {
    match op {
        MicroOp::Nop => vec![],
        MicroOp::Data(a) => vec![a],
        MicroOp::Copy { dst, src } => vec![dst, src],
        MicroOp::Add { dst, lhs, rhs }
        | MicroOp::Sub { dst, lhs, rhs }
        | MicroOp::And { dst, lhs, rhs }
        | MicroOp::Or { dst, lhs, rhs }
        | MicroOp::XOr { dst, lhs, rhs }
        | MicroOp::SetEq { dst, lhs, rhs }
        | MicroOp::SetNEq { dst, lhs, rhs }
        | MicroOp::SSetL { dst, lhs, rhs }
        | MicroOp::SSetLE { dst, lhs, rhs }
        | MicroOp::USetL { dst, lhs, rhs } => vec![dst, lhs, rhs],
        MicroOp::Not { dst, src } => vec![dst, src],
        MicroOp::Shl { dst, src, amount }
        | MicroOp::Srl { dst, src, amount }
        | MicroOp::Sra { dst, src, amount } => vec![dst, src, amount],
        MicroOp::Jmp { target } => vec![target],
        MicroOp::JmpIf { cond, target } => vec![cond, target],
        MicroOp::Call { link, target } => vec![link, target],
        MicroOp::Return { link } => vec![link],
        MicroOp::CopyInsn { dst, src, .. } => vec![dst, src],
        MicroOp::SignedCastInsn { dst, src, .. } | MicroOp::UnsignedCastInsn { dst, src, .. } => {
            vec![dst, src]
        }
        MicroOp::UnsupportedInsn { args, .. } => args.iter_mut().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::StaticDebugSource;

    #[test]
    fn drops_padding_nops_but_keeps_a_lone_one() {
        let mut block = MicroAssemblyBlock::new(0);
        block.push(MicroOp::Nop);
        block.push(MicroOp::Jmp { target: Arg::constant(0x10, 32) });
        drop_padding_nops(&mut block);
        assert_eq!(block.insns, vec![MicroOp::Jmp { target: Arg::constant(0x10, 32) }]);

        let mut lone = MicroAssemblyBlock::new(4);
        lone.push(MicroOp::Nop);
        drop_padding_nops(&mut lone);
        assert_eq!(lone.insns, vec![MicroOp::Nop]);
    }

    #[test]
    fn resolves_previously_unresolved_symbols() {
        let debug = StaticDebugSource::new().with_label(0x8006_0000, "g_table");
        let mut block = MicroAssemblyBlock::new(0);
        block.push(MicroOp::Copy {
            dst: Arg::register(crate::micro::Register::gpr(2), 32),
            src: Arg::address(0x8006_0000, None, 32),
        });
        resolve_symbols(&mut block, &debug);
        match &block.insns[0] {
            MicroOp::Copy { src: Arg::Address(a), .. } => {
                assert_eq!(a.symbol.as_deref(), Some("g_table"));
            }
            _ => panic!("expected a Copy with an Address source"),
        }
    }
}

//! Micro-op opcodes (§3.3): the closed set plus the boxed forms used
//! for sized memory transfers and unsupported instructions.

use super::arg::Arg;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicroOp {
    Nop,
    /// Opaque word that decoded to no recognized opcode.
    Data(Arg),
    Copy { dst: Arg, src: Arg },
    Add { dst: Arg, lhs: Arg, rhs: Arg },
    Sub { dst: Arg, lhs: Arg, rhs: Arg },
    And { dst: Arg, lhs: Arg, rhs: Arg },
    Or { dst: Arg, lhs: Arg, rhs: Arg },
    XOr { dst: Arg, lhs: Arg, rhs: Arg },
    Not { dst: Arg, src: Arg },
    Shl { dst: Arg, src: Arg, amount: Arg },
    Srl { dst: Arg, src: Arg, amount: Arg },
    Sra { dst: Arg, src: Arg, amount: Arg },
    SetEq { dst: Arg, lhs: Arg, rhs: Arg },
    SetNEq { dst: Arg, lhs: Arg, rhs: Arg },
    SSetL { dst: Arg, lhs: Arg, rhs: Arg },
    SSetLE { dst: Arg, lhs: Arg, rhs: Arg },
    USetL { dst: Arg, lhs: Arg, rhs: Arg },
    Jmp { target: Arg },
    JmpIf { cond: Arg, target: Arg },
    Call { link: Arg, target: Arg },
    Return { link: Arg },
    /// Sized copy between a register and a (possibly gp-resolved)
    /// memory operand; `width` is the load/store width in bits.
    CopyInsn { dst: Arg, src: Arg, width: u8 },
    SignedCastInsn { dst: Arg, src: Arg, from_bits: u8 },
    UnsignedCastInsn { dst: Arg, src: Arg, from_bits: u8 },
    UnsupportedInsn { name: &'static str, args: Vec<Arg> },
}

impl MicroOp {
    /// True for the handful of ops that end a block's control flow
    /// (used to decide whether fall-through `Control` is emitted and,
    /// later, whether fusion must split a basic block).
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            MicroOp::Jmp { .. }
                | MicroOp::JmpIf { .. }
                | MicroOp::Call { .. }
                | MicroOp::Return { .. }
        )
    }

    pub fn inputs(&self) -> Vec<Arg> {
        match self {
            MicroOp::Nop => vec![],
            MicroOp::Data(a) => vec![a.clone()],
            MicroOp::Copy { src, .. } => vec![src.clone()],
            MicroOp::Add { lhs, rhs, .. }
            | MicroOp::Sub { lhs, rhs, .. }
            | MicroOp::And { lhs, rhs, .. }
            | MicroOp::Or { lhs, rhs, .. }
            | MicroOp::XOr { lhs, rhs, .. }
            | MicroOp::SetEq { lhs, rhs, .. }
            | MicroOp::SetNEq { lhs, rhs, .. }
            | MicroOp::SSetL { lhs, rhs, .. }
            | MicroOp::SSetLE { lhs, rhs, .. }
            | MicroOp::USetL { lhs, rhs, .. } => vec![lhs.clone(), rhs.clone()],
            MicroOp::Not { src, .. } => vec![src.clone()],
            MicroOp::Shl { src, amount, .. }
            | MicroOp::Srl { src, amount, .. }
            | MicroOp::Sra { src, amount, .. } => vec![src.clone(), amount.clone()],
            MicroOp::Jmp { target } => vec![target.clone()],
            MicroOp::JmpIf { cond, target } => vec![cond.clone(), target.clone()],
            MicroOp::Call { target, .. } => vec![target.clone()],
            MicroOp::Return { link } => vec![link.clone()],
            MicroOp::CopyInsn { src, .. } => vec![src.clone()],
            MicroOp::SignedCastInsn { src, .. } | MicroOp::UnsignedCastInsn { src, .. } => {
                vec![src.clone()]
            }
            MicroOp::UnsupportedInsn { args, .. } => args.clone(),
        }
    }

    pub fn output(&self) -> Option<Arg> {
        match self {
            MicroOp::Copy { dst, .. }
            | MicroOp::Add { dst, .. }
            | MicroOp::Sub { dst, .. }
            | MicroOp::And { dst, .. }
            | MicroOp::Or { dst, .. }
            | MicroOp::XOr { dst, .. }
            | MicroOp::Not { dst, .. }
            | MicroOp::Shl { dst, .. }
            | MicroOp::Srl { dst, .. }
            | MicroOp::Sra { dst, .. }
            | MicroOp::SetEq { dst, .. }
            | MicroOp::SetNEq { dst, .. }
            | MicroOp::SSetL { dst, .. }
            | MicroOp::SSetLE { dst, .. }
            | MicroOp::USetL { dst, .. }
            | MicroOp::CopyInsn { dst, .. }
            | MicroOp::SignedCastInsn { dst, .. }
            | MicroOp::UnsignedCastInsn { dst, .. } => Some(dst.clone()),
            MicroOp::Call { link, .. } => Some(link.clone()),
            _ => None,
        }
    }
}

/// How control reaches a successor block (§3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpType {
    Call,
    CallConditional,
    Jump,
    JumpConditional,
    /// Sequential fall-through: the next block *may* execute.
    Control,
}

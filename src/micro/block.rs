//! `MicroAssemblyBlock` (§3.3).

use std::collections::{BTreeMap, BTreeSet};

use crate::exe::LocalAddr;
use super::arg::Arg;
use super::op::{JumpType, MicroOp};
use super::reg::Register;

/// A straight-line run of micro-ops owned by one local address, with
/// typed in/out edges to other blocks (keyed by local address, per
/// §3.3's invariant that every block's `address` equals its key in the
/// enclosing map).
#[derive(Debug, Clone)]
pub struct MicroAssemblyBlock {
    pub address: LocalAddr,
    pub insns: Vec<MicroOp>,
    pub outs: BTreeMap<LocalAddr, JumpType>,
    pub ins: BTreeMap<LocalAddr, JumpType>,
    pub owning_functions: BTreeSet<LocalAddr>,
}

impl MicroAssemblyBlock {
    pub fn new(address: LocalAddr) -> Self {
        MicroAssemblyBlock {
            address,
            insns: Vec::new(),
            outs: BTreeMap::new(),
            ins: BTreeMap::new(),
            owning_functions: BTreeSet::new(),
        }
    }

    pub fn push(&mut self, op: MicroOp) {
        self.insns.push(op);
    }

    pub fn add_out(&mut self, target: LocalAddr, kind: JumpType) {
        self.outs.insert(target, kind);
    }

    /// True iff this block's only outgoing edge is a `Control`
    /// fall-through (used by basic-block fusion, §4.2).
    pub fn falls_through_only(&self) -> bool {
        self.outs.len() == 1 && self.outs.values().all(|k| *k == JumpType::Control)
    }

    pub fn has_non_control_out(&self) -> bool {
        self.outs.values().any(|k| *k != JumpType::Control)
    }

    /// Registers read across every instruction in the block, minus
    /// those written earlier in the same block (a conservative
    /// over-approximation is acceptable; under-approximation is not,
    /// since callers use this for structural-node input sets, §3.4).
    pub fn input_registers(&self) -> BTreeSet<Register> {
        let mut written = BTreeSet::new();
        let mut inputs = BTreeSet::new();
        for insn in &self.insns {
            for arg in insn.inputs() {
                for reg in arg.registers() {
                    if !written.contains(&reg) {
                        inputs.insert(reg);
                    }
                }
            }
            if let Some(Arg::Register(r)) = insn.output() {
                written.insert(r.reg);
            }
        }
        inputs
    }

    pub fn output_registers(&self) -> BTreeSet<Register> {
        self.insns
            .iter()
            .filter_map(|i| i.output())
            .filter_map(|a| match a {
                Arg::Register(r) => Some(r.reg),
                _ => None,
            })
            .collect()
    }
}

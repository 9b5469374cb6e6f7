//! Basic-block fusion (§4.2): merges straight-line chains of
//! single-instruction micro-blocks produced by the worklist decoder
//! into maximal basic blocks, using each block's `ins` edge kinds to
//! decide whether a merge is safe.
//!
//! Grounded on the teacher's `cpu/disassembler.rs` linear scan, which
//! walked a flat, already-basic-block-sized instruction stream; MIPS
//! decoding instead produces one micro-block per decoded word, so this
//! pass recovers basic-block granularity after the fact.

use super::BlockMap;
use crate::exe::LocalAddr;
use crate::micro::{JumpType, MicroAssemblyBlock};

/// Fuses straight-line runs of blocks into basic blocks (§4.2, §8
/// "Fusion soundness"). A block `b` is folded into the growing basic
/// block `bb` iff `b.ins` holds only `Control` edges *and* `bb` itself
/// hasn't already ended in a real transfer (i.e. `bb`'s only outgoing
/// edge is itself `Control`).
pub fn fuse_basic_blocks(mut blocks: BlockMap) -> BlockMap {
    let addresses: Vec<LocalAddr> = blocks.keys().copied().collect();
    let mut fused = BlockMap::new();
    let mut idx = 0;

    while idx < addresses.len() {
        let start = addresses[idx];
        let Some(mut bb) = blocks.remove(&start) else {
            idx += 1;
            continue;
        };
        idx += 1;

        while idx < addresses.len() {
            let next_addr = addresses[idx];
            if !can_fuse(&bb, &blocks, next_addr) {
                break;
            }
            let next = blocks
                .remove(&next_addr)
                .expect("next_addr came from the same map being scanned");
            bb.outs = next.outs;
            bb.insns.extend(next.insns);
            idx += 1;
        }

        fused.insert(start, bb);
    }

    fused
}

fn can_fuse(bb: &MicroAssemblyBlock, blocks: &BlockMap, next_addr: LocalAddr) -> bool {
    if !bb.falls_through_only() {
        return false;
    }
    let Some(next) = blocks.get(&next_addr) else {
        return false;
    };
    !next.ins.is_empty() && next.ins.values().all(|k| *k == JumpType::Control)
}

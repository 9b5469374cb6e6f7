//! Reachability driver (C3, §4.2): worklist disassembly, edge
//! reversal, basic-block fusion, function-ownership tagging, and
//! peephole simplification.
//!
//! Grounded on the teacher's `cpu/disassembler.rs` linear scan over a
//! ROM's PRG pages, generalized from "walk every byte in order" to
//! "walk only what's reachable", since MIPS code (unlike a flat NES
//! opcode stream) interleaves with data and must be discovered by
//! following edges.

mod fusion;
mod ownership;
mod peephole;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::warn;

use crate::debug::DebugSource;
use crate::decoder::{self, DecodeSession, DelaySlotMode};
use crate::exe::{Executable, LocalAddr};
use crate::micro::{MicroAssemblyBlock, TempAllocator};

pub use fusion::fuse_basic_blocks;
pub use ownership::tag_function_ownership;
pub use peephole::run_peephole;

/// The decoded, post-fusion, ownership-tagged, peepholed micro-block
/// map: local address -> block. Every entry satisfies the block-key
/// identity invariant (§8): `map[a].address == a`.
pub type BlockMap = BTreeMap<LocalAddr, MicroAssemblyBlock>;

/// Runs the full C3 pipeline: disassemble from the entry points,
/// reverse edges, fuse basic blocks, tag function ownership, and
/// peephole. This is the single entry point `reach` exposes; the
/// sub-passes are public individually only so tests can exercise them
/// in isolation.
pub fn run(exe: &Executable, debug: &dyn DebugSource) -> BlockMap {
    let mut temps = TempAllocator::new();
    let mut callees = BTreeSet::new();
    let mut blocks = disassemble(exe, debug, &mut temps, &mut callees);
    reverse_edges(&mut blocks);
    let mut blocks = fuse_basic_blocks(blocks);
    tag_function_ownership(&mut blocks, exe, debug, &callees);
    run_peephole(&mut blocks, debug);
    blocks
}

/// Worklist disassembly (§4.2): seeded from `pc0` and every known
/// function entry, converted to local addresses. Terminates because
/// the text section is finite and each local address is decoded at
/// most once.
fn disassemble(
    exe: &Executable,
    debug: &dyn DebugSource,
    temps: &mut TempAllocator,
    callees: &mut BTreeSet<LocalAddr>,
) -> BlockMap {
    let mut blocks = BlockMap::new();
    let mut worklist: VecDeque<LocalAddr> = VecDeque::new();

    if let Ok(entry) = exe.entry_local() {
        worklist.push_back(entry);
    }
    for function in debug.functions() {
        if let Ok(local) = exe.to_local(function.global_address) {
            worklist.push_back(local);
        }
    }

    while let Some(addr) = worklist.pop_front() {
        if !exe.in_range(addr) || blocks.contains_key(&addr) {
            continue;
        }
        let Some(word) = exe.read_word(addr) else {
            warn!(addr, "address in range but word read failed");
            continue;
        };

        let mut block = MicroAssemblyBlock::new(addr);
        {
            let mut session = DecodeSession { exe, debug, temps, callees };
            decoder::decode_instruction(&mut session, &mut block, word, addr.wrapping_add(4), DelaySlotMode::None);
        }

        // `jal`/`jalr` targets are already recorded in `outs` (as
        // `Call`/`CallConditional`), so this single scan discovers
        // both control-flow successors and call targets; `callees`
        // itself is only consulted later, by function-ownership BFS.
        for &target in block.outs.keys() {
            if exe.in_range(target) && !blocks.contains_key(&target) {
                worklist.push_back(target);
            }
        }

        blocks.insert(addr, block);
    }

    blocks
}

/// Edge reversal (§4.2, §8): populates every block's `ins` from the
/// transpose of `outs` across the whole map. An `outs` target missing
/// from the map (`UnknownTarget`, §7) is logged and dropped rather
/// than failing the pass.
fn reverse_edges(blocks: &mut BlockMap) {
    let transposed: Vec<(LocalAddr, LocalAddr, crate::micro::JumpType)> = blocks
        .iter()
        .flat_map(|(&from, block)| block.outs.iter().map(move |(&to, &kind)| (from, to, kind)))
        .collect();

    for (from, to, kind) in transposed {
        if let Some(target_block) = blocks.get_mut(&to) {
            target_block.ins.insert(from, kind);
        } else {
            warn!(from, to, "outs edge targets an address missing from the block map (UnknownTarget)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::StaticDebugSource;
    use crate::exe::header;

    fn exe_with_words(words: &[u32]) -> Executable {
        let mut buf = vec![0u8; header::HEADER_SIZE];
        buf[0..8].copy_from_slice(header::MAGIC);
        buf[0x10..0x14].copy_from_slice(&0x8001_0000u32.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&0x8001_0000u32.to_le_bytes());
        buf[0x1C..0x20].copy_from_slice(&((words.len() * 4) as u32).to_le_bytes());
        for w in words {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        Executable::load(&buf).unwrap()
    }

    #[test]
    fn edge_reversal_is_transpose_of_outs() {
        let exe = exe_with_words(&[0, 0, 0]);
        let debug = StaticDebugSource::new();
        let blocks = run(&exe, &debug);
        for (addr, block) in blocks.iter() {
            for (&out_target, &kind) in block.outs.iter() {
                if let Some(target_block) = blocks.get(&out_target) {
                    assert_eq!(target_block.ins.get(addr), Some(&kind));
                }
            }
        }
    }

    #[test]
    fn block_key_identity_holds_after_full_pipeline() {
        let exe = exe_with_words(&[0, 0, 0, 0]);
        let debug = StaticDebugSource::new();
        let blocks = run(&exe, &debug);
        for (addr, block) in blocks.iter() {
            assert_eq!(*addr, block.address);
        }
    }
}

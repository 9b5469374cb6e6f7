//! Function-ownership tagging (§4.2): BFS from each call target,
//! following only `Jump`/`JumpConditional`/`Control` edges (never
//! `Call`), tagging every visited block as owned by that function. A
//! block may end up owned by more than one function when tail code is
//! shared between them.

use std::collections::{BTreeSet, VecDeque};

use super::BlockMap;
use crate::debug::DebugSource;
use crate::exe::{Executable, LocalAddr};
use crate::micro::JumpType;

/// Tags every block reachable from an entry point (the program entry,
/// every debug-supplied function, and every observed `jal`/`jalr`
/// target) with that entry's address, walking only intraprocedural
/// edges so a callee's body is never pulled into the caller.
pub fn tag_function_ownership(
    blocks: &mut BlockMap,
    exe: &Executable,
    debug: &dyn DebugSource,
    callees: &BTreeSet<LocalAddr>,
) {
    let mut entries: BTreeSet<LocalAddr> = callees.clone();
    if let Ok(entry) = exe.entry_local() {
        entries.insert(entry);
    }
    for function in debug.functions() {
        if let Ok(local) = exe.to_local(function.global_address) {
            entries.insert(local);
        }
    }

    for owner in entries {
        if !blocks.contains_key(&owner) {
            continue;
        }
        let reachable = reachable_from(blocks, owner);
        for addr in reachable {
            if let Some(block) = blocks.get_mut(&addr) {
                block.owning_functions.insert(owner);
            }
        }
    }
}

fn reachable_from(blocks: &BlockMap, owner: LocalAddr) -> BTreeSet<LocalAddr> {
    let mut seen = BTreeSet::new();
    let mut worklist = VecDeque::new();
    worklist.push_back(owner);

    while let Some(addr) = worklist.pop_front() {
        if !seen.insert(addr) {
            continue;
        }
        let Some(block) = blocks.get(&addr) else {
            continue;
        };
        for (&target, kind) in &block.outs {
            if matches!(kind, JumpType::Jump | JumpType::JumpConditional | JumpType::Control)
                && !seen.contains(&target)
            {
                worklist.push_back(target);
            }
        }
    }

    seen
}

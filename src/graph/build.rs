//! Builds the initial structural graph (§3.4) from one function's
//! post-fusion micro-blocks (§4.2's output), before any reduction
//! runs: one `Sequence` node per block, wired by the block's `outs`
//! edge kinds, with synthetic `Entry`/`Exit` nodes framing the
//! function.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::exe::LocalAddr;
use crate::micro::JumpType;
use crate::reach::BlockMap;

use super::{EdgeKind, Graph, Node, NodeId, SequenceNode};

/// Builds a structural graph scoped to one function: every block
/// whose `owning_functions` contains `function_entry`. Inter-
/// procedural `Call`/`CallConditional` edges are not modeled here
/// (§4.2's ownership BFS excludes them for the same reason: a call
/// doesn't bifurcate *this* function's control flow).
pub fn build_function_graph(blocks: &BlockMap, function_entry: LocalAddr) -> Graph {
    let mut graph = Graph::new();

    let member_addrs: Vec<LocalAddr> = blocks
        .iter()
        .filter(|(_, b)| b.owning_functions.contains(&function_entry))
        .map(|(&addr, _)| addr)
        .collect();

    let mut node_of: HashMap<LocalAddr, NodeId> = HashMap::new();
    for &addr in &member_addrs {
        let id = graph.fresh_id();
        let mut insns = BTreeMap::new();
        insns.insert(addr, blocks[&addr].clone());
        graph.insert_node(Node::Sequence(SequenceNode { id, insns }));
        node_of.insert(addr, id);
    }

    let entry_id = graph.fresh_id();
    graph.insert_node(Node::Entry(entry_id));
    let exit_id = graph.fresh_id();
    graph.insert_node(Node::Exit(exit_id));

    if let Some(&start_id) = node_of.get(&function_entry) {
        graph.add_edge(entry_id, start_id, EdgeKind::Entry);
    }

    for &addr in &member_addrs {
        let block = &blocks[&addr];
        let structural: Vec<(LocalAddr, JumpType)> = block
            .outs
            .iter()
            .filter(|(_, kind)| {
                matches!(kind, JumpType::Jump | JumpType::JumpConditional | JumpType::Control)
            })
            .map(|(&target, &kind)| (target, kind))
            .collect();

        let Some(&from_id) = node_of.get(&addr) else {
            continue;
        };

        if structural.is_empty() {
            graph.add_edge(from_id, exit_id, EdgeKind::Exit);
            continue;
        }

        let has_conditional = structural.iter().any(|(_, k)| *k == JumpType::JumpConditional);
        if structural.len() == 2 && has_conditional {
            for (target, kind) in &structural {
                let edge_kind = match kind {
                    JumpType::JumpConditional => EdgeKind::True,
                    _ => EdgeKind::False,
                };
                let to = node_of.get(target).copied().unwrap_or(exit_id);
                graph.add_edge(from_id, to, edge_kind);
            }
        } else {
            for (target, _) in &structural {
                let to = node_of.get(target).copied().unwrap_or(exit_id);
                graph.add_edge(from_id, to, EdgeKind::Always);
            }
        }
    }

    graph
}

//! Structural CFG reduction (C4, §4.3): sequence fusion, `IfNode`
//! reduction, and `WhileTrueNode` reduction, driven to a fixed point.
//!
//! Grounded in Design Notes §9 ("mutual mutation during reduction"):
//! each pass collects candidate IDs into a separate list before
//! applying any reduction, then re-scans after a non-empty pass, so a
//! reducer never mutates the graph while iterating over it.

use std::collections::BTreeMap;

use super::{CollectionNode, Edge, EdgeKind, Graph, IfNode, Node, NodeId, SequenceNode, WhileTrueNode};

/// Repeatedly scans the graph, attempting sequence fusion, `if`
/// reduction, then `while(true)` reduction at each candidate node;
/// terminates when a full pass makes no change (§4.3 "Driver"). Once
/// the fixed point is reached, every remaining `Sequence` node —
/// top-level or nested inside an `If`/`WhileTrue` — is frozen into a
/// `Collection`: no further sequence-fusion pass will ever touch it
/// again, so it becomes the "immutable and derived" snapshot §3.4
/// describes.
pub fn reduce(graph: &mut Graph) {
    loop {
        let mut changed = false;
        for id in graph.node_ids() {
            if !graph.contains(id) {
                continue;
            }
            if try_reduce_sequence(graph, id) {
                changed = true;
                continue;
            }
            if try_reduce_if(graph, id) {
                changed = true;
                continue;
            }
            if try_reduce_while_true(graph, id) {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for id in graph.node_ids() {
        if let Some(node) = graph.take_node(id) {
            graph.insert_node(freeze_sequences(node));
        }
    }
}

/// Converts every `Sequence` reachable from `node` (including `node`
/// itself) into a `Collection`, recursing into `If`/`WhileTrue`
/// children. Leaves `Entry`/`Exit`/`Collection` nodes untouched.
fn freeze_sequences(node: Node) -> Node {
    match node {
        Node::Sequence(n) => Node::Collection(CollectionNode { id: n.id, insns: n.insns }),
        Node::If(n) => Node::If(IfNode {
            id: n.id,
            condition: Box::new(freeze_sequences(*n.condition)),
            body: Box::new(freeze_sequences(*n.body)),
            inverted: n.inverted,
        }),
        Node::WhileTrue(n) => {
            Node::WhileTrue(WhileTrueNode { id: n.id, body: Box::new(freeze_sequences(*n.body)) })
        }
        other => other,
    }
}

fn is_sequence_leaf(node: Option<&Node>) -> bool {
    matches!(node, Some(Node::Sequence(_)) | Some(Node::Collection(_)))
}

fn take_leaf_insns(node: Node) -> BTreeMap<crate::exe::LocalAddr, crate::micro::MicroAssemblyBlock> {
    match node {
        Node::Sequence(n) => n.insns,
        Node::Collection(n) => n.insns,
        _ => unreachable!("is_sequence_leaf guards every call site"),
    }
}

/// Merges `a` into its successor `b` when `a`'s only outgoing edge is
/// an `AlwaysEdge` to `b` and `b`'s only incoming edge is that same
/// edge — i.e. a private straight-line hop between two leaf blocks.
/// Restricted to `Sequence`/`Collection` leaves on both ends so an
/// already-reduced `If`/`WhileTrue` is never flattened back into a
/// flat instruction map.
fn try_reduce_sequence(graph: &mut Graph, a: NodeId) -> bool {
    if !is_sequence_leaf(graph.node(a)) {
        return false;
    }
    let outs_a = graph.edges_from(a);
    if outs_a.len() != 1 || outs_a[0].kind != EdgeKind::Always {
        return false;
    }
    let b = outs_a[0].to;
    if b == a || !is_sequence_leaf(graph.node(b)) {
        return false;
    }
    let incoming_b = graph.edges_to(b);
    if incoming_b.len() != 1 || incoming_b[0].from != a {
        return false;
    }

    let outs_b: Vec<Edge> = graph.edges_from(b);
    let node_a = graph.take_node(a).expect("checked above");
    let node_b = graph.take_node(b).expect("checked above");
    graph.remove_edges_touching(a);
    graph.remove_edges_touching(b);

    let new_id = graph.fresh_id();
    let mut insns = take_leaf_insns(node_a);
    insns.extend(take_leaf_insns(node_b));
    graph.insert_node(Node::Sequence(SequenceNode { id: new_id, insns }));
    graph.rewire_incoming(a, new_id);

    for edge in outs_b {
        let to = if edge.to == a || edge.to == b { new_id } else { edge.to };
        graph.add_edge(new_id, to, edge.kind);
    }
    true
}

/// Returns the common successor if `candidate` plays the "body" role
/// for an if rooted at `c`: exactly one incoming edge, from `c`, and
/// exactly one outgoing `AlwaysEdge`.
fn body_common(graph: &Graph, candidate: NodeId, c: NodeId) -> Option<NodeId> {
    let incoming = graph.edges_to(candidate);
    if incoming.len() != 1 || incoming[0].from != c {
        return None;
    }
    let outgoing = graph.edges_from(candidate);
    if outgoing.len() != 1 || outgoing[0].kind != EdgeKind::Always {
        return None;
    }
    Some(outgoing[0].to)
}

/// IfNode candidacy and reduction (§4.3). `c` qualifies iff it has
/// exactly two outgoing edges, one `TrueEdge` and one `FalseEdge`, and
/// exactly one of the two targets plays the body role (§4.3's
/// candidate-exclusivity invariant, §8).
fn try_reduce_if(graph: &mut Graph, c: NodeId) -> bool {
    if matches!(graph.node(c), None | Some(Node::Entry(_)) | Some(Node::Exit(_))) {
        return false;
    }
    let outs = graph.edges_from(c);
    if outs.len() != 2 {
        return false;
    }
    let Some(true_edge) = outs.iter().copied().find(|e| e.kind == EdgeKind::True) else {
        return false;
    };
    let Some(false_edge) = outs.iter().copied().find(|e| e.kind == EdgeKind::False) else {
        return false;
    };

    let true_is_body = body_common(graph, true_edge.to, c) == Some(false_edge.to);
    let false_is_body = body_common(graph, false_edge.to, c) == Some(true_edge.to);

    let (body_id, common, inverted) = match (true_is_body, false_is_body) {
        (true, false) => (true_edge.to, false_edge.to, false),
        (false, true) => (false_edge.to, true_edge.to, true),
        _ => return false,
    };

    let condition_node = graph.take_node(c).expect("checked above");
    let body_node = graph.take_node(body_id).expect("body_common only returns live nodes");
    graph.remove_edges_touching(c);
    graph.remove_edges_touching(body_id);

    let new_id = graph.fresh_id();
    graph.insert_node(Node::If(IfNode {
        id: new_id,
        condition: Box::new(condition_node),
        body: Box::new(body_node),
        inverted,
    }));
    graph.rewire_incoming(c, new_id);
    graph.add_edge(new_id, common, EdgeKind::Always);
    true
}

/// WhileTrueNode candidacy and reduction (§4.3): `b` qualifies iff its
/// only outgoing edge is an `AlwaysEdge` back to itself.
fn try_reduce_while_true(graph: &mut Graph, b: NodeId) -> bool {
    if matches!(graph.node(b), None | Some(Node::Entry(_)) | Some(Node::Exit(_))) {
        return false;
    }
    let outs = graph.edges_from(b);
    if outs.len() != 1 {
        return false;
    }
    let edge = outs[0];
    if edge.kind != EdgeKind::Always || edge.to != b {
        return false;
    }

    let body_node = graph.take_node(b).expect("checked above");
    graph.remove_self_loop(b);

    let new_id = graph.fresh_id();
    graph.insert_node(Node::WhileTrue(WhileTrueNode { id: new_id, body: Box::new(body_node) }));
    graph.rewire_incoming(b, new_id);
    graph.rewire_outgoing(b, new_id);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn leaf(graph: &mut Graph) -> NodeId {
        let id = graph.fresh_id();
        graph.insert_node(Node::Sequence(SequenceNode { id, insns: BTreeMap::new() }));
        id
    }

    fn leaf_at(graph: &mut Graph, addr: crate::exe::LocalAddr) -> NodeId {
        let id = graph.fresh_id();
        let mut insns = BTreeMap::new();
        insns.insert(addr, crate::micro::MicroAssemblyBlock::new(addr));
        graph.insert_node(Node::Sequence(SequenceNode { id, insns }));
        id
    }

    fn all_addresses(graph: &Graph) -> std::collections::BTreeSet<crate::exe::LocalAddr> {
        graph
            .node_ids()
            .into_iter()
            .flat_map(|id| graph.node(id).unwrap().addresses())
            .collect()
    }

    /// Scenario 5: `C -T→ B -A→ X`, `C -F→ X`, `B` has exactly one
    /// in-edge and one out-edge.
    #[test]
    fn if_reduction_collapses_the_diamond() {
        let mut g = Graph::new();
        let c = leaf(&mut g);
        let b = leaf(&mut g);
        let x = leaf(&mut g);
        g.add_edge(c, b, EdgeKind::True);
        g.add_edge(c, x, EdgeKind::False);
        g.add_edge(b, x, EdgeKind::Always);

        assert!(try_reduce_if(&mut g, c));
        assert_eq!(g.len(), 2); // the new If node plus X

        let if_id = g
            .node_ids()
            .into_iter()
            .find(|&id| matches!(g.node(id), Some(Node::If(_))))
            .unwrap();
        match g.node(if_id).unwrap() {
            Node::If(n) => assert!(!n.inverted),
            _ => unreachable!(),
        }
        let outs = g.edges_from(if_id);
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].kind, EdgeKind::Always);
        assert_eq!(outs[0].to, x);
    }

    #[test]
    fn if_reduction_sets_inverted_when_the_false_branch_is_the_body() {
        let mut g = Graph::new();
        let c = leaf(&mut g);
        let b = leaf(&mut g);
        let x = leaf(&mut g);
        g.add_edge(c, x, EdgeKind::True);
        g.add_edge(c, b, EdgeKind::False);
        g.add_edge(b, x, EdgeKind::Always);

        assert!(try_reduce_if(&mut g, c));
        let if_id = g
            .node_ids()
            .into_iter()
            .find(|&id| matches!(g.node(id), Some(Node::If(_))))
            .unwrap();
        match g.node(if_id).unwrap() {
            Node::If(n) => assert!(n.inverted),
            _ => unreachable!(),
        }
    }

    /// Scenario 6: a single node with a self-loop `AlwaysEdge`.
    #[test]
    fn while_true_reduction_removes_the_self_loop() {
        let mut g = Graph::new();
        let b = leaf(&mut g);
        g.add_edge(b, b, EdgeKind::Always);

        assert!(try_reduce_while_true(&mut g, b));
        assert_eq!(g.len(), 1);
        let while_id = g.node_ids()[0];
        assert!(matches!(g.node(while_id), Some(Node::WhileTrue(_))));
        assert!(g.edges_from(while_id).is_empty());
    }

    #[test]
    fn while_true_preserves_external_incoming_edges() {
        let mut g = Graph::new();
        let pred = leaf(&mut g);
        let b = leaf(&mut g);
        g.add_edge(pred, b, EdgeKind::Always);
        g.add_edge(b, b, EdgeKind::Always);

        assert!(try_reduce_while_true(&mut g, b));
        let while_id = g
            .node_ids()
            .into_iter()
            .find(|&id| matches!(g.node(id), Some(Node::WhileTrue(_))))
            .unwrap();
        let incoming = g.edges_to(while_id);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].from, pred);
    }

    #[test]
    fn sequence_fusion_merges_a_private_straight_line_hop() {
        let mut g = Graph::new();
        let a = leaf(&mut g);
        let b = leaf(&mut g);
        g.add_edge(a, b, EdgeKind::Always);

        assert!(try_reduce_sequence(&mut g, a));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn sequence_fusion_refuses_a_shared_successor() {
        let mut g = Graph::new();
        let a = leaf(&mut g);
        let b = leaf(&mut g);
        let other = leaf(&mut g);
        g.add_edge(a, b, EdgeKind::Always);
        g.add_edge(other, b, EdgeKind::Always); // b now has two predecessors

        assert!(!try_reduce_sequence(&mut g, a));
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn full_driver_reaches_a_fixed_point_on_an_if_inside_a_sequence() {
        // entry_seq -> C -T-> B -A-> X ; C -F-> X ; X is a further
        // sequence leaf so the driver must both fuse and if-reduce.
        let mut g = Graph::new();
        let head = leaf(&mut g);
        let c = leaf(&mut g);
        let b = leaf(&mut g);
        let x = leaf(&mut g);
        let tail = leaf(&mut g);

        g.add_edge(head, c, EdgeKind::Always);
        g.add_edge(c, b, EdgeKind::True);
        g.add_edge(c, x, EdgeKind::False);
        g.add_edge(b, x, EdgeKind::Always);
        g.add_edge(x, tail, EdgeKind::Always);

        reduce(&mut g);

        // head+if+x+tail should all have fused/reduced down to a
        // small number of nodes with no further candidates left.
        assert!(g.len() <= 3);
        assert!(g.node_ids().into_iter().any(|id| matches!(g.node(id), Some(Node::If(_)))));
    }

    /// §8 "Address conservation under structural reduction": folding
    /// sequences/ifs/whiles into composite nodes must never drop or
    /// duplicate an instruction address, only regroup them.
    #[test]
    fn reduce_preserves_the_full_set_of_instruction_addresses() {
        let mut g = Graph::new();
        let head = leaf_at(&mut g, 0);
        let c = leaf_at(&mut g, 4);
        let b = leaf_at(&mut g, 8);
        let x = leaf_at(&mut g, 12);
        let tail = leaf_at(&mut g, 16);

        g.add_edge(head, c, EdgeKind::Always);
        g.add_edge(c, b, EdgeKind::True);
        g.add_edge(c, x, EdgeKind::False);
        g.add_edge(b, x, EdgeKind::Always);
        g.add_edge(x, tail, EdgeKind::Always);

        let before = all_addresses(&g);
        reduce(&mut g);
        let after = all_addresses(&g);

        assert_eq!(before, after);
        assert_eq!(after.len(), 5);
    }

    /// Once the fixed point is reached, every surviving `Sequence` node
    /// is frozen into a `Collection` so no further pass can touch it.
    #[test]
    fn reduce_freezes_surviving_sequences_into_collections() {
        let mut g = Graph::new();
        let a = leaf(&mut g);
        let b = leaf(&mut g);
        g.add_edge(a, b, EdgeKind::Always);

        reduce(&mut g);

        assert_eq!(g.len(), 1);
        let id = g.node_ids()[0];
        assert!(matches!(g.node(id), Some(Node::Collection(_))));
    }

    /// `Collection`s nested inside a reduced `If`/`WhileTrue` are frozen
    /// too, not just top-level survivors.
    #[test]
    fn reduce_freezes_sequences_nested_inside_reduced_composites() {
        let mut g = Graph::new();
        let c = leaf(&mut g);
        let body = leaf(&mut g);
        g.add_edge(body, body, EdgeKind::Always);
        g.add_edge(c, body, EdgeKind::Always);

        reduce(&mut g);

        let while_id = g
            .node_ids()
            .into_iter()
            .find(|&id| matches!(g.node(id), Some(Node::WhileTrue(_))))
            .unwrap();
        match g.node(while_id).unwrap() {
            Node::WhileTrue(n) => assert!(matches!(*n.body, Node::Collection(_))),
            _ => unreachable!(),
        }
    }

    #[test]
    fn candidate_exclusivity_if_and_while_true_are_disjoint() {
        // A self-looping node can never also look like an if-candidate
        // (it has one outgoing edge, not the two an if needs).
        let mut g = Graph::new();
        let b = leaf(&mut g);
        g.add_edge(b, b, EdgeKind::Always);
        assert!(!try_reduce_if(&mut g, b));
        assert!(try_reduce_while_true(&mut g, b));
    }
}

//! Flattening a normalized tree into the ordered leaf sequence a banner
//! persists. Groups are structural only and leave no trace in the rows.

use crate::schema::{AclLeaf, LeafRule, RuleNode};

/// Emit every leaf in depth-first document order, discarding group
/// metadata. The result length equals the number of leaves the
/// normalizer kept.
pub fn flatten(nodes: &[RuleNode]) -> Vec<LeafRule> {
    let mut out = Vec::new();
    walk(nodes, &mut out);
    out
}

fn walk(nodes: &[RuleNode], out: &mut Vec<LeafRule>) {
    for node in nodes {
        match node {
            RuleNode::Group(g) => walk(&g.rules, out),
            RuleNode::Leaf(l) => out.push(l.clone()),
        }
    }
}

/// Re-sequence a leaf list into persisted rows with a contiguous
/// `execution_order` starting at 1 in emission order.
pub fn acl_rows(leaves: &[LeafRule]) -> Vec<AclLeaf> {
    leaves
        .iter()
        .enumerate()
        .map(|(i, leaf)| AclLeaf {
            logical: leaf.logical,
            rule_type: leaf.rule_type.clone(),
            comparison: leaf.comparison,
            data: leaf.data.to_stored(),
            execution_order: (i + 1) as u32,
        })
        .collect()
}

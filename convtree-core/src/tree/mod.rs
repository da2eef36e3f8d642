//! Navigable conversation tree
//!
//! ```text
//! session:<id>
//! ├── msg:<uuid>                  user prompt
//! │   └── msg:<uuid>/text:0
//! ├── msg:<uuid>                  assistant turn (consolidated)
//! │   ├── msg:<uuid>/text:0
//! │   └── tool:<tool_use_id>      TOOL_INPUT
//! │       └── result:<tool_use_id>
//! └── ...
//! ```
//!
//! Trees are rebuilt from scratch on every refresh. Because ids are
//! deterministic, presentation state keyed by id (expansion, selection)
//! carries over with [`Tree::expansion_state`] / [`Tree::apply_expansion`].

mod builder;
mod node;

pub use builder::{build_tree, IdAllocator, TreeBuilder};
pub use node::{
    MessageNode, NodeData, ResultNode, SessionNode, TextNode, ToolCallNode, ToolStatus, TreeNode,
};

use crate::classify::ClassificationResult;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// A built tree plus the classification side table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tree {
    pub root: TreeNode,
    /// Node id → classification, for every classified node
    pub classifications: BTreeMap<String, ClassificationResult>,
}

impl Tree {
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        self.root.find(id)
    }

    pub fn classification(&self, id: &str) -> Option<&ClassificationResult> {
        self.classifications.get(id)
    }

    /// Pre-order traversal; the root has depth 0.
    pub fn walk<F>(&self, mut f: F)
    where
        F: FnMut(&TreeNode, usize),
    {
        self.root.walk(&mut f);
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _| count += 1);
        count
    }

    /// Every node id in pre-order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.walk(|n, _| ids.push(n.id.clone()));
        ids
    }

    pub fn label(&self, id: &str) -> Option<String> {
        self.find(id).map(TreeNode::label)
    }

    pub fn expanded_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        self.walk(|n, _| {
            if n.expanded {
                ids.insert(n.id.clone());
            }
        });
        ids
    }

    /// Expansion flag of every node, keyed by id.
    pub fn expansion_state(&self) -> BTreeMap<String, bool> {
        let mut state = BTreeMap::new();
        self.walk(|n, _| {
            state.insert(n.id.clone(), n.expanded);
        });
        state
    }

    /// Restore expansion from a previous tree. Nodes the previous tree did
    /// not have keep their initial state.
    pub fn apply_expansion(&mut self, state: &BTreeMap<String, bool>) {
        self.root.walk_mut(&mut |n| {
            if let Some(expanded) = state.get(&n.id) {
                n.expanded = *expanded;
            }
        });
    }

    pub fn set_expanded(&mut self, id: &str, expanded: bool) -> bool {
        match self.root.find_mut(id) {
            Some(node) => {
                node.expanded = expanded;
                true
            }
            None => false,
        }
    }

    /// Indented outline, one node per line.
    ///
    /// With `respect_expansion`, children of collapsed nodes are hidden.
    pub fn render_outline(&self, respect_expansion: bool) -> String {
        let mut out = String::new();
        render_node(self, &self.root, 0, respect_expansion, &mut out);
        out
    }
}

fn render_node(
    tree: &Tree,
    node: &TreeNode,
    depth: usize,
    respect_expansion: bool,
    out: &mut String,
) {
    let marker = if node.is_leaf() {
        "-"
    } else if node.expanded || !respect_expansion {
        "▾"
    } else {
        "▸"
    };
    let _ = write!(out, "{}{} {}", "  ".repeat(depth), marker, node.label());
    if let Some(c) = tree.classification(&node.id) {
        let _ = write!(out, "  <{}>", c.content_type);
    }
    out.push('\n');

    if respect_expansion && !node.expanded {
        return;
    }
    for child in &node.children {
        render_node(tree, child, depth + 1, respect_expansion, out);
    }
}

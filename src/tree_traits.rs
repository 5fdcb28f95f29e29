/*
Debug rendering of the node graph.

A YAML tree has no natural label for its nodes, so each node is shown as
`[index] TYPE key: val` with the parts it actually holds.
 */
use termtree::Tree as TermTree;
use tracing::instrument;

use crate::domain::{NodeId, Tree, ROOT};
use crate::errors::YamlResult;

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> YamlResult<TermTree<String>>;
}

fn label(tree: &Tree<'_>, node: NodeId) -> YamlResult<String> {
    let node_type = tree.node_type(node)?;
    let mut label = format!("[{node}] {}", node_type.type_str());
    if node_type.has_key() {
        label.push(' ');
        label.push_str(tree.key(node)?);
        label.push(':');
    }
    if node_type.has_val() {
        label.push(' ');
        label.push_str(tree.val(node)?);
    }
    Ok(label)
}

fn build(tree: &Tree<'_>, node: NodeId) -> YamlResult<TermTree<String>> {
    let leaves = tree
        .children(node)?
        .map(|child| build(tree, child))
        .collect::<YamlResult<Vec<_>>>()?;
    Ok(TermTree::new(label(tree, node)?).with_leaves(leaves))
}

impl TreeNodeConvert for Tree<'_> {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> YamlResult<TermTree<String>> {
        build(self, ROOT)
    }
}

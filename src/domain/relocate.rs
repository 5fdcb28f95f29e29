//! Subtree relocation: within one parent, to a new parent, and across trees.
//!
//! Every operation validates all of its preconditions before touching a
//! link, so a rejected request leaves the tree exactly as it was.

use tracing::{debug, instrument};

use crate::domain::node_type::NodeType;
use crate::domain::scalar::ScalarRef;
use crate::domain::tree::{check_accepts, NodeId, Tree};
use crate::error_channel::{self, violation};
use crate::errors::YamlResult;

impl<'s> Tree<'s> {
    /// Return the parent of a node that may be relocated.
    fn movable_parent(&self, node: NodeId) -> YamlResult<NodeId> {
        self.get(node)?
            .parent
            .ok_or_else(|| violation(format!("root node {node} cannot be relocated")))
    }

    /// Move `node` so that it directly follows its sibling `after`, or
    /// becomes the first child of its parent when `after` is `None`.
    ///
    /// `after` must share `node`'s parent; changing parents is
    /// [`Tree::move_to_new_parent`].
    #[instrument(level = "debug", skip(self))]
    pub fn move_within(&mut self, node: NodeId, after: Option<NodeId>) -> YamlResult<()> {
        error_channel::init_once();
        let parent = self.movable_parent(node)?;
        if let Some(a) = after {
            if self.get(a)?.parent != Some(parent) {
                return Err(violation(format!(
                    "node {a} is not a sibling of node {node}"
                )));
            }
        }
        self.move_to_new_parent(node, parent, after)
    }

    /// Move `node` with its subtree under `new_parent`, right after `after`
    /// (first child when `None`).
    #[instrument(level = "debug", skip(self))]
    pub fn move_to_new_parent(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        after: Option<NodeId>,
    ) -> YamlResult<()> {
        error_channel::init_once();
        let old_parent = self.movable_parent(node)?;
        if new_parent == node || self.is_ancestor(node, new_parent)? {
            return Err(violation(format!(
                "moving node {node} under node {new_parent} would create a cycle"
            )));
        }
        if after == Some(node) {
            return Err(violation(format!("node {node} cannot be placed after itself")));
        }
        self.check_position(new_parent, after)?;

        let current = self.data(node);
        if old_parent == new_parent && current.prev_sibling == after {
            debug!(node, "node already in requested position");
            return Ok(());
        }
        check_accepts(self.data(new_parent).node_type, current.node_type).map_err(violation)?;

        self.unlink(node);
        self.link(node, new_parent, after);
        debug!(node, old_parent, new_parent, ?after, "moved subtree");
        Ok(())
    }

    /// Copy the subtree rooted at `node` in `src` into this tree under
    /// `new_parent`, right after `after`. Text referenced by the copy is
    /// duplicated into this tree's arena; `src` is left untouched.
    ///
    /// Returns the index of the copy's root in this tree.
    #[instrument(level = "debug", skip(self, src))]
    pub fn move_from_tree(
        &mut self,
        src: &Tree<'_>,
        node: NodeId,
        new_parent: NodeId,
        after: Option<NodeId>,
    ) -> YamlResult<NodeId> {
        error_channel::init_once();
        src.movable_parent(node)?;
        self.check_position(new_parent, after)?;
        let node_type = src.data(node).node_type;
        check_accepts(self.data(new_parent).node_type, node_type).map_err(violation)?;

        let arena_before = self.arena_size();
        let copy = self.alloc();
        if let Err(e) = self.copy_from(src, node, copy) {
            self.free_subtree(copy);
            return Err(e);
        }
        self.link(copy, new_parent, after);
        debug!(
            node,
            copy,
            copied_bytes = self.arena_size() - arena_before,
            "copied subtree across trees"
        );
        Ok(copy)
    }

    /// Copy the subtree rooted at `node` to a new position in this same
    /// tree. Scalars are shared with the original rather than re-copied.
    #[instrument(level = "debug", skip(self))]
    pub fn duplicate(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        after: Option<NodeId>,
    ) -> YamlResult<NodeId> {
        error_channel::init_once();
        self.movable_parent(node)?;
        if new_parent == node || self.is_ancestor(node, new_parent)? {
            return Err(violation(format!(
                "node {new_parent} lies inside the subtree being duplicated"
            )));
        }
        self.check_position(new_parent, after)?;
        check_accepts(self.data(new_parent).node_type, self.data(node).node_type)
            .map_err(violation)?;

        let copy = self.alloc();
        self.copy_local(node, copy);
        self.link(copy, new_parent, after);
        debug!(node, copy, "duplicated subtree");
        Ok(copy)
    }

    /// Copy every child subtree of `node` under `parent`, in order, starting
    /// right after `after`. `parent` may be `node` itself but not one of its
    /// descendants.
    ///
    /// Returns the last node placed, or `after` when `node` has no children.
    #[instrument(level = "debug", skip(self))]
    pub fn duplicate_children(
        &mut self,
        node: NodeId,
        parent: NodeId,
        after: Option<NodeId>,
    ) -> YamlResult<Option<NodeId>> {
        error_channel::init_once();
        self.get(node)?;
        if self.is_ancestor(node, parent)? {
            return Err(violation(format!(
                "node {parent} lies inside the subtree of node {node}"
            )));
        }
        self.check_position(parent, after)?;
        let children: Vec<NodeId> = self.children(node)?.collect();
        let types: Vec<NodeType> = children.iter().map(|&c| self.data(c).node_type).collect();
        check_children_fit(self.data(parent).node_type, &types)?;

        let copies: Vec<NodeId> = children.into_iter().map(|c| self.copy_detached(c)).collect();
        let last = self.link_all(&copies, parent, after);
        debug!(node, parent, copied = copies.len(), "duplicated children");
        Ok(last)
    }

    /// Copy every child subtree of `node` in `src` under `parent` in this
    /// tree, starting right after `after`. All copied text goes to this
    /// tree's arena.
    ///
    /// Returns the last node placed, or `after` when `node` has no children.
    #[instrument(level = "debug", skip(self, src))]
    pub fn duplicate_children_from_tree(
        &mut self,
        src: &Tree<'_>,
        node: NodeId,
        parent: NodeId,
        after: Option<NodeId>,
    ) -> YamlResult<Option<NodeId>> {
        error_channel::init_once();
        src.get(node)?;
        self.check_position(parent, after)?;
        let types: Vec<NodeType> = src.children(node)?.map(|c| src.data(c).node_type).collect();
        check_children_fit(self.data(parent).node_type, &types)?;

        let copies = self.copy_children_from(src, node)?;
        let last = self.link_all(&copies, parent, after);
        debug!(node, parent, copied = copies.len(), "duplicated children across trees");
        Ok(last)
    }

    /// Give `loc` the type and value of `node` and append copies of
    /// `node`'s children after `loc`'s own. The key and document mark of
    /// `loc` are kept.
    #[instrument(level = "debug", skip(self))]
    pub fn duplicate_contents(&mut self, node: NodeId, loc: NodeId) -> YamlResult<()> {
        error_channel::init_once();
        let data = *self.get(node)?;
        self.get(loc)?;
        if loc == node || self.is_ancestor(node, loc)? {
            return Err(violation(format!(
                "node {loc} lies inside the subtree of node {node}"
            )));
        }
        let children: Vec<NodeId> = self.children(node)?.collect();
        let types: Vec<NodeType> = children.iter().map(|&c| self.data(c).node_type).collect();
        let node_type = self.contents_type(data.node_type, loc, &types)?;

        let copies: Vec<NodeId> = children.into_iter().map(|c| self.copy_detached(c)).collect();
        self.apply_contents(loc, node_type, data.val, &copies);
        Ok(())
    }

    /// [`Tree::duplicate_contents`] with `node` taken from `src`.
    #[instrument(level = "debug", skip(self, src))]
    pub fn duplicate_contents_from_tree(
        &mut self,
        src: &Tree<'_>,
        node: NodeId,
        loc: NodeId,
    ) -> YamlResult<()> {
        error_channel::init_once();
        let data = *src.get(node)?;
        self.get(loc)?;
        let types: Vec<NodeType> = src.children(node)?.map(|c| src.data(c).node_type).collect();
        let node_type = self.contents_type(data.node_type, loc, &types)?;

        let val = self.arena.copy(src.resolve(data.val)?);
        let copies = self.copy_children_from(src, node)?;
        self.apply_contents(loc, node_type, val, &copies);
        Ok(())
    }

    /// Like [`Tree::duplicate_children`], but a child whose key (under a
    /// map) or value (under a sequence) already exists in `parent` is not
    /// repeated. Of the two, the one that ends up closer to the end wins:
    /// an existing entry before the insertion point is replaced by the copy,
    /// one after it is moved into the copy's place.
    ///
    /// Returns the last node placed, or `after` when nothing was placed.
    #[instrument(level = "debug", skip(self))]
    pub fn duplicate_children_no_rep(
        &mut self,
        node: NodeId,
        parent: NodeId,
        after: Option<NodeId>,
    ) -> YamlResult<Option<NodeId>> {
        error_channel::init_once();
        self.get(node)?;
        if parent == node || self.is_ancestor(node, parent)? {
            return Err(violation(format!(
                "node {parent} lies inside the subtree of node {node}"
            )));
        }
        self.check_position(parent, after)?;
        let children: Vec<NodeId> = self.children(node)?.collect();
        let types: Vec<NodeType> = children.iter().map(|&c| self.data(c).node_type).collect();
        check_children_fit(self.data(parent).node_type, &types)?;

        let mut prev = after;
        for child in children {
            let Some(rep) = self.find_repetition(parent, child)? else {
                let copy = self.copy_detached(child);
                self.link(copy, parent, prev);
                prev = Some(copy);
                continue;
            };
            if Some(rep) == prev {
                continue;
            }
            let removable = rep != node && !self.is_ancestor(rep, node)?;
            if removable && self.precedes(parent, rep, prev)? {
                self.unlink(rep);
                self.free_subtree(rep);
                let copy = self.copy_detached(child);
                self.link(copy, parent, prev);
                prev = Some(copy);
            } else {
                self.unlink(rep);
                self.link(rep, parent, prev);
                prev = Some(rep);
            }
        }
        debug!(node, parent, ?prev, "duplicated children without repetitions");
        Ok(prev)
    }

    /// Child of `parent` that `child` would repeat: same key in a map, same
    /// value in a sequence.
    fn find_repetition(&self, parent: NodeId, child: NodeId) -> YamlResult<Option<NodeId>> {
        let parent_type = self.data(parent).node_type;
        let data = self.data(child);
        if parent_type.is_map() && data.node_type.has_key() {
            return self.find_child(parent, self.resolve(data.key)?);
        }
        if parent_type.is_seq() && data.node_type.is_val() {
            let val = self.resolve(data.val)?;
            for c in self.children(parent)? {
                let existing = self.data(c);
                if existing.node_type.is_val() && self.resolve(existing.val)? == val {
                    return Ok(Some(c));
                }
            }
        }
        Ok(None)
    }

    /// Whether `node` comes before the insertion point right after `after`.
    fn precedes(&self, parent: NodeId, node: NodeId, after: Option<NodeId>) -> YamlResult<bool> {
        let Some(after) = after else {
            return Ok(false);
        };
        let pos = self.child_pos(parent, node)?;
        let after_pos = self.child_pos(parent, after)?;
        Ok(pos < after_pos)
    }

    /// Type `loc` gets when it takes over the contents of a `source` node
    /// with children of `child_types`, checked against `loc`'s parent and
    /// current children.
    fn contents_type(
        &self,
        source: NodeType,
        loc: NodeId,
        child_types: &[NodeType],
    ) -> YamlResult<NodeType> {
        let positional = NodeType::KEY | NodeType::KEY_QUOTED | NodeType::DOC;
        let current = self.data(loc);
        let node_type = source.difference(positional) | (current.node_type & positional);
        if node_type.is_stream() && current.parent.is_some() {
            return Err(violation("only the root node can become a stream"));
        }
        if let Some(parent) = current.parent {
            check_accepts(self.data(parent).node_type, node_type).map_err(violation)?;
        }
        for c in self.children(loc)? {
            check_accepts(node_type, self.data(c).node_type).map_err(violation)?;
        }
        for &t in child_types {
            check_accepts(node_type, t).map_err(violation)?;
        }
        Ok(node_type)
    }

    fn apply_contents(&mut self, loc: NodeId, node_type: NodeType, val: ScalarRef, copies: &[NodeId]) {
        let key = self.data(loc).key;
        self.init_node(loc, node_type, key, val);
        let last = self.data(loc).last_child;
        self.link_all(copies, loc, last);
        debug!(loc, copied = copies.len(), "duplicated contents");
    }

    /// Copy `node`'s subtree to a fresh detached node of this tree.
    fn copy_detached(&mut self, node: NodeId) -> NodeId {
        let copy = self.alloc();
        self.copy_local(node, copy);
        copy
    }

    /// Copy every child subtree of `node` in `src` to detached nodes; on
    /// failure nothing stays allocated.
    fn copy_children_from(&mut self, src: &Tree<'_>, node: NodeId) -> YamlResult<Vec<NodeId>> {
        let mut copies = Vec::new();
        for child in src.children(node)? {
            let copy = self.alloc();
            copies.push(copy);
            if let Err(e) = self.copy_from(src, child, copy) {
                for c in copies {
                    self.free_subtree(c);
                }
                return Err(e);
            }
        }
        Ok(copies)
    }

    /// Link detached `nodes` under `parent` in order after `after`; returns
    /// the last one linked, or `after`.
    fn link_all(&mut self, nodes: &[NodeId], parent: NodeId, after: Option<NodeId>) -> Option<NodeId> {
        let mut prev = after;
        for &n in nodes {
            self.link(n, parent, prev);
            prev = Some(n);
        }
        prev
    }

    fn copy_from(&mut self, src: &Tree<'_>, from: NodeId, to: NodeId) -> YamlResult<()> {
        let data = src.data(from);
        let key = self.arena.copy(src.resolve(data.key)?);
        let val = self.arena.copy(src.resolve(data.val)?);
        self.init_node(to, data.node_type, key, val);
        for child in src.children(from)? {
            let copy = self.push_child(to);
            self.copy_from(src, child, copy)?;
        }
        Ok(())
    }

    fn copy_local(&mut self, from: NodeId, to: NodeId) {
        let data = self.data(from);
        self.init_node(to, data.node_type, data.key, data.val);
        let mut child = data.first_child;
        while let Some(c) = child {
            let copy = self.push_child(to);
            self.copy_local(c, copy);
            child = self.data(c).next_sibling;
        }
    }
}

/// Check that a container of `parent` type accepts children of every type in
/// `types`, and that it is a container at all.
fn check_children_fit(parent: NodeType, types: &[NodeType]) -> YamlResult<()> {
    check_accepts(parent, NodeType::NOTYPE).map_err(violation)?;
    for &t in types {
        check_accepts(parent, t).map_err(violation)?;
    }
    Ok(())
}

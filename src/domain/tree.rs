use tracing::{debug, instrument};

use crate::config::TreeSettings;
use crate::domain::node_type::NodeType;
use crate::domain::scalar::{Arena, ScalarRef};
use crate::error_channel::{self, fatal, violation};
use crate::errors::YamlResult;

/// Stable index of a node in its tree's node table.
pub type NodeId = usize;

/// Index of the root node of every tree.
pub const ROOT: NodeId = 0;

/// An entry in the node table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeData {
    pub node_type: NodeType,
    pub key: ScalarRef,
    pub val: ScalarRef,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn blank() -> Self {
        Self {
            node_type: NodeType::NOTYPE,
            key: ScalarRef::Empty,
            val: ScalarRef::Empty,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// Decide whether a node of `parent` type may hold a child of `child` type.
pub(crate) fn check_accepts(parent: NodeType, child: NodeType) -> Result<(), String> {
    if !parent.is_container() {
        return Err(format!("a {} node cannot hold children", parent.type_str()));
    }
    if child.is_notype() {
        return Ok(());
    }
    if child.is_stream() {
        return Err("a stream can only be the root node".to_string());
    }
    if parent.is_stream() {
        return if child.is_doc() {
            Ok(())
        } else {
            Err(format!(
                "a stream only holds documents, not {}",
                child.type_str()
            ))
        };
    }
    if child.is_doc() {
        return Err("documents can only live in a stream".to_string());
    }
    if parent.is_map() && !child.has_key() {
        return Err(format!("map children must be keyed, got {}", child.type_str()));
    }
    if parent.is_seq() && child.has_key() {
        return Err(format!(
            "sequence children cannot be keyed, got {}",
            child.type_str()
        ));
    }
    Ok(())
}

/// A YAML document tree: a node table with a free list and the arena that
/// owns scalar text.
///
/// `'s` is the lifetime of the caller buffer an in-place parse borrowed;
/// trees that own all their text are `Tree<'static>`.
#[derive(Debug, Clone)]
pub struct Tree<'s> {
    nodes: Vec<Option<NodeData>>,
    free: Vec<NodeId>,
    pub(crate) arena: Arena,
    source: Option<&'s str>,
}

impl Default for Tree<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s> Tree<'s> {
    /// Create a tree holding only an untyped root node.
    pub fn new() -> Self {
        Self::with_settings(&TreeSettings::default())
    }

    pub fn with_settings(settings: &TreeSettings) -> Self {
        error_channel::init_once();
        let mut nodes = Vec::with_capacity(settings.node_capacity.max(1));
        nodes.push(Some(NodeData::blank()));
        Self {
            nodes,
            free: Vec::new(),
            arena: Arena::with_capacity(settings.arena_capacity),
            source: None,
        }
    }

    /// Tree whose scalars may reference `source` directly.
    pub(crate) fn borrowing(source: &'s str, settings: &TreeSettings) -> Self {
        let mut tree = Self::with_settings(settings);
        tree.source = Some(source);
        tree
    }

    // ------------------------------------------------------------------
    // capacity

    pub fn root_id(&self) -> NodeId {
        ROOT
    }

    /// Number of live nodes.
    pub fn size(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 1 && self.nodes[ROOT].is_some_and(|n| n.node_type.is_notype())
    }

    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Number of nodes that can be added without reallocating the table.
    pub fn slack(&self) -> usize {
        self.capacity() - self.nodes.len() + self.free.len()
    }

    pub fn reserve(&mut self, node_capacity: usize) {
        self.nodes
            .reserve(node_capacity.saturating_sub(self.nodes.len()));
    }

    pub fn arena_size(&self) -> usize {
        self.arena.len()
    }

    pub fn arena_capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub fn reserve_arena(&mut self, arena_capacity: usize) {
        self.arena
            .reserve(arena_capacity.saturating_sub(self.arena.len()));
    }

    /// Drop every node but an untyped root, and all arena text.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Some(NodeData::blank()));
        self.free.clear();
        self.arena.clear();
    }

    /// Copy `s` into the arena.
    pub fn copy_to_arena(&mut self, s: &str) -> ScalarRef {
        self.arena.copy(s)
    }

    // ------------------------------------------------------------------
    // node access

    #[track_caller]
    pub fn get(&self, node: NodeId) -> YamlResult<&NodeData> {
        match self.nodes.get(node) {
            Some(Some(data)) => Ok(data),
            Some(None) => Err(fatal(format!("node {node} has been removed"))),
            None => Err(fatal(format!(
                "node index {node} out of bounds (table holds {})",
                self.nodes.len()
            ))),
        }
    }

    #[track_caller]
    fn get_mut(&mut self, node: NodeId) -> YamlResult<&mut NodeData> {
        let len = self.nodes.len();
        match self.nodes.get_mut(node) {
            Some(Some(data)) => Ok(data),
            Some(None) => Err(fatal(format!("node {node} has been removed"))),
            None => Err(fatal(format!(
                "node index {node} out of bounds (table holds {len})"
            ))),
        }
    }

    /// Link access for nodes whose validity was already checked.
    pub(crate) fn data(&self, node: NodeId) -> NodeData {
        self.nodes
            .get(node)
            .copied()
            .flatten()
            .unwrap_or_else(NodeData::blank)
    }

    fn data_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node).and_then(Option::as_mut)
    }

    /// Resolve a scalar reference against this tree's storage.
    #[track_caller]
    pub fn resolve(&self, scalar: ScalarRef) -> YamlResult<&str> {
        let text = match scalar {
            ScalarRef::Empty => Some(""),
            ScalarRef::Arena(span) => self.arena.get(span),
            ScalarRef::Source(span) => self
                .source
                .and_then(|s| s.get(span.start..span.end())),
        };
        text.ok_or_else(|| fatal(format!("scalar {scalar:?} does not resolve in this tree")))
    }

    pub fn node_type(&self, node: NodeId) -> YamlResult<NodeType> {
        Ok(self.get(node)?.node_type)
    }

    pub fn key(&self, node: NodeId) -> YamlResult<&str> {
        let data = self.get(node)?;
        if !data.node_type.has_key() {
            return Err(violation(format!(
                "node {node} ({}) has no key",
                data.node_type.type_str()
            )));
        }
        self.resolve(data.key)
    }

    pub fn val(&self, node: NodeId) -> YamlResult<&str> {
        let data = self.get(node)?;
        if !data.node_type.has_val() {
            return Err(violation(format!(
                "node {node} ({}) has no value",
                data.node_type.type_str()
            )));
        }
        self.resolve(data.val)
    }

    pub fn parent(&self, node: NodeId) -> YamlResult<Option<NodeId>> {
        Ok(self.get(node)?.parent)
    }

    pub fn first_child(&self, node: NodeId) -> YamlResult<Option<NodeId>> {
        Ok(self.get(node)?.first_child)
    }

    pub fn last_child(&self, node: NodeId) -> YamlResult<Option<NodeId>> {
        Ok(self.get(node)?.last_child)
    }

    pub fn next_sibling(&self, node: NodeId) -> YamlResult<Option<NodeId>> {
        Ok(self.get(node)?.next_sibling)
    }

    pub fn prev_sibling(&self, node: NodeId) -> YamlResult<Option<NodeId>> {
        Ok(self.get(node)?.prev_sibling)
    }

    pub fn is_root(&self, node: NodeId) -> YamlResult<bool> {
        Ok(self.get(node)?.parent.is_none())
    }

    pub fn has_children(&self, node: NodeId) -> YamlResult<bool> {
        Ok(self.get(node)?.first_child.is_some())
    }

    pub fn children(&self, node: NodeId) -> YamlResult<Children<'_, 's>> {
        Ok(Children {
            tree: self,
            next: self.get(node)?.first_child,
        })
    }

    pub fn num_children(&self, node: NodeId) -> YamlResult<usize> {
        Ok(self.children(node)?.count())
    }

    pub fn child(&self, node: NodeId, pos: usize) -> YamlResult<Option<NodeId>> {
        Ok(self.children(node)?.nth(pos))
    }

    pub fn child_pos(&self, node: NodeId, child: NodeId) -> YamlResult<Option<usize>> {
        Ok(self.children(node)?.position(|c| c == child))
    }

    /// First child of `node` whose key equals `key`.
    pub fn find_child(&self, node: NodeId, key: &str) -> YamlResult<Option<NodeId>> {
        for child in self.children(node)? {
            let data = self.data(child);
            if data.node_type.has_key() && self.resolve(data.key)? == key {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Whether `ancestor` lies on the parent chain of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> YamlResult<bool> {
        self.get(ancestor)?;
        let mut current = self.get(node)?.parent;
        while let Some(p) = current {
            if p == ancestor {
                return Ok(true);
            }
            current = self.data(p).parent;
        }
        Ok(false)
    }

    pub fn has_parent(&self, node: NodeId) -> YamlResult<bool> {
        Ok(self.get(node)?.parent.is_some())
    }

    pub fn has_child(&self, node: NodeId, key: &str) -> YamlResult<bool> {
        Ok(self.find_child(node, key)?.is_some())
    }

    /// `false` for the root.
    pub fn parent_is_map(&self, node: NodeId) -> YamlResult<bool> {
        Ok(self
            .get(node)?
            .parent
            .is_some_and(|p| self.data(p).node_type.is_map()))
    }

    /// `false` for the root.
    pub fn parent_is_seq(&self, node: NodeId) -> YamlResult<bool> {
        Ok(self
            .get(node)?
            .parent
            .is_some_and(|p| self.data(p).node_type.is_seq()))
    }

    /// No children, no key text and no value text.
    pub fn is_node_empty(&self, node: NodeId) -> YamlResult<bool> {
        let data = *self.get(node)?;
        Ok(data.first_child.is_none()
            && self.resolve(data.key)?.is_empty()
            && (!data.node_type.has_val() || self.resolve(data.val)?.is_empty()))
    }

    // ------------------------------------------------------------------
    // siblings
    //
    // The siblings of a node are the children of its parent, the node
    // included. The root is its own only sibling.

    pub fn num_siblings(&self, node: NodeId) -> YamlResult<usize> {
        match self.get(node)?.parent {
            Some(p) => self.num_children(p),
            None => Ok(1),
        }
    }

    pub fn num_other_siblings(&self, node: NodeId) -> YamlResult<usize> {
        Ok(self.num_siblings(node)? - 1)
    }

    pub fn has_other_siblings(&self, node: NodeId) -> YamlResult<bool> {
        let data = self.get(node)?;
        Ok(data.prev_sibling.is_some() || data.next_sibling.is_some())
    }

    /// Position of `sibling` among the siblings of `node`.
    pub fn sibling_pos(&self, node: NodeId, sibling: NodeId) -> YamlResult<Option<usize>> {
        match self.get(node)?.parent {
            Some(p) => self.child_pos(p, sibling),
            None => Ok((sibling == node).then_some(0)),
        }
    }

    pub fn first_sibling(&self, node: NodeId) -> YamlResult<NodeId> {
        Ok(self
            .get(node)?
            .parent
            .and_then(|p| self.data(p).first_child)
            .unwrap_or(node))
    }

    pub fn last_sibling(&self, node: NodeId) -> YamlResult<NodeId> {
        Ok(self
            .get(node)?
            .parent
            .and_then(|p| self.data(p).last_child)
            .unwrap_or(node))
    }

    pub fn sibling(&self, node: NodeId, pos: usize) -> YamlResult<Option<NodeId>> {
        match self.get(node)?.parent {
            Some(p) => self.child(p, pos),
            None => Ok((pos == 0).then_some(node)),
        }
    }

    /// First sibling of `node` (possibly `node` itself) whose key equals `key`.
    pub fn find_sibling(&self, node: NodeId, key: &str) -> YamlResult<Option<NodeId>> {
        let data = self.get(node)?;
        if let Some(p) = data.parent {
            return self.find_child(p, key);
        }
        let matches = data.node_type.has_key() && self.resolve(data.key)? == key;
        Ok(matches.then_some(node))
    }

    pub fn has_sibling(&self, node: NodeId, key: &str) -> YamlResult<bool> {
        Ok(self.find_sibling(node, key)?.is_some())
    }

    // ------------------------------------------------------------------
    // construction

    /// Take a slot from the free list or grow the table; the node is detached.
    pub(crate) fn alloc(&mut self) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(NodeData::blank());
                id
            }
            None => {
                self.nodes.push(Some(NodeData::blank()));
                self.nodes.len() - 1
            }
        }
    }

    /// Allocate an untyped node and place it after `after` under `parent`
    /// (first when `after` is `None`).
    #[instrument(level = "trace", skip(self))]
    pub fn insert_child(&mut self, parent: NodeId, after: Option<NodeId>) -> YamlResult<NodeId> {
        self.check_position(parent, after)?;
        check_accepts(self.data(parent).node_type, NodeType::NOTYPE).map_err(violation)?;
        let node = self.alloc();
        self.link(node, parent, after);
        Ok(node)
    }

    pub fn prepend_child(&mut self, parent: NodeId) -> YamlResult<NodeId> {
        self.insert_child(parent, None)
    }

    pub fn append_child(&mut self, parent: NodeId) -> YamlResult<NodeId> {
        let last = self.last_child(parent)?;
        self.insert_child(parent, last)
    }

    fn sibling_parent(&self, node: NodeId) -> YamlResult<NodeId> {
        self.get(node)?
            .parent
            .ok_or_else(|| violation(format!("root node {node} has no siblings")))
    }

    /// Allocate an untyped node among the siblings of `node`, right after
    /// `after` (first when `None`).
    pub fn insert_sibling(&mut self, node: NodeId, after: Option<NodeId>) -> YamlResult<NodeId> {
        let parent = self.sibling_parent(node)?;
        self.insert_child(parent, after)
    }

    pub fn prepend_sibling(&mut self, node: NodeId) -> YamlResult<NodeId> {
        let parent = self.sibling_parent(node)?;
        self.insert_child(parent, None)
    }

    pub fn append_sibling(&mut self, node: NodeId) -> YamlResult<NodeId> {
        let parent = self.sibling_parent(node)?;
        let last = self.data(parent).last_child;
        self.insert_child(parent, last)
    }

    /// Turn `node` into the map, sequence or value named by `new_type`,
    /// keeping its key and document mark. Children and value text are
    /// dropped.
    ///
    /// Returns `false` and changes nothing when the node already is of that
    /// kind.
    #[instrument(level = "debug", skip(self))]
    pub fn change_type(&mut self, node: NodeId, new_type: NodeType) -> YamlResult<bool> {
        let structure = NodeType::MAP | NodeType::SEQ | NodeType::VAL;
        let kind = new_type & structure;
        if ![NodeType::MAP, NodeType::SEQ, NodeType::VAL].contains(&kind) || new_type.is_stream() {
            return Err(violation(format!(
                "change_type needs exactly one of MAP, SEQ or VAL, got {new_type:?}"
            )));
        }
        let current = *self.get(node)?;
        if current.node_type.is_stream() {
            return Err(violation("a stream cannot change type"));
        }
        if new_type.has_key() && !current.node_type.has_key() {
            return Err(violation(format!("node {node} has no key to keep")));
        }
        if current.node_type.contains(kind) {
            return Ok(false);
        }
        let node_type =
            current.node_type.difference(structure | NodeType::VAL_QUOTED) | kind;
        if let Some(parent) = current.parent {
            check_accepts(self.data(parent).node_type, node_type).map_err(violation)?;
        }
        self.remove_children(node)?;
        self.init_node(node, node_type, current.key, ScalarRef::Empty);
        debug!(node, from = %current.node_type, to = %node_type, "changed type");
        Ok(true)
    }

    /// Apply a new type and scalars to `node` after checking it against its
    /// parent and its current children.
    fn retype(
        &mut self,
        node: NodeId,
        node_type: NodeType,
        key: Option<&str>,
        val: Option<&str>,
    ) -> YamlResult<()> {
        let current = *self.get(node)?;
        let node_type = node_type | (current.node_type & NodeType::DOC);
        if let Some(parent) = current.parent {
            check_accepts(self.data(parent).node_type, node_type).map_err(violation)?;
        }
        if current.first_child.is_some() {
            let mut child = current.first_child;
            while let Some(c) = child {
                check_accepts(node_type, self.data(c).node_type).map_err(violation)?;
                child = self.data(c).next_sibling;
            }
        }
        let key = key.map(|k| self.arena.copy(k)).unwrap_or_default();
        let val = val.map(|v| self.arena.copy(v)).unwrap_or_default();
        let data = self.get_mut(node)?;
        data.node_type = node_type;
        data.key = key;
        data.val = val;
        Ok(())
    }

    pub fn to_val(&mut self, node: NodeId, val: &str) -> YamlResult<()> {
        self.retype(node, NodeType::VAL, None, Some(val))
    }

    pub fn to_keyval(&mut self, node: NodeId, key: &str, val: &str) -> YamlResult<()> {
        self.retype(node, NodeType::KEYVAL, Some(key), Some(val))
    }

    pub fn to_map(&mut self, node: NodeId) -> YamlResult<()> {
        self.retype(node, NodeType::MAP, None, None)
    }

    pub fn to_keymap(&mut self, node: NodeId, key: &str) -> YamlResult<()> {
        self.retype(node, NodeType::KEYMAP, Some(key), None)
    }

    pub fn to_seq(&mut self, node: NodeId) -> YamlResult<()> {
        self.retype(node, NodeType::SEQ, None, None)
    }

    pub fn to_keyseq(&mut self, node: NodeId, key: &str) -> YamlResult<()> {
        self.retype(node, NodeType::KEYSEQ, Some(key), None)
    }

    /// Mark `node` as a document; a later `to_map`/`to_seq`/`to_val` keeps
    /// the mark.
    pub fn to_doc(&mut self, node: NodeId) -> YamlResult<()> {
        self.retype(node, NodeType::DOC, None, None)
    }

    pub fn to_stream(&mut self, node: NodeId) -> YamlResult<()> {
        if self.get(node)?.parent.is_some() {
            return Err(violation("only the root node can become a stream"));
        }
        self.retype(node, NodeType::STREAM, None, None)
    }

    /// Replace the value text of a node that holds a value.
    pub fn set_val(&mut self, node: NodeId, val: &str) -> YamlResult<()> {
        if !self.get(node)?.node_type.has_val() {
            return Err(violation(format!("node {node} has no value to replace")));
        }
        let val = self.arena.copy(val);
        let data = self.get_mut(node)?;
        data.val = val;
        data.node_type.remove(NodeType::VAL_QUOTED);
        Ok(())
    }

    /// Set type and scalar references without policy checks.
    pub(crate) fn init_node(
        &mut self,
        node: NodeId,
        node_type: NodeType,
        key: ScalarRef,
        val: ScalarRef,
    ) {
        if let Some(data) = self.data_mut(node) {
            data.node_type = node_type;
            data.key = key;
            data.val = val;
        }
    }

    /// Append a fresh node under `parent` without policy checks.
    pub(crate) fn push_child(&mut self, parent: NodeId) -> NodeId {
        let last = self.data(parent).last_child;
        let node = self.alloc();
        self.link(node, parent, last);
        node
    }

    // ------------------------------------------------------------------
    // removal

    /// Remove `node` and its whole subtree.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, node: NodeId) -> YamlResult<()> {
        error_channel::init_once();
        if self.get(node)?.parent.is_none() {
            return Err(violation("the root node cannot be removed"));
        }
        self.unlink(node);
        self.free_subtree(node);
        debug!(node, size = self.size(), "removed subtree");
        Ok(())
    }

    /// Remove every child of `node`, keeping the node itself.
    pub fn remove_children(&mut self, node: NodeId) -> YamlResult<()> {
        let mut child = self.get(node)?.first_child;
        while let Some(c) = child {
            child = self.data(c).next_sibling;
            self.free_subtree(c);
        }
        if let Some(data) = self.data_mut(node) {
            data.first_child = None;
            data.last_child = None;
        }
        Ok(())
    }

    pub(crate) fn free_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let mut child = self.data(current).first_child;
            while let Some(c) = child {
                stack.push(c);
                child = self.data(c).next_sibling;
            }
            self.nodes[current] = None;
            self.free.push(current);
        }
    }

    // ------------------------------------------------------------------
    // linking

    /// Check that `after` (if any) is a live child of the live `parent`.
    pub(crate) fn check_position(&self, parent: NodeId, after: Option<NodeId>) -> YamlResult<()> {
        self.get(parent)?;
        if let Some(a) = after {
            if self.get(a)?.parent != Some(parent) {
                return Err(violation(format!(
                    "node {a} is not a child of node {parent}"
                )));
            }
        }
        Ok(())
    }

    /// Detach `node` from its parent and siblings.
    pub(crate) fn unlink(&mut self, node: NodeId) {
        let data = self.data(node);
        match data.prev_sibling {
            Some(prev) => {
                if let Some(p) = self.data_mut(prev) {
                    p.next_sibling = data.next_sibling;
                }
            }
            None => {
                if let Some(parent) = data.parent.and_then(|p| self.data_mut(p)) {
                    parent.first_child = data.next_sibling;
                }
            }
        }
        match data.next_sibling {
            Some(next) => {
                if let Some(n) = self.data_mut(next) {
                    n.prev_sibling = data.prev_sibling;
                }
            }
            None => {
                if let Some(parent) = data.parent.and_then(|p| self.data_mut(p)) {
                    parent.last_child = data.prev_sibling;
                }
            }
        }
        if let Some(d) = self.data_mut(node) {
            d.parent = None;
            d.prev_sibling = None;
            d.next_sibling = None;
        }
    }

    /// Attach a detached `node` under `parent`, right after `after`.
    pub(crate) fn link(&mut self, node: NodeId, parent: NodeId, after: Option<NodeId>) {
        let next = match after {
            Some(a) => self.data(a).next_sibling,
            None => self.data(parent).first_child,
        };
        if let Some(d) = self.data_mut(node) {
            d.parent = Some(parent);
            d.prev_sibling = after;
            d.next_sibling = next;
        }
        match after {
            Some(a) => {
                if let Some(prev) = self.data_mut(a) {
                    prev.next_sibling = Some(node);
                }
            }
            None => {
                if let Some(p) = self.data_mut(parent) {
                    p.first_child = Some(node);
                }
            }
        }
        match next {
            Some(n) => {
                if let Some(next) = self.data_mut(n) {
                    next.prev_sibling = Some(node);
                }
            }
            None => {
                if let Some(p) = self.data_mut(parent) {
                    p.last_child = Some(node);
                }
            }
        }
    }
}

/// Iterator over the children of one node, in order.
pub struct Children<'t, 's> {
    tree: &'t Tree<'s>,
    next: Option<NodeId>,
}

impl Iterator for Children<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.data(current).next_sibling;
        Some(current)
    }
}

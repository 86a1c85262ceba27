use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, Result, invariant};
use crate::node::{NodeData, NodeKey, NodeKind};

/// Arena of document nodes addressed by [`NodeKey`].
///
/// A node is owned by its parent's child list; the parent pointer is only a
/// back-reference for navigation. Nodes created but never attached are
/// "detached" and get dropped by [`Tree::collect_detached`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: HashMap<NodeKey, NodeData>,
    root: NodeKey,
    next_key: u64,
    revision: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let root = NodeKey(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            root,
            next_key: 1,
            revision: 0,
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Bumped by every mutation; lets callers tell a no-op from a change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Nodes in the arena, the root and any detached nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the root holds any block.
    pub fn has_blocks(&self) -> bool {
        self.children(self.root).is_ok_and(|c| !c.is_empty())
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn create(&mut self, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        self.nodes.insert(
            key,
            NodeData {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        self.revision += 1;
        key
    }

    pub fn create_with_children(
        &mut self,
        kind: NodeKind,
        children: Vec<NodeKey>,
    ) -> Result<NodeKey> {
        let key = self.create(kind);
        if !children.is_empty() {
            self.splice_children(key, 0, 0, children)?;
        }
        Ok(key)
    }

    pub fn get(&self, key: NodeKey) -> Result<&NodeData> {
        self.nodes.get(&key).ok_or(EngineError::NodeNotFound(key))
    }

    pub fn kind(&self, key: NodeKey) -> Result<&NodeKind> {
        Ok(&self.get(key)?.kind)
    }

    pub fn parent(&self, key: NodeKey) -> Result<Option<NodeKey>> {
        Ok(self.get(key)?.parent)
    }

    pub fn parent_kind(&self, key: NodeKey) -> Result<Option<&NodeKind>> {
        match self.parent(key)? {
            Some(parent) => Ok(Some(self.kind(parent)?)),
            None => Ok(None),
        }
    }

    pub fn children(&self, key: NodeKey) -> Result<&[NodeKey]> {
        Ok(&self.get(key)?.children)
    }

    pub fn child_count(&self, key: NodeKey) -> Result<usize> {
        Ok(self.get(key)?.children.len())
    }

    pub fn index_in_parent(&self, key: NodeKey) -> Result<usize> {
        let parent = self
            .parent(key)?
            .ok_or_else(|| EngineError::precondition("Must have parent node"))?;
        self.children(parent)?
            .iter()
            .position(|child| *child == key)
            .ok_or_else(|| EngineError::precondition("Parent must list its child"))
    }

    pub fn previous_sibling(&self, key: NodeKey) -> Result<Option<NodeKey>> {
        let Some(parent) = self.parent(key)? else {
            return Ok(None);
        };
        let index = self.index_in_parent(key)?;
        Ok(index
            .checked_sub(1)
            .and_then(|ix| self.nodes[&parent].children.get(ix).copied()))
    }

    pub fn next_sibling(&self, key: NodeKey) -> Result<Option<NodeKey>> {
        let Some(parent) = self.parent(key)? else {
            return Ok(None);
        };
        let index = self.index_in_parent(key)?;
        Ok(self.nodes[&parent].children.get(index + 1).copied())
    }

    /// In-place attribute setter. The variant must stay the same; changing the
    /// shape of a node goes through replacement instead.
    pub fn set_kind(&mut self, key: NodeKey, kind: NodeKind) -> Result<()> {
        let data = self
            .nodes
            .get_mut(&key)
            .ok_or(EngineError::NodeNotFound(key))?;
        invariant(
            data.kind.same_variant(&kind),
            "Setter must keep the node kind",
        )?;
        if data.kind != kind {
            data.kind = kind;
            self.revision += 1;
        }
        Ok(())
    }

    /// Replaces `delete_count` children of `parent` starting at `index` with
    /// `insertions`. Deleted children are destroyed with their subtrees.
    ///
    /// Every precondition is checked before the child list is touched.
    pub fn splice_children(
        &mut self,
        parent: NodeKey,
        index: usize,
        delete_count: usize,
        insertions: Vec<NodeKey>,
    ) -> Result<()> {
        let removed = self.splice_inner(parent, index, delete_count, insertions)?;
        for key in removed {
            self.destroy(key);
        }
        Ok(())
    }

    /// Removes `count` children of `parent` starting at `index` and returns
    /// them detached, subtrees intact, ready to be spliced in elsewhere.
    pub fn detach_children(
        &mut self,
        parent: NodeKey,
        index: usize,
        count: usize,
    ) -> Result<Vec<NodeKey>> {
        let removed = self.splice_inner(parent, index, count, Vec::new())?;
        for key in &removed {
            if let Some(data) = self.nodes.get_mut(key) {
                data.parent = None;
            }
        }
        Ok(removed)
    }

    fn splice_inner(
        &mut self,
        parent: NodeKey,
        index: usize,
        delete_count: usize,
        insertions: Vec<NodeKey>,
    ) -> Result<Vec<NodeKey>> {
        let parent_data = self.get(parent)?;
        invariant(parent_data.kind.is_element(), "Must be ElementNode")?;
        invariant(
            index
                .checked_add(delete_count)
                .is_some_and(|end| end <= parent_data.children.len()),
            "Splice range out of bounds",
        )?;

        let ancestors: HashSet<NodeKey> = self.ancestors_inclusive(parent)?.into_iter().collect();
        let mut seen = HashSet::new();
        for key in &insertions {
            let data = self.get(*key)?;
            invariant(*key != self.root, "Cannot insert the root node")?;
            invariant(data.parent.is_none(), "Inserted node must be detached")?;
            invariant(!ancestors.contains(key), "Insertion would create a cycle")?;
            invariant(seen.insert(*key), "Node inserted twice")?;
            if parent_data.kind.is_grid_container() {
                invariant(
                    data.kind.is_grid_item(),
                    "GridContainerNode accepts only GridItemNode children",
                )?;
            }
        }

        for key in &insertions {
            if let Some(data) = self.nodes.get_mut(key) {
                data.parent = Some(parent);
            }
        }
        let removed: Vec<NodeKey> = match self.nodes.get_mut(&parent) {
            Some(data) => data
                .children
                .splice(index..index + delete_count, insertions)
                .collect(),
            None => return Err(EngineError::NodeNotFound(parent)),
        };
        self.revision += 1;
        Ok(removed)
    }

    pub fn append(&mut self, parent: NodeKey, children: Vec<NodeKey>) -> Result<()> {
        let len = self.child_count(parent)?;
        self.splice_children(parent, len, 0, children)
    }

    /// Removes `key` from its parent, destroying its subtree.
    pub fn remove(&mut self, key: NodeKey) -> Result<()> {
        let parent = self
            .parent(key)?
            .ok_or_else(|| EngineError::precondition("Must have parent node"))?;
        let index = self.index_in_parent(key)?;
        self.splice_children(parent, index, 1, Vec::new())
    }

    /// Substitutes the detached node `with` for `key` at the same position.
    pub fn replace(&mut self, key: NodeKey, with: NodeKey) -> Result<()> {
        self.replace_with(key, vec![with])
    }

    pub fn replace_with(&mut self, key: NodeKey, with: Vec<NodeKey>) -> Result<()> {
        let parent = self
            .parent(key)?
            .ok_or_else(|| EngineError::precondition("Must have parent node"))?;
        let index = self.index_in_parent(key)?;
        self.splice_children(parent, index, 1, with)
    }

    /// Detached copy of `key`'s subtree with fresh keys. Line breaks are
    /// dropped rather than copied.
    pub fn deep_copy(&mut self, key: NodeKey) -> Result<NodeKey> {
        let data = self.get(key)?.clone();
        let copy = self.create(data.kind);
        let mut children = Vec::with_capacity(data.children.len());
        for child in data.children {
            if self.kind(child)?.is_line_break() {
                continue;
            }
            children.push(self.deep_copy(child)?);
        }
        if !children.is_empty() {
            self.splice_children(copy, 0, 0, children)?;
        }
        Ok(copy)
    }

    /// Deep copies of every child of `key`, in order.
    pub fn copy_children(&mut self, key: NodeKey) -> Result<Vec<NodeKey>> {
        let children = self.children(key)?.to_vec();
        let mut copies = Vec::with_capacity(children.len());
        for child in children {
            if self.kind(child)?.is_line_break() {
                continue;
            }
            copies.push(self.deep_copy(child)?);
        }
        Ok(copies)
    }

    /// Inclusive run of siblings from `a` to `b`, whichever comes first.
    pub fn siblings_between(&self, a: NodeKey, b: NodeKey) -> Result<Vec<NodeKey>> {
        if a == b {
            self.get(a)?;
            return Ok(vec![a]);
        }
        let parent = self.parent(a)?;
        invariant(
            parent.is_some() && parent == self.parent(b)?,
            "Nodes must be siblings",
        )?;
        let ia = self.index_in_parent(a)?;
        let ib = self.index_in_parent(b)?;
        let (start, end) = if ia <= ib { (ia, ib) } else { (ib, ia) };
        let Some(parent) = parent else {
            return Ok(Vec::new());
        };
        Ok(self.children(parent)?[start..=end].to_vec())
    }

    /// Walks up until the parent is the root, a grid item or a grid container.
    pub fn top_level_ancestor(&self, key: NodeKey) -> Result<NodeKey> {
        invariant(key != self.root, "Root has no top-level ancestor")?;
        let mut current = key;
        loop {
            let Some(parent) = self.parent(current)? else {
                return Ok(current);
            };
            let kind = self.kind(parent)?;
            if kind.is_root() || kind.is_grid_item() || kind.is_grid_container() {
                return Ok(current);
            }
            current = parent;
        }
    }

    /// Nearest ancestor-or-self that is a block element or an image.
    pub fn nearest_block(&self, key: NodeKey) -> Result<Option<NodeKey>> {
        let mut current = Some(key);
        while let Some(node) = current {
            if self.kind(node)?.is_block() {
                return Ok(Some(node));
            }
            current = self.parent(node)?;
        }
        Ok(None)
    }

    /// Nearest proper ancestor matching `predicate`.
    pub fn find_ancestor(
        &self,
        key: NodeKey,
        predicate: impl Fn(&NodeKind) -> bool,
    ) -> Result<Option<NodeKey>> {
        let mut current = self.parent(key)?;
        while let Some(node) = current {
            if predicate(self.kind(node)?) {
                return Ok(Some(node));
            }
            current = self.parent(node)?;
        }
        Ok(None)
    }

    fn ancestors_inclusive(&self, key: NodeKey) -> Result<Vec<NodeKey>> {
        let mut out = vec![key];
        let mut current = self.parent(key)?;
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node)?;
        }
        Ok(out)
    }

    pub fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> Result<bool> {
        Ok(ancestor != key && self.ancestors_inclusive(key)?.contains(&ancestor))
    }

    /// Child-index path from the root. Attached nodes only.
    pub fn path_of(&self, key: NodeKey) -> Result<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = key;
        while current != self.root {
            path.push(self.index_in_parent(current)?);
            current = self
                .parent(current)?
                .ok_or_else(|| EngineError::precondition("Node must be attached"))?;
        }
        path.reverse();
        Ok(path)
    }

    /// Pre-order walk of `key`'s subtree, `key` included.
    pub fn descendants(&self, key: NodeKey) -> Result<Vec<NodeKey>> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node)?.iter().rev());
        }
        Ok(out)
    }

    pub fn leaves(&self, key: NodeKey) -> Result<Vec<NodeKey>> {
        let mut out = Vec::new();
        for node in self.descendants(key)? {
            if self.children(node)?.is_empty() {
                out.push(node);
            }
        }
        Ok(out)
    }

    pub fn text_content(&self, key: NodeKey) -> Result<String> {
        let mut out = String::new();
        self.collect_text(key, &mut out)?;
        Ok(out)
    }

    fn collect_text(&self, key: NodeKey, out: &mut String) -> Result<()> {
        let data = self.get(key)?;
        match &data.kind {
            NodeKind::Text(leaf) => out.push_str(&leaf.text),
            NodeKind::LineBreak => out.push('\n'),
            _ => {
                let len = data.children.len();
                for (ix, child) in data.children.iter().enumerate() {
                    self.collect_text(*child, out)?;
                    if ix + 1 < len && self.kind(*child)?.is_block() {
                        out.push_str("\n\n");
                    }
                }
            }
        }
        Ok(())
    }

    /// Drops nodes that are not reachable from the root.
    pub fn collect_detached(&mut self) -> usize {
        let reachable: HashSet<NodeKey> = match self.descendants(self.root) {
            Ok(keys) => keys.into_iter().collect(),
            Err(_) => return 0,
        };
        let before = self.nodes.len();
        self.nodes.retain(|key, _| reachable.contains(key));
        before - self.nodes.len()
    }

    /// Checks the stable-state invariants of the whole tree.
    pub fn validate(&self) -> Result<()> {
        let root = self.get(self.root)?;
        if root.parent.is_some() || !root.kind.is_root() {
            return Err(EngineError::InvalidDocument("malformed root".into()));
        }

        let mut reached = 0usize;
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            reached += 1;
            let data = self.get(key)?;
            if key != self.root && data.kind.is_root() {
                return Err(EngineError::InvalidDocument(format!("nested root at {key}")));
            }
            if !data.kind.is_element() && !data.children.is_empty() {
                return Err(EngineError::InvalidDocument(format!(
                    "{} node {key} cannot have children",
                    data.kind.name()
                )));
            }
            for child in &data.children {
                let child_data = self.get(*child)?;
                if child_data.parent != Some(key) {
                    return Err(EngineError::InvalidDocument(format!(
                        "node {child} does not point back to parent {key}"
                    )));
                }
                if child_data.kind.is_grid_item() && !data.kind.is_grid_container() {
                    return Err(EngineError::InvalidDocument(format!(
                        "grid item {child} outside a grid container"
                    )));
                }
            }
            if let NodeKind::GridContainer { column_count } = &data.kind {
                self.validate_grid(key, column_count.get(), data)?;
            }
            stack.extend(data.children.iter().copied());
        }

        if reached != self.nodes.len() {
            return Err(EngineError::InvalidDocument(format!(
                "{} detached nodes",
                self.nodes.len() - reached
            )));
        }
        Ok(())
    }

    fn validate_grid(&self, key: NodeKey, column_count: u32, data: &NodeData) -> Result<()> {
        if data.parent != Some(self.root) {
            return Err(EngineError::InvalidDocument(format!(
                "grid container {key} must be a root child"
            )));
        }
        let items = data.children.len();
        if items == 0 {
            return Err(EngineError::InvalidDocument(format!(
                "grid container {key} has no items"
            )));
        }
        for child in &data.children {
            match &self.get(*child)?.kind {
                NodeKind::GridItem { column_span } => {
                    if column_span.get() as usize * items != column_count as usize {
                        return Err(EngineError::InvalidDocument(format!(
                            "grid item {child} spans {} of {column_count} with {items} items",
                            column_span.get()
                        )));
                    }
                }
                other => {
                    return Err(EngineError::InvalidDocument(format!(
                        "grid container {key} holds a {} node",
                        other.name()
                    )));
                }
            }
        }
        Ok(())
    }

    fn destroy(&mut self, key: NodeKey) {
        let mut stack = vec![key];
        while let Some(node) = stack.pop() {
            if let Some(data) = self.nodes.remove(&node) {
                stack.extend(data.children);
            }
        }
    }
}

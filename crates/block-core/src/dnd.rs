use std::fmt;

use kurbo::{Point as Pointer, Rect};
use serde::{Deserialize, Serialize};

use crate::classify::is_block_wrapper;
use crate::error::{EngineError, Result, invariant};
use crate::grid::{
    create_grid_item, insert_grid_item, rebalanced_span, remove_with_pruning, wrap_in_grid,
};
use crate::node::{NodeKey, NodeKind};
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    /// Tie-break order for [`closest_edge`].
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left];

    fn bit(self) -> u8 {
        match self {
            Edge::Top => 1,
            Edge::Right => 1 << 1,
            Edge::Bottom => 1 << 2,
            Edge::Left => 1 << 3,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Edge::Top | Edge::Bottom)
    }

    /// Absolute distance from the pointer to this side of `rect`.
    pub fn distance(self, pointer: Pointer, rect: Rect) -> f64 {
        match self {
            Edge::Top => (pointer.y - rect.y0).abs(),
            Edge::Right => (rect.x1 - pointer.x).abs(),
            Edge::Bottom => (rect.y1 - pointer.y).abs(),
            Edge::Left => (pointer.x - rect.x0).abs(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Edge::Top => "top",
            Edge::Right => "right",
            Edge::Bottom => "bottom",
            Edge::Left => "left",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeSet(u8);

impl EdgeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::from_iter(Edge::ALL)
    }

    pub fn insert(&mut self, edge: Edge) {
        self.0 |= edge.bit();
    }

    pub fn with(mut self, edge: Edge) -> Self {
        self.insert(edge);
        self
    }

    pub fn contains(&self, edge: Edge) -> bool {
        self.0 & edge.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Edge> + '_ {
        Edge::ALL.into_iter().filter(|edge| self.contains(*edge))
    }
}

impl FromIterator<Edge> for EdgeSet {
    fn from_iter<I: IntoIterator<Item = Edge>>(iter: I) -> Self {
        let mut set = EdgeSet::empty();
        for edge in iter {
            set.insert(edge);
        }
        set
    }
}

fn ensure_draggable(tree: &Tree, key: NodeKey) -> Result<()> {
    let kind = tree.kind(key)?;
    invariant(kind.is_block(), "Must be ElementNode or ImageNode")?;
    invariant(!is_block_wrapper(kind), "Layout wrappers are not draggable")
}

/// Top unless `source` sits right before `target`, bottom unless right
/// after it.
fn vertical_edges(tree: &Tree, source: NodeKey, target: NodeKey) -> Result<EdgeSet> {
    let mut edges = EdgeSet::empty();
    if tree.next_sibling(source)? != Some(target) {
        edges.insert(Edge::Top);
    }
    if tree.previous_sibling(source)? != Some(target) {
        edges.insert(Edge::Bottom);
    }
    Ok(edges)
}

/// Edges of `target` that `source` may be dropped on.
pub fn allowed_edges(tree: &Tree, source: NodeKey, target: NodeKey) -> Result<EdgeSet> {
    if source == target {
        return Ok(EdgeSet::empty());
    }
    ensure_draggable(tree, source)?;
    let target_kind = tree.kind(target)?;
    invariant(target_kind.is_block(), "Must be ElementNode or ImageNode")?;
    // Neither block may contain the other.
    if tree.is_ancestor(source, target)? || tree.is_ancestor(target, source)? {
        return Ok(EdgeSet::empty());
    }

    let parent = tree
        .parent(target)?
        .ok_or_else(|| EngineError::precondition("Must have parent node"))?;
    let parent_kind = tree.kind(parent)?;
    let source_is_item = tree.kind(source)?.is_list_item();

    if parent_kind.is_root() {
        let edges = vertical_edges(tree, source, target)?;
        // Grids never nest, so a grid only takes reorders.
        if target_kind.is_grid_container() {
            return Ok(edges);
        }
        return Ok(edges.with(Edge::Left).with(Edge::Right));
    }
    if parent_kind.is_quote() {
        return Ok(EdgeSet::from_iter([Edge::Top, Edge::Bottom]));
    }
    if target_kind.is_list_item() && source_is_item {
        return vertical_edges(tree, source, target);
    }
    if target_kind.is_list_item() {
        return Ok(EdgeSet::all());
    }
    if parent_kind.is_grid_item() {
        let mut edges = EdgeSet::from_iter([Edge::Top, Edge::Bottom]);
        let source_parent = tree.parent(source)?;
        if let Some(previous) = tree.previous_sibling(parent)? {
            if Some(previous) != source_parent {
                edges.insert(Edge::Left);
            }
        }
        if let Some(next) = tree.next_sibling(parent)? {
            if Some(next) != source_parent {
                edges.insert(Edge::Right);
            }
        }
        return Ok(edges);
    }

    Err(EngineError::UnhandledDragContext)
}

/// Allowed edge nearest the pointer. Ties go to the first edge in
/// [`Edge::ALL`] order.
pub fn closest_edge(pointer: Pointer, rect: Rect, allowed: EdgeSet) -> Option<Edge> {
    let mut closest: Option<(Edge, f64)> = None;
    for edge in allowed.iter() {
        let distance = edge.distance(pointer, rect);
        match closest {
            Some((_, best)) if distance >= best => {}
            _ => closest = Some((edge, distance)),
        }
    }
    closest.map(|(edge, _)| edge)
}

/// Detached copy of `source` shaped for its new parent: list items leaving
/// a list get a list of their own, other blocks entering a list get an
/// item.
fn source_copy(tree: &mut Tree, source: NodeKey, new_parent: NodeKey) -> Result<NodeKey> {
    let source_parent = tree
        .parent(source)?
        .ok_or_else(|| EngineError::precondition("Must have source parent"))?;
    let leaving_list = tree.kind(source_parent)?.list_type();
    let entering_list = tree.kind(new_parent)?.is_list();

    let copy = tree.deep_copy(source)?;
    match (leaving_list, entering_list) {
        (Some(list_type), false) => {
            tree.create_with_children(NodeKind::list(list_type), vec![copy])
        }
        (None, true) if !tree.kind(copy)?.is_list_item() => {
            tree.create_with_children(NodeKind::ListItem, vec![copy])
        }
        _ => Ok(copy),
    }
}

/// Moves `source` to `edge` of `target`. Returns the key of the moved
/// content when it is still in the tree afterwards.
pub fn drop_block(
    tree: &mut Tree,
    source: NodeKey,
    target: NodeKey,
    edge: Edge,
) -> Result<Option<NodeKey>> {
    if source == target {
        return Ok(None);
    }
    let allowed = allowed_edges(tree, source, target)?;
    if !allowed.contains(edge) {
        return Err(EngineError::precondition(format!(
            "Drop edge {edge} is not allowed here"
        )));
    }

    let target_parent = tree
        .parent(target)?
        .ok_or_else(|| EngineError::precondition("Must have parent node"))?;

    let moved = if edge.is_vertical() {
        let copy = source_copy(tree, source, target_parent)?;
        let index = tree.index_in_parent(target)?;
        let index = if edge == Edge::Bottom { index + 1 } else { index };
        tree.splice_children(target_parent, index, 0, vec![copy])?;
        copy
    } else if tree.kind(target_parent)?.is_root() {
        let copy = source_copy(tree, source, target_parent)?;
        let target_copy = tree.deep_copy(target)?;
        let grid = side_by_side(tree, edge, target_copy, copy)?;
        tree.replace(target, grid)?;
        copy
    } else if tree.kind(target_parent)?.is_list() {
        drop_beside_list(tree, source, target_parent, edge)?
    } else {
        let item = tree
            .parent(target)?
            .filter(|item| matches!(tree.kind(*item), Ok(NodeKind::GridItem { .. })))
            .ok_or_else(|| EngineError::precondition("Must be GridItemNode"))?;
        drop_beside_grid_item(tree, source, item, edge)?
    };

    remove_with_pruning(tree, source)?;
    tracing::debug!(%source, %target, %edge, "dropped block");
    Ok(tree.contains(moved).then_some(moved))
}

/// Two-column grid holding `target` and `source`, `source` on the side it
/// was dropped.
fn side_by_side(tree: &mut Tree, edge: Edge, target: NodeKey, source: NodeKey) -> Result<NodeKey> {
    match edge {
        Edge::Right => wrap_in_grid(tree, vec![target], vec![source]),
        Edge::Left => wrap_in_grid(tree, vec![source], vec![target]),
        Edge::Top | Edge::Bottom => Err(EngineError::UnhandledDragContext),
    }
}

fn drop_beside_list(tree: &mut Tree, source: NodeKey, list: NodeKey, edge: Edge) -> Result<NodeKey> {
    let container = tree
        .parent(list)?
        .ok_or_else(|| EngineError::precondition("List must have parent"))?;
    let container_kind = tree.kind(container)?;

    if container_kind.is_root() {
        let copy = source_copy(tree, source, container)?;
        let list_copy = tree.deep_copy(list)?;
        let grid = side_by_side(tree, edge, list_copy, copy)?;
        tree.replace(list, grid)?;
        return Ok(copy);
    }
    if container_kind.is_grid_item() {
        return drop_beside_grid_item(tree, source, container, edge);
    }
    Err(EngineError::UnhandledDragContext)
}

fn drop_beside_grid_item(
    tree: &mut Tree,
    source: NodeKey,
    item: NodeKey,
    edge: Edge,
) -> Result<NodeKey> {
    let grid = tree
        .parent(item)?
        .ok_or_else(|| EngineError::precondition("Must be GridNode"))?;
    let column_count = match tree.kind(grid)? {
        NodeKind::GridContainer { column_count } => *column_count,
        _ => return Err(EngineError::precondition("Must be GridNode")),
    };
    let span = rebalanced_span(column_count, tree.child_count(grid)? + 1)?;

    let copy = source_copy(tree, source, item)?;
    let new_item = create_grid_item(tree, span, vec![copy])?;
    let index = tree.index_in_parent(item)?;
    let index = if edge == Edge::Right { index + 1 } else { index };
    insert_grid_item(tree, grid, index, new_item)?;
    Ok(copy)
}

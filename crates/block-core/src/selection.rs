use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::classify::is_block_wrapper;
use crate::error::Result;
use crate::node::{NodeKey, NodeKind};
use crate::tree::Tree;

/// A position in the tree. For text leaves `offset` counts characters, for
/// elements it is a child index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
}

impl Point {
    pub fn new(key: NodeKey, offset: usize) -> Self {
        Self { key, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn caret(key: NodeKey, offset: usize) -> Self {
        Self::collapsed(Point::new(key, offset))
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// `(start, end)` in document order, both resolved to leaf positions.
    pub fn ordered(&self, tree: &Tree) -> Result<(Point, Point)> {
        let anchor = resolve_point(tree, self.anchor)?;
        let focus = resolve_point(tree, self.focus)?;
        if point_position(tree, &anchor)? > point_position(tree, &focus)? {
            Ok((focus, anchor))
        } else {
            Ok((anchor, focus))
        }
    }
}

/// Moves an element point down to the leaf boundary it denotes: the start
/// of child `offset`, or the end of the last child when `offset` is past
/// the children. Leaves and empty elements come back unchanged.
pub fn resolve_point(tree: &Tree, point: Point) -> Result<Point> {
    let mut point = point;
    loop {
        let children = tree.children(point.key)?;
        let Some(last) = children.last().copied() else {
            return Ok(point);
        };
        point = match children.get(point.offset) {
            Some(child) => Point::new(*child, 0),
            None => {
                let data = tree.get(last)?;
                let end = if data.kind.is_element() {
                    data.children.len()
                } else {
                    leaf_len(&data.kind)
                };
                Point::new(last, end)
            }
        };
    }
}

/// Child-index path of the point's node with the offset appended. Leaves
/// have no children, so text offsets and child indices never collide.
pub(crate) fn point_position(tree: &Tree, point: &Point) -> Result<Vec<usize>> {
    let mut position = tree.path_of(point.key)?;
    position.push(point.offset);
    Ok(position)
}

pub fn compare_points(tree: &Tree, a: &Point, b: &Point) -> Result<Ordering> {
    let a = resolve_point(tree, *a)?;
    let b = resolve_point(tree, *b)?;
    Ok(point_position(tree, &a)?.cmp(&point_position(tree, &b)?))
}

pub(crate) fn leaf_len(kind: &NodeKind) -> usize {
    match kind {
        NodeKind::Text(leaf) => leaf.text.chars().count(),
        _ => 0,
    }
}

/// Leaves of the document whose extent intersects the selection, in
/// document order. Empty elements count as leaves.
pub(crate) fn selected_leaves(tree: &Tree, selection: &Selection) -> Result<Vec<NodeKey>> {
    let (start, end) = selection.ordered(tree)?;
    let start = point_position(tree, &start)?;
    let end = point_position(tree, &end)?;

    let mut out = Vec::new();
    for leaf in tree.leaves(tree.root())? {
        if leaf == tree.root() {
            continue;
        }
        let mut first = tree.path_of(leaf)?;
        let mut last = first.clone();
        first.push(0);
        last.push(leaf_len(tree.kind(leaf)?));
        if first <= end && last >= start {
            out.push(leaf);
        }
    }
    Ok(out)
}

/// Blocks touched by the selection: the nearest block of every selected
/// leaf, deduplicated in document order. Wrapper blocks are left out.
pub fn touched_blocks(tree: &Tree, selection: &Selection) -> Result<Vec<NodeKey>> {
    let mut blocks: Vec<NodeKey> = Vec::new();
    for leaf in selected_leaves(tree, selection)? {
        let Some(block) = tree.nearest_block(leaf)? else {
            continue;
        };
        if is_block_wrapper(tree.kind(block)?) {
            continue;
        }
        if !blocks.contains(&block) {
            blocks.push(block);
        }
    }
    Ok(blocks)
}

/// Caret at the end of `key`: after the last character of its last text
/// leaf, or after its last child when it holds no text.
pub fn select_end(tree: &Tree, key: NodeKey) -> Result<Selection> {
    let last_text = tree
        .descendants(key)?
        .into_iter()
        .filter(|node| matches!(tree.kind(*node), Ok(NodeKind::Text(_))))
        .last();
    if let Some(text) = last_text {
        return Ok(Selection::caret(text, leaf_len(tree.kind(text)?)));
    }
    let kind = tree.kind(key)?;
    if kind.is_element() {
        Ok(Selection::caret(key, tree.child_count(key)?))
    } else {
        Ok(Selection::caret(key, 0))
    }
}

fn clamp_point(tree: &Tree, point: Point) -> Option<Point> {
    let data = tree.get(point.key).ok()?;
    // Attached nodes only.
    tree.path_of(point.key).ok()?;
    let max = if data.kind.is_element() {
        data.children.len()
    } else {
        leaf_len(&data.kind)
    };
    Some(Point::new(point.key, point.offset.min(max)))
}

/// Repairs a selection after the tree changed under it: offsets are
/// clamped, and points on nodes that no longer exist fall back to the end
/// of the last top-level block.
pub fn normalize_selection(tree: &Tree, selection: Selection) -> Result<Selection> {
    match (
        clamp_point(tree, selection.anchor),
        clamp_point(tree, selection.focus),
    ) {
        (Some(anchor), Some(focus)) => Ok(Selection::new(anchor, focus)),
        _ => match tree.children(tree.root())?.last() {
            Some(last) => select_end(tree, *last),
            None => Ok(Selection::caret(tree.root(), 0)),
        },
    }
}

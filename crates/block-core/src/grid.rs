//! Grid containers and their items.
//!
//! A container holds only grid items, and after every structural change each
//! item spans `column_count / item_count` columns. Containers reduced to one
//! item are flattened back into plain content by [`prune`].

use crate::error::{EngineError, Result, invariant};
use crate::node::{ColumnCount, ColumnSpan, NodeKey, NodeKind};
use crate::tree::Tree;

pub fn create_grid_container(tree: &mut Tree, items: Vec<NodeKey>) -> Result<NodeKey> {
    tree.create_with_children(
        NodeKind::GridContainer {
            column_count: ColumnCount::default(),
        },
        items,
    )
}

pub fn create_grid_item(
    tree: &mut Tree,
    column_span: ColumnSpan,
    children: Vec<NodeKey>,
) -> Result<NodeKey> {
    tree.create_with_children(NodeKind::GridItem { column_span }, children)
}

/// Span every item gets when `items` share `column_count` columns.
pub fn rebalanced_span(column_count: ColumnCount, items: usize) -> Result<ColumnSpan> {
    let columns = column_count.get();
    let invalid = || EngineError::InvalidColumnSpan {
        column_count: columns,
        items,
    };
    let Ok(n) = u32::try_from(items) else {
        return Err(invalid());
    };
    if n == 0 || columns % n != 0 {
        return Err(invalid());
    }
    ColumnSpan::try_from(columns / n).map_err(|_| invalid())
}

fn column_count(tree: &Tree, container: NodeKey) -> Result<ColumnCount> {
    match tree.kind(container)? {
        NodeKind::GridContainer { column_count } => Ok(*column_count),
        _ => Err(EngineError::precondition("Must be GridContainerNode")),
    }
}

pub fn update_children_column_span(tree: &mut Tree, container: NodeKey) -> Result<()> {
    let columns = column_count(tree, container)?;
    let items = tree.children(container)?.to_vec();
    let column_span = rebalanced_span(columns, items.len())?;
    for item in items {
        invariant(tree.kind(item)?.is_grid_item(), "Must be GridItemNode")?;
        tree.set_kind(item, NodeKind::GridItem { column_span })?;
    }
    tracing::trace!(%container, span = column_span.get(), "rebalanced grid");
    Ok(())
}

/// Inserts a detached grid item and rebalances. The new span is checked
/// before anything is spliced.
pub fn insert_grid_item(
    tree: &mut Tree,
    container: NodeKey,
    index: usize,
    item: NodeKey,
) -> Result<()> {
    let columns = column_count(tree, container)?;
    invariant(tree.kind(item)?.is_grid_item(), "Must be GridItemNode")?;
    let count = tree.child_count(container)?;
    invariant(index <= count, "Must have insertion index")?;
    rebalanced_span(columns, count + 1)?;

    tree.splice_children(container, index, 0, vec![item])?;
    update_children_column_span(tree, container)
}

/// Two-item container, `first` on the left. Both item lists are detached.
pub fn wrap_in_grid(
    tree: &mut Tree,
    first: Vec<NodeKey>,
    second: Vec<NodeKey>,
) -> Result<NodeKey> {
    let span = rebalanced_span(ColumnCount::default(), 2)?;
    let left = create_grid_item(tree, span, first)?;
    let right = create_grid_item(tree, span, second)?;
    create_grid_container(tree, vec![left, right])
}

/// Collapses degenerate grids: empty items go, an empty container goes, a
/// container left with one item is replaced by copies of that item's
/// children. Otherwise spans are rebalanced if any item was removed.
pub fn prune(tree: &mut Tree, container: NodeKey) -> Result<()> {
    column_count(tree, container)?;
    let items = tree.children(container)?.to_vec();

    let mut empty = Vec::new();
    let mut remaining = Vec::new();
    for item in items {
        if tree.child_count(item)? == 0 {
            empty.push(item);
        } else {
            remaining.push(item);
        }
    }

    let parent = tree
        .parent(container)?
        .ok_or_else(|| EngineError::precondition("Must have parent node"))?;
    if remaining.len() == 1 {
        invariant(parent == tree.root(), "Must be root")?;
    }

    for item in &empty {
        tree.remove(*item)?;
    }

    match remaining.as_slice() {
        [] => {
            tracing::trace!(%container, "removing empty grid");
            tree.remove(container)
        }
        [single] => {
            tracing::trace!(%container, "promoting single grid item");
            let copies = tree.copy_children(*single)?;
            let index = tree.index_in_parent(container)?;
            tree.splice_children(parent, index, 1, copies)
        }
        _ if !empty.is_empty() => update_children_column_span(tree, container),
        _ => Ok(()),
    }
}

pub fn parent_grid(tree: &Tree, key: NodeKey) -> Result<Option<NodeKey>> {
    tree.find_ancestor(key, NodeKind::is_grid_container)
}

/// Removes `key`, then any quote or list ancestors it leaves empty.
/// Returns the nearest surviving ancestor.
pub(crate) fn remove_and_clean_up(tree: &mut Tree, key: NodeKey) -> Result<NodeKey> {
    let mut parent = tree
        .parent(key)?
        .ok_or_else(|| EngineError::precondition("Must have parent node"))?;
    tree.remove(key)?;
    loop {
        let kind = tree.kind(parent)?;
        if !(kind.is_quote() || kind.is_list()) || tree.child_count(parent)? > 0 {
            return Ok(parent);
        }
        let Some(next) = tree.parent(parent)? else {
            return Ok(parent);
        };
        tree.remove(parent)?;
        parent = next;
    }
}

/// Removes `key` and prunes the grid it was in, if any.
pub fn remove_with_pruning(tree: &mut Tree, key: NodeKey) -> Result<()> {
    let grid = parent_grid(tree, key)?;
    remove_and_clean_up(tree, key)?;
    match grid {
        Some(grid) if tree.contains(grid) => prune(tree, grid),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(tree: &mut Tree, text: &str) -> NodeKey {
        let leaf = tree.create(NodeKind::text(text));
        tree.create_with_children(NodeKind::paragraph(), vec![leaf])
            .unwrap()
    }

    #[test]
    fn rebalanced_span_follows_item_count() {
        let c = ColumnCount::Twelve;
        assert_eq!(rebalanced_span(c, 1).unwrap(), ColumnSpan::Twelve);
        assert_eq!(rebalanced_span(c, 2).unwrap(), ColumnSpan::Six);
        assert_eq!(rebalanced_span(c, 3).unwrap(), ColumnSpan::Four);
        assert_eq!(rebalanced_span(c, 4).unwrap(), ColumnSpan::Three);
        for n in [0, 5, 6, 12] {
            assert!(matches!(
                rebalanced_span(c, n),
                Err(EngineError::InvalidColumnSpan { items, .. }) if items == n
            ));
        }
    }

    #[test]
    fn prune_removes_emptied_container() {
        let mut tree = Tree::new();
        let a = tree.create(NodeKind::GridItem {
            column_span: ColumnSpan::Six,
        });
        let b = tree.create(NodeKind::GridItem {
            column_span: ColumnSpan::Six,
        });
        let grid = create_grid_container(&mut tree, vec![a, b]).unwrap();
        tree.append(tree.root(), vec![grid]).unwrap();

        prune(&mut tree, grid).unwrap();
        assert!(!tree.contains(grid));
        assert!(!tree.has_blocks());
    }

    #[test]
    fn prune_rejects_promotion_outside_root() {
        let mut tree = Tree::new();
        let p = paragraph(&mut tree, "x");
        let item = create_grid_item(&mut tree, ColumnSpan::Six, vec![p]).unwrap();
        let empty = create_grid_item(&mut tree, ColumnSpan::Six, Vec::new()).unwrap();
        let grid = create_grid_container(&mut tree, vec![item, empty]).unwrap();
        let quote = tree.create_with_children(NodeKind::Quote, vec![grid]).unwrap();
        tree.append(tree.root(), vec![quote]).unwrap();
        let before = tree.clone();

        let err = prune(&mut tree, grid).unwrap_err();
        assert_eq!(err.to_string(), "Invariant failed: Must be root");
        assert_eq!(tree, before);
    }

    #[test]
    fn insert_rejects_fifth_item_before_mutating() {
        let mut tree = Tree::new();
        let mut items = Vec::new();
        for text in ["a", "b", "c", "d"] {
            let p = paragraph(&mut tree, text);
            items.push(create_grid_item(&mut tree, ColumnSpan::Three, vec![p]).unwrap());
        }
        let grid = create_grid_container(&mut tree, items).unwrap();
        tree.append(tree.root(), vec![grid]).unwrap();
        let extra = create_grid_item(&mut tree, ColumnSpan::Twelve, Vec::new()).unwrap();
        let children_before = tree.children(grid).unwrap().to_vec();

        let err = insert_grid_item(&mut tree, grid, 4, extra).unwrap_err();
        assert!(matches!(err, EngineError::InvalidColumnSpan { items: 5, .. }));
        assert_eq!(tree.children(grid).unwrap(), children_before.as_slice());
    }

    #[test]
    fn removing_last_quote_child_drops_the_quote() {
        let mut tree = Tree::new();
        let p = paragraph(&mut tree, "quoted");
        let quote = tree.create_with_children(NodeKind::Quote, vec![p]).unwrap();
        let other = paragraph(&mut tree, "other");
        let left = create_grid_item(&mut tree, ColumnSpan::Six, vec![quote]).unwrap();
        let right = create_grid_item(&mut tree, ColumnSpan::Six, vec![other]).unwrap();
        let grid = create_grid_container(&mut tree, vec![left, right]).unwrap();
        tree.append(tree.root(), vec![grid]).unwrap();

        remove_with_pruning(&mut tree, p).unwrap();

        assert!(!tree.contains(grid));
        let root_children = tree.children(tree.root()).unwrap().to_vec();
        assert_eq!(root_children.len(), 1);
        assert_eq!(tree.text_content(root_children[0]).unwrap(), "other");
        tree.validate().unwrap();
    }
}

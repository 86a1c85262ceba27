//! Toolbar block conversions over the blocks a selection touches.
//!
//! Every conversion returns the caret to place afterwards, or `None` when
//! the selection touches nothing it can convert. Converting a block to its
//! own shape leaves the tree untouched.

use crate::classify::{BlockTag, block_tag};
use crate::error::{EngineError, Result, invariant};
use crate::grid::remove_and_clean_up;
use crate::node::{HeadingLevel, ListType, NodeKey, NodeKind, TextColor};
use crate::selection::{Point, Selection, select_end, touched_blocks};
use crate::tree::Tree;

/// Touched blocks that conversions act on: paragraphs, headings and list
/// items. Images and bare containers are skipped; kinds outside the
/// catalog fail classification.
fn convertible_blocks(tree: &Tree, selection: &Selection) -> Result<Vec<NodeKey>> {
    let mut blocks = Vec::new();
    for block in touched_blocks(tree, selection)? {
        match block_tag(tree, block)? {
            BlockTag::P | BlockTag::H2 | BlockTag::H3 | BlockTag::H4 | BlockTag::Li => {
                blocks.push(block)
            }
            BlockTag::Blockquote
            | BlockTag::Ul
            | BlockTag::Ol
            | BlockTag::Img
            | BlockTag::GridContainer
            | BlockTag::GridItem => {}
        }
    }
    Ok(blocks)
}

/// Replaces list item `li` with the detached `replacement`, splitting its
/// list so that the items after `li` move to a new list of the same type
/// placed after `replacement`.
pub(crate) fn lift_out_of_list(tree: &mut Tree, li: NodeKey, replacement: NodeKey) -> Result<()> {
    let list = tree
        .parent(li)?
        .ok_or_else(|| EngineError::precondition("Must have parent node"))?;
    let list_type = tree
        .kind(list)?
        .list_type()
        .ok_or_else(|| EngineError::precondition("Must be ListNode"))?;
    let container = tree
        .parent(list)?
        .ok_or_else(|| EngineError::precondition("List must have parent"))?;

    let index = tree.index_in_parent(li)?;
    let count = tree.child_count(list)?;
    let tail = tree.detach_children(list, index + 1, count - index - 1)?;
    tree.splice_children(list, index, 1, Vec::new())?;

    let mut insertions = vec![replacement];
    if !tail.is_empty() {
        insertions.push(tree.create_with_children(NodeKind::list(list_type), tail)?);
    }
    let list_index = tree.index_in_parent(list)?;
    tree.splice_children(container, list_index + 1, 0, insertions)?;
    if tree.child_count(list)? == 0 {
        tree.remove(list)?;
    }
    Ok(())
}

/// Puts the detached `replacement` where `block` is, lifting list items out
/// of their list first.
fn substitute(tree: &mut Tree, block: NodeKey, replacement: NodeKey) -> Result<()> {
    if tree.kind(block)?.is_list_item() {
        lift_out_of_list(tree, block, replacement)
    } else {
        tree.replace(block, replacement)
    }
}

/// Every touched block's top-level container must share one parent for a
/// conversion that gathers blocks into a single new container.
fn single_container(tree: &Tree, blocks: &[NodeKey]) -> Result<(NodeKey, NodeKey)> {
    let first = blocks
        .first()
        .ok_or_else(|| EngineError::precondition("Must have selected blocks"))?;
    let top = tree.top_level_ancestor(*first)?;
    let container = tree
        .parent(top)?
        .ok_or_else(|| EngineError::precondition("Must have container"))?;
    for block in &blocks[1..] {
        let other = tree.parent(tree.top_level_ancestor(*block)?)?;
        if other != Some(container) {
            return Err(EngineError::UnsupportedElement("blocks across layout containers"));
        }
    }
    Ok((top, container))
}

pub fn insert_body(tree: &mut Tree, selection: &Selection) -> Result<Option<Selection>> {
    let blocks = convertible_blocks(tree, selection)?;
    let Some(mut end_block) = blocks.last().copied() else {
        return Ok(None);
    };

    let mut quotes: Vec<NodeKey> = Vec::new();
    for block in blocks {
        if tree.kind(block)?.is_paragraph() {
            if let Some(parent) = tree.parent(block)? {
                if tree.kind(parent)?.is_quote() && !quotes.contains(&parent) {
                    quotes.push(parent);
                }
            }
            continue;
        }

        let children = tree.copy_children(block)?;
        let paragraph = tree.create_with_children(NodeKind::paragraph(), children)?;
        if block == end_block {
            end_block = paragraph;
        }
        substitute(tree, block, paragraph)?;
    }

    for quote in quotes {
        if !tree.contains(quote) {
            continue;
        }
        let count = tree.child_count(quote)?;
        let children = tree.detach_children(quote, 0, count)?;
        tree.replace_with(quote, children)?;
    }

    select_end(tree, end_block).map(Some)
}

/// Each touched block that is not already a heading of `level` becomes one,
/// its content flattened to a single plain text leaf.
pub fn insert_heading(
    tree: &mut Tree,
    selection: &Selection,
    level: HeadingLevel,
) -> Result<Option<Selection>> {
    let blocks = convertible_blocks(tree, selection)?;
    let Some(mut end_block) = blocks.last().copied() else {
        return Ok(None);
    };

    let target = NodeKind::heading(level);
    for block in blocks {
        if *tree.kind(block)? == target {
            continue;
        }
        let text = tree.text_content(block)?;
        let leaf = tree.create(NodeKind::text(text));
        let heading = tree.create_with_children(target.clone(), vec![leaf])?;
        if block == end_block {
            end_block = heading;
        }
        substitute(tree, block, heading)?;
    }

    select_end(tree, end_block).map(Some)
}

pub fn insert_list(
    tree: &mut Tree,
    selection: &Selection,
    list_type: ListType,
) -> Result<Option<Selection>> {
    let blocks = convertible_blocks(tree, selection)?;
    if blocks.is_empty() {
        return Ok(None);
    }
    single_container(tree, &blocks)?;

    let mut already_listed = true;
    for block in &blocks {
        let in_list = tree.kind(*block)?.is_list_item()
            && tree.parent_kind(*block)?.and_then(NodeKind::list_type) == Some(list_type);
        already_listed &= in_list;
    }
    if already_listed {
        return select_end(tree, blocks[blocks.len() - 1]).map(Some);
    }

    // Items of other lists become paragraphs in place first, so the new
    // list lands where they were.
    let mut lifted = Vec::with_capacity(blocks.len());
    for block in blocks {
        if tree.kind(block)?.is_list_item() {
            let children = tree.copy_children(block)?;
            let paragraph = tree.create_with_children(NodeKind::paragraph(), children)?;
            lift_out_of_list(tree, block, paragraph)?;
            lifted.push(paragraph);
        } else {
            lifted.push(block);
        }
    }

    let (top, container) = single_container(tree, &lifted)?;
    let index = tree.index_in_parent(top)?;

    let mut items = Vec::with_capacity(lifted.len());
    for block in lifted {
        let children = tree.copy_children(block)?;
        items.push(tree.create_with_children(NodeKind::ListItem, children)?);
        remove_and_clean_up(tree, block)?;
    }
    let end_item = items[items.len() - 1];
    let list = tree.create_with_children(NodeKind::list(list_type), items)?;
    let index = index.min(tree.child_count(container)?);
    tree.splice_children(container, index, 0, vec![list])?;

    select_end(tree, end_item).map(Some)
}

pub fn insert_quote(tree: &mut Tree, selection: &Selection) -> Result<Option<Selection>> {
    let blocks = convertible_blocks(tree, selection)?;
    if blocks.is_empty() {
        return Ok(None);
    }
    let (top, container) = single_container(tree, &blocks)?;

    let first_parent = tree.parent(blocks[0])?;
    let mut same_quote = first_parent.is_some();
    for block in &blocks {
        let parent = tree.parent(*block)?;
        same_quote &= parent == first_parent
            && parent.is_some_and(|p| matches!(tree.kind(p), Ok(NodeKind::Quote)));
    }
    if same_quote {
        return select_end(tree, blocks[blocks.len() - 1]).map(Some);
    }

    let index = tree.index_in_parent(top)?;
    let mut quoted = Vec::with_capacity(blocks.len());
    for block in &blocks {
        let copy = if tree.kind(*block)?.is_list_item() {
            let children = tree.copy_children(*block)?;
            tree.create_with_children(NodeKind::paragraph(), children)?
        } else {
            tree.deep_copy(*block)?
        };
        quoted.push(copy);
    }
    for block in blocks {
        remove_and_clean_up(tree, block)?;
    }

    let end_block = quoted[quoted.len() - 1];
    let quote = tree.create_with_children(NodeKind::Quote, quoted)?;
    let index = index.min(tree.child_count(container)?);
    tree.splice_children(container, index, 0, vec![quote])?;

    select_end(tree, end_block).map(Some)
}

/// Appends the image and a blank paragraph at the end of the document and
/// puts the caret in that paragraph.
pub fn insert_image(
    tree: &mut Tree,
    source: &str,
    alt_text: &str,
    width: f64,
) -> Result<Selection> {
    invariant(width > 0.0 && width.is_finite(), "Image width must be positive")?;
    let image = tree.create(NodeKind::image(source, alt_text, width));
    let blank = tree.create(NodeKind::text(" "));
    let paragraph = tree.create_with_children(NodeKind::paragraph(), vec![blank])?;
    tree.append(tree.root(), vec![image, paragraph])?;
    Ok(Selection::collapsed(Point::new(blank, 0)))
}

/// Recolours the touched paragraphs. `None` when no paragraph is touched.
pub fn change_text_color(
    tree: &mut Tree,
    selection: &Selection,
    color: TextColor,
) -> Result<Option<Selection>> {
    let mut changed = false;
    for block in touched_blocks(tree, selection)? {
        if tree.kind(block)?.is_paragraph() {
            tree.set_kind(block, NodeKind::Paragraph { text_color: color })?;
            changed = true;
        }
    }
    Ok(changed.then_some(*selection))
}

use crate::error::{EngineError, Result};
use crate::node::{FormatFlag, NodeKey, NodeKind, TextFormat, TextLeaf};
use crate::selection::{Point, Selection, leaf_len, resolve_point, selected_leaves};
use crate::tree::Tree;

#[derive(Debug, Clone, Copy)]
struct Segment {
    leaf: NodeKey,
    from: usize,
    to: usize,
}

/// Non-empty character ranges of text leaves covered by the selection.
fn selected_segments(tree: &Tree, selection: &Selection) -> Result<Vec<Segment>> {
    let (start, end) = selection.ordered(tree)?;
    let mut segments = Vec::new();
    for leaf in selected_leaves(tree, selection)? {
        let kind = tree.kind(leaf)?;
        if !matches!(kind, NodeKind::Text(_)) {
            continue;
        }
        let len = leaf_len(kind);
        let from = if leaf == start.key { start.offset.min(len) } else { 0 };
        let to = if leaf == end.key { end.offset.min(len) } else { len };
        if from < to {
            segments.push(Segment { leaf, from, to });
        }
    }
    Ok(segments)
}

fn leaf_of(tree: &Tree, key: NodeKey) -> Result<TextLeaf> {
    match tree.kind(key)? {
        NodeKind::Text(leaf) => Ok(leaf.clone()),
        _ => Err(EngineError::precondition("Must be TextNode")),
    }
}

/// Splits `key` so `[from, to)` is its own leaf and returns that leaf.
fn isolate(tree: &mut Tree, key: NodeKey, from: usize, to: usize) -> Result<NodeKey> {
    let leaf = leaf_of(tree, key)?;
    let len = leaf.text.chars().count();
    if from == 0 && to == len {
        return Ok(key);
    }

    let piece = |a: usize, b: usize| -> String { leaf.text.chars().skip(a).take(b - a).collect() };
    let mut parts = Vec::with_capacity(3);
    if from > 0 {
        parts.push(tree.create(NodeKind::Text(TextLeaf {
            text: piece(0, from),
            format: leaf.format,
        })));
    }
    let middle = tree.create(NodeKind::Text(TextLeaf {
        text: piece(from, to),
        format: leaf.format,
    }));
    parts.push(middle);
    if to < len {
        parts.push(tree.create(NodeKind::Text(TextLeaf {
            text: piece(to, len),
            format: leaf.format,
        })));
    }

    tree.replace_with(key, parts)?;
    Ok(middle)
}

/// Joins neighbouring text leaves of `parent` that share a format, moving
/// selection points onto the surviving leaf.
fn merge_text_runs(tree: &mut Tree, parent: NodeKey, selection: &mut Selection) -> Result<()> {
    let mut run: Option<NodeKey> = None;
    for child in tree.children(parent)?.to_vec() {
        let NodeKind::Text(leaf) = tree.kind(child)?.clone() else {
            run = None;
            continue;
        };
        let Some(head) = run else {
            run = Some(child);
            continue;
        };
        let mut merged = leaf_of(tree, head)?;
        if merged.format != leaf.format {
            run = Some(child);
            continue;
        }

        let shift = merged.text.chars().count();
        merged.text.push_str(&leaf.text);
        tree.set_kind(head, NodeKind::Text(merged))?;
        for point in [&mut selection.anchor, &mut selection.focus] {
            if point.key == child {
                *point = Point::new(head, point.offset + shift);
            }
        }
        tree.remove(child)?;
    }
    Ok(())
}

/// Toggles `flag` over the selected text: cleared if every selected
/// character already has it, set everywhere otherwise. Returns the
/// selection covering the formatted text, or `None` when nothing is
/// selected.
pub fn format_text(
    tree: &mut Tree,
    selection: &Selection,
    flag: FormatFlag,
) -> Result<Option<Selection>> {
    if selection.is_collapsed() {
        return Ok(None);
    }
    let segments = selected_segments(tree, selection)?;
    if segments.is_empty() {
        return Ok(None);
    }

    let mut enable = false;
    for segment in &segments {
        if !leaf_of(tree, segment.leaf)?.format.has(flag) {
            enable = true;
        }
    }

    let mut parents = Vec::new();
    let mut formatted = Vec::with_capacity(segments.len());
    for segment in segments {
        if let Some(parent) = tree.parent(segment.leaf)? {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        let middle = isolate(tree, segment.leaf, segment.from, segment.to)?;
        let mut leaf = leaf_of(tree, middle)?;
        leaf.format.set(flag, enable);
        tree.set_kind(middle, NodeKind::Text(leaf))?;
        formatted.push(middle);
    }

    let (Some(first), Some(last)) = (formatted.first(), formatted.last()) else {
        return Ok(None);
    };
    let last_len = leaf_len(tree.kind(*last)?);
    let mut after = Selection::new(Point::new(*first, 0), Point::new(*last, last_len));
    for parent in parents {
        merge_text_runs(tree, parent, &mut after)?;
    }
    tracing::trace!(?flag, enable, "formatted text");
    Ok(Some(after))
}

/// Format flags shared by every selected character; for a caret, the format
/// of the text leaf it sits in.
pub fn active_formats(tree: &Tree, selection: &Selection) -> Result<TextFormat> {
    if selection.is_collapsed() {
        let caret = resolve_point(tree, selection.focus)?;
        return Ok(match tree.kind(caret.key)? {
            NodeKind::Text(leaf) => leaf.format,
            _ => TextFormat::default(),
        });
    }

    let segments = selected_segments(tree, selection)?;
    if segments.is_empty() {
        return Ok(TextFormat::default());
    }
    let mut active = TextFormat::default();
    for flag in FormatFlag::ALL {
        let mut all = true;
        for segment in &segments {
            if !leaf_of(tree, segment.leaf)?.format.has(flag) {
                all = false;
                break;
            }
        }
        active.set(flag, all);
    }
    Ok(active)
}

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::node::{HeadingLevel, ImageAttrs, NodeKey, NodeKind, TextColor};
use crate::selection::{Selection, touched_blocks};
use crate::tree::Tree;

/// Canonical tag of every node kind in the block catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    P,
    H2,
    H3,
    H4,
    Blockquote,
    Li,
    Ul,
    Ol,
    Img,
    GridContainer,
    GridItem,
}

impl BlockTag {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockTag::P => "p",
            BlockTag::H2 => "h2",
            BlockTag::H3 => "h3",
            BlockTag::H4 => "h4",
            BlockTag::Blockquote => "blockquote",
            BlockTag::Li => "li",
            BlockTag::Ul => "ul",
            BlockTag::Ol => "ol",
            BlockTag::Img => "img",
            BlockTag::GridContainer => "grid-container",
            BlockTag::GridItem => "grid-item",
        }
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockTag {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "p" => BlockTag::P,
            "h2" => BlockTag::H2,
            "h3" => BlockTag::H3,
            "h4" => BlockTag::H4,
            "blockquote" => BlockTag::Blockquote,
            "li" => BlockTag::Li,
            "ul" => BlockTag::Ul,
            "ol" => BlockTag::Ol,
            "img" => BlockTag::Img,
            "grid-container" => BlockTag::GridContainer,
            "grid-item" => BlockTag::GridItem,
            other => return Err(EngineError::UnsupportedBlockType(other.to_string())),
        })
    }
}

impl From<HeadingLevel> for BlockTag {
    fn from(level: HeadingLevel) -> Self {
        match level {
            HeadingLevel::H2 => BlockTag::H2,
            HeadingLevel::H3 => BlockTag::H3,
            HeadingLevel::H4 => BlockTag::H4,
        }
    }
}

pub fn is_supported_heading_tag(tag: &str) -> bool {
    matches!(tag, "h2" | "h3" | "h4")
}

/// Tag of a node kind. Kinds outside the block catalog are rejected.
pub fn kind_tag(kind: &NodeKind) -> Result<BlockTag> {
    match kind {
        NodeKind::Paragraph { .. } => Ok(BlockTag::P),
        NodeKind::Heading { level } => Ok((*level).into()),
        NodeKind::Quote => Ok(BlockTag::Blockquote),
        NodeKind::List { list_type } => Ok(if list_type.is_ordered() {
            BlockTag::Ol
        } else {
            BlockTag::Ul
        }),
        NodeKind::ListItem => Ok(BlockTag::Li),
        NodeKind::Image(_) => Ok(BlockTag::Img),
        NodeKind::GridContainer { .. } => Ok(BlockTag::GridContainer),
        NodeKind::GridItem { .. } => Ok(BlockTag::GridItem),
        NodeKind::Root
        | NodeKind::Text(_)
        | NodeKind::LineBreak
        | NodeKind::Link { .. }
        | NodeKind::Table
        | NodeKind::TableRow
        | NodeKind::TableCell => Err(EngineError::UnsupportedElement(kind.name())),
    }
}

pub fn block_tag(tree: &Tree, key: NodeKey) -> Result<BlockTag> {
    kind_tag(tree.kind(key)?)
}

pub fn is_block_wrapper(kind: &NodeKind) -> bool {
    kind.is_grid_container() || kind.is_grid_item()
}

/// Tag the toolbar shows for the current selection: lists report their
/// list type, everything else its own tag. `None` when the touched
/// top-level blocks disagree or nothing is touched.
pub fn active_block_type(tree: &Tree, selection: &Selection) -> Result<Option<BlockTag>> {
    let mut active = None;
    for block in touched_blocks(tree, selection)? {
        let top = tree.top_level_ancestor(block)?;
        let tag = block_tag(tree, top)?;
        match active {
            None => active = Some(tag),
            Some(current) if current == tag => {}
            Some(_) => return Ok(None),
        }
    }
    Ok(active)
}

/// What an external renderer needs to draw one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderAttributes {
    pub block_tag: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_span: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<TextColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttrs>,
}

pub fn render_attributes(tree: &Tree, key: NodeKey) -> Result<RenderAttributes> {
    let kind = tree.kind(key)?;
    let mut attrs = RenderAttributes {
        block_tag: kind_tag(kind)?.as_str(),
        column_span: None,
        column_count: None,
        text_color: None,
        image: None,
    };
    match kind {
        NodeKind::GridContainer { column_count } => attrs.column_count = Some(column_count.get()),
        NodeKind::GridItem { column_span } => attrs.column_span = Some(column_span.get()),
        NodeKind::Paragraph { text_color } => attrs.text_color = Some(*text_color),
        NodeKind::Image(image) => attrs.image = Some(image.clone()),
        _ => {}
    }
    Ok(attrs)
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HeadingLevel {
    H2,
    H3,
    H4,
}

impl HeadingLevel {
    pub fn get(self) -> u8 {
        match self {
            HeadingLevel::H2 => 2,
            HeadingLevel::H3 => 3,
            HeadingLevel::H4 => 4,
        }
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(HeadingLevel::H2),
            3 => Ok(HeadingLevel::H3),
            4 => Ok(HeadingLevel::H4),
            other => Err(EngineError::UnsupportedBlockType(format!("h{other}"))),
        }
    }
}

impl From<HeadingLevel> for u8 {
    fn from(value: HeadingLevel) -> Self {
        value.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bullet,
    Number,
}

impl ListType {
    pub fn is_ordered(self) -> bool {
        matches!(self, ListType::Number)
    }
}

/// Total columns of a grid container. Only a 12-column grid is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ColumnCount {
    #[default]
    Twelve,
}

impl ColumnCount {
    pub fn get(self) -> u32 {
        match self {
            ColumnCount::Twelve => 12,
        }
    }
}

impl TryFrom<u32> for ColumnCount {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            12 => Ok(ColumnCount::Twelve),
            other => Err(EngineError::precondition(format!(
                "Grid does not support provided columnsNumber {other}"
            ))),
        }
    }
}

impl From<ColumnCount> for u32 {
    fn from(value: ColumnCount) -> Self {
        value.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ColumnSpan {
    Three,
    Four,
    Six,
    #[default]
    Twelve,
}

impl ColumnSpan {
    pub fn get(self) -> u32 {
        match self {
            ColumnSpan::Three => 3,
            ColumnSpan::Four => 4,
            ColumnSpan::Six => 6,
            ColumnSpan::Twelve => 12,
        }
    }

    pub fn is_allowed(span: u32) -> bool {
        Self::try_from(span).is_ok()
    }
}

impl TryFrom<u32> for ColumnSpan {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(ColumnSpan::Three),
            4 => Ok(ColumnSpan::Four),
            6 => Ok(ColumnSpan::Six),
            12 => Ok(ColumnSpan::Twelve),
            other => Err(EngineError::precondition(format!(
                "Must have allowed column span, got {other}"
            ))),
        }
    }
}

impl From<ColumnSpan> for u32 {
    fn from(value: ColumnSpan) -> Self {
        value.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextColor {
    #[default]
    Zinc,
    Red,
    Orange,
    Amber,
    Green,
    Blue,
    Violet,
}

impl TextColor {
    pub fn as_str(self) -> &'static str {
        match self {
            TextColor::Zinc => "zinc",
            TextColor::Red => "red",
            TextColor::Orange => "orange",
            TextColor::Amber => "amber",
            TextColor::Green => "green",
            TextColor::Blue => "blue",
            TextColor::Violet => "violet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatFlag {
    Bold,
    Italic,
    Highlight,
    Strikethrough,
}

impl FormatFlag {
    pub const ALL: [FormatFlag; 4] = [
        FormatFlag::Bold,
        FormatFlag::Italic,
        FormatFlag::Highlight,
        FormatFlag::Strikethrough,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextFormat {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default)]
    pub strikethrough: bool,
}

impl TextFormat {
    pub fn has(&self, flag: FormatFlag) -> bool {
        match flag {
            FormatFlag::Bold => self.bold,
            FormatFlag::Italic => self.italic,
            FormatFlag::Highlight => self.highlight,
            FormatFlag::Strikethrough => self.strikethrough,
        }
    }

    pub fn set(&mut self, flag: FormatFlag, on: bool) {
        match flag {
            FormatFlag::Bold => self.bold = on,
            FormatFlag::Italic => self.italic = on,
            FormatFlag::Highlight => self.highlight = on,
            FormatFlag::Strikethrough => self.strikethrough = on,
        }
    }

    pub fn with(mut self, flag: FormatFlag) -> Self {
        self.set(flag, true);
        self
    }

    pub fn is_plain(&self) -> bool {
        *self == TextFormat::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLeaf {
    pub text: String,
    #[serde(default, skip_serializing_if = "TextFormat::is_plain")]
    pub format: TextFormat,
}

impl TextLeaf {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttrs {
    pub source: String,
    #[serde(default)]
    pub alt_text: String,
    pub width: f64,
}

/// Every node shape the engine knows about. Matches over this enum are
/// exhaustive on purpose: a new kind has to be classified everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeKind {
    Root,
    Paragraph {
        #[serde(default)]
        text_color: TextColor,
    },
    Heading {
        level: HeadingLevel,
    },
    Quote,
    List {
        list_type: ListType,
    },
    ListItem,
    GridContainer {
        #[serde(default)]
        column_count: ColumnCount,
    },
    GridItem {
        #[serde(default)]
        column_span: ColumnSpan,
    },
    Image(ImageAttrs),
    Text(TextLeaf),
    LineBreak,
    Link {
        url: String,
    },
    Table,
    TableRow,
    TableCell,
}

impl NodeKind {
    pub fn paragraph() -> Self {
        NodeKind::Paragraph {
            text_color: TextColor::default(),
        }
    }

    pub fn heading(level: HeadingLevel) -> Self {
        NodeKind::Heading { level }
    }

    pub fn list(list_type: ListType) -> Self {
        NodeKind::List { list_type }
    }

    pub fn text(text: impl Into<String>) -> Self {
        NodeKind::Text(TextLeaf::plain(text))
    }

    pub fn image(source: impl Into<String>, alt_text: impl Into<String>, width: f64) -> Self {
        NodeKind::Image(ImageAttrs {
            source: source.into(),
            alt_text: alt_text.into(),
            width,
        })
    }

    /// Can hold children.
    pub fn is_element(&self) -> bool {
        match self {
            NodeKind::Image(_) | NodeKind::Text(_) | NodeKind::LineBreak => false,
            NodeKind::Root
            | NodeKind::Paragraph { .. }
            | NodeKind::Heading { .. }
            | NodeKind::Quote
            | NodeKind::List { .. }
            | NodeKind::ListItem
            | NodeKind::GridContainer { .. }
            | NodeKind::GridItem { .. }
            | NodeKind::Link { .. }
            | NodeKind::Table
            | NodeKind::TableRow
            | NodeKind::TableCell => true,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            NodeKind::Text(_) | NodeKind::LineBreak | NodeKind::Link { .. }
        )
    }

    /// Block-level element (not the root) or an image, which stands in for
    /// a block in layout and drag handling.
    pub fn is_block(&self) -> bool {
        match self {
            NodeKind::Root => false,
            NodeKind::Image(_) => true,
            other => other.is_element() && !other.is_inline(),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, NodeKind::Root)
    }

    pub fn is_paragraph(&self) -> bool {
        matches!(self, NodeKind::Paragraph { .. })
    }

    pub fn is_quote(&self) -> bool {
        matches!(self, NodeKind::Quote)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, NodeKind::List { .. })
    }

    pub fn is_list_item(&self) -> bool {
        matches!(self, NodeKind::ListItem)
    }

    pub fn is_grid_container(&self) -> bool {
        matches!(self, NodeKind::GridContainer { .. })
    }

    pub fn is_grid_item(&self) -> bool {
        matches!(self, NodeKind::GridItem { .. })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, NodeKind::Image(_))
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self, NodeKind::LineBreak)
    }

    pub fn list_type(&self) -> Option<ListType> {
        match self {
            NodeKind::List { list_type } => Some(*list_type),
            _ => None,
        }
    }

    pub fn text_leaf(&self) -> Option<&TextLeaf> {
        match self {
            NodeKind::Text(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Paragraph { .. } => "paragraph",
            NodeKind::Heading { .. } => "heading",
            NodeKind::Quote => "quote",
            NodeKind::List { .. } => "list",
            NodeKind::ListItem => "list-item",
            NodeKind::GridContainer { .. } => "grid-container",
            NodeKind::GridItem { .. } => "grid-item",
            NodeKind::Image(_) => "image",
            NodeKind::Text(_) => "text",
            NodeKind::LineBreak => "line-break",
            NodeKind::Link { .. } => "link",
            NodeKind::Table => "table",
            NodeKind::TableRow => "table-row",
            NodeKind::TableCell => "table-cell",
        }
    }

    pub(crate) fn same_variant(&self, other: &NodeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
}

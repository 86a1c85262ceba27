//! Markdown import and export for the blocks the engine models.
//!
//! Import runs on `pulldown-cmark` with strikethrough enabled. Headings map
//! onto levels 2 to 4, quotes and flat lists keep their shape, a paragraph
//! holding only an image becomes an image block, and `==highlight==` is
//! paired by hand after parsing. Grids have no markdown form; their items
//! are exported one after another.

use pulldown_cmark::{Event, HeadingLevel as Depth, Options, Parser, Tag, TagEnd};

use crate::core::EditorConfig;
use crate::error::{EngineError, Result};
use crate::node::{FormatFlag, HeadingLevel, ListType, NodeKey, NodeKind, TextFormat, TextLeaf};
use crate::tree::Tree;

pub fn import(markdown: &str, config: &EditorConfig) -> Result<Tree> {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    let mut state = ImportState::new(config);
    for event in parser {
        state.event(event)?;
    }
    state.finish()
}

pub fn export(tree: &Tree) -> Result<String> {
    let mut blocks = Vec::new();
    for child in tree.children(tree.root())? {
        export_block(tree, *child, &mut blocks)?;
    }
    Ok(blocks.join("\n\n"))
}

// ---------------------------------------------------------------------------
// Import state machine
// ---------------------------------------------------------------------------

/// Inline content held back until its block closes, so standalone images,
/// highlight markers and adjacent runs can be settled first.
#[derive(Debug, Clone, PartialEq)]
enum Inline {
    Text(TextLeaf),
    Break,
    Link { url: String, children: Vec<Inline> },
    Image { source: String, alt: String },
}

#[derive(Debug, Clone, Copy)]
enum InlineBlock {
    Paragraph,
    Heading(HeadingLevel),
    Item,
}

#[derive(Debug)]
enum Frame {
    /// The root or a quote.
    Blocks(Vec<NodeKey>),
    List(ListType, Vec<NodeKey>),
    Inline(InlineBlock, Vec<Inline>),
    Link(String, Vec<Inline>),
    Image { source: String, alt: String },
}

impl Frame {
    fn name(&self) -> &'static str {
        match self {
            Frame::Blocks(_) => "quote",
            Frame::List(..) => "list",
            Frame::Inline(InlineBlock::Paragraph, _) => "paragraph",
            Frame::Inline(InlineBlock::Heading(_), _) => "heading",
            Frame::Inline(InlineBlock::Item, _) => "list-item",
            Frame::Link(..) => "link",
            Frame::Image { .. } => "image",
        }
    }
}

struct ImportState<'c> {
    config: &'c EditorConfig,
    tree: Tree,
    frames: Vec<Frame>,
    marks: Vec<FormatFlag>,
}

fn unbalanced() -> EngineError {
    EngineError::InvalidDocument("unbalanced markdown events".into())
}

impl<'c> ImportState<'c> {
    fn new(config: &'c EditorConfig) -> Self {
        Self {
            config,
            tree: Tree::new(),
            frames: vec![Frame::Blocks(Vec::new())],
            marks: Vec::new(),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) | Event::Code(text) | Event::InlineHtml(text) => {
                self.text(&text);
                Ok(())
            }
            Event::SoftBreak | Event::HardBreak => {
                self.push_inline(Inline::Break);
                Ok(())
            }
            // Rules, block HTML, footnotes and math have no block here.
            _ => Ok(()),
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) -> Result<()> {
        match tag {
            Tag::Paragraph => {
                // Loose list items wrap their text in paragraphs.
                if let Some(Frame::Inline(InlineBlock::Item, children)) = self.frames.last_mut() {
                    if !children.is_empty() {
                        children.push(Inline::Break);
                    }
                    return Ok(());
                }
                self.open_block(Frame::Inline(InlineBlock::Paragraph, Vec::new()))
            }
            Tag::CodeBlock(_) => {
                self.open_block(Frame::Inline(InlineBlock::Paragraph, Vec::new()))
            }
            Tag::Heading { level, .. } => self.open_block(Frame::Inline(
                InlineBlock::Heading(heading_level(level)),
                Vec::new(),
            )),
            Tag::BlockQuote(_) => self.open_block(Frame::Blocks(Vec::new())),
            Tag::List(start) => {
                let list_type = if start.is_some() {
                    ListType::Number
                } else {
                    ListType::Bullet
                };
                self.open_block(Frame::List(list_type, Vec::new()))
            }
            Tag::Item => {
                self.frames
                    .push(Frame::Inline(InlineBlock::Item, Vec::new()));
                Ok(())
            }
            Tag::Emphasis => {
                self.marks.push(FormatFlag::Italic);
                Ok(())
            }
            Tag::Strong => {
                self.marks.push(FormatFlag::Bold);
                Ok(())
            }
            Tag::Strikethrough => {
                self.marks.push(FormatFlag::Strikethrough);
                Ok(())
            }
            Tag::Link { dest_url, .. } => {
                self.frames.push(Frame::Link(dest_url.to_string(), Vec::new()));
                Ok(())
            }
            Tag::Image { dest_url, .. } => {
                self.frames.push(Frame::Image {
                    source: dest_url.to_string(),
                    alt: String::new(),
                });
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) -> Result<()> {
        match tag {
            TagEnd::Paragraph => {
                if matches!(self.frames.last(), Some(Frame::Inline(InlineBlock::Item, _))) {
                    return Ok(());
                }
                self.close_inline_block()
            }
            TagEnd::CodeBlock | TagEnd::Heading(_) | TagEnd::Item => self.close_inline_block(),
            TagEnd::BlockQuote(_) => {
                let Some(Frame::Blocks(children)) = self.frames.pop() else {
                    return Err(unbalanced());
                };
                let quote = self.tree.create_with_children(NodeKind::Quote, children)?;
                self.push_block(quote)
            }
            TagEnd::List(_) => {
                let Some(Frame::List(list_type, items)) = self.frames.pop() else {
                    return Err(unbalanced());
                };
                let list = self
                    .tree
                    .create_with_children(NodeKind::list(list_type), items)?;
                self.push_block(list)
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.marks.pop();
                Ok(())
            }
            TagEnd::Link => {
                let Some(Frame::Link(url, children)) = self.frames.pop() else {
                    return Err(unbalanced());
                };
                self.push_inline(Inline::Link { url, children });
                Ok(())
            }
            TagEnd::Image => {
                let Some(Frame::Image { source, alt }) = self.frames.pop() else {
                    return Err(unbalanced());
                };
                self.push_inline(Inline::Image { source, alt });
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn format(&self) -> TextFormat {
        self.marks
            .iter()
            .fold(TextFormat::default(), |format, flag| format.with(*flag))
    }

    /// Code block text arrives with embedded newlines; other text never does.
    fn text(&mut self, text: &str) {
        if let Some(Frame::Image { alt, .. }) = self.frames.last_mut() {
            alt.push_str(text);
            return;
        }
        let format = self.format();
        let mut lines = text.strip_suffix('\n').unwrap_or(text).split('\n');
        if let Some(first) = lines.next() {
            self.push_inline(Inline::Text(TextLeaf {
                text: first.to_string(),
                format,
            }));
        }
        for line in lines {
            self.push_inline(Inline::Break);
            self.push_inline(Inline::Text(TextLeaf {
                text: line.to_string(),
                format,
            }));
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        match self.frames.last_mut() {
            Some(Frame::Inline(_, children) | Frame::Link(_, children)) => children.push(inline),
            Some(Frame::Image { alt, .. }) => {
                if let Inline::Text(leaf) = inline {
                    alt.push_str(&leaf.text);
                }
            }
            _ => {}
        }
    }

    fn open_block(&mut self, frame: Frame) -> Result<()> {
        if let Some(Frame::Inline(..) | Frame::Link(..) | Frame::Image { .. }) = self.frames.last() {
            return Err(EngineError::UnsupportedBlockType(format!(
                "nested {}",
                frame.name()
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn push_block(&mut self, key: NodeKey) -> Result<()> {
        match self.frames.last_mut() {
            Some(Frame::Blocks(children) | Frame::List(_, children)) => {
                children.push(key);
                Ok(())
            }
            _ => Err(unbalanced()),
        }
    }

    fn close_inline_block(&mut self) -> Result<()> {
        let Some(Frame::Inline(block, children)) = self.frames.pop() else {
            return Err(unbalanced());
        };
        let standalone_image = match (block, children.as_slice()) {
            (InlineBlock::Paragraph, [Inline::Image { source, alt }]) => Some(NodeKind::image(
                source.clone(),
                alt.clone(),
                self.config.default_image_width,
            )),
            _ => None,
        };
        let kind = match (standalone_image, block) {
            (Some(image), _) => {
                let key = self.tree.create(image);
                return self.push_block(key);
            }
            (None, InlineBlock::Paragraph) => NodeKind::paragraph(),
            (None, InlineBlock::Heading(level)) => NodeKind::heading(level),
            (None, InlineBlock::Item) => NodeKind::ListItem,
        };
        let nodes = self.inline_nodes(children)?;
        let key = self.tree.create_with_children(kind, nodes)?;
        self.push_block(key)
    }

    fn inline_nodes(&mut self, inlines: Vec<Inline>) -> Result<Vec<NodeKey>> {
        let inlines = merge_runs(split_highlights(literal_images(inlines)));
        let mut nodes = Vec::with_capacity(inlines.len());
        for inline in inlines {
            let key = match inline {
                Inline::Text(leaf) => self.tree.create(NodeKind::Text(leaf)),
                Inline::Break => self.tree.create(NodeKind::LineBreak),
                Inline::Link { url, children } => {
                    let label = self.inline_nodes(children)?;
                    self.tree.create_with_children(NodeKind::Link { url }, label)?
                }
                Inline::Image { source, alt } => {
                    self.tree.create(NodeKind::text(format!("![{alt}]({source})")))
                }
            };
            nodes.push(key);
        }
        Ok(nodes)
    }

    fn finish(mut self) -> Result<Tree> {
        let Some(Frame::Blocks(blocks)) = self.frames.pop() else {
            return Err(unbalanced());
        };
        if !self.frames.is_empty() {
            return Err(unbalanced());
        }
        let root = self.tree.root();
        tracing::trace!(blocks = blocks.len(), "imported markdown");
        self.tree.append(root, blocks)?;
        Ok(self.tree)
    }
}

/// `#` imports as the top supported level, `#####` and below as the lowest.
fn heading_level(level: Depth) -> HeadingLevel {
    match level {
        Depth::H1 | Depth::H2 => HeadingLevel::H2,
        Depth::H3 => HeadingLevel::H3,
        Depth::H4 | Depth::H5 | Depth::H6 => HeadingLevel::H4,
    }
}

/// Images only stand alone as blocks; inline ones keep their source text.
fn literal_images(inlines: Vec<Inline>) -> Vec<Inline> {
    inlines
        .into_iter()
        .map(|inline| match inline {
            Inline::Image { source, alt } => {
                Inline::Text(TextLeaf::plain(format!("![{alt}]({source})")))
            }
            other => other,
        })
        .collect()
}

/// Pairs of `==` across the text runs of one block toggle highlight. An
/// unpaired last marker stays literal.
fn split_highlights(inlines: Vec<Inline>) -> Vec<Inline> {
    let markers: usize = inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text(leaf) => leaf.text.matches("==").count(),
            _ => 0,
        })
        .sum();
    let mut consumable = markers - markers % 2;
    if consumable == 0 {
        return inlines;
    }

    let mut highlighted = false;
    let mut out = Vec::with_capacity(inlines.len());
    for inline in inlines {
        let Inline::Text(leaf) = inline else {
            out.push(inline);
            continue;
        };
        let mut rest = leaf.text.as_str();
        while consumable > 0 {
            let Some(at) = rest.find("==") else {
                break;
            };
            push_run(&mut out, &rest[..at], leaf.format, highlighted);
            highlighted = !highlighted;
            consumable -= 1;
            rest = &rest[at + 2..];
        }
        push_run(&mut out, rest, leaf.format, highlighted);
    }
    out
}

fn push_run(out: &mut Vec<Inline>, text: &str, format: TextFormat, highlighted: bool) {
    if text.is_empty() {
        return;
    }
    let mut format = format;
    if highlighted {
        format.set(FormatFlag::Highlight, true);
    }
    out.push(Inline::Text(TextLeaf {
        text: text.to_string(),
        format,
    }));
}

/// The parser splits text at every delimiter it considers; adjacent runs
/// with one format become one leaf again.
fn merge_runs(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        if let (Some(Inline::Text(last)), Inline::Text(next)) = (out.last_mut(), &inline) {
            if last.format == next.format {
                last.text.push_str(&next.text);
                continue;
            }
        }
        out.push(inline);
    }
    out
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn export_block(tree: &Tree, key: NodeKey, out: &mut Vec<String>) -> Result<()> {
    let data = tree.get(key)?;
    match &data.kind {
        NodeKind::Paragraph { .. } => out.push(export_inline(tree, &data.children)?),
        NodeKind::Heading { level } => out.push(format!(
            "{} {}",
            "#".repeat(level.get() as usize),
            export_inline(tree, &data.children)?
        )),
        NodeKind::Quote => {
            let mut inner = Vec::new();
            for child in &data.children {
                export_block(tree, *child, &mut inner)?;
            }
            let quoted: Vec<String> = inner
                .join("\n\n")
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {line}")
                    }
                })
                .collect();
            out.push(quoted.join("\n"));
        }
        NodeKind::List { list_type } => {
            let mut items = Vec::with_capacity(data.children.len());
            for (ix, item) in data.children.iter().enumerate() {
                let marker = if list_type.is_ordered() {
                    format!("{}. ", ix + 1)
                } else {
                    "- ".to_string()
                };
                items.push(format!("{marker}{}", export_inline(tree, tree.children(*item)?)?));
            }
            out.push(items.join("\n"));
        }
        NodeKind::Image(image) => out.push(format!("![{}]({})", image.alt_text, image.source)),
        NodeKind::GridContainer { .. } | NodeKind::GridItem { .. } => {
            for child in &data.children {
                export_block(tree, *child, out)?;
            }
        }
        NodeKind::ListItem => out.push(format!("- {}", export_inline(tree, &data.children)?)),
        NodeKind::Root
        | NodeKind::Text(_)
        | NodeKind::LineBreak
        | NodeKind::Link { .. }
        | NodeKind::Table
        | NodeKind::TableRow
        | NodeKind::TableCell => return Err(EngineError::UnsupportedElement(data.kind.name())),
    }
    Ok(())
}

fn marker_for(flag: FormatFlag) -> &'static str {
    match flag {
        FormatFlag::Bold => "**",
        FormatFlag::Italic => "*",
        FormatFlag::Highlight => "==",
        FormatFlag::Strikethrough => "~~",
    }
}

/// Flags open outermost first.
const EXPORT_ORDER: [FormatFlag; 4] = [
    FormatFlag::Highlight,
    FormatFlag::Strikethrough,
    FormatFlag::Bold,
    FormatFlag::Italic,
];

fn emit(out: &mut String, open: &mut Vec<FormatFlag>, format: TextFormat) {
    let keep = open.iter().take_while(|flag| format.has(**flag)).count();
    while open.len() > keep {
        if let Some(flag) = open.pop() {
            out.push_str(marker_for(flag));
        }
    }
    for flag in EXPORT_ORDER {
        if format.has(flag) && !open.contains(&flag) {
            out.push_str(marker_for(flag));
            open.push(flag);
        }
    }
}

/// Backslash-escapes the characters the parser would read as inline
/// syntax. `=` is left alone; highlight pairing ignores escapes.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '*' | '_' | '~' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Inline content with markers opened and closed only where the format
/// changes, so a bold run containing an italic word stays one bold span.
fn export_inline(tree: &Tree, children: &[NodeKey]) -> Result<String> {
    let mut out = String::new();
    let mut open: Vec<FormatFlag> = Vec::new();

    for child in children {
        match tree.kind(*child)? {
            NodeKind::Text(leaf) => {
                emit(&mut out, &mut open, leaf.format);
                out.push_str(&escape_text(&leaf.text));
            }
            NodeKind::LineBreak => out.push('\n'),
            NodeKind::Link { url } => {
                emit(&mut out, &mut open, TextFormat::default());
                let label = export_inline(tree, tree.children(*child)?)?;
                out.push_str(&format!("[{label}]({url})"));
            }
            other => return Err(EngineError::UnsupportedElement(other.name())),
        }
    }
    emit(&mut out, &mut open, TextFormat::default());
    Ok(out)
}

use kurbo::{Point as Pointer, Rect};
use serde::{Deserialize, Serialize};

use crate::classify::{BlockTag, RenderAttributes, active_block_type, render_attributes};
use crate::command::{Command, CommandOutcome};
use crate::convert::{
    change_text_color, insert_body, insert_heading, insert_image, insert_list, insert_quote,
};
use crate::dnd::{EdgeSet, allowed_edges, closest_edge, drop_block};
use crate::error::Result;
use crate::format::{active_formats, format_text};
use crate::node::{NodeKey, NodeKind, TextFormat};
use crate::selection::{Selection, normalize_selection, select_end};
use crate::tree::Tree;
use crate::value::DocumentValue;

const DEFAULT_MAX_HISTORY: usize = 30;
const DEFAULT_MAX_NORMALIZE_ITERATIONS: usize = 16;
const DEFAULT_IMAGE_WIDTH: f64 = 320.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo entries kept; the oldest are dropped first.
    pub max_history: usize,
    pub max_normalize_iterations: usize,
    pub default_image_width: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            max_normalize_iterations: DEFAULT_MAX_NORMALIZE_ITERATIONS,
            default_image_width: DEFAULT_IMAGE_WIDTH,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        Ok(config.with_defaults())
    }

    fn with_defaults(mut self) -> Self {
        if self.max_history == 0 {
            self.max_history = DEFAULT_MAX_HISTORY;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = DEFAULT_MAX_NORMALIZE_ITERATIONS;
        }
        if !(self.default_image_width.is_finite() && self.default_image_width > 0.0) {
            self.default_image_width = DEFAULT_IMAGE_WIDTH;
        }
        self
    }
}

/// A tree fix-up run after every committed change until none applies.
pub trait NormalizePass {
    fn id(&self) -> &'static str;

    /// Returns whether the tree was changed.
    fn run(&self, tree: &mut Tree) -> Result<bool>;
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, tree: &mut Tree) -> Result<bool> {
        if tree.has_blocks() {
            return Ok(false);
        }
        let paragraph = tree.create(NodeKind::paragraph());
        tree.append(tree.root(), vec![paragraph])?;
        Ok(true)
    }
}

struct DropDetachedNodes;

impl NormalizePass for DropDetachedNodes {
    fn id(&self) -> &'static str {
        "core.drop_detached_nodes"
    }

    fn run(&self, tree: &mut Tree) -> Result<bool> {
        Ok(tree.collect_detached() > 0)
    }
}

fn core_normalize_passes() -> Vec<Box<dyn NormalizePass>> {
    vec![Box::new(EnsureNonEmptyDocument), Box::new(DropDetachedNodes)]
}

/// Working state of one update: a private copy of the document plus the
/// selection the update started from.
#[derive(Debug)]
pub struct Transaction {
    tree: Tree,
    selection: Selection,
    selection_after: Option<Selection>,
    source: String,
}

impl Transaction {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection_after(&mut self, selection: Selection) {
        self.selection_after = Some(selection);
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone)]
struct UndoRecord {
    tree: Tree,
    selection: Selection,
}

pub struct Editor {
    tree: Tree,
    selection: Selection,
    config: EditorConfig,
    passes: Vec<Box<dyn NormalizePass>>,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    /// Takes ownership of a parsed document. The tree is validated and
    /// normalized; the caret starts at the end of the document.
    pub fn new(tree: Tree, config: EditorConfig) -> Result<Self> {
        let mut editor = Self {
            selection: Selection::caret(tree.root(), 0),
            tree,
            config: config.with_defaults(),
            passes: core_normalize_passes(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        let mut tree = editor.tree.clone();
        editor.normalize(&mut tree)?;
        tree.validate()?;
        editor.tree = tree;
        if let Some(last) = editor.tree.children(editor.tree.root())?.last() {
            editor.selection = select_end(&editor.tree, *last)?;
        }
        Ok(editor)
    }

    pub fn empty() -> Result<Self> {
        Self::new(Tree::new(), EditorConfig::default())
    }

    pub fn from_markdown(markdown: &str, config: EditorConfig) -> Result<Self> {
        let config = config.with_defaults();
        let tree = crate::markdown::import(markdown, &config)?;
        Self::new(tree, config)
    }

    pub fn from_value(value: DocumentValue, config: EditorConfig) -> Result<Self> {
        Self::new(value.into_tree()?, config)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<()> {
        self.selection = normalize_selection(&self.tree, selection)?;
        Ok(())
    }

    pub fn to_markdown(&self) -> Result<String> {
        crate::markdown::export(&self.tree)
    }

    pub fn to_value(&self) -> Result<DocumentValue> {
        DocumentValue::from_tree(&self.tree)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        let current = UndoRecord {
            tree: std::mem::replace(&mut self.tree, record.tree),
            selection: self.selection,
        };
        self.selection = record.selection;
        self.redo_stack.push(current);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        let current = UndoRecord {
            tree: std::mem::replace(&mut self.tree, record.tree),
            selection: self.selection,
        };
        self.selection = record.selection;
        self.undo_stack.push(current);
        true
    }

    /// Runs `f` against a working copy of the document. The copy replaces
    /// the document only if `f` succeeds and the result still validates;
    /// on error the editor is left exactly as it was.
    pub fn update<T>(
        &mut self,
        source: &str,
        f: impl FnOnce(&mut Transaction) -> Result<T>,
    ) -> Result<T> {
        let mut tx = Transaction {
            tree: self.tree.clone(),
            selection: self.selection,
            selection_after: None,
            source: source.to_string(),
        };
        let value = f(&mut tx)?;

        let Transaction {
            mut tree,
            selection_after,
            ..
        } = tx;
        if tree.revision() == self.tree.revision() {
            if let Some(selection) = selection_after {
                self.selection = normalize_selection(&self.tree, selection)?;
            }
            return Ok(value);
        }

        self.normalize(&mut tree)?;
        tree.validate()?;
        let selection = normalize_selection(&tree, selection_after.unwrap_or(self.selection))?;

        let previous = std::mem::replace(&mut self.tree, tree);
        self.undo_stack.push(UndoRecord {
            tree: previous,
            selection: self.selection,
        });
        if self.undo_stack.len() > self.config.max_history {
            let overflow = self.undo_stack.len() - self.config.max_history;
            self.undo_stack.drain(..overflow);
        }
        self.redo_stack.clear();
        self.selection = selection;
        tracing::debug!(source, nodes = self.tree.node_count(), "committed transaction");
        Ok(value)
    }

    fn normalize(&self, tree: &mut Tree) -> Result<()> {
        for _ in 0..self.config.max_normalize_iterations {
            let mut changed = false;
            for pass in &self.passes {
                if pass.run(tree)? {
                    tracing::trace!(pass = pass.id(), "normalized");
                    changed = true;
                }
            }
            if !changed {
                return Ok(());
            }
        }
        tracing::warn!(
            iterations = self.config.max_normalize_iterations,
            "normalization did not settle"
        );
        Ok(())
    }

    pub fn dispatch(&mut self, command: &Command) -> Result<CommandOutcome> {
        tracing::debug!(command = command.name(), "dispatching command");
        let default_width = self.config.default_image_width;
        self.update(command.name(), |tx| {
            let selection = *tx.selection();
            let tree = tx.tree_mut();
            let after = match command {
                Command::InsertHeading { level } => insert_heading(tree, &selection, *level)?,
                Command::InsertBody => insert_body(tree, &selection)?,
                Command::InsertQuote => insert_quote(tree, &selection)?,
                Command::InsertList { list_type } => insert_list(tree, &selection, *list_type)?,
                Command::InsertImage { source, alt, width } => Some(insert_image(
                    tree,
                    source,
                    alt,
                    width.unwrap_or(default_width),
                )?),
                Command::ChangeTextColor { color } => change_text_color(tree, &selection, *color)?,
                Command::FormatText { format } => format_text(tree, &selection, *format)?,
                Command::Drop {
                    source,
                    target,
                    edge,
                } => {
                    if source == target {
                        None
                    } else {
                        match drop_block(tree, *source, *target, *edge)? {
                            Some(moved) => Some(select_end(tree, moved)?),
                            None => Some(selection),
                        }
                    }
                }
            };
            Ok(match after {
                Some(selection) => {
                    tx.set_selection_after(selection);
                    CommandOutcome::Handled
                }
                None => CommandOutcome::NotHandled,
            })
        })
    }

    /// UI-boundary wrapper around [`Editor::dispatch`]: failures are logged
    /// and reported as "not handled".
    pub fn handle(&mut self, command: &Command) -> bool {
        match self.dispatch(command) {
            Ok(outcome) => outcome.is_handled(),
            Err(err) => {
                tracing::warn!(command = command.name(), error = %err, "command failed");
                false
            }
        }
    }

    pub fn allowed_edges(&self, source: NodeKey, target: NodeKey) -> Result<EdgeSet> {
        allowed_edges(&self.tree, source, target)
    }

    /// Resolves the drop edge from pointer geometry and performs the drop.
    /// A pointer with no allowed edge is an inert drop.
    pub fn drop_at(
        &mut self,
        source: NodeKey,
        target: NodeKey,
        pointer: Pointer,
        target_rect: Rect,
    ) -> Result<CommandOutcome> {
        let allowed = self.allowed_edges(source, target)?;
        let Some(edge) = closest_edge(pointer, target_rect, allowed) else {
            return Ok(CommandOutcome::NotHandled);
        };
        self.dispatch(&Command::Drop {
            source,
            target,
            edge,
        })
    }

    pub fn active_block_type(&self) -> Result<Option<BlockTag>> {
        active_block_type(&self.tree, &self.selection)
    }

    pub fn active_formats(&self) -> Result<TextFormat> {
        active_formats(&self.tree, &self.selection)
    }

    pub fn render_attributes(&self, key: NodeKey) -> Result<RenderAttributes> {
        render_attributes(&self.tree, key)
    }
}

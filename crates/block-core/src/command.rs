use serde::{Deserialize, Serialize};

use crate::dnd::Edge;
use crate::node::{FormatFlag, HeadingLevel, ListType, NodeKey, TextColor};

/// The toolbar and drag-and-drop command catalog. Each variant is routed to
/// exactly one handler by [`crate::Editor::dispatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    InsertHeading {
        level: HeadingLevel,
    },
    InsertBody,
    InsertQuote,
    InsertList {
        list_type: ListType,
    },
    InsertImage {
        source: String,
        #[serde(default)]
        alt: String,
        /// Falls back to the editor's configured image width.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
    },
    ChangeTextColor {
        color: TextColor,
    },
    FormatText {
        format: FormatFlag,
    },
    Drop {
        source: NodeKey,
        target: NodeKey,
        edge: Edge,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::InsertHeading { .. } => "insert_heading",
            Command::InsertBody => "insert_body",
            Command::InsertQuote => "insert_quote",
            Command::InsertList { .. } => "insert_list",
            Command::InsertImage { .. } => "insert_image",
            Command::ChangeTextColor { .. } => "change_text_color",
            Command::FormatText { .. } => "format_text",
            Command::Drop { .. } => "drop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Handled,
    /// The command did not apply to the current selection or drop; nothing
    /// changed.
    NotHandled,
}

impl CommandOutcome {
    pub fn is_handled(self) -> bool {
        matches!(self, CommandOutcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: Command =
            serde_json::from_value(json!({ "command": "insert_heading", "level": 2 })).unwrap();
        assert_eq!(
            cmd,
            Command::InsertHeading {
                level: HeadingLevel::H2
            }
        );

        let cmd: Command = serde_json::from_value(json!({
            "command": "drop",
            "source": 4,
            "target": 7,
            "edge": "right",
        }))
        .unwrap();
        assert_eq!(cmd.name(), "drop");

        let cmd: Command =
            serde_json::from_value(json!({ "command": "insert_image", "source": "a.png" }))
                .unwrap();
        assert_eq!(
            cmd,
            Command::InsertImage {
                source: "a.png".into(),
                alt: String::new(),
                width: None
            }
        );
    }

    #[test]
    fn unsupported_heading_level_is_rejected() {
        assert!(
            serde_json::from_value::<Command>(json!({ "command": "insert_heading", "level": 5 }))
                .is_err()
        );
    }
}

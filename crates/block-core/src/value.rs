use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::node::{NodeKey, NodeKind};
use crate::tree::Tree;

const DEFAULT_SCHEMA: &str = "manos-block";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

/// One node of a serialized document with its children inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeValue {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeValue>,
}

impl NodeValue {
    pub fn new(kind: NodeKind, children: Vec<NodeValue>) -> Self {
        Self { kind, children }
    }
}

/// Serialized form of a whole document. Keys are not part of it; loading
/// assigns fresh ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: NodeValue,
}

impl DocumentValue {
    pub fn from_tree(tree: &Tree) -> Result<Self> {
        Ok(Self {
            schema: default_schema(),
            version: default_version(),
            document: node_value(tree, tree.root())?,
        })
    }

    /// Builds and validates the tree this value describes.
    pub fn into_tree(self) -> Result<Tree> {
        if self.schema != DEFAULT_SCHEMA {
            return Err(EngineError::InvalidDocument(format!(
                "unknown schema {:?}",
                self.schema
            )));
        }
        if !self.document.kind.is_root() {
            return Err(EngineError::InvalidDocument(
                "document must start at the root".into(),
            ));
        }

        let mut tree = Tree::new();
        let root = tree.root();
        let mut children = Vec::with_capacity(self.document.children.len());
        for child in self.document.children {
            children.push(build(&mut tree, child)?);
        }
        tree.append(root, children)
            .map_err(|err| EngineError::InvalidDocument(err.to_string()))?;
        tree.validate()?;
        Ok(tree)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

fn node_value(tree: &Tree, key: NodeKey) -> Result<NodeValue> {
    let data = tree.get(key)?;
    let mut children = Vec::with_capacity(data.children.len());
    for child in &data.children {
        children.push(node_value(tree, *child)?);
    }
    Ok(NodeValue::new(data.kind.clone(), children))
}

fn build(tree: &mut Tree, value: NodeValue) -> Result<NodeKey> {
    if value.kind.is_root() {
        return Err(EngineError::InvalidDocument("nested root".into()));
    }
    if let NodeKind::Image(image) = &value.kind {
        if !(image.width.is_finite() && image.width > 0.0) {
            return Err(EngineError::InvalidDocument(format!(
                "image width must be positive, got {}",
                image.width
            )));
        }
    }
    if !value.kind.is_element() && !value.children.is_empty() {
        return Err(EngineError::InvalidDocument(format!(
            "{} node cannot have children",
            value.kind.name()
        )));
    }

    let mut children = Vec::with_capacity(value.children.len());
    for child in value.children {
        children.push(build(tree, child)?);
    }
    tree.create_with_children(value.kind, children)
        .map_err(|err| EngineError::InvalidDocument(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_schema_and_version_take_defaults() {
        let value: DocumentValue = serde_json::from_value(json!({
            "document": {
                "type": "root",
                "children": [
                    { "type": "paragraph", "children": [{ "type": "text", "text": "hi" }] }
                ]
            }
        }))
        .unwrap();
        assert_eq!(value.schema, "manos-block");
        assert_eq!(value.version, 1);

        let tree = value.into_tree().unwrap();
        assert_eq!(tree.text_content(tree.root()).unwrap(), "hi");
    }

    #[test]
    fn leaves_with_children_are_rejected() {
        let value: DocumentValue = serde_json::from_value(json!({
            "document": {
                "type": "root",
                "children": [{
                    "type": "image",
                    "source": "a.png",
                    "width": 100,
                    "children": [{ "type": "line-break" }]
                }]
            }
        }))
        .unwrap();
        assert!(matches!(
            value.into_tree(),
            Err(EngineError::InvalidDocument(_))
        ));
    }
}

//! Data model shared by the dir parser, the hierarchy extractor and the navigator.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node name Info uses for the entry point of a manual.
pub const TOP_NODE: &str = "Top";

/// One subject line of the top-level Info directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoDirEntry {
    pub title: String,
    /// `info:/<topic>[/<node>]`
    pub url: String,
}

/// A heading of the dir file together with the subjects listed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoDirSection {
    pub heading: String,
    pub entries: Vec<InfoDirEntry>,
}

/// One node of a manual's menu hierarchy.
///
/// The root of an extracted hierarchy owns its whole subtree. Children are kept in
/// the order their menu entries appear in the page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoNode {
    pub topic: String,
    /// Raw Info node identifier.
    pub name: String,
    /// Menu label; empty when the node was reached without one.
    pub title: String,
    pub children: Vec<InfoNode>,
}

impl InfoNode {
    pub fn new(topic: impl Into<String>, name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            name: name.into(),
            title: title.into(),
            children: Vec::new(),
        }
    }

    /// Text shown for this node: the title, or the node name when there is none.
    pub fn label(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    /// The `info:/` URL addressing this node.
    pub fn url(&self) -> InfoUrl {
        InfoUrl::new(&self.topic, Some(&self.name))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(InfoNode::count).sum::<usize>()
    }

    /// Depth of the deepest leaf below this node (a leaf has depth 0).
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Render this node and its descendants with box-drawing characters.
    pub fn render_box_tree(&self, prefix: &str, is_last: bool) -> String {
        let mut out = String::new();
        let connector = if is_last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(self.label());
        out.push('\n');

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        for (i, child) in self.children.iter().enumerate() {
            let last = i == self.children.len() - 1;
            out.push_str(&child.render_box_tree(&child_prefix, last));
        }
        out
    }
}

/// Parsed form of an `info:/<topic>[/<node>]` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoUrl {
    pub topic: String,
    /// `None` addresses the manual's main node.
    pub node: Option<String>,
}

impl InfoUrl {
    pub fn new(topic: &str, node: Option<&str>) -> Self {
        Self {
            topic: topic.to_string(),
            node: node.filter(|n| !n.is_empty()).map(str::to_string),
        }
    }

    /// Parse an `info:/` URL. Returns `None` when `url` is not of that form.
    pub fn parse(url: &str) -> Option<Self> {
        use std::sync::OnceLock;

        static URL_PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = URL_PATTERN.get_or_init(|| Regex::new(r"^info:/([^/]*)(?:/(.*))?$").unwrap());

        let caps = re.captures(url)?;
        let topic = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let node = caps.get(2).map(|m| m.as_str());
        Some(Self::new(topic, node))
    }

    /// Node the URL points to, defaulting to `Top`.
    pub fn node_or_top(&self) -> &str {
        self.node.as_deref().unwrap_or(TOP_NODE)
    }
}

impl fmt::Display for InfoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "info:/{}/{}", self.topic, node),
            None => write!(f, "info:/{}", self.topic),
        }
    }
}

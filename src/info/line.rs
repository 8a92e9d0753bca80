//! Line grammar for Info directory subjects and node menu entries.
//!
//! Both the top-level `dir` file and the menus of individual nodes list their targets as
//! `* Title: (topic)node.` lines, so a single parser object serves both. Its patterns are
//! compiled once when the parser is built and never change afterwards.

use regex::Regex;
use tracing::{debug, warn};

use super::node::{InfoDirEntry, InfoUrl};

/// A reference to a node found in a page's `* Menu:` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub title: String,
    /// Set when the entry points into another manual (`(topic)node` form).
    pub topic: Option<String>,
    pub node: String,
}

/// Parser for `* ...` lines.
#[derive(Debug, Clone)]
pub struct LineParser {
    subject: Regex,
    short_entry: Regex,
    long_entry: Regex,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            // `* Title: (topic)` followed by whitespace, or by an optional node name ending in '.'
            subject: Regex::new(r"^\* ([^:]+):\s+\(([^)]+)\)(?:\s|([^.]*)\.).*$").unwrap(),
            short_entry: Regex::new(r"^\* ([^:]+)::").unwrap(),
            long_entry: Regex::new(r"^\* ([^:]+):\s+([^.,\t]+)").unwrap(),
        }
    }

    /// Parse one subject line of the dir file.
    ///
    /// Returns `None` (after logging the line) when it does not follow the
    /// `* Title: (topic)node.` grammar; the caller skips it.
    pub fn parse_subject_line(&self, line: &str) -> Option<InfoDirEntry> {
        let Some(caps) = self.subject.captures(line) else {
            warn!(line, "could not parse line from the info directory (dir) file");
            return None;
        };

        let title = caps[1].trim().to_string();
        let topic = caps[2].trim();
        let node = caps.get(3).map(|m| m.as_str().trim());

        Some(InfoDirEntry {
            title,
            url: InfoUrl::new(topic, node).to_string(),
        })
    }

    /// Parse one entry line from a node's menu.
    ///
    /// Accepts `* Node::`, `* Title: (topic)Node.` and `* Title: Node.` (the node name may
    /// also end at a comma, a tab or the end of the line).
    pub fn parse_menu_entry(&self, line: &str) -> Option<MenuEntry> {
        if let Some(caps) = self.short_entry.captures(line) {
            let name = caps[1].trim().to_string();
            return Some(MenuEntry {
                title: name.clone(),
                topic: None,
                node: name,
            });
        }

        if let Some(caps) = self.subject.captures(line) {
            let node = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
            let url = InfoUrl::new(caps[2].trim(), Some(node));
            return Some(MenuEntry {
                title: caps[1].trim().to_string(),
                node: url.node_or_top().to_string(),
                topic: Some(url.topic),
            });
        }

        if let Some(caps) = self.long_entry.captures(line) {
            let node = caps[2].trim();
            if !node.is_empty() {
                return Some(MenuEntry {
                    title: caps[1].trim().to_string(),
                    topic: None,
                    node: node.to_string(),
                });
            }
        }

        debug!(line, "skipping unrecognized menu line");
        None
    }
}

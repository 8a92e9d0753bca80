//! Access to formatted Info node pages.
//!
//! Formatting a node (resolving tag tables, split files, compression) is left to an
//! external formatter; the hierarchy extractor only sees the resulting page text.

use std::collections::HashMap;
use std::ffi::OsString;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The manual or the node inside it does not exist or cannot be read.
    #[error("info node ({topic}){node} is unavailable")]
    NotFound { topic: String, node: String },
    /// The formatter could not be run at all.
    #[error("failed to run info formatter {program:?}")]
    Formatter {
        program: OsString,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies the formatted text of one node.
///
/// Implementations are shared between concurrently running extraction jobs.
pub trait NodeSource: Send + Sync {
    fn page(&self, topic: &str, node: &str) -> Result<String, SourceError>;
}

/// Formats nodes by running the GNU `info` program.
#[derive(Debug, Clone)]
pub struct InfoProgram {
    program: OsString,
}

impl InfoProgram {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for InfoProgram {
    fn default() -> Self {
        Self::new("info")
    }
}

impl NodeSource for InfoProgram {
    fn page(&self, topic: &str, node: &str) -> Result<String, SourceError> {
        debug!(topic, node, "formatting info node");
        let output = Command::new(&self.program)
            .arg("--file")
            .arg(topic)
            .arg("--node")
            .arg(node)
            .args(["--output", "-"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| SourceError::Formatter {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(SourceError::NotFound {
                topic: topic.to_string(),
                node: node.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Serves pages from memory, keyed by `(topic, node)`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: HashMap<(String, String), String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, topic: &str, node: &str, text: &str) -> Self {
        self.insert(topic, node, text);
        self
    }

    pub fn insert(&mut self, topic: &str, node: &str, text: &str) {
        self.pages
            .insert((topic.to_string(), node.to_string()), text.to_string());
    }
}

impl NodeSource for MemorySource {
    fn page(&self, topic: &str, node: &str) -> Result<String, SourceError> {
        self.pages
            .get(&(topic.to_string(), node.to_string()))
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                topic: topic.to_string(),
                node: node.to_string(),
            })
    }
}

//! Extraction of a manual's node hierarchy by following `* Menu:` entries.
//!
//! A [`HierarchyMaker`] runs one extraction off the caller's thread and reports the
//! outcome exactly once through a channel. Dropping the maker cancels it: the
//! liveness flag is checked before every page fetch, and a cancelled job never reports.
//!
//! Page fetching runs on a worker thread per job, but nothing else does. The channel is
//! only drained by its owner ([`HierarchyRegistry::poll`](super::HierarchyRegistry::poll)),
//! so completion handlers and every tree mutation stay on the owner's thread.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use thiserror::Error;
use tracing::{debug, warn};

use super::line::{LineParser, MenuEntry};
use super::node::{InfoNode, TOP_NODE};
use super::source::{NodeSource, SourceError};

/// Outcome code reported to the navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    Ok,
    FileUnavailable,
    NoHierarchy,
    Unknown,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Ok => "ok",
            ErrorCode::FileUnavailable => "file unavailable",
            ErrorCode::NoHierarchy => "no hierarchy",
            ErrorCode::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("info node ({topic}){node} is unavailable")]
    FileUnavailable { topic: String, node: String },
    #[error("info node ({topic}){node} has no menu")]
    NoHierarchy { topic: String, node: String },
    #[error("hierarchy extraction was cancelled")]
    Cancelled,
    #[error("{0}")]
    Unknown(String),
}

impl HierarchyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            HierarchyError::FileUnavailable { .. } => ErrorCode::FileUnavailable,
            HierarchyError::NoHierarchy { .. } => ErrorCode::NoHierarchy,
            HierarchyError::Cancelled | HierarchyError::Unknown(_) => ErrorCode::Unknown,
        }
    }
}

impl From<SourceError> for HierarchyError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound { topic, node } => HierarchyError::FileUnavailable { topic, node },
            other => HierarchyError::Unknown(other.to_string()),
        }
    }
}

/// Code for a finished extraction, `Ok` on success.
pub fn result_code(result: &Result<InfoNode, HierarchyError>) -> ErrorCode {
    match result {
        Ok(_) => ErrorCode::Ok,
        Err(err) => err.code(),
    }
}

/// Lifecycle of one extraction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Message sent when a job finishes.
#[derive(Debug)]
pub struct Completion<K> {
    pub key: K,
    pub result: Result<InfoNode, HierarchyError>,
}

/// Extract the hierarchy below `(topic)start` synchronously.
///
/// An empty `start` means the manual's `Top` node. Nodes already visited during this
/// call are skipped, so cyclic menus terminate. Entries pointing into another manual are
/// kept as leaves.
pub fn extract_hierarchy(
    source: &dyn NodeSource,
    parser: &LineParser,
    topic: &str,
    start: &str,
    cancel: &AtomicBool,
) -> Result<InfoNode, HierarchyError> {
    let start = if start.is_empty() { TOP_NODE } else { start };
    let mut traversal = Traversal {
        source,
        parser,
        cancel,
        visited: HashSet::new(),
    };

    let mut root = InfoNode::new(topic, start, "");
    traversal
        .visited
        .insert((topic.to_string(), start.to_string()));

    let entries = traversal
        .fetch_menu(topic, start)?
        .ok_or_else(|| HierarchyError::NoHierarchy {
            topic: topic.to_string(),
            node: start.to_string(),
        })?;
    traversal.expand(&mut root, entries)?;

    Ok(root)
}

/// Menu entries of a formatted page, or `None` when the page has no menu.
pub fn menu_entries(parser: &LineParser, page: &str) -> Option<Vec<MenuEntry>> {
    let mut lines = page.lines().skip_while(|line| !line.starts_with("* Menu:"));
    lines.next()?;

    Some(
        lines
            .take_while(|line| !line.starts_with('\x1f'))
            .filter(|line| line.starts_with("* "))
            .filter_map(|line| parser.parse_menu_entry(line))
            .collect(),
    )
}

struct Traversal<'a> {
    source: &'a dyn NodeSource,
    parser: &'a LineParser,
    cancel: &'a AtomicBool,
    visited: HashSet<(String, String)>,
}

impl Traversal<'_> {
    fn fetch_menu(&self, topic: &str, node: &str) -> Result<Option<Vec<MenuEntry>>, HierarchyError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(HierarchyError::Cancelled);
        }
        let page = self.source.page(topic, node)?;
        Ok(menu_entries(self.parser, &page))
    }

    fn expand(&mut self, parent: &mut InfoNode, entries: Vec<MenuEntry>) -> Result<(), HierarchyError> {
        for entry in entries {
            if let Some(other) = entry.topic.filter(|t| *t != parent.topic) {
                parent
                    .children
                    .push(InfoNode::new(other, entry.node, entry.title));
                continue;
            }

            if !self
                .visited
                .insert((parent.topic.clone(), entry.node.clone()))
            {
                debug!(topic = %parent.topic, node = %entry.node, "skipping already visited node");
                continue;
            }

            let mut child = InfoNode::new(parent.topic.clone(), entry.node, entry.title);
            if let Some(grandchildren) = self.fetch_menu(&child.topic, &child.name)? {
                self.expand(&mut child, grandchildren)?;
            }
            parent.children.push(child);
        }
        Ok(())
    }
}

/// One asynchronous extraction of `(topic)start_node`.
#[derive(Debug)]
pub struct HierarchyMaker {
    topic: String,
    start_node: String,
    state: Arc<Mutex<JobState>>,
    cancelled: Arc<AtomicBool>,
}

impl HierarchyMaker {
    /// A pending job for `topic`; an empty `start_node` means the `Top` node.
    pub fn new(topic: impl Into<String>, start_node: impl Into<String>) -> Self {
        let start_node = start_node.into();
        Self {
            topic: topic.into(),
            start_node: if start_node.is_empty() {
                TOP_NODE.to_string()
            } else {
                start_node
            },
            state: Arc::new(Mutex::new(JobState::Pending)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn start_node(&self) -> &str {
        &self.start_node
    }

    /// Start the extraction and return immediately.
    ///
    /// The outcome is sent once on `sender`, tagged with `key`. A maker only runs once;
    /// later calls are ignored.
    pub fn create_hierarchy<K: Send + 'static>(
        &mut self,
        key: K,
        source: Arc<dyn NodeSource>,
        parser: LineParser,
        sender: Sender<Completion<K>>,
    ) {
        if self.state() != JobState::Pending {
            warn!(topic = %self.topic, start = %self.start_node, "hierarchy maker already started");
            return;
        }
        set_state(&self.state, JobState::Running);

        let state = Arc::clone(&self.state);
        let cancelled = Arc::clone(&self.cancelled);
        let topic = self.topic.clone();
        let start = self.start_node.clone();

        // Shared so a failed spawn can still report under this key
        let key_slot = Arc::new(Mutex::new(Some(key)));
        let worker_key = Arc::clone(&key_slot);
        let fallback_sender = sender.clone();

        let spawned = thread::Builder::new()
            .name(format!("info-hierarchy-{topic}"))
            .spawn(move || {
                let result = extract_hierarchy(source.as_ref(), &parser, &topic, &start, &cancelled);
                if cancelled.load(Ordering::Relaxed) {
                    set_state(&state, JobState::Failed);
                    return;
                }

                let finished = if result.is_ok() {
                    JobState::Completed
                } else {
                    JobState::Failed
                };
                let key = worker_key
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(key) = key {
                    // The receiver is gone when the registry was torn down
                    let _ = sender.send(Completion { key, result });
                }
                set_state(&state, finished);
            });

        if let Err(err) = spawned {
            warn!(topic = %self.topic, "failed to spawn hierarchy worker: {err}");
            let key = key_slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(key) = key {
                let _ = fallback_sender.send(Completion {
                    key,
                    result: Err(HierarchyError::Unknown(err.to_string())),
                });
            }
            set_state(&self.state, JobState::Failed);
        }
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the job has not yet delivered its outcome.
    pub fn is_working(&self) -> bool {
        matches!(self.state(), JobState::Pending | JobState::Running)
    }

    /// Ask a running job to stop at its next step. It will not report.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Drop for HierarchyMaker {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn set_state(state: &Mutex<JobState>, next: JobState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::source::MemorySource;
    use std::sync::mpsc;
    use std::time::Duration;

    const TOP: &str = "File: sample.info,  Node: Top,  Next: Intro,  Up: (dir)

Sample manual
*************

* Menu:

* Intro::                 Getting started.
* Usage: Using Sample.    How to use it.
* Editing: (readline)Command Line Editing.

Appendices
* Index::
";

    const INTRO: &str = "File: sample.info,  Node: Intro,  Next: Using Sample,  Up: Top

Introduction
============

* Menu:

* Installing::
";

    fn sample_source() -> MemorySource {
        MemorySource::new()
            .with_page("sample", "Top", TOP)
            .with_page("sample", "Intro", INTRO)
            .with_page("sample", "Installing", "No menu here.\n")
            .with_page("sample", "Using Sample", "Plain text.\n")
            .with_page("sample", "Index", "Index page.\n")
    }

    fn extract(source: &MemorySource, topic: &str, start: &str) -> Result<InfoNode, HierarchyError> {
        extract_hierarchy(source, &LineParser::new(), topic, start, &AtomicBool::new(false))
    }

    #[test]
    fn test_extracts_children_in_menu_order() {
        let root = extract(&sample_source(), "sample", "").unwrap();

        assert_eq!(root.name, "Top");
        assert_eq!(root.topic, "sample");
        let names: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Intro", "Using Sample", "Command Line Editing", "Index"]
        );

        assert_eq!(root.children[0].children.len(), 1);
        assert_eq!(root.children[0].children[0].name, "Installing");
        assert_eq!(root.children[1].title, "Usage");

        // Cross-manual reference is a leaf carrying its own topic
        let editing = &root.children[2];
        assert_eq!(editing.topic, "readline");
        assert!(editing.children.is_empty());

        assert!(root.children.iter().all(|c| !c.topic.is_empty()));
    }

    #[test]
    fn test_self_reference_terminates() {
        let source = MemorySource::new()
            .with_page("loop", "Top", "* Menu:\n* Top::\n* A::\n")
            .with_page("loop", "A", "* Menu:\n* A::\n* B::\n")
            .with_page("loop", "B", "* Menu:\n* Top::\n* A::\n");

        let root = extract(&source, "loop", "Top").unwrap();
        assert_eq!(root.count(), 3);
        assert_eq!(root.children[0].name, "A");
        assert_eq!(root.children[0].children[0].name, "B");
        assert!(root.children[0].children[0].children.is_empty());
    }

    #[test]
    fn test_missing_start_node() {
        let err = extract(&sample_source(), "sample", "Nowhere").unwrap_err();
        assert_eq!(err.code(), ErrorCode::FileUnavailable);
    }

    #[test]
    fn test_missing_child_node() {
        let source = MemorySource::new().with_page("broken", "Top", "* Menu:\n* Gone::\n");
        let err = extract(&source, "broken", "Top").unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::FileUnavailable { ref node, .. } if node == "Gone"
        ));
    }

    #[test]
    fn test_start_node_without_menu() {
        let err = extract(&sample_source(), "sample", "Index").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoHierarchy);
    }

    #[test]
    fn test_empty_menu_is_ok() {
        let source = MemorySource::new().with_page("flat", "Top", "* Menu:\n\nNothing listed.\n");
        let root = extract(&source, "flat", "Top").unwrap();
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_menu_ends_at_node_separator() {
        let page = "* Menu:\n* One::\n\x1f\nFile: x,  Node: Other\n* Menu:\n* Two::\n";
        let entries = menu_entries(&LineParser::new(), page).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].node, "One");
        assert!(menu_entries(&LineParser::new(), "no menu").is_none());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = AtomicBool::new(true);
        let err = extract_hierarchy(&sample_source(), &LineParser::new(), "sample", "Top", &cancel)
            .unwrap_err();
        assert!(matches!(err, HierarchyError::Cancelled));
    }

    #[test]
    fn test_maker_reports_once() {
        let (tx, rx) = mpsc::channel();
        let mut maker = HierarchyMaker::new("sample", "");
        assert_eq!(maker.state(), JobState::Pending);
        assert_eq!(maker.topic(), "sample");
        assert_eq!(maker.start_node(), "Top");

        maker.create_hierarchy(7u32, Arc::new(sample_source()), LineParser::new(), tx);
        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.key, 7);
        assert_eq!(result_code(&completion.result), ErrorCode::Ok);

        // The worker flips the state right after sending
        for _ in 0..500 {
            if !maker.is_working() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(maker.state(), JobState::Completed);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_maker_reports_failure() {
        let (tx, rx) = mpsc::channel();
        let mut maker = HierarchyMaker::new("absent", "");
        maker.create_hierarchy("k", Arc::new(MemorySource::new()), LineParser::new(), tx);

        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result_code(&completion.result), ErrorCode::FileUnavailable);
    }
}

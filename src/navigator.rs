//! The navigator's content tree.
//!
//! Holds the "Browse info pages" branch: dir sections, their subjects and, once a subject
//! is expanded, the node hierarchy extracted for it. Display state (icons, open/closed)
//! belongs to whatever front end draws the tree; this module only tracks labels, URLs and
//! whether an item can still be expanded.

use indextree::{Arena, NodeId};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::info::{
    DirEvent, DirWatcher, ErrorCode, HierarchyError, HierarchyRegistry, InfoDirEntry,
    InfoDirSection, InfoNode, InfoUrl, LineParser, NodeSource, build_sections, load_sections,
};

/// Label of the branch holding the info pages.
pub const INFO_ROOT_LABEL: &str = "Browse info pages";

/// Section holding subjects added with [`Navigator::add_subject`].
pub const OTHER_SECTION_LABEL: &str = "Other";

/// Title of the message shown when a subject cannot be expanded.
pub const HIERARCHY_ERROR_TITLE: &str = "Cannot create hierarchy of info nodes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemKind {
    InfoRoot,
    Section,
    Subject,
    Node,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavItem {
    pub name: String,
    pub url: Option<String>,
    pub kind: ItemKind,
    pub expandable: bool,
}

impl NavItem {
    fn new(name: impl Into<String>, url: Option<String>, kind: ItemKind) -> Self {
        Self {
            name: name.into(),
            url,
            kind,
            expandable: false,
        }
    }
}

/// Serializable copy of a navigator subtree.
#[derive(Debug, Clone, Serialize)]
pub struct NavSnapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub kind: ItemKind,
    pub expandable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavSnapshot>,
}

/// A failed expansion, to be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub title: String,
    pub text: String,
}

pub struct Navigator {
    arena: Arena<NavItem>,
    info_root: NodeId,
    parser: LineParser,
    registry: HierarchyRegistry<NodeId>,
    messages: Vec<UserMessage>,
}

impl Navigator {
    pub fn new(source: Arc<dyn NodeSource>, sweep_interval: Duration) -> Self {
        let mut arena = Arena::new();
        let info_root = arena.new_node(NavItem::new(
            INFO_ROOT_LABEL,
            Some("info:/dir".to_string()),
            ItemKind::InfoRoot,
        ));

        Self {
            arena,
            info_root,
            parser: LineParser::new(),
            registry: HierarchyRegistry::new(source).with_sweep_interval(sweep_interval),
            messages: Vec::new(),
        }
    }

    pub fn info_root(&self) -> NodeId {
        self.info_root
    }

    pub fn item(&self, id: NodeId) -> Option<&NavItem> {
        self.arena
            .get(id)
            .filter(|node| !node.is_removed())
            .map(|node| node.get())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        id.children(&self.arena).collect()
    }

    pub fn registry(&self) -> &HierarchyRegistry<NodeId> {
        &self.registry
    }

    /// Read the `dir` file from `search_dirs` and fill the info branch.
    pub fn load_info_dir<P: AsRef<Path>>(&mut self, search_dirs: &[P]) {
        let sections = load_sections(&self.parser, search_dirs);
        self.clear_info_branch();
        self.build_info_subtree(&sections);
    }

    /// Replace the info branch with the sections of freshly read `dir` text.
    ///
    /// Extractions still running for the old items are abandoned.
    pub fn reload_info_dir(&mut self, text: &str) {
        let sections = build_sections(&self.parser, text);
        self.clear_info_branch();
        self.build_info_subtree(&sections);
    }

    /// Rebuild the info branch when `watcher` reports a settled change to the `dir` file.
    ///
    /// A removed `dir` file empties the branch. Returns `true` when the branch was rebuilt.
    pub fn sync_info_dir(&mut self, watcher: &mut DirWatcher, now: Instant) -> bool {
        match watcher.poll(now) {
            Some(DirEvent::Changed { path, text }) => {
                debug!(path = %path.display(), "reloading info directory");
                self.reload_info_dir(&text);
                true
            }
            Some(DirEvent::Removed) => {
                warn!("info directory (dir) file was removed");
                self.clear_info_branch();
                true
            }
            None => false,
        }
    }

    /// Append sections and their subjects under the info root.
    pub fn build_info_subtree(&mut self, sections: &[InfoDirSection]) {
        for section in sections {
            let section_id = self
                .arena
                .new_node(NavItem::new(&section.heading, None, ItemKind::Section));
            self.info_root.append(section_id, &mut self.arena);

            for entry in &section.entries {
                let mut item = NavItem::new(&entry.title, Some(entry.url.clone()), ItemKind::Subject);
                item.expandable = true;
                let subject_id = self.arena.new_node(item);
                section_id.append(subject_id, &mut self.arena);
            }
        }
        debug!(sections = sections.len(), "built info subtree");
    }

    /// The sections and subjects currently under the info root.
    pub fn sections(&self) -> Vec<InfoDirSection> {
        self.info_root
            .children(&self.arena)
            .filter_map(|section_id| {
                let heading = self.item(section_id)?.name.clone();
                let entries = section_id
                    .children(&self.arena)
                    .filter_map(|id| self.item(id))
                    .map(|item| InfoDirEntry {
                        title: item.name.clone(),
                        url: item.url.clone().unwrap_or_default(),
                    })
                    .collect();
                Some(InfoDirSection { heading, entries })
            })
            .collect()
    }

    /// Find a subject whose label matches `query`, ignoring case.
    pub fn find_subject(&self, query: &str) -> Option<NodeId> {
        self.info_root.descendants(&self.arena).find(|&id| {
            self.item(id).is_some_and(|item| {
                item.kind == ItemKind::Subject && item.name.eq_ignore_ascii_case(query)
            })
        })
    }

    /// Add a subject that the dir file does not list, under a catch-all section.
    pub fn add_subject(&mut self, title: &str, url: &InfoUrl) -> NodeId {
        let existing = self
            .info_root
            .children(&self.arena)
            .find(|&id| {
                let item = self.arena[id].get();
                item.kind == ItemKind::Section && item.name == OTHER_SECTION_LABEL
            });
        let section_id = match existing {
            Some(id) => id,
            None => {
                let id = self
                    .arena
                    .new_node(NavItem::new(OTHER_SECTION_LABEL, None, ItemKind::Section));
                self.info_root.append(id, &mut self.arena);
                id
            }
        };

        let mut item = NavItem::new(title, Some(url.to_string()), ItemKind::Subject);
        item.expandable = true;
        let id = self.arena.new_node(item);
        section_id.append(id, &mut self.arena);
        id
    }

    /// Handle the user opening `id`.
    ///
    /// Only unexpanded subjects start an extraction. Returns `true` when a job was
    /// created for the item.
    pub fn on_expansion_requested(&mut self, id: NodeId) -> bool {
        let Some(item) = self.item(id) else {
            return false;
        };
        if item.kind != ItemKind::Subject || !item.expandable || id.children(&self.arena).next().is_some() {
            return false;
        }

        let under_info_root = id
            .ancestors(&self.arena)
            .nth(2)
            .is_some_and(|ancestor| ancestor == self.info_root);
        if !under_info_root {
            return false;
        }

        let url = item.url.clone().unwrap_or_default();
        let Some(parsed) = InfoUrl::parse(&url) else {
            warn!(url, "could not parse info URL");
            self.arena[id].get_mut().expandable = false;
            return false;
        };

        debug!(topic = %parsed.topic, node = ?parsed.node, "subject expansion requested");
        self.registry
            .ensure_job(id, &parsed.topic, parsed.node_or_top())
    }

    /// Reclaim finished jobs when due, then apply finished extractions.
    ///
    /// A job only stops working after its outcome is queued, so everything swept here is
    /// delivered by the poll that follows. Returns the number of completions received.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.registry.tick(now);

        let mut finished = Vec::new();
        self.registry.poll(|key, result| finished.push((key, result)));

        let received = finished.len();
        for (key, result) in finished {
            self.on_hierarchy_created(key, result);
        }
        received
    }

    /// Drop all extraction jobs immediately.
    pub fn teardown(&mut self) {
        self.registry.teardown();
    }

    /// URL to open when `id` is selected, if it has one.
    pub fn select(&self, id: NodeId) -> Option<&str> {
        self.item(id)
            .and_then(|item| item.url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Messages queued since the last call.
    pub fn take_messages(&mut self) -> Vec<UserMessage> {
        std::mem::take(&mut self.messages)
    }

    pub fn snapshot(&self, id: NodeId) -> Option<NavSnapshot> {
        let item = self.item(id)?;
        Some(NavSnapshot {
            name: item.name.clone(),
            url: item.url.clone(),
            kind: item.kind,
            expandable: item.expandable,
            children: id
                .children(&self.arena)
                .filter_map(|child| self.snapshot(child))
                .collect(),
        })
    }

    /// Render the subtree at `id` with box-drawing characters.
    pub fn render_box_tree(&self, id: NodeId, prefix: &str, is_last: bool) -> String {
        let Some(item) = self.item(id) else {
            return String::new();
        };

        let mut out = format!("{}{}{}\n", prefix, if is_last { "└── " } else { "├── " }, item.name);
        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        let children = self.children(id);
        for (i, child) in children.iter().enumerate() {
            out.push_str(&self.render_box_tree(*child, &child_prefix, i == children.len() - 1));
        }
        out
    }

    fn on_hierarchy_created(&mut self, key: NodeId, result: Result<InfoNode, HierarchyError>) {
        if key.is_removed(&self.arena) {
            debug!(?key, "ignoring hierarchy for a removed item");
            return;
        }
        if !self.arena[key].get().expandable || key.children(&self.arena).next().is_some() {
            debug!(?key, "ignoring hierarchy for an item that was already expanded");
            return;
        }

        match result {
            Ok(root) if root.children.is_empty() => {
                self.arena[key].get_mut().expandable = false;
            }
            Ok(root) => self.add_children(key, &root),
            Err(err) => {
                let name = self.arena[key].get().name.clone();
                warn!(subject = %name, "cannot create info hierarchy: {err}");
                self.messages.push(UserMessage {
                    title: HIERARCHY_ERROR_TITLE.to_string(),
                    text: error_message(err.code(), &name),
                });
                self.arena[key].get_mut().expandable = false;
            }
        }
    }

    fn add_children(&mut self, parent: NodeId, node: &InfoNode) {
        for child in &node.children {
            let mut item = NavItem::new(child.label(), Some(child.url().to_string()), ItemKind::Node);
            item.expandable = !child.children.is_empty();
            let id = self.arena.new_node(item);
            parent.append(id, &mut self.arena);

            self.add_children(id, child);
        }
    }

    fn clear_info_branch(&mut self) {
        self.registry.teardown();
        let children: Vec<_> = self.info_root.children(&self.arena).collect();
        for child in children {
            child.remove_subtree(&mut self.arena);
        }
    }
}

/// User-facing text for a failed expansion of `subject`.
pub fn error_message(code: ErrorCode, subject: &str) -> String {
    match code {
        ErrorCode::FileUnavailable => format!(
            "One or more files containing info nodes belonging to the subject '{subject}' do not exist."
        ),
        ErrorCode::NoHierarchy => format!(
            "Info nodes belonging to the subject '{subject}' do not seem to be ordered in a hierarchy."
        ),
        ErrorCode::Ok | ErrorCode::Unknown => format!(
            "An unknown error occurred while creating the hierarchy of info nodes belonging to the subject '{subject}'."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::MemorySource;
    use std::thread;

    const DIR: &str = "* Menu:

Shells
* Sample: (sample).            A sample manual.
* Flat: (flat)Top.             No hierarchy here.
* Broken: (broken).            Missing pages.
* Empty: (empty).              Menu without entries.
";

    fn navigator() -> Navigator {
        let source = MemorySource::new()
            .with_page("sample", "Top", "* Menu:\n* Intro::\n* Usage: Using Sample.\n")
            .with_page("sample", "Intro", "* Menu:\n* Installing::\n")
            .with_page("sample", "Installing", "leaf\n")
            .with_page("sample", "Using Sample", "leaf\n")
            .with_page("flat", "Top", "no menu\n")
            .with_page("empty", "Top", "* Menu:\n\n");
        let mut nav = Navigator::new(Arc::new(source), Duration::from_secs(30));
        nav.reload_info_dir(DIR);
        nav
    }

    fn run_until_applied(nav: &mut Navigator) {
        for _ in 0..500 {
            if nav.tick(Instant::now()) > 0 {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("extraction did not finish");
    }

    fn wait_until_idle(nav: &Navigator, id: NodeId) {
        for _ in 0..500 {
            if nav.registry().is_working(&id) != Some(true) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_builds_sections_and_subjects() {
        let nav = navigator();
        let sections = nav.children(nav.info_root());
        assert_eq!(sections.len(), 1);
        assert_eq!(nav.item(sections[0]).unwrap().name, "Shells");

        let subjects = nav.children(sections[0]);
        assert_eq!(subjects.len(), 4);
        let sample = nav.item(subjects[0]).unwrap();
        assert_eq!(sample.kind, ItemKind::Subject);
        assert!(sample.expandable);
        assert_eq!(nav.select(subjects[0]), Some("info:/sample"));
        assert_eq!(nav.select(sections[0]), None);
    }

    #[test]
    fn test_expansion_populates_children() {
        let mut nav = navigator();
        let sample = nav.find_subject("sample").unwrap();

        assert!(nav.on_expansion_requested(sample));
        // Second request while the job is registered is ignored
        assert!(!nav.on_expansion_requested(sample));
        run_until_applied(&mut nav);

        let children = nav.children(sample);
        let labels: Vec<_> = children
            .iter()
            .map(|&id| nav.item(id).unwrap().name.clone())
            .collect();
        assert_eq!(labels, vec!["Intro", "Usage"]);
        assert_eq!(nav.select(children[1]), Some("info:/sample/Using Sample"));

        let installing = nav.children(children[0])[0];
        assert_eq!(nav.select(installing), Some("info:/sample/Installing"));
        assert!(nav.take_messages().is_empty());

        // Already has children: no new job
        assert!(!nav.on_expansion_requested(sample));
    }

    #[test]
    fn test_failed_expansion_reports_and_disables() {
        let mut nav = navigator();
        let flat = nav.find_subject("Flat").unwrap();
        assert!(nav.on_expansion_requested(flat));
        run_until_applied(&mut nav);

        assert!(!nav.item(flat).unwrap().expandable);
        let messages = nav.take_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].title, HIERARCHY_ERROR_TITLE);
        assert!(messages[0].text.contains("'Flat'"));
        assert!(messages[0].text.contains("hierarchy"));

        let broken = nav.find_subject("Broken").unwrap();
        assert!(nav.on_expansion_requested(broken));
        run_until_applied(&mut nav);
        assert!(nav.take_messages()[0].text.contains("do not exist"));
    }

    #[test]
    fn test_failed_subject_is_never_restarted() {
        let mut nav = navigator();
        let flat = nav.find_subject("Flat").unwrap();
        assert!(nav.on_expansion_requested(flat));
        run_until_applied(&mut nav);
        assert_eq!(nav.take_messages().len(), 1);

        wait_until_idle(&nav, flat);
        nav.registry.sweep();
        assert!(!nav.registry().contains(&flat));

        assert!(!nav.on_expansion_requested(flat));
        assert!(nav.registry().is_empty());
    }

    #[test]
    fn test_completion_applied_once_after_early_sweep() {
        let mut nav = navigator();
        let sample = nav.find_subject("sample").unwrap();
        assert!(nav.on_expansion_requested(sample));

        wait_until_idle(&nav, sample);
        // Reclaimed while its outcome is still queued
        assert_eq!(nav.registry.sweep(), 1);
        assert!(nav.on_expansion_requested(sample));

        let mut received = 0;
        for _ in 0..500 {
            received += nav.tick(Instant::now());
            if received >= 2 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(received, 2);

        let labels: Vec<_> = nav
            .children(sample)
            .iter()
            .map(|&id| nav.item(id).unwrap().name.clone())
            .collect();
        assert_eq!(labels, vec!["Intro", "Usage"]);
    }

    #[test]
    fn test_empty_hierarchy_disables_item() {
        let mut nav = navigator();
        let empty = nav.find_subject("Empty").unwrap();
        assert!(nav.on_expansion_requested(empty));
        run_until_applied(&mut nav);

        assert!(!nav.item(empty).unwrap().expandable);
        assert!(nav.children(empty).is_empty());
        assert!(nav.take_messages().is_empty());
    }

    #[test]
    fn test_only_subjects_expand() {
        let mut nav = navigator();
        let root = nav.info_root();
        let section = nav.children(root)[0];
        assert!(!nav.on_expansion_requested(root));
        assert!(!nav.on_expansion_requested(section));
    }

    #[test]
    fn test_unparsable_url_disables_item() {
        let mut nav = Navigator::new(Arc::new(MemorySource::new()), Duration::from_secs(30));
        nav.build_info_subtree(&[InfoDirSection {
            heading: "Odd".to_string(),
            entries: vec![InfoDirEntry {
                title: "Odd".to_string(),
                url: "man:/odd".to_string(),
            }],
        }]);

        let odd = nav.find_subject("odd").unwrap();
        assert!(!nav.on_expansion_requested(odd));
        assert!(!nav.item(odd).unwrap().expandable);
        assert!(nav.registry().is_empty());
    }

    #[test]
    fn test_reload_replaces_branch() {
        let mut nav = navigator();
        nav.reload_info_dir("* Menu:\n\nGames\n* Chess: (chess).\n");

        let sections = nav.children(nav.info_root());
        assert_eq!(sections.len(), 1);
        assert_eq!(nav.item(sections[0]).unwrap().name, "Games");
        assert!(nav.find_subject("Sample").is_none());
    }

    #[test]
    fn test_dir_watcher_drives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dir");
        std::fs::write(&path, DIR).unwrap();

        let mut nav = navigator();
        let mut watcher = DirWatcher::new(&[dir.path()])
            .unwrap()
            .with_settle(Duration::ZERO);
        let sample = nav.find_subject("sample").unwrap();
        assert!(nav.on_expansion_requested(sample));

        std::fs::write(&path, "* Menu:\n\nGames\n* Chess: (chess).\n").unwrap();
        let now = Instant::now();
        watcher.record(
            &notify::Event::new(notify::EventKind::Modify(notify::event::ModifyKind::Any))
                .add_path(path.clone()),
            now,
        );

        assert!(nav.sync_info_dir(&mut watcher, now));
        assert!(nav.find_subject("Sample").is_none());
        assert_eq!(
            nav.sections(),
            vec![InfoDirSection {
                heading: "Games".to_string(),
                entries: vec![InfoDirEntry {
                    title: "Chess".to_string(),
                    url: "info:/chess".to_string(),
                }],
            }]
        );
        // The job for the replaced subject was dropped with the old branch
        assert!(nav.registry().is_empty());
    }

    #[test]
    fn test_add_subject_and_snapshot() {
        let mut nav = Navigator::new(Arc::new(MemorySource::new()), Duration::from_secs(30));
        let id = nav.add_subject("sed", &InfoUrl::new("sed", None));
        assert_eq!(nav.select(id), Some("info:/sed"));

        let snapshot = nav.snapshot(nav.info_root()).unwrap();
        assert_eq!(snapshot.children[0].name, "Other");
        assert_eq!(snapshot.children[0].children[0].name, "sed");

        let rendered = nav.render_box_tree(nav.info_root(), "", true);
        assert_eq!(rendered, "└── Browse info pages\n    └── Other\n        └── sed\n");
    }

    #[test]
    fn test_error_messages_name_subject() {
        for code in [ErrorCode::FileUnavailable, ErrorCode::NoHierarchy, ErrorCode::Unknown] {
            assert!(error_message(code, "Bash").contains("'Bash'"));
        }
    }
}

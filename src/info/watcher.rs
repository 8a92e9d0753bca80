//! Live reload of the Info `dir` file.
//!
//! Installing or removing a manual rewrites `dir`, often by replacing it, and a `dir` can
//! appear in an earlier search directory than the one in use. The watcher therefore
//! observes the search directories themselves and, once a burst of changes has settled,
//! locates and reads the `dir` file again.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::dir::{DIR_FILE_NAME, DirError, find_dir_file, read_dir_file};

/// Quiet period after the first change of a burst before the file is re-read.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(250);

/// Outcome of re-locating the `dir` file after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEvent {
    /// The `dir` file at `path` now reads as `text`.
    Changed { path: PathBuf, text: String },
    /// No search directory holds a `dir` file anymore.
    Removed,
}

pub struct DirWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    search_dirs: Vec<PathBuf>,
    location: Option<PathBuf>,
    pending_since: Option<Instant>,
    settle: Duration,
}

impl DirWatcher {
    /// Watch every existing directory of `search_dirs`.
    pub fn new<P: AsRef<Path>>(search_dirs: &[P]) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;

        let search_dirs: Vec<PathBuf> = search_dirs.iter().map(|d| d.as_ref().to_path_buf()).collect();
        for dir in search_dirs.iter().filter(|d| d.is_dir()) {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            debug!(dir = %dir.display(), "watching info directory");
        }

        let location = find_dir_file(&search_dirs);
        Ok(Self {
            _watcher: watcher,
            events: rx,
            search_dirs,
            location,
            pending_since: None,
            settle: DEFAULT_SETTLE,
        })
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Path of the `dir` file currently in use.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Drain notifications and, once a change has settled, re-read the `dir` file.
    pub fn poll(&mut self, now: Instant) -> Option<DirEvent> {
        loop {
            match self.events.try_recv() {
                Ok(Ok(event)) => self.record(&event, now),
                Ok(Err(err)) => warn!("info directory watch error: {err}"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let since = self.pending_since?;
        if now.duration_since(since) < self.settle {
            return None;
        }
        self.pending_since = None;
        self.relocate()
    }

    pub(crate) fn record(&mut self, event: &Event, now: Instant) {
        if !self.concerns_dir_file(event) {
            return;
        }
        if self.pending_since.is_none() {
            debug!(kind = ?event.kind, "info directory file changed");
            self.pending_since = Some(now);
        }
    }

    fn concerns_dir_file(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        event.paths.iter().any(|path| {
            path.file_name().is_some_and(|name| name == DIR_FILE_NAME)
                && path
                    .parent()
                    .is_some_and(|parent| self.search_dirs.iter().any(|dir| dir == parent))
        })
    }

    fn relocate(&mut self) -> Option<DirEvent> {
        match read_dir_file(&self.search_dirs) {
            Ok((path, text)) => {
                if self.location.as_ref() != Some(&path) {
                    debug!(path = %path.display(), "info directory file moved");
                }
                self.location = Some(path.clone());
                Some(DirEvent::Changed { path, text })
            }
            Err(DirError::NotFound) => {
                self.location = None;
                Some(DirEvent::Removed)
            }
            Err(err) => {
                warn!("{err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::fs;

    fn event(kind: EventKind, path: PathBuf) -> Event {
        Event::new(kind).add_path(path)
    }

    #[test]
    fn test_locates_dir_file_on_start() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("dir"), "* Menu:\n").unwrap();

        let watcher = DirWatcher::new(&[first.path(), second.path()]).unwrap();
        assert_eq!(watcher.location(), Some(second.path().join("dir").as_path()));
    }

    #[test]
    fn test_change_reported_after_settling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dir");
        fs::write(&path, "* Menu:\n").unwrap();

        let mut watcher = DirWatcher::new(&[dir.path()])
            .unwrap()
            .with_settle(Duration::from_secs(1));
        fs::write(&path, "* Menu:\n\nGames\n* Chess: (chess).\n").unwrap();

        let start = Instant::now();
        watcher.record(&event(EventKind::Modify(ModifyKind::Any), path.clone()), start);
        assert_eq!(watcher.poll(start), None);

        match watcher.poll(start + Duration::from_secs(1)) {
            Some(DirEvent::Changed { path: changed, text }) => {
                assert_eq!(changed, path);
                assert!(text.contains("Chess"));
            }
            other => panic!("expected a change, got {other:?}"),
        }
    }

    #[test]
    fn test_earlier_directory_takes_over() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("dir"), "second").unwrap();

        let mut watcher = DirWatcher::new(&[first.path(), second.path()])
            .unwrap()
            .with_settle(Duration::ZERO);
        let replacement = first.path().join("dir");
        fs::write(&replacement, "first").unwrap();

        let now = Instant::now();
        watcher.record(&event(EventKind::Create(CreateKind::File), replacement.clone()), now);
        assert_eq!(
            watcher.poll(now),
            Some(DirEvent::Changed {
                path: replacement.clone(),
                text: "first".to_string(),
            })
        );
        assert_eq!(watcher.location(), Some(replacement.as_path()));
    }

    #[test]
    fn test_removal_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dir");
        fs::write(&path, "* Menu:\n").unwrap();

        let mut watcher = DirWatcher::new(&[dir.path()]).unwrap().with_settle(Duration::ZERO);
        fs::remove_file(&path).unwrap();

        let now = Instant::now();
        watcher.record(&event(EventKind::Remove(RemoveKind::File), path), now);
        assert_eq!(watcher.poll(now), Some(DirEvent::Removed));
        assert_eq!(watcher.location(), None);
    }

    #[test]
    fn test_unrelated_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DirWatcher::new(&[dir.path()]).unwrap().with_settle(Duration::ZERO);

        let now = Instant::now();
        watcher.record(
            &event(EventKind::Create(CreateKind::File), dir.path().join("bash.info.gz")),
            now,
        );
        assert_eq!(watcher.pending_since, None);
    }
}

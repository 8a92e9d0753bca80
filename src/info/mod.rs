//! GNU Info support: the `dir` file, node menus and hierarchy extraction.

pub mod dir;
pub mod hierarchy;
pub mod line;
pub mod node;
pub mod registry;
pub mod source;
pub mod watcher;

pub use dir::{DirError, build_sections, find_dir_file, load_sections, read_dir_file};
pub use hierarchy::{
    Completion, ErrorCode, HierarchyError, HierarchyMaker, JobState, extract_hierarchy,
};
pub use line::{LineParser, MenuEntry};
pub use node::{InfoDirEntry, InfoDirSection, InfoNode, InfoUrl, TOP_NODE};
pub use registry::{DEFAULT_SWEEP_INTERVAL, HierarchyRegistry};
pub use source::{InfoProgram, MemorySource, NodeSource, SourceError};
pub use watcher::{DirEvent, DirWatcher};

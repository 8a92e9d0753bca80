//! Info `dir` file discovery and section building.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::line::LineParser;
use super::node::InfoDirSection;

/// Name of the top-level Info directory file.
pub const DIR_FILE_NAME: &str = "dir";

/// Line that opens the directory body.
const MENU_MARKER: &str = "* Menu:";

#[derive(Debug, Error)]
pub enum DirError {
    #[error("info directory (dir) file not found")]
    NotFound,
    #[error("cannot open info directory (dir) file {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Return the first existing `dir` entry in `search_dirs`, in order.
///
/// Existence is all that is checked, so an unreadable entry still stops the search.
pub fn find_dir_file<P: AsRef<Path>>(search_dirs: &[P]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .map(|dir| dir.as_ref().join(DIR_FILE_NAME))
        .find(|candidate| candidate.exists())
}

/// Locate and read the `dir` file.
///
/// Only the first file found is considered; if it cannot be read the search does not
/// continue with later directories.
pub fn read_dir_file<P: AsRef<Path>>(search_dirs: &[P]) -> Result<(PathBuf, String), DirError> {
    let path = find_dir_file(search_dirs).ok_or(DirError::NotFound)?;
    debug!(path = %path.display(), "reading info directory file");

    match fs::read(&path) {
        // dir files are not always valid UTF-8 (older Latin-1 installs)
        Ok(bytes) => Ok((path, String::from_utf8_lossy(&bytes).into_owned())),
        Err(source) => Err(DirError::Unreadable { path, source }),
    }
}

/// Build the section list from the full text of a `dir` file.
///
/// Nothing before the `* Menu:` line is considered. Inside the body a line starting with
/// an ASCII letter or digit opens a section (closing the previous one), `* ` lines add
/// subjects to it and a blank line closes it once at least one subject line has been
/// seen. Sections where no subject line parsed are dropped.
pub fn build_sections(parser: &LineParser, text: &str) -> Vec<InfoDirSection> {
    let mut sections = Vec::new();
    let mut in_body = false;
    let mut current: Option<InfoDirSection> = None;
    let mut saw_subject_line = false;

    for line in text.lines() {
        if !in_body {
            in_body = line.trim_end() == MENU_MARKER;
            continue;
        }

        if starts_with_alnum(line) {
            push_section(&mut sections, current.take());
            current = Some(InfoDirSection {
                heading: line.trim_end().to_string(),
                entries: Vec::new(),
            });
            saw_subject_line = false;
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };
        if line.starts_with("* ") {
            saw_subject_line = true;
            if let Some(entry) = parser.parse_subject_line(line) {
                section.entries.push(entry);
            }
        } else if line.trim().is_empty() && saw_subject_line {
            push_section(&mut sections, current.take());
        }
    }
    push_section(&mut sections, current.take());

    sections
}

/// Read the `dir` file from `search_dirs` and build its sections.
///
/// A missing or unreadable file is not fatal: it is logged and an empty list returned.
pub fn load_sections<P: AsRef<Path>>(parser: &LineParser, search_dirs: &[P]) -> Vec<InfoDirSection> {
    match read_dir_file(search_dirs) {
        Ok((_, text)) => build_sections(parser, &text),
        Err(err) => {
            warn!("{err}");
            Vec::new()
        }
    }
}

fn push_section(sections: &mut Vec<InfoDirSection>, section: Option<InfoDirSection>) {
    match section {
        Some(section) if !section.entries.is_empty() => sections.push(section),
        Some(section) => debug!(heading = %section.heading, "dropping section without subjects"),
        None => {}
    }
}

fn starts_with_alnum(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
}

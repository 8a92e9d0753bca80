//! # helpnav
//!
//! The navigation and glossary core of a help-center browser.
//!
//! The centerpiece is GNU Info support: the top-level `dir` file is parsed into
//! sections of subjects, and when a subject is opened its node hierarchy is
//! extracted in the background by following the `* Menu:` entries of each page.
//! A [`Navigator`] ties both together into a browsable tree; the [`Glossary`]
//! model serves term definitions with cross-references.
//!
//! ## Example
//!
//! ```rust
//! use helpnav::info::{LineParser, build_sections};
//!
//! let dir = "* Menu:\n\nBasics\n* Introduction: (intro)Top.\n";
//! let sections = build_sections(&LineParser::new(), dir);
//!
//! assert_eq!(sections[0].heading, "Basics");
//! assert_eq!(sections[0].entries[0].url, "info:/intro/Top");
//! ```

/// Configuration module for persisting user preferences.
pub mod config;

/// Glossary parsing and indices.
pub mod glossary;

/// GNU Info directory parsing and node hierarchy extraction.
pub mod info;

/// Navigator tree model driving hierarchy extraction.
pub mod navigator;

// Re-export commonly used types for convenience
pub use config::Config;
pub use glossary::{Glossary, GlossaryEntry};
pub use info::{HierarchyRegistry, InfoDirSection, InfoNode};
pub use navigator::Navigator;

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "helpnav")]
#[command(version)]
#[command(about = "Browse GNU Info manuals and the help-center glossary")]
#[command(
    long_about = "helpnav - the navigation core of a help center.\n\n\
    Lists the subjects of the Info directory, expands a manual into its node\n\
    hierarchy and looks up glossary terms.\n\n\
    Examples:\n  \
    helpnav dir                    # List Info directory sections\n  \
    helpnav dir --watch            # Re-list whenever the dir file changes\n  \
    helpnav tree Bash              # Show the node hierarchy of a subject\n  \
    helpnav -o json tree coreutils # Same, as JSON\n  \
    helpnav glossary --entry gloss-ip"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format
    ///
    /// Controls how results are displayed:
    ///   plain - Human-readable text (default)
    ///   json  - JSON for scripting/parsing
    ///   tree  - Box-drawing tree structure
    #[arg(short = 'o', long = "output", default_value = "plain", global = true)]
    pub output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory to search for the Info `dir` file (repeatable, replaces the configured list)
    #[arg(long = "info-dir", value_name = "DIR", global = true)]
    pub info_dirs: Vec<PathBuf>,

    /// Program used to format Info nodes
    #[arg(long = "program", value_name = "PROGRAM", global = true)]
    pub program: Option<String>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// List the sections and subjects of the Info directory
    Dir {
        /// Keep running and print the directory again whenever it changes
        #[arg(long = "watch")]
        watch: bool,
    },

    /// Extract and print the node hierarchy of a subject
    ///
    /// SUBJECT is matched against the titles in the Info directory (case-insensitive).
    /// If no title matches it is used as a manual name directly.
    Tree {
        subject: String,

        /// Start from this node instead of the subject's own
        #[arg(long = "node", value_name = "NODE")]
        node: Option<String>,

        /// Give up after this many seconds
        #[arg(long = "timeout", value_name = "SECS", default_value_t = 60)]
        timeout: u64,
    },

    /// List glossary entries or show one of them
    Glossary {
        /// Glossary XML file (defaults to the configured path)
        #[arg(long = "file", value_name = "FILE")]
        file: Option<PathBuf>,

        /// Show the entry with this id
        #[arg(long = "entry", value_name = "ID")]
        entry: Option<String>,

        /// Group entries by initial instead of by topic
        #[arg(long = "alphabetical")]
        alphabetical: bool,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Plain,
    /// JSON output
    Json,
    /// Tree format with box-drawing
    Tree,
}

//! # helpnav
//!
//! Command-line host for the help-center navigator.
//!
//! ## Usage
//!
//! List the Info directory:
//! ```sh
//! helpnav dir
//! ```
//!
//! Show the node hierarchy of a manual:
//! ```sh
//! helpnav tree Bash
//! ```
//!
//! Look up a glossary term:
//! ```sh
//! helpnav glossary --file glossary.xml --entry gloss-ip
//! ```

mod cli;

use clap::Parser as ClapParser;
use cli::{Cli, Command, OutputFormat};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use helpnav::info::{DirWatcher, InfoDirSection, InfoProgram, InfoUrl, LineParser, load_sections};
use helpnav::navigator::NavSnapshot;
use helpnav::{Config, Glossary, Navigator};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;

/// How long the host event loop sleeps between ticks
const TICK: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();
    install_tracing(args.verbose)?;

    let mut config = Config::load();
    if !args.info_dirs.is_empty() {
        config.info.dirs = args.info_dirs.clone();
    }
    if let Some(ref program) = args.program {
        config.info.program = program.clone();
    }
    debug!(?config);

    match args.command {
        Command::Dir { watch } => run_dir(&config, &args.output, watch),
        Command::Tree {
            ref subject,
            ref node,
            timeout,
        } => run_tree(
            &config,
            &args.output,
            subject,
            node.as_deref(),
            Duration::from_secs(timeout),
        ),
        Command::Glossary {
            ref file,
            ref entry,
            alphabetical,
        } => run_glossary(
            &config,
            &args.output,
            file.clone(),
            entry.as_deref(),
            alphabetical,
        ),
    }
}

fn install_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init()
        .map_err(|err| eyre!(err))
        .wrap_err("Failed to initialize tracing subscriber")
}

fn run_dir(config: &Config, format: &OutputFormat, watch: bool) -> Result<()> {
    let parser = LineParser::new();
    let sections = load_sections(&parser, &config.info.dirs);
    print_sections(&sections, format)?;

    if !watch {
        return Ok(());
    }

    let mut watcher =
        DirWatcher::new(&config.info.dirs).wrap_err("Failed to watch the info directories")?;
    match watcher.location() {
        Some(path) => info!(path = %path.display(), "watching for changes"),
        None => info!("no dir file yet, watching for one to appear"),
    }

    let source = Arc::new(InfoProgram::new(&config.info.program));
    let mut nav = Navigator::new(source, config.info.sweep_interval());
    nav.load_info_dir(&config.info.dirs);

    loop {
        let now = Instant::now();
        if nav.sync_info_dir(&mut watcher, now) {
            println!();
            print_sections(&nav.sections(), format)?;
        }
        nav.tick(now);
        thread::sleep(TICK * 4);
    }
}

fn print_sections(sections: &[InfoDirSection], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Plain => {
            for section in sections {
                println!("{}", section.heading);
                for entry in &section.entries {
                    println!("  {}  {}", entry.title, entry.url);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(sections)?);
        }
        OutputFormat::Tree => {
            for (i, section) in sections.iter().enumerate() {
                let last_section = i == sections.len() - 1;
                println!("{}{}", if last_section { "└── " } else { "├── " }, section.heading);
                let prefix = if last_section { "    " } else { "│   " };
                for (j, entry) in section.entries.iter().enumerate() {
                    let connector = if j == section.entries.len() - 1 { "└── " } else { "├── " };
                    println!("{}{}{}", prefix, connector, entry.title);
                }
            }
        }
    }
    Ok(())
}

fn run_tree(
    config: &Config,
    format: &OutputFormat,
    subject: &str,
    node: Option<&str>,
    timeout: Duration,
) -> Result<()> {
    let source = Arc::new(InfoProgram::new(&config.info.program));
    let mut nav = Navigator::new(source, config.info.sweep_interval());
    nav.load_info_dir(&config.info.dirs);

    let listed = nav
        .find_subject(subject)
        .and_then(|id| nav.select(id).and_then(InfoUrl::parse).map(|url| (id, url)));
    let id = match (listed, node) {
        (Some((id, _)), None) => id,
        (Some((_, url)), Some(node)) => nav.add_subject(subject, &InfoUrl::new(&url.topic, Some(node))),
        (None, node) => nav.add_subject(subject, &InfoUrl::new(subject, node)),
    };

    if !nav.on_expansion_requested(id) {
        return Err(eyre!("'{}' cannot be expanded", subject));
    }

    // Drive the navigator the way a UI event loop would
    let deadline = Instant::now() + timeout;
    while nav.tick(Instant::now()) == 0 {
        if Instant::now() >= deadline {
            nav.teardown();
            return Err(eyre!("Timed out extracting the hierarchy of '{}'", subject));
        }
        thread::sleep(TICK);
    }

    let messages = nav.take_messages();
    if let Some(message) = messages.first() {
        nav.teardown();
        return Err(eyre!("{}: {}", message.title, message.text));
    }

    let snapshot = nav
        .snapshot(id)
        .ok_or_else(|| eyre!("Subject disappeared from the navigator"))?;
    match format {
        OutputFormat::Plain => print_snapshot(&snapshot, 0),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Tree => print!("{}", nav.render_box_tree(id, "", true)),
    }

    nav.teardown();
    Ok(())
}

fn print_snapshot(snapshot: &NavSnapshot, depth: usize) {
    println!("{}{}", "  ".repeat(depth), snapshot.name);
    for child in &snapshot.children {
        print_snapshot(child, depth + 1);
    }
}

fn run_glossary(
    config: &Config,
    format: &OutputFormat,
    file: Option<PathBuf>,
    entry: Option<&str>,
    alphabetical: bool,
) -> Result<()> {
    let path = file
        .or_else(|| config.glossary.path.clone())
        .ok_or_else(|| eyre!("No glossary file given and none configured"))?;
    let mut glossary = Glossary::load(&path)
        .wrap_err_with(|| format!("Failed to load glossary {}", path.display()))?;

    if let Some(id) = entry {
        let Some(selected) = glossary.select(id).cloned() else {
            return Err(eyre!("Glossary entry '{}' not found", id));
        };
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&selected)?),
            OutputFormat::Plain | OutputFormat::Tree => print!("{}", glossary.format_entry(&selected)),
        }
        return Ok(());
    }

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&glossary)?);
        return Ok(());
    }

    let groups: Vec<(String, Vec<String>)> = if alphabetical {
        glossary
            .alphabetical()
            .iter()
            .map(|(initial, ids)| (initial.clone(), ids.clone()))
            .collect()
    } else {
        glossary
            .by_topic()
            .iter()
            .map(|section| (section.title.clone(), section.entry_ids.clone()))
            .collect()
    };

    for (i, (heading, ids)) in groups.iter().enumerate() {
        let tree = matches!(format, OutputFormat::Tree);
        let last_group = i == groups.len() - 1;
        if tree {
            println!("{}{}", if last_group { "└── " } else { "├── " }, heading);
        } else {
            println!("{}", heading);
        }
        for (j, id) in ids.iter().enumerate() {
            let Some(entry) = glossary.entry(id) else {
                continue;
            };
            if tree {
                let prefix = if last_group { "    " } else { "│   " };
                let connector = if j == ids.len() - 1 { "└── " } else { "├── " };
                println!("{}{}{}", prefix, connector, entry.term);
            } else {
                println!("  {}  ({})", entry.term, entry.id);
            }
        }
    }
    Ok(())
}

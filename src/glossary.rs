//! Glossary viewer model.
//!
//! The glossary is read from the XML cache the docbook processor produces:
//!
//! ```xml
//! <glossary>
//!   <section title="Networking">
//!     <entry id="gloss-ip">
//!       <term>IP</term>
//!       <definition>Internet Protocol.</definition>
//!       <references><reference term="TCP" id="gloss-tcp"/></references>
//!     </entry>
//!   </section>
//! </glossary>
//! ```
//!
//! Entries are indexed both by topic (the sections, in file order) and alphabetically
//! (one bucket per upper-cased initial, in first-seen order).

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader as XmlReader;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GlossaryError {
    #[error("cannot read glossary file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse glossary xml")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute in glossary xml")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("glossary xml has no root element")]
    MissingRoot,
}

/// A "see also" link from one entry to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlossaryXRef {
    pub term: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlossaryEntry {
    pub id: String,
    pub term: String,
    pub definition: String,
    pub see_also: Vec<GlossaryXRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlossarySection {
    pub title: String,
    pub entry_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Glossary {
    entries: IndexMap<String, GlossaryEntry>,
    by_topic: Vec<GlossarySection>,
    alphabetical: IndexMap<String, Vec<String>>,
    #[serde(skip)]
    current: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Term,
    Definition,
}

#[derive(Debug, Default)]
struct PendingEntry {
    id: Option<String>,
    term: String,
    definition: String,
    see_also: Vec<GlossaryXRef>,
}

impl Glossary {
    pub fn load(path: &Path) -> Result<Self, GlossaryError> {
        let xml = std::fs::read_to_string(path)?;
        Self::parse(&xml)
    }

    pub fn parse(xml: &str) -> Result<Self, GlossaryError> {
        let mut reader = XmlReader::from_str(xml);
        reader.trim_text(true);

        let mut glossary = Glossary::default();
        let mut saw_root = false;
        let mut section: Option<GlossarySection> = None;
        let mut entry: Option<PendingEntry> = None;
        // Field being captured and the element depth it was opened at
        let mut capture: Option<(Field, usize)> = None;
        let mut depth = 0usize;

        loop {
            match reader.read_event()? {
                Event::Start(tag) => {
                    saw_root = true;
                    depth += 1;
                    match tag.local_name().as_ref() {
                        b"section" => {
                            section = Some(GlossarySection {
                                title: attribute(&tag, b"title")?.unwrap_or_default(),
                                entry_ids: Vec::new(),
                            });
                        }
                        b"entry" => {
                            entry = Some(PendingEntry {
                                id: attribute(&tag, b"id")?,
                                ..PendingEntry::default()
                            });
                        }
                        b"term" if entry.is_some() && capture.is_none() => {
                            capture = Some((Field::Term, depth));
                        }
                        b"definition" if entry.is_some() && capture.is_none() => {
                            capture = Some((Field::Definition, depth));
                        }
                        b"reference" => push_reference(&mut entry, &tag)?,
                        _ => {}
                    }
                }
                Event::Empty(tag) => {
                    saw_root = true;
                    if tag.local_name().as_ref() == b"reference" {
                        push_reference(&mut entry, &tag)?;
                    }
                }
                Event::Text(text) => {
                    if let (Some((field, _)), Some(pending)) = (capture, entry.as_mut()) {
                        append_text(pending, field, &text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let (Some((field, _)), Some(pending)) = (capture, entry.as_mut()) {
                        append_text(pending, field, &String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(tag) => {
                    if capture.is_some_and(|(_, at)| at == depth) {
                        capture = None;
                    }
                    depth = depth.saturating_sub(1);
                    match tag.local_name().as_ref() {
                        b"entry" => {
                            if let Some(pending) = entry.take() {
                                glossary.add_entry(pending, section.as_mut());
                            }
                        }
                        b"section" => {
                            if let Some(done) = section.take() {
                                glossary.by_topic.push(done);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(GlossaryError::MissingRoot);
        }
        Ok(glossary)
    }

    fn add_entry(&mut self, pending: PendingEntry, section: Option<&mut GlossarySection>) {
        let Some(id) = pending.id else {
            debug!(term = %pending.term, "skipping glossary entry without id");
            return;
        };

        let entry = GlossaryEntry {
            id: id.clone(),
            term: simplify(&pending.term),
            definition: simplify(&pending.definition),
            see_also: pending.see_also,
        };

        if let Some(section) = section {
            section.entry_ids.push(id.clone());
        }
        if let Some(initial) = entry.term.chars().next() {
            self.alphabetical
                .entry(initial.to_uppercase().collect())
                .or_default()
                .push(id.clone());
        }
        self.entries.insert(id, entry);
    }

    pub fn entry(&self, id: &str) -> Option<&GlossaryEntry> {
        self.entries.get(id)
    }

    /// All entries in file order.
    pub fn entries(&self) -> impl Iterator<Item = &GlossaryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_topic(&self) -> &[GlossarySection] {
        &self.by_topic
    }

    /// Entry ids grouped by the upper-cased first character of their term.
    pub fn alphabetical(&self) -> &IndexMap<String, Vec<String>> {
        &self.alphabetical
    }

    /// Make `id` the current entry. Unknown ids leave the selection untouched.
    pub fn select(&mut self, id: &str) -> Option<&GlossaryEntry> {
        if !self.entries.contains_key(id) {
            return None;
        }
        if self.current.as_deref() != Some(id) {
            self.current = Some(id.to_string());
        }
        self.entries.get(id)
    }

    pub fn current(&self) -> Option<&GlossaryEntry> {
        self.current.as_deref().and_then(|id| self.entries.get(id))
    }

    /// Cross-references of `entry`, each with its target when the glossary has it.
    pub fn see_also<'a>(
        &'a self,
        entry: &'a GlossaryEntry,
    ) -> impl Iterator<Item = (&'a GlossaryXRef, Option<&'a GlossaryEntry>)> + 'a {
        entry
            .see_also
            .iter()
            .map(move |xref| (xref, self.entries.get(&xref.id)))
    }

    /// Plain-text rendition of an entry.
    pub fn format_entry(&self, entry: &GlossaryEntry) -> String {
        let mut out = format!("{}\n\n{}\n", entry.term, entry.definition);
        if !entry.see_also.is_empty() {
            let terms: Vec<_> = entry.see_also.iter().map(|x| x.term.as_str()).collect();
            out.push_str(&format!("\nSee also: {}\n", terms.join(", ")));
        }
        out
    }
}

fn attribute(tag: &BytesStart, name: &[u8]) -> Result<Option<String>, GlossaryError> {
    for attr in tag.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn push_reference(entry: &mut Option<PendingEntry>, tag: &BytesStart) -> Result<(), GlossaryError> {
    let Some(pending) = entry.as_mut() else {
        return Ok(());
    };
    pending.see_also.push(GlossaryXRef {
        term: attribute(tag, b"term")?.unwrap_or_default(),
        id: attribute(tag, b"id")?.unwrap_or_default(),
    });
    Ok(())
}

fn append_text(entry: &mut PendingEntry, field: Field, text: &str) {
    let target = match field {
        Field::Term => &mut entry.term,
        Field::Definition => &mut entry.definition,
    };
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

fn simplify(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

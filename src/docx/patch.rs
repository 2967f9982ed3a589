use std::collections::HashMap;

use anyhow::Context;

use crate::docx::package::{DocxPackage, PRIMARY_CONTENT_ENTRY};

/// One literal substitution with an occurrence budget: only the first
/// `occurrences` matches are replaced, so occurrences belonging to skipped
/// slots (or never detected at all) survive verbatim.
#[derive(Clone, Debug)]
pub struct Replacement {
    pub find: String,
    pub replace: String,
    pub occurrences: usize,
}

/// Ordered, de-duplicated substitution list. Entries are held longest-key
/// first: when one key is a substring of another, applying the longer one
/// first guarantees the longer placeholder never survives partially
/// replaced, and makes the outcome deterministic.
#[derive(Clone, Debug, Default)]
pub struct ReplacementSet {
    entries: Vec<Replacement>,
}

impl ReplacementSet {
    pub fn new(mut entries: Vec<Replacement>) -> Self {
        // Stable sort: equal-length keys keep their insertion order.
        entries.sort_by(|a, b| b.find.len().cmp(&a.find.len()));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Replacement] {
        &self.entries
    }

    /// Apply every substitution to plain text, longest key first.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for entry in &self.entries {
            out = replace_first_n(&out, &entry.find, &entry.replace, entry.occurrences);
        }
        out
    }

    /// Apply to raw XML: both sides of each pair are XML-text-escaped so the
    /// key matches the serialized form and the filled value cannot break
    /// well-formedness.
    fn apply_xml(&self, xml: &str) -> String {
        let mut out = xml.to_string();
        for entry in &self.entries {
            out = replace_first_n(
                &out,
                &escape_xml_text(&entry.find),
                &escape_xml_text(&entry.replace),
                entry.occurrences,
            );
        }
        out
    }
}

/// Rewrite the original packaged bytes: substitutions are applied to the
/// primary content entry only; every other entry is copied verbatim. An
/// empty replacement set returns the input bytes unchanged, byte for byte.
pub fn patch_document(original: &[u8], set: &ReplacementSet) -> anyhow::Result<Vec<u8>> {
    if set.is_empty() {
        return Ok(original.to_vec());
    }

    let pkg = DocxPackage::read(original).context("reopen package")?;
    let entry = pkg.primary_content()?;
    let xml = std::str::from_utf8(&entry.data).context("decode primary entry as utf-8")?;

    let patched = set.apply_xml(xml);
    verify_well_formed(patched.as_bytes()).context("patched content is not well-formed XML")?;

    let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
    replacements.insert(PRIMARY_CONTENT_ENTRY.to_string(), patched.into_bytes());
    pkg.write_with_replacements(&replacements)
        .context("re-archive package")
}

fn replace_first_n(text: &str, find: &str, replace: &str, n: usize) -> String {
    if n == 0 || find.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut done = 0;
    while done < n {
        match rest.find(find) {
            Some(pos) => {
                out.push_str(&rest[..pos]);
                out.push_str(replace);
                rest = &rest[pos + find.len()..];
                done += 1;
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn escape_xml_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn verify_well_formed(xml: &[u8]) -> anyhow::Result<()> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).context("read xml event")? {
            Event::Eof => return Ok(()),
            // Attributes are parsed lazily; walk them so a substitution that
            // corrupted an attribute value is caught here.
            Event::Start(e) => {
                for attr in e.attributes() {
                    attr.context("attr")?;
                }
            }
            Event::Empty(e) => {
                for attr in e.attributes() {
                    attr.context("attr")?;
                }
            }
            _ => {}
        }
    }
}

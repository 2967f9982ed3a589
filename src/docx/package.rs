use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use anyhow::{anyhow, Context};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive member holding the document's textual body.
pub const PRIMARY_CONTENT_ENTRY: &str = "word/document.xml";

/// In-memory view of a DOCX zip container. Entry metadata (compression
/// method, mtime, unix mode) is retained so a rewrite preserves everything
/// the substitution did not touch.
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(bytes: &[u8]) -> anyhow::Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes)).context("read zip")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).context("read zip entry")?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn primary_content(&self) -> anyhow::Result<&DocxEntry> {
        self.entries
            .iter()
            .find(|e| e.name == PRIMARY_CONTENT_ENTRY)
            .ok_or_else(|| anyhow!("missing {PRIMARY_CONTENT_ENTRY}"))
    }

    /// Re-archive all entries, substituting entry data by name. Entries not
    /// in `replacements` are written back verbatim.
    pub fn write_with_replacements(
        &self,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> anyhow::Result<Vec<u8>> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for ent in &self.entries {
            let data = replacements
                .get(&ent.name)
                .cloned()
                .unwrap_or_else(|| ent.data.clone());
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(&ent.name, opts)
                    .with_context(|| format!("add zip dir: {}", ent.name))?;
            } else {
                zout.start_file(&ent.name, opts)
                    .with_context(|| format!("start zip file: {}", ent.name))?;
                zout.write_all(&data)
                    .with_context(|| format!("write zip file: {}", ent.name))?;
            }
        }
        let cursor = zout.finish().context("finish zip")?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::PRIMARY_CONTENT_ENTRY;

    /// Minimal DOCX container: one body entry plus an opaque payload entry.
    pub fn build_docx(document_xml: &str) -> Vec<u8> {
        build_docx_with_extra(document_xml, &[("word/styles.xml", b"<styles/>")])
    }

    pub fn build_docx_with_extra(document_xml: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        zout.start_file(PRIMARY_CONTENT_ENTRY, opts).unwrap();
        zout.write_all(document_xml.as_bytes()).unwrap();
        for (name, data) in extra {
            zout.start_file(*name, opts).unwrap();
            zout.write_all(data).unwrap();
        }
        zout.finish().unwrap().into_inner()
    }
}

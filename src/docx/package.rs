use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// The OOXML zip container, held entirely in memory. Requests arrive as
/// byte payloads and leave the same way; nothing touches the filesystem.
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
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes)).context("read docx zip")?;
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

    pub fn entry(&self, name: &str) -> Option<&DocxEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Re-emit the package, swapping in replacement bytes for the named
    /// entries. Every other entry is written back byte-identical, keeping
    /// compression, timestamps and permissions.
    pub fn to_bytes_with_replacements(
        &self,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> anyhow::Result<Vec<u8>> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for ent in &self.entries {
            let data = replacements.get(&ent.name).unwrap_or(&ent.data);
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
                zout.write_all(data)
                    .with_context(|| format!("write zip file: {}", ent.name))?;
            }
        }
        let cursor = zout.finish().context("finish zip")?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> Vec<u8> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zout.start_file("word/document.xml", opts).unwrap();
        zout.write_all(b"<w:document/>").unwrap();
        zout.start_file("word/styles.xml", opts).unwrap();
        zout.write_all(b"<w:styles/>").unwrap();
        zout.finish().unwrap().into_inner()
    }

    #[test]
    fn roundtrip_without_replacements_keeps_entries() {
        let bytes = sample_package();
        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        let out = pkg.to_bytes_with_replacements(&HashMap::new()).unwrap();
        let again = DocxPackage::from_bytes(&out).unwrap();
        assert_eq!(again.entries.len(), 2);
        assert_eq!(again.entry("word/styles.xml").unwrap().data, b"<w:styles/>");
    }

    #[test]
    fn replacement_swaps_only_named_entry() {
        let bytes = sample_package();
        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        let mut repl = HashMap::new();
        repl.insert("word/document.xml".to_string(), b"<w:document>x</w:document>".to_vec());
        let out = pkg.to_bytes_with_replacements(&repl).unwrap();
        let again = DocxPackage::from_bytes(&out).unwrap();
        assert_eq!(
            again.entry("word/document.xml").unwrap().data,
            b"<w:document>x</w:document>"
        );
        assert_eq!(again.entry("word/styles.xml").unwrap().data, b"<w:styles/>");
    }
}

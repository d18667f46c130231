use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::error::{Error, Result};
use crate::ClassFile;

/// In-memory, read-only view of a JAR (ZIP) archive.
///
/// Entries are stored as a `BTreeMap<String, Vec<u8>>` mapping entry paths to
/// raw bytes, so the archive handle does not need to outlive the read.
#[derive(Clone, Debug, Default)]
pub struct JarFile {
    entries: BTreeMap<String, Vec<u8>>,
}

impl JarFile {
    /// Read a JAR from any reader.
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut entries = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.insert(name, data);
        }

        Ok(JarFile { entries })
    }

    /// Read a JAR from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read(Cursor::new(bytes))
    }

    /// Read a JAR from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read(std::io::BufReader::new(file))
    }

    /// Iterate over `.class` entry paths only.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .map(|s| s.as_str())
            .filter(|n| n.ends_with(".class"))
    }

    /// Get the raw bytes of an entry.
    pub fn get_entry(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(|v| v.as_slice())
    }

    /// Parse the class with internal name `name` (no `.class` suffix).
    pub fn parse_class(&self, name: &str) -> Result<ClassFile> {
        let path = format!("{name}.class");
        let data = self
            .get_entry(&path)
            .ok_or_else(|| Error::Resolution(format!("class {name} not found in jar")))?;
        crate::parse_class_bytes(data)
    }
}

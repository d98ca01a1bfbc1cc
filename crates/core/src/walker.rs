use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn file(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            is_dir: false,
        }
    }

    pub fn has_extension(&self, suffix: &str) -> bool {
        !self.is_dir && self.name.ends_with(suffix)
    }
}

/// Every entry of a jar, in archive order
pub fn read_entries(path: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut archive = open_archive(path)?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let mut data = Vec::new();
        if !entry.is_dir() {
            entry
                .read_to_end(&mut data)
                .with_context(|| format!("failed to read {}", entry.name()))?;
        }

        entries.push(ArchiveEntry {
            name: entry.name().to_string(),
            data,
            is_dir: entry.is_dir(),
        });
    }

    info!("Read {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))
}

/// Class entries under `prefix`, e.g. `net/minecraft/`
pub fn read_class_entries(path: &Path, prefix: &str) -> Result<Vec<ArchiveEntry>> {
    let mut archive = open_archive(path)?;

    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = entry.name();
        if entry.is_dir() || !name.starts_with(prefix) || !class_harness::is_class_entry(name) {
            continue;
        }

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}", entry.name()))?;
        entries.push(ArchiveEntry::file(entry.name(), data));
    }

    debug!("Found {} class entries under {} in {}", entries.len(), prefix, path.display());
    Ok(entries)
}

/// Writes a jar, refusing to write the same entry name twice
pub struct ArchiveWriter {
    writer: ZipWriter<File>,
    written: FxHashSet<String>,
}

impl ArchiveWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Output {} will be overwritten", path.display());
        }

        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self {
            writer: ZipWriter::new(file),
            written: FxHashSet::default(),
        })
    }

    /// Whether an entry was written; duplicates are skipped
    pub fn add(&mut self, entry: &ArchiveEntry) -> Result<bool> {
        if !self.written.insert(entry.name.clone()) {
            debug!("Skipping duplicate entry {}", entry.name);
            return Ok(false);
        }

        let options = SimpleFileOptions::default();
        if entry.is_dir {
            self.writer
                .add_directory(entry.name.as_str(), options)
                .with_context(|| format!("failed to add {}", entry.name))?;
        } else {
            self.writer
                .start_file(entry.name.as_str(), options)
                .with_context(|| format!("failed to start {}", entry.name))?;
            self.writer
                .write_all(&entry.data)
                .with_context(|| format!("failed to write {}", entry.name))?;
        }
        Ok(true)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.written.contains(name)
    }

    pub fn finish(self) -> Result<usize> {
        let count = self.written.len();
        self.writer.finish().context("failed to finish jar")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_jar(path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
        let mut writer = ArchiveWriter::create(path)?;
        for entry in entries {
            writer.add(entry)?;
        }
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn test_round_trip_keeps_order_and_directories() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("mod.jar");
        let entries = vec![
            ArchiveEntry { name: "assets/".to_string(), data: Vec::new(), is_dir: true },
            ArchiveEntry::file("fabric.mod.json", b"{}".to_vec()),
            ArchiveEntry::file("com/example/Mod.class", vec![0xCA, 0xFE, 0xBA, 0xBE]),
        ];
        write_jar(&path, &entries)?;

        assert_eq!(read_entries(&path)?, entries);
        Ok(())
    }

    #[test]
    fn test_duplicate_entries_are_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("mod.jar");

        let mut writer = ArchiveWriter::create(&path)?;
        assert!(writer.add(&ArchiveEntry::file("a.txt", b"first".to_vec()))?);
        assert!(!writer.add(&ArchiveEntry::file("a.txt", b"second".to_vec()))?);
        assert!(writer.contains("a.txt"));
        assert_eq!(writer.finish()?, 1);

        let entries = read_entries(&path)?;
        assert_eq!(entries, vec![ArchiveEntry::file("a.txt", b"first".to_vec())]);
        Ok(())
    }

    #[test]
    fn test_class_entries_are_filtered_by_prefix() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("minecraft.jar");
        write_jar(
            &path,
            &[
                ArchiveEntry::file("net/minecraft/Entity.class", vec![1]),
                ArchiveEntry::file("net/minecraft/lang.json", vec![2]),
                ArchiveEntry::file("com/mojang/Util.class", vec![3]),
            ],
        )?;

        let classes = read_class_entries(&path, "net/minecraft/")?;
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "net/minecraft/Entity.class");
        Ok(())
    }

    #[test]
    fn test_missing_archive_has_path_in_error() {
        let error = read_entries(Path::new("/nonexistent/mod.jar")).unwrap_err();
        assert!(error.to_string().contains("/nonexistent/mod.jar"));
    }
}

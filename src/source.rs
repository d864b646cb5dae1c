//! Where report contents come from
//!
//! The rendering pipeline only sees strings. A [`ReportSource`] resolves the
//! paths named in the configuration into those strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub trait ReportSource {
    /// Content of `path`, or `None` when it is missing or empty
    fn read(&self, path: &str) -> Option<String>;
}

/// In-memory sources keyed by path
impl ReportSource for BTreeMap<String, String> {
    fn read(&self, path: &str) -> Option<String> {
        self.get(path).filter(|content| !content.is_empty()).cloned()
    }
}

/// Reads reports from disk, relative paths resolved against `base_dir`
#[derive(Debug, Clone)]
pub struct FsSource {
    base_dir: PathBuf,
}

impl FsSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl ReportSource for FsSource {
    fn read(&self, path: &str) -> Option<String> {
        let resolved = self.resolve(path);

        if !resolved.exists() {
            warn!("File '{}' doesn't exist", resolved.display());
            return None;
        }

        match fs::read_to_string(&resolved) {
            Ok(content) if content.is_empty() => {
                warn!("No content found in file '{}'", resolved.display());
                None
            }
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Failed to read '{}': {}", resolved.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_source_relative_and_absolute() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("coverage.txt");
        fs::write(&file, "content").unwrap();

        let source = FsSource::new(dir.path());
        assert_eq!(source.read("coverage.txt").as_deref(), Some("content"));
        assert_eq!(source.read(file.to_str().unwrap()).as_deref(), Some("content"));
    }

    #[test]
    fn test_fs_source_missing_or_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("empty.xml"), "").unwrap();

        let source = FsSource::new(dir.path());
        assert!(source.read("empty.xml").is_none());
        assert!(source.read("absent.xml").is_none());
    }

    #[test]
    fn test_map_source() {
        let mut files = BTreeMap::new();
        files.insert("a.txt".to_string(), "a".to_string());
        files.insert("b.txt".to_string(), String::new());

        assert_eq!(files.read("a.txt").as_deref(), Some("a"));
        assert!(files.read("b.txt").is_none());
        assert!(files.read("c.txt").is_none());
    }
}

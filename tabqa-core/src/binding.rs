//! File Binding
//!
//! Maps the file identifiers the model sees (and passes in tool arguments)
//! to local paths produced by the external download step. The binding is
//! read-only for the duration of a conversation; a replacement takes effect
//! at the next conversation seed.

use std::path::{Path, PathBuf};

/// An ordered file-identifier → local-path binding.
#[derive(Debug, Clone, Default)]
pub struct FileBinding {
    entries: Vec<(String, PathBuf)>,
}

impl FileBinding {
    /// Build a binding from local paths. The identifier for each file is its
    /// file name; falls back to the full path string when the path has no
    /// name component.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let entries = paths
            .into_iter()
            .map(|p| {
                let path: PathBuf = p.into();
                let id = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                (id, path)
            })
            .collect();
        Self { entries }
    }

    /// Bound identifiers, in binding order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Resolve an identifier to its local path.
    ///
    /// Accepts either the bare identifier or the full path string the model
    /// may echo back from an earlier tool result.
    pub fn resolve(&self, id: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(name, path)| name == id || path.to_string_lossy() == id)
            .map(|(_, path)| path.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_preserve_insertion_order() {
        let binding = FileBinding::from_paths(["/data/b.xlsx", "/data/a.csv"]);
        assert_eq!(binding.ids(), vec!["b.xlsx", "a.csv"]);
    }

    #[test]
    fn resolve_by_id_or_full_path() {
        let binding = FileBinding::from_paths(["/data/studies.csv"]);
        assert_eq!(
            binding.resolve("studies.csv").unwrap(),
            Path::new("/data/studies.csv")
        );
        assert_eq!(
            binding.resolve("/data/studies.csv").unwrap(),
            Path::new("/data/studies.csv")
        );
        assert!(binding.resolve("other.csv").is_none());
    }
}

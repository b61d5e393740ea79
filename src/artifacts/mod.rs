//! Artifact materialization for generated code and tests.
//!
//! Generated text lives in named slots: flat files under a workspace root
//! that the external tools (test runner, scanner) reference by path. Writes
//! overwrite; there is no versioning or locking because exactly one run is
//! active per workspace.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Slot name for the generated solution under test.
pub const CODE_SLOT: &str = "solution.py";

/// Slot name for the generated test file.
pub const TEST_SLOT: &str = "test_solution.py";

/// Flat-file store for per-run text artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at the given workspace directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the on-disk path for a slot.
    pub fn path(&self, slot: &str) -> PathBuf {
        self.root.join(slot)
    }

    /// Writes content to a named slot, overwriting any prior content.
    ///
    /// The workspace root is created on first use. Returns the path the
    /// content was written to, for handing to tool commands.
    pub fn save(&self, slot: &str, content: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.path(slot);
        fs::write(&path, content)?;
        debug!(slot, bytes = content.len(), "Materialized artifact");
        Ok(path)
    }

    /// Reads a slot's current content.
    pub fn read(&self, slot: &str) -> io::Result<String> {
        fs::read_to_string(self.path(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_read_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());

        let content = "def double(x):\n    return x * 2\n";
        let path = store.save(CODE_SLOT, content).unwrap();

        assert_eq!(path, temp.path().join("solution.py"));
        // Byte-identical round trip: what tools read is exactly what was written.
        assert_eq!(store.read(CODE_SLOT).unwrap(), content);
        assert_eq!(fs::read(&path).unwrap(), content.as_bytes());
    }

    #[test]
    fn test_save_overwrites_prior_content() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());

        store.save(TEST_SLOT, "first").unwrap();
        store.save(TEST_SLOT, "second").unwrap();

        assert_eq!(store.read(TEST_SLOT).unwrap(), "second");
    }

    #[test]
    fn test_save_creates_workspace_root() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("run").join("workspace");
        let store = ArtifactStore::new(&nested);

        store.save(CODE_SLOT, "x = 1\n").unwrap();
        assert!(nested.join(CODE_SLOT).exists());
    }
}

//! Output backends for generated files

use crate::error::Result;
use crate::project::GeneratedFile;
use indexmap::IndexMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Trait for output backends
pub trait OutputBackend {
    /// Write one generated file
    fn write(&self, file: &GeneratedFile) -> Result<()>;
}

/// Writes files below a root directory
#[derive(Debug, Clone)]
pub struct FsOutput {
    root: PathBuf,
}

impl FsOutput {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputBackend for FsOutput {
    fn write(&self, file: &GeneratedFile) -> Result<()> {
        let target = self.root.join(&file.path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &file.content)?;
        if file.executable {
            mark_executable(&target)?;
        }

        debug!("Wrote {}", target.display());
        Ok(())
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// In-memory output (for tests and dry runs)
#[derive(Debug, Default)]
pub struct InMemoryOutput {
    files: RwLock<IndexMap<String, GeneratedFile>>,
}

impl InMemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<GeneratedFile> {
        self.files.read().ok()?.get(path).cloned()
    }

    /// Paths in write order
    pub fn paths(&self) -> Vec<String> {
        self.files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputBackend for InMemoryOutput {
    fn write(&self, file: &GeneratedFile) -> Result<()> {
        let mut files = self
            .files
            .write()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "output lock poisoned"))?;
        files.insert(file.path.clone(), file.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, executable: bool) -> GeneratedFile {
        GeneratedFile {
            path: path.to_string(),
            content: "content\n".to_string(),
            executable,
        }
    }

    #[test]
    fn test_fs_output_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let output = FsOutput::new(dir.path());
        output.write(&file(".github/workflows/deploy.yml", false)).unwrap();

        let written = std::fs::read_to_string(dir.path().join(".github/workflows/deploy.yml")).unwrap();
        assert_eq!(written, "content\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_output_marks_scripts_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let output = FsOutput::new(dir.path());
        output.write(&file("pipeline.sh", true)).unwrap();

        let mode = std::fs::metadata(dir.path().join("pipeline.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_in_memory_output_keeps_write_order() {
        let output = InMemoryOutput::new();
        output.write(&file("b.yml", false)).unwrap();
        output.write(&file("a.yml", false)).unwrap();
        assert_eq!(output.paths(), vec!["b.yml", "a.yml"]);
        assert_eq!(output.len(), 2);
    }
}

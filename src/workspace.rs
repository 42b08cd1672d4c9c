//! # Workspace Module
//!
//! Directory temporanea per singola richiesta e registro dei file creati al suo interno.
//!
//! ## Responsabilità:
//! - Crea una directory `<prefix>XXXXXX` (default `nonverbal-ai-`) nella temp dir del sistema
//! - Genera i path dei file di input e dei tentativi con nomi UUID
//! - Tiene traccia di tutti i file creati
//! - Rimuove ricorsivamente la directory al rilascio
//!
//! ## Garanzia di cleanup:
//! - `release()` esplicito a fine pipeline, con errore loggabile
//! - Se il `Workspace` viene droppato senza `release()` (errore, timeout,
//!   cancellazione del future) la `TempDir` interna rimuove comunque tutto

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

/// Request-scoped temporary directory, sole owner of every file inside it
pub struct Workspace {
    dir: TempDir,
    created_files: BTreeSet<PathBuf>,
}

impl Workspace {
    /// Create a workspace in the system temp directory
    pub fn acquire(prefix: &str) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(Self::from_dir(dir))
    }

    /// Create a workspace under `parent`
    pub fn acquire_in(parent: &Path, prefix: &str) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
        Ok(Self::from_dir(dir))
    }

    fn from_dir(dir: TempDir) -> Self {
        debug!("Acquired workspace {}", dir.path().display());
        Self {
            dir,
            created_files: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn created_files(&self) -> &BTreeSet<PathBuf> {
        &self.created_files
    }

    /// Write the original upload into the workspace
    pub async fn write_input(&mut self, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.register(format!("{}-input", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Fresh, registered path for one encode attempt
    pub fn attempt_path(&mut self) -> PathBuf {
        self.register(format!("{}-compressed.mp4", Uuid::new_v4()))
    }

    fn register(&mut self, file_name: String) -> PathBuf {
        let path = self.dir.path().join(file_name);
        self.created_files.insert(path.clone());
        path
    }

    /// Remove the directory and everything in it
    pub fn release(self) -> std::io::Result<()> {
        let root = self.dir.path().to_path_buf();
        let count = self.created_files.len();
        self.dir.close()?;
        debug!("Released workspace {} ({} files)", root.display(), count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_files_live_inside_root() {
        let parent = TempDir::new().unwrap();
        let mut workspace = Workspace::acquire_in(parent.path(), "nonverbal-ai-").unwrap();

        let input = workspace.write_input(b"video bytes").await.unwrap();
        let attempt = workspace.attempt_path();

        assert!(workspace.root().file_name().unwrap().to_string_lossy().starts_with("nonverbal-ai-"));
        assert!(input.starts_with(workspace.root()));
        assert!(attempt.starts_with(workspace.root()));
        assert!(attempt.to_string_lossy().ends_with("-compressed.mp4"));
        assert_eq!(tokio::fs::read(&input).await.unwrap(), b"video bytes");
        assert_eq!(workspace.created_files().len(), 2);
        assert_ne!(workspace.attempt_path(), attempt);
    }

    #[tokio::test]
    async fn test_release_removes_everything() {
        let parent = TempDir::new().unwrap();
        let mut workspace = Workspace::acquire_in(parent.path(), "ws-").unwrap();
        let root = workspace.root().to_path_buf();
        let input = workspace.write_input(&[1, 2, 3]).await.unwrap();
        let attempt = workspace.attempt_path();
        tokio::fs::write(&attempt, [4u8, 5]).await.unwrap();

        workspace.release().unwrap();

        assert!(!root.exists());
        assert!(!input.exists());
        assert!(!attempt.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_everything() {
        let parent = TempDir::new().unwrap();
        let root = {
            let mut workspace = Workspace::acquire_in(parent.path(), "ws-").unwrap();
            workspace.write_input(&[0u8; 64]).await.unwrap();
            workspace.root().to_path_buf()
        };
        assert!(!root.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}

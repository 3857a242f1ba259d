use std::path::{Path, PathBuf};

use titvo_core::{ChangedFile, TitvoError};

/// Local directory tree replicating the changed files of a commit.
///
/// Every write lands strictly below [`Mirror::root`]; parent directories are
/// created on demand and existing files are overwritten, so writes are
/// idempotent.
///
/// # Examples
///
/// ```
/// use titvo_core::ChangedFile;
/// use titvo_mirror::Mirror;
///
/// let mirror = Mirror::new("repo_files");
/// let file = ChangedFile::new("src/pkg/module.py").unwrap();
/// let path = mirror.resolve(&file).unwrap();
/// assert!(path.ends_with("src/pkg/module.py"));
///
/// let escape = ChangedFile::new("../etc/passwd").unwrap();
/// assert!(mirror.resolve(&escape).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Mirror {
    root: PathBuf,
}

impl Mirror {
    /// A mirror rooted at `root`. Nothing is created until [`Mirror::prepare`]
    /// or the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The mirror root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Io`] if the directory cannot be created.
    pub async fn prepare(&self) -> Result<(), TitvoError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Map a changed file to its location below the root.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::UnsafePath`] for absolute paths and for empty,
    /// `.` or `..` segments.
    pub fn resolve(&self, file: &ChangedFile) -> Result<PathBuf, TitvoError> {
        let mut path = self.root.clone();
        for segment in file.segments() {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains('\\')
                || segment.contains('\0')
            {
                return Err(TitvoError::UnsafePath(file.path().to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Write `content` for `file`, creating parent directories first.
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::UnsafePath`] if the path would escape the root,
    /// or [`TitvoError::Io`] if a directory or the file cannot be written.
    pub async fn write(&self, file: &ChangedFile, content: &str) -> Result<u64, TitvoError> {
        let path = self.resolve(file)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content.as_bytes()).await?;
        Ok(content.len() as u64)
    }

    /// Delete the mirrored copy of `file`. A file that is not there is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::UnsafePath`] if the path would escape the root,
    /// or [`TitvoError::Io`] if an existing file cannot be removed.
    pub async fn remove(&self, file: &ChangedFile) -> Result<(), TitvoError> {
        let path = self.resolve(file)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

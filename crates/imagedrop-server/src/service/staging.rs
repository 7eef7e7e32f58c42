//! Local staging of uploaded files.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Tracing target for staging operations.
const TRACING_TARGET: &str = "imagedrop_server::service::staging";

/// Errors raised while staging one uploaded file.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// The client-supplied file name has no usable final component.
    #[error("invalid file name '{0}'")]
    InvalidName(String),
    /// The file exceeds the per-file size limit.
    #[error("file '{name}' exceeds the limit of {limit} bytes")]
    TooLarge { name: String, limit: usize },
    /// Writing to the staging directory failed.
    #[error("failed to stage '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Strips every directory component from a client-supplied file name.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// remains, or the remainder is `.` or `..`.
pub fn sanitize_file_name(file_name: &str) -> Option<String> {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    match name {
        "" | "." | ".." => None,
        name if name.chars().any(char::is_control) => None,
        name => Some(name.to_owned()),
    }
}

/// A file that was fully written to the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Sanitized name, also used as the blob name.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Number of bytes written.
    pub size: u64,
}

/// Directory uploaded files are written to before their transfer.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    max_file_size: usize,
}

impl StagingArea {
    /// Creates a staging area rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_file_size,
        }
    }

    /// Staging directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Per-file size limit in bytes.
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Creates the staging directory if it is missing.
    pub async fn prepare(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Opens a writer for the client-supplied `file_name`.
    ///
    /// The name is sanitized first. Every upload is written to its own
    /// `upload-<random>-{name}` file, so two uploads of the same name never
    /// share a path.
    pub async fn create(&self, file_name: &str) -> Result<StagedWriter, StagingError> {
        let name = sanitize_file_name(file_name)
            .ok_or_else(|| StagingError::InvalidName(file_name.to_owned()))?;

        let io_error = |source| StagingError::Io {
            path: self.dir.join(&name),
            source,
        };

        self.prepare().await.map_err(io_error)?;
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&format!("-{name}"))
            .tempfile_in(&self.dir)
            .map_err(io_error)?
            .keep()
            .map_err(|err| io_error(err.error))?;

        tracing::debug!(
            target: TRACING_TARGET,
            file = %name,
            path = %path.display(),
            "staging file"
        );

        Ok(StagedWriter {
            name,
            path,
            file: File::from_std(file),
            written: 0,
            limit: self.max_file_size,
        })
    }
}

/// Writes one upload to disk, enforcing the per-file size limit.
///
/// Call [`finish`](Self::finish) on success or [`discard`](Self::discard) to
/// remove a partial file.
#[derive(Debug)]
pub struct StagedWriter {
    name: String,
    path: PathBuf,
    file: File,
    written: u64,
    limit: usize,
}

impl StagedWriter {
    /// Sanitized file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a chunk of the upload.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StagingError> {
        if self.written + chunk.len() as u64 > self.limit as u64 {
            return Err(StagingError::TooLarge {
                name: self.name.clone(),
                limit: self.limit,
            });
        }

        self.file
            .write_all(chunk)
            .await
            .map_err(|source| StagingError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes the file and returns its description.
    pub async fn finish(mut self) -> Result<StagedFile, StagingError> {
        if let Err(source) = self.file.flush().await {
            let path = self.path.clone();
            self.discard().await;
            return Err(StagingError::Io { path, source });
        }

        Ok(StagedFile {
            name: self.name,
            path: self.path,
            size: self.written,
        })
    }

    /// Removes the partially written file.
    pub async fn discard(self) {
        let Self { file, path, .. } = self;
        drop(file);

        if let Err(err) = tokio::fs::remove_file(&path).await {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %path.display(),
                error = %err,
                "failed to remove partial staged file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directory_components() {
        assert_eq!(sanitize_file_name("cat.png").as_deref(), Some("cat.png"));
        assert_eq!(
            sanitize_file_name("C:\\Users\\me\\Pictures\\cat.png").as_deref(),
            Some("cat.png")
        );
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("dir/ sub \\ dog.jpg ").as_deref(), Some("dog.jpg"));
    }

    #[test]
    fn rejects_unusable_names() {
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("photos/"), None);
        assert_eq!(sanitize_file_name("photos\\.."), None);
        assert_eq!(sanitize_file_name("."), None);
        assert_eq!(sanitize_file_name("bad\nname"), None);
    }

    #[tokio::test]
    async fn writes_file_into_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("images"), 1024);

        let mut writer = staging.create("uploads\\cat.png").await.unwrap();
        writer.write(b"meow").await.unwrap();
        writer.write(b"meow").await.unwrap();
        let staged = writer.finish().await.unwrap();

        assert_eq!(staged.name, "cat.png");
        assert_eq!(staged.size, 8);
        assert_eq!(staged.path.parent(), Some(dir.path().join("images").as_path()));
        assert!(staged.path.to_string_lossy().ends_with("-cat.png"));
        assert_eq!(tokio::fs::read(&staged.path).await.unwrap(), b"meowmeow");
    }

    #[tokio::test]
    async fn same_name_uploads_do_not_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path(), 1024);

        let mut first = staging.create("cat.png").await.unwrap();
        first.write(b"first").await.unwrap();
        let first = first.finish().await.unwrap();

        let mut second = staging.create("cat.png").await.unwrap();
        second.write(b"2nd").await.unwrap();
        let second = second.finish().await.unwrap();

        assert_eq!(first.name, second.name);
        assert_ne!(first.path, second.path);
        assert_eq!(tokio::fs::read(&first.path).await.unwrap(), b"first");
        assert_eq!(tokio::fs::read(&second.path).await.unwrap(), b"2nd");
    }

    #[tokio::test]
    async fn enforces_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path(), 4);

        let mut writer = staging.create("big.png").await.unwrap();
        writer.write(b"1234").await.unwrap();
        let err = writer.write(b"5").await.unwrap_err();
        assert!(matches!(err, StagingError::TooLarge { limit: 4, .. }));

        let path = writer.path.clone();
        writer.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn invalid_name_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path(), 4);

        let err = staging.create("folder/").await.unwrap_err();
        assert!(matches!(err, StagingError::InvalidName(_)));
    }
}

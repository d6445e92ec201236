use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Content I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reject anything that could address a file outside the content directory.
///
/// A valid name has no `..`, `/` or `\`, and is a non-empty stem followed by
/// `.{extension}`.
pub fn validate_content_filename(name: &str, extension: &str) -> Result<(), ContentError> {
    let invalid = || ContentError::InvalidFilename(name.to_string());

    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(invalid());
    }

    let stem = name
        .strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .ok_or_else(invalid)?;

    if stem.is_empty() || name.contains('\0') {
        return Err(invalid());
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFile {
    pub filename: String,
    pub size: u64,
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Flat directory of authored content files (blog posts).
#[derive(Debug, Clone)]
pub struct ContentLibrary {
    root: PathBuf,
    extension: String,
}

impl ContentLibrary {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub async fn list(&self) -> Result<Vec<ContentFile>, ContentError> {
        let mut files = Vec::new();

        if !self.root.exists() {
            return Ok(files);
        }

        let io_err = |source| ContentError::Io {
            path: self.root.clone(),
            source,
        };

        let mut entries = fs::read_dir(&self.root).await.map_err(io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let filename = entry.file_name().to_string_lossy().into_owned();
            if validate_content_filename(&filename, &self.extension).is_err() {
                continue;
            }

            if let Ok(metadata) = entry.metadata().await
                && metadata.is_file()
            {
                files.push(ContentFile {
                    filename,
                    size: metadata.len(),
                    modified: metadata.modified().ok().map(Into::into),
                });
            }
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));

        Ok(files)
    }

    pub async fn delete(&self, filename: &str) -> Result<(), ContentError> {
        validate_content_filename(filename, &self.extension)?;

        let path = self.root.join(filename);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted content file {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Content file {:?} already absent", path);
                Err(ContentError::NotFound(filename.to_string()))
            }
            Err(source) => Err(ContentError::Io { path, source }),
        }
    }
}

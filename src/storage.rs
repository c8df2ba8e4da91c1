//! Upload directory
//!
//! Holds the uploaded listings and the JSON artifacts generated from them.
//! Files are addressed by sanitized name only; writes to an existing name
//! overwrite it.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::ProcessRecord;

const ALLOWED_EXTENSIONS: [&str; 1] = ["txt"];

const ARTIFACT_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Whether a client-supplied filename has an accepted extension
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Reduce a client-supplied filename to a safe, flat ASCII name.
///
/// Accented Latin letters are folded to their base letter (`é` → `e`) and
/// other non-ASCII characters are dropped. Path separators become spaces,
/// whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]` is dropped
/// and leading/trailing `.`/`_` are trimmed. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .chars()
        .map(fold_accent)
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Base letter of a Latin-1 accented letter, the char itself otherwise
fn fold_accent(c: char) -> char {
    match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

/// Name of the JSON artifact generated from an upload: `ps.txt` → `ps.json`
pub fn artifact_name(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    format!("{}.{}", stem, ARTIFACT_EXTENSION)
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Open the store, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> Option<PathBuf> {
        let safe = secure_filename(filename);
        if safe.is_empty() || safe != filename {
            return None;
        }
        Some(self.root.join(safe))
    }

    /// Save an uploaded file under an already-sanitized name
    pub async fn save_upload(&self, filename: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.path_for(filename).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("unsafe filename: {}", filename))
        })?;
        tokio::fs::write(&path, data).await?;
        tracing::debug!("Saved upload {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }

    /// Write records as a pretty-printed JSON array
    pub async fn write_artifact(&self, filename: &str, records: &[ProcessRecord]) -> Result<PathBuf, StorageError> {
        let path = self.path_for(filename).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("unsafe filename: {}", filename))
        })?;
        let json = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&path, json).await?;
        tracing::debug!("Wrote artifact {} ({} records)", path.display(), records.len());
        Ok(path)
    }

    /// Read a stored file; `None` if it does not exist or the name is unsafe
    pub async fn read(&self, filename: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let Some(path) = self.path_for(filename) else {
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

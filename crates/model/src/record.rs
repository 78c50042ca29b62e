use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

const PREVIEWABLE_EXTENSIONS: &[&str] = &["pdf"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl FileSource {
    pub fn read(&self) -> io::Result<Vec<u8>> {
        match self {
            Self::Path(path) => fs::read(path),
            Self::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// Opaque reference to a selected file: its metadata plus where the bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    name: String,
    size: u64,
    last_modified_ms: i64,
    source: FileSource,
}

impl FileHandle {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        last_modified_ms: i64,
        source: FileSource,
    ) -> Self {
        Self { name: name.into(), size, last_modified_ms, source }
    }

    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        last_modified_ms: i64,
    ) -> Self {
        let bytes = bytes.into();
        Self::new(name, bytes.len() as u64, last_modified_ms, FileSource::Bytes(bytes))
    }

    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let last_modified_ms = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or_default();

        Ok(Self::new(name, metadata.len(), last_modified_ms, FileSource::Path(path.to_path_buf())))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_modified_ms(&self) -> i64 {
        self.last_modified_ms
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn key(&self) -> FileKey {
        FileKey { name: self.name.clone(), size: self.size }
    }

    pub fn extension(&self) -> Option<String> {
        let (stem, extension) = self.name.rsplit_once('.')?;
        if stem.is_empty() || extension.is_empty() {
            return None;
        }
        Some(extension.to_ascii_lowercase())
    }

    pub fn can_preview(&self) -> bool {
        self.extension().is_some_and(|extension| PREVIEWABLE_EXTENSIONS.contains(&extension.as_str()))
    }
}

/// Deduplication identity: two selections with the same name and byte size are the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: RecordId,
    pub handle: FileHandle,
    pub is_password_protected: bool,
    pub saved_password: Option<String>,
}

/// One item yielded by the drag/select side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub handle: FileHandle,
    pub is_password_protected: bool,
}

impl Incoming {
    pub fn new(handle: FileHandle, is_password_protected: bool) -> Self {
        Self { handle, is_password_protected }
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} Bytes");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{value:.2}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

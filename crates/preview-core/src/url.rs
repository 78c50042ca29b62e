use intake_model::FileRecord;
use std::collections::HashSet;
use std::fmt;

/// Revocable reference to the previewed file's bytes.
///
/// Not `Clone`: each URL is handed back to its registry exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ObjectUrlRegistry {
    fn create(&mut self, record: &FileRecord) -> ObjectUrl;
    fn revoke(&mut self, url: ObjectUrl);
}

/// In-process registry handing out `blob:` style URLs.
#[derive(Debug, Default)]
pub struct BlobUrlRegistry {
    next: u64,
    live: HashSet<String>,
    revoked: usize,
}

impl BlobUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live.contains(url)
    }
}

impl ObjectUrlRegistry for BlobUrlRegistry {
    fn create(&mut self, record: &FileRecord) -> ObjectUrl {
        self.next += 1;
        let url = format!("blob:intake/{}/{}", record.id.0, self.next);
        self.live.insert(url.clone());
        ObjectUrl(url)
    }

    fn revoke(&mut self, url: ObjectUrl) {
        if self.live.remove(&url.0) {
            self.revoked += 1;
        } else {
            tracing::warn!(url = %url, "revoked unknown object url");
        }
    }
}

mod batch;
mod record;
mod store;
pub mod view;

pub use batch::{
    BatchId, BatchLedger, BatchView, DocumentId, ProcessingStage, SubmittedDocument, UploadBatch,
};
pub use record::{format_size, FileHandle, FileKey, FileRecord, FileSource, Incoming, RecordId};
pub use store::{AddOutcome, DuplicateNotice, FileStore};
pub use view::{project, ProjectionCache, SortDirection, SortKey, ViewQuery};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    Light,
    Dark,
}

impl ThemeChoice {
    pub fn from_dark(is_dark: bool) -> Self {
        if is_dark {
            Self::Dark
        } else {
            Self::Light
        }
    }

    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Grid,
    List,
}

/// User preferences that survive restarts. Staged files never do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Explicit theme choice; `None` follows the system theme.
    pub theme: Option<ThemeChoice>,
    #[serde(default)]
    pub layout: LayoutMode,
}

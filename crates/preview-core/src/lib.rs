mod cancel;
mod controller;
mod driver;
mod page_view;
mod session;
mod url;

pub use cancel::{CancellationToken, LoadToken, SessionId};
pub use controller::{
    PreviewController, CANCELLED_MESSAGE, INCORRECT_PASSWORD_MESSAGE, PASSWORD_REQUIRED_MESSAGE,
};
pub use driver::PreviewDriver;
pub use page_view::PageView;
pub use session::{
    CloseTrigger, DownloadRequest, LoadOutcome, LoadRequest, PreviewSession, PreviewState,
};
pub use url::{BlobUrlRegistry, ObjectUrl, ObjectUrlRegistry};

use intake_model::RecordId;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("no staged file with id {0}")]
    UnknownRecord(RecordId),
    #[error("{0} cannot be previewed; only PDF files are supported")]
    NotPreviewable(String),
}

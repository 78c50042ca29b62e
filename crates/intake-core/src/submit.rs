//! Batch submission
//!
//! [`build_payload`] pairs every staged file with its saved password and
//! [`BatchSubmitter`] hands the result to a [`Transport`]. The only transport
//! shipped is [`StubTransport`], which waits a fixed delay and succeeds.
//! Accepted batches are kept in the submitter's [`BatchLedger`].

use crate::notify::{NoticeLevel, Notifier};
use intake_model::{BatchId, BatchLedger, FileHandle, FileStore};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const SUBMIT_SUCCESS_MESSAGE: &str = "Files uploaded successfully!";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("no files to submit")]
    Empty,
    #[error("a submission is already in progress")]
    InProgress,
    #[error("upload failed: {0}")]
    Transport(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum PayloadPart {
    File { field: String, handle: FileHandle },
    Password { field: String, password: String },
}

impl PayloadPart {
    pub fn field(&self) -> &str {
        match self {
            Self::File { field, .. } | Self::Password { field, .. } => field,
        }
    }
}

impl fmt::Debug for PayloadPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { field, handle } => f
                .debug_struct("File")
                .field("field", field)
                .field("name", &handle.name())
                .field("size", &handle.size())
                .finish(),
            Self::Password { field, .. } => {
                f.debug_struct("Password").field("field", field).finish_non_exhaustive()
            }
        }
    }
}

/// Multipart-style form body, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    parts: Vec<PayloadPart>,
}

impl Payload {
    pub fn parts(&self) -> &[PayloadPart] {
        &self.parts
    }

    pub fn fields(&self) -> Vec<&str> {
        self.parts.iter().map(PayloadPart::field).collect()
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileHandle> {
        self.parts.iter().filter_map(|part| match part {
            PayloadPart::File { handle, .. } => Some(handle),
            PayloadPart::Password { .. } => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// `file-{i}` for every record; `password-{i}` only when the record is
/// protected and has a saved password.
pub fn build_payload(store: &FileStore) -> Payload {
    let mut parts = Vec::with_capacity(store.len());

    for (index, record) in store.records().iter().enumerate() {
        parts.push(PayloadPart::File {
            field: format!("file-{index}"),
            handle: record.handle.clone(),
        });

        let saved = record.saved_password.as_ref().filter(|_| record.is_password_protected);
        if let Some(password) = saved {
            parts.push(PayloadPart::Password {
                field: format!("password-{index}"),
                password: password.clone(),
            });
        }
    }

    Payload { parts }
}

/// Transport acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub file_count: usize,
}

/// Accepted submission, as recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub file_count: usize,
    pub batch: BatchId,
}

pub type SubmitFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Receipt, SubmitError>> + Send + 'a>>;

/// Request/response boundary to the upload endpoint.
pub trait Transport: Send + Sync {
    fn submit<'a>(&'a self, payload: &'a Payload) -> SubmitFuture<'a>;
}

/// Acknowledges every payload after `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubTransport {
    delay: Duration,
}

impl StubTransport {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Transport for StubTransport {
    fn submit<'a>(&'a self, payload: &'a Payload) -> SubmitFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(Receipt { file_count: payload.file_count() })
        })
    }
}

/// Shared view of the `Submitting` flag.
#[derive(Debug, Clone, Default)]
pub struct SubmitStatus {
    submitting: Arc<AtomicBool>,
}

impl SubmitStatus {
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }
}

/// Clears the flag however the submission future ends.
struct SubmittingGuard(Arc<AtomicBool>);

impl Drop for SubmittingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct BatchSubmitter {
    status: SubmitStatus,
    ledger: Mutex<BatchLedger>,
}

impl BatchSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_submitting(&self) -> bool {
        self.status.is_submitting()
    }

    pub fn status(&self) -> SubmitStatus {
        self.status.clone()
    }

    /// Batches accepted so far, with their processing stages.
    pub fn ledger(&self) -> MutexGuard<'_, BatchLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submits every staged file. The store is left as is either way.
    pub async fn submit<T, N>(
        &self,
        store: &FileStore,
        transport: &T,
        notifier: &N,
    ) -> Result<Ack, SubmitError>
    where
        T: Transport + ?Sized,
        N: Notifier + ?Sized,
    {
        if store.is_empty() {
            return Err(SubmitError::Empty);
        }
        if self
            .status
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::InProgress);
        }
        let _guard = SubmittingGuard(Arc::clone(&self.status.submitting));

        let payload = build_payload(store);
        tracing::info!(
            files = payload.file_count(),
            fields = payload.parts().len(),
            "submitting batch"
        );

        match transport.submit(&payload).await {
            Ok(receipt) => {
                let batch = self.ledger().record(payload.files(), now_ms());
                tracing::info!(files = receipt.file_count, batch = batch.0, "batch accepted");
                notifier.notify(NoticeLevel::Success, SUBMIT_SUCCESS_MESSAGE);
                Ok(Ack { file_count: receipt.file_count, batch })
            }
            Err(err) => {
                tracing::warn!(error = %err, "batch submission failed");
                notifier.notify(NoticeLevel::Error, &err.to_string());
                Err(err)
            }
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

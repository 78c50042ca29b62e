//! Submitted batches and the processing stage of each document in them.

use crate::record::FileHandle;
use crate::view::{arrange, compare_names, ViewQuery};
use crate::SortKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    Uploaded,
    Analyzing,
    Extraction,
    Review,
    Completed,
}

impl ProcessingStage {
    pub const ALL: [Self; 5] =
        [Self::Uploaded, Self::Analyzing, Self::Extraction, Self::Review, Self::Completed];

    pub fn label(self) -> &'static str {
        match self {
            Self::Uploaded => "Uploaded",
            Self::Analyzing => "Analyzing",
            Self::Extraction => "Data Extraction",
            Self::Review => "Review",
            Self::Completed => "Completed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Uploaded => "Document has been uploaded successfully",
            Self::Analyzing => "Document is being analyzed for content structure",
            Self::Extraction => "Extracting key information from document",
            Self::Review => "Document needs review for accuracy",
            Self::Completed => "Document processing completed successfully",
        }
    }

    /// Position in the status sort: completed first, freshly uploaded last.
    pub fn status_rank(self) -> u8 {
        match self {
            Self::Completed => 1,
            Self::Review => 2,
            Self::Extraction => 3,
            Self::Analyzing => 4,
            Self::Uploaded => 5,
        }
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `batch-index`, with a 1-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    pub batch: BatchId,
    pub index: u32,
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.batch.0, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedDocument {
    pub id: DocumentId,
    pub name: String,
    pub size: u64,
    pub uploaded_at_ms: i64,
    pub stage: ProcessingStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadBatch {
    pub id: BatchId,
    pub submitted_at_ms: i64,
    documents: Vec<SubmittedDocument>,
}

impl UploadBatch {
    pub fn documents(&self) -> &[SubmittedDocument] {
        &self.documents
    }

    pub fn total(&self) -> usize {
        self.documents.len()
    }

    pub fn completed(&self) -> usize {
        self.documents.iter().filter(|doc| doc.stage.is_completed()).count()
    }

    /// Rounded share of completed documents, 0 for an empty batch.
    pub fn percent_complete(&self) -> u8 {
        if self.documents.is_empty() {
            return 0;
        }
        let percent = (self.completed() as f64 / self.total() as f64 * 100.0).round();
        percent as u8
    }
}

/// One batch as shown under a query: its matching documents, ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchView<'a> {
    pub batch: &'a UploadBatch,
    pub documents: Vec<&'a SubmittedDocument>,
    pub expanded: bool,
}

/// History of submitted batches, newest last, plus which of them are expanded.
#[derive(Debug, Clone, Default)]
pub struct BatchLedger {
    batches: Vec<UploadBatch>,
    next_id: u64,
    expanded: HashSet<BatchId>,
}

impl BatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a submitted batch; every document starts at `Uploaded`.
    pub fn record<'a>(
        &mut self,
        files: impl IntoIterator<Item = &'a FileHandle>,
        submitted_at_ms: i64,
    ) -> BatchId {
        self.next_id += 1;
        let id = BatchId(self.next_id);

        let documents = files
            .into_iter()
            .zip(1_u32..)
            .map(|(handle, index)| SubmittedDocument {
                id: DocumentId { batch: id, index },
                name: handle.name().to_owned(),
                size: handle.size(),
                uploaded_at_ms: submitted_at_ms,
                stage: ProcessingStage::Uploaded,
            })
            .collect::<Vec<_>>();

        tracing::debug!(batch = id.0, documents = documents.len(), "recorded batch");
        self.batches.push(UploadBatch { id, submitted_at_ms, documents });
        id
    }

    pub fn batches(&self) -> &[UploadBatch] {
        &self.batches
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn get(&self, id: BatchId) -> Option<&UploadBatch> {
        self.batches.iter().find(|batch| batch.id == id)
    }

    pub fn document(&self, id: DocumentId) -> Option<&SubmittedDocument> {
        self.get(id.batch)?.documents.iter().find(|doc| doc.id == id)
    }

    /// Returns whether the stage changed.
    pub fn set_stage(&mut self, id: DocumentId, stage: ProcessingStage) -> bool {
        let Some(doc) = self
            .batches
            .iter_mut()
            .find(|batch| batch.id == id.batch)
            .and_then(|batch| batch.documents.iter_mut().find(|doc| doc.id == id))
        else {
            return false;
        };
        if doc.stage == stage {
            return false;
        }

        tracing::debug!(document = %id, from = %doc.stage, to = %stage, "processing stage changed");
        doc.stage = stage;
        true
    }

    /// Flips the expansion of `id`; returns the new state.
    pub fn toggle_expanded(&mut self, id: BatchId) -> bool {
        if self.expanded.remove(&id) {
            return false;
        }
        self.get(id).is_some() && self.expanded.insert(id)
    }

    pub fn is_expanded(&self, id: BatchId) -> bool {
        self.expanded.contains(&id)
    }

    /// Expands the batch that holds `document`, as when it is linked to directly.
    pub fn expand_containing(&mut self, document: DocumentId) -> bool {
        if self.document(document).is_none() {
            return false;
        }
        self.expanded.insert(document.batch);
        true
    }

    /// Newest batch first; documents filtered and ordered within each batch.
    /// Batches left without a matching document are dropped.
    pub fn view(&self, query: &ViewQuery) -> Vec<BatchView<'_>> {
        self.batches
            .iter()
            .rev()
            .filter_map(|batch| {
                let documents = arrange(&batch.documents, query, |doc| doc.name.as_str(), |a, b| {
                    compare_documents(a, b, query.sort_by)
                });
                (!documents.is_empty()).then(|| BatchView {
                    batch,
                    documents,
                    expanded: self.is_expanded(batch.id),
                })
            })
            .collect()
    }
}

fn compare_documents(a: &SubmittedDocument, b: &SubmittedDocument, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => compare_names(&a.name, &b.name),
        SortKey::Size => a.size.cmp(&b.size),
        SortKey::Date => a.uploaded_at_ms.cmp(&b.uploaded_at_ms),
        SortKey::Status => a.stage.status_rank().cmp(&b.stage.status_rank()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SortDirection;

    fn handles(names: &[(&str, usize)]) -> Vec<FileHandle> {
        names
            .iter()
            .map(|(name, size)| FileHandle::from_bytes(*name, vec![0_u8; *size], 0))
            .collect()
    }

    fn names(view: &BatchView<'_>) -> Vec<String> {
        view.documents.iter().map(|doc| doc.name.clone()).collect()
    }

    #[test]
    fn recorded_batches_start_uploaded() {
        let mut ledger = BatchLedger::new();
        let files = handles(&[("a.pdf", 1), ("b.pdf", 2)]);
        let id = ledger.record(&files, 1_000);

        let batch = ledger.get(id).expect("batch");
        assert_eq!(batch.total(), 2);
        assert_eq!(batch.completed(), 0);
        assert!(batch.documents().iter().all(|doc| doc.stage == ProcessingStage::Uploaded));
        assert_eq!(batch.documents()[1].id.to_string(), "1-2");
    }

    #[test]
    fn progress_counts_completed_documents() {
        let mut ledger = BatchLedger::new();
        let id = ledger.record(&handles(&[("a.pdf", 1), ("b.pdf", 2), ("c.pdf", 3)]), 0);

        assert!(ledger.set_stage(DocumentId { batch: id, index: 1 }, ProcessingStage::Completed));
        assert!(!ledger.set_stage(DocumentId { batch: id, index: 1 }, ProcessingStage::Completed));
        assert!(!ledger.set_stage(DocumentId { batch: id, index: 9 }, ProcessingStage::Review));

        let batch = ledger.get(id).expect("batch");
        assert_eq!((batch.completed(), batch.total()), (1, 3));
        assert_eq!(batch.percent_complete(), 33);
    }

    #[test]
    fn status_sort_puts_completed_first() {
        let mut ledger = BatchLedger::new();
        let id = ledger.record(
            &handles(&[("up.pdf", 1), ("review.pdf", 2), ("done.pdf", 3), ("scan.pdf", 4)]),
            0,
        );
        ledger.set_stage(DocumentId { batch: id, index: 2 }, ProcessingStage::Review);
        ledger.set_stage(DocumentId { batch: id, index: 3 }, ProcessingStage::Completed);
        ledger.set_stage(DocumentId { batch: id, index: 4 }, ProcessingStage::Analyzing);

        let query = ViewQuery::new("", SortKey::Status, SortDirection::Asc);
        let view = ledger.view(&query);
        assert_eq!(names(&view[0]), vec!["done.pdf", "review.pdf", "scan.pdf", "up.pdf"]);
    }

    #[test]
    fn view_lists_newest_batch_first_and_drops_empty_ones() {
        let mut ledger = BatchLedger::new();
        let first = ledger.record(&handles(&[("invoice.pdf", 1)]), 10);
        let second = ledger.record(&handles(&[("contract.pdf", 1), ("Invoice-2.pdf", 2)]), 20);

        let all = ledger.view(&ViewQuery::default());
        assert_eq!(all.iter().map(|view| view.batch.id).collect::<Vec<_>>(), vec![second, first]);

        let filtered = ledger.view(&ViewQuery::new("contract", SortKey::Name, SortDirection::Asc));
        assert_eq!(filtered.len(), 1);
        assert_eq!(names(&filtered[0]), vec!["contract.pdf"]);
    }

    #[test]
    fn expansion_toggles_and_follows_document_links() {
        let mut ledger = BatchLedger::new();
        let id = ledger.record(&handles(&[("a.pdf", 1)]), 0);

        assert!(ledger.toggle_expanded(id));
        assert!(!ledger.toggle_expanded(id));
        assert!(!ledger.toggle_expanded(BatchId(42)));

        assert!(ledger.expand_containing(DocumentId { batch: id, index: 1 }));
        assert!(ledger.view(&ViewQuery::default())[0].expanded);
    }

    #[test]
    fn stage_labels_and_order() {
        let ranks: Vec<u8> = ProcessingStage::ALL.iter().map(|stage| stage.status_rank()).collect();
        assert_eq!(ranks, vec![5, 4, 3, 2, 1]);
        assert_eq!(ProcessingStage::Extraction.to_string(), "Data Extraction");
    }
}

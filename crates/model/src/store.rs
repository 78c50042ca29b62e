use crate::record::{FileKey, FileRecord, Incoming, RecordId};
use std::collections::HashSet;
use std::fmt;

/// Result of one `FileStore::add` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub accepted: Vec<RecordId>,
    pub rejected: Vec<String>,
}

impl AddOutcome {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn duplicate_notice(&self) -> Option<DuplicateNotice> {
        match self.rejected.as_slice() {
            [] => None,
            [name] => Some(DuplicateNotice::Single(name.clone())),
            names => Some(DuplicateNotice::Multiple(names.len())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateNotice {
    Single(String),
    Multiple(usize),
}

impl fmt::Display for DuplicateNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(name) => write!(f, "\"{name}\" has already been added."),
            Self::Multiple(count) => write!(f, "{count} duplicate files were not added."),
        }
    }
}

/// Ordered, in-memory collection of staged files.
///
/// Holds at most one record per [`FileKey`]. Records are addressed by
/// [`RecordId`], which is never reused within one store.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    records: Vec<FileRecord>,
    next_id: u64,
    revision: u64,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I>(&mut self, incoming: I) -> AddOutcome
    where
        I: IntoIterator<Item = Incoming>,
    {
        let mut seen: HashSet<FileKey> =
            self.records.iter().map(|record| record.handle.key()).collect();
        let mut outcome = AddOutcome::default();
        let mut accepted = Vec::new();

        for item in incoming {
            if !seen.insert(item.handle.key()) {
                outcome.rejected.push(item.handle.name().to_owned());
                continue;
            }

            self.next_id += 1;
            let id = RecordId(self.next_id);
            outcome.accepted.push(id);
            accepted.push(FileRecord {
                id,
                handle: item.handle,
                is_password_protected: item.is_password_protected,
                saved_password: None,
            });
        }

        if !accepted.is_empty() {
            self.records.extend(accepted);
            self.revision += 1;
        }

        tracing::debug!(
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            total = self.records.len(),
            "staged files"
        );

        outcome
    }

    pub fn remove(&mut self, id: RecordId) -> Option<FileRecord> {
        let index = self.records.iter().position(|record| record.id == id)?;
        let removed = self.records.remove(index);
        self.revision += 1;

        tracing::debug!(id = id.0, name = removed.handle.name(), "removed staged file");
        Some(removed)
    }

    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.revision += 1;

        tracing::debug!(count, "cleared staged files");
        count
    }

    pub fn set_password(&mut self, id: RecordId, password: impl Into<String>) -> bool {
        let Some(record) = self.get_mut(id) else {
            return false;
        };

        record.saved_password = Some(password.into());
        self.revision += 1;
        true
    }

    pub fn mark_protected(&mut self, id: RecordId) -> bool {
        let Some(record) = self.get_mut(id) else {
            return false;
        };

        if record.is_password_protected {
            return true;
        }

        record.is_password_protected = true;
        self.revision += 1;
        true
    }

    pub fn password(&self, id: RecordId) -> Option<&str> {
        self.get(id)?.saved_password.as_deref()
    }

    pub fn is_protected(&self, id: RecordId) -> bool {
        self.get(id).is_some_and(|record| record.is_password_protected)
    }

    pub fn get(&self, id: RecordId) -> Option<&FileRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    fn get_mut(&mut self, id: RecordId) -> Option<&mut FileRecord> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&FileRecord> {
        self.records.iter().find(|record| record.handle.name() == name)
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bumped on every mutation; used to memoize projections.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileHandle;

    fn incoming(name: &str, size: usize, protected: bool) -> Incoming {
        Incoming::new(FileHandle::from_bytes(name, vec![0_u8; size], 0), protected)
    }

    fn assert_unique_keys(store: &FileStore) {
        let keys: HashSet<FileKey> = store.records().iter().map(|r| r.handle.key()).collect();
        assert_eq!(keys.len(), store.len());
    }

    #[test]
    fn re_adding_same_file_is_rejected_with_single_notice() {
        let mut store = FileStore::new();

        let first = store.add([incoming("a.pdf", 100, false)]);
        assert_eq!(first.accepted.len(), 1);
        assert_eq!(first.duplicate_notice(), None);

        let second = store.add([incoming("a.pdf", 100, false)]);
        assert_eq!(store.len(), 1);
        assert_eq!(second.duplicate_notice(), Some(DuplicateNotice::Single("a.pdf".to_owned())));
        assert_eq!(
            second.duplicate_notice().map(|notice| notice.to_string()).as_deref(),
            Some("\"a.pdf\" has already been added.")
        );
    }

    #[test]
    fn multiple_duplicates_yield_one_aggregate_notice() {
        let mut store = FileStore::new();
        store.add([incoming("a.pdf", 1, false), incoming("b.pdf", 2, false)]);

        let outcome =
            store.add([incoming("a.pdf", 1, false), incoming("c.pdf", 3, false), incoming("b.pdf", 2, false)]);

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected_count(), 2);
        assert_eq!(outcome.duplicate_notice(), Some(DuplicateNotice::Multiple(2)));
        assert_eq!(
            outcome.duplicate_notice().map(|notice| notice.to_string()).as_deref(),
            Some("2 duplicate files were not added.")
        );
    }

    #[test]
    fn same_name_with_different_size_is_a_different_file() {
        let mut store = FileStore::new();
        store.add([incoming("a.pdf", 1, false)]);
        let outcome = store.add([incoming("a.pdf", 2, false)]);

        assert!(outcome.rejected.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicates_inside_one_batch_are_rejected() {
        let mut store = FileStore::new();
        let outcome = store.add([incoming("a.pdf", 5, false), incoming("a.pdf", 5, true)]);

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected, vec!["a.pdf".to_owned()]);
        assert!(!store.records()[0].is_password_protected);
    }

    #[test]
    fn duplicates_never_overwrite_existing_records() {
        let mut store = FileStore::new();
        let id = store.add([incoming("a.pdf", 5, true)]).accepted[0];
        store.set_password(id, "secret");

        store.add([incoming("a.pdf", 5, false)]);

        assert!(store.is_protected(id));
        assert_eq!(store.password(id), Some("secret"));
    }

    #[test]
    fn arrival_order_is_preserved() {
        let mut store = FileStore::new();
        store.add([incoming("z.pdf", 1, false), incoming("a.pdf", 2, false)]);
        store.add([incoming("m.pdf", 3, false)]);

        let names: Vec<&str> = store.records().iter().map(|r| r.handle.name()).collect();
        assert_eq!(names, vec!["z.pdf", "a.pdf", "m.pdf"]);
    }

    #[test]
    fn keys_stay_unique_across_many_batches() {
        let mut store = FileStore::new();
        for round in 0..5 {
            let batch: Vec<Incoming> = (0..8)
                .map(|i| incoming(&format!("f{}.pdf", (i + round) % 6), (i + round) % 3 + 1, false))
                .collect();
            store.add(batch);
            assert_unique_keys(&store);
        }
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = FileStore::new();
        let id = store.add([incoming("a.pdf", 1, false)]).accepted[0];

        assert!(store.remove(id).is_some());
        assert!(store.remove(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn removed_file_can_be_staged_again_with_a_new_id() {
        let mut store = FileStore::new();
        let id = store.add([incoming("a.pdf", 1, false)]).accepted[0];
        store.remove(id);

        let again = store.add([incoming("a.pdf", 1, false)]).accepted[0];
        assert_ne!(id, again);
    }

    #[test]
    fn reads_on_absent_records_are_empty() {
        let mut store = FileStore::new();

        assert_eq!(store.password(RecordId(42)), None);
        assert!(!store.is_protected(RecordId(42)));
        assert!(!store.set_password(RecordId(42), "x"));
        assert!(!store.mark_protected(RecordId(42)));
    }

    #[test]
    fn clear_empties_and_bumps_revision() {
        let mut store = FileStore::new();
        store.add([incoming("a.pdf", 1, false), incoming("b.pdf", 2, false)]);
        let before = store.revision();

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert!(store.revision() > before);
    }

    #[test]
    fn mark_protected_flags_record_once() {
        let mut store = FileStore::new();
        let id = store.add([incoming("a.pdf", 1, false)]).accepted[0];

        assert!(store.mark_protected(id));
        let revision = store.revision();
        assert!(store.mark_protected(id));

        assert!(store.is_protected(id));
        assert_eq!(store.revision(), revision);
    }
}

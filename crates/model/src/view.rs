use crate::record::{FileRecord, RecordId};
use crate::store::FileStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Date,
    /// Processing stage, most advanced first. Staged files have no stage yet.
    Status,
}

impl SortKey {
    /// Unknown keys fall back to name ordering.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "size" => Self::Size,
            "date" => Self::Date,
            "status" => Self::Status,
            _ => Self::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ViewQuery {
    pub query: String,
    pub sort_by: SortKey,
    pub direction: SortDirection,
}

impl ViewQuery {
    pub fn new(query: impl Into<String>, sort_by: SortKey, direction: SortDirection) -> Self {
        Self { query: query.into(), sort_by, direction }
    }
}

/// Filtered, ordered view of `records`. The input slice is left untouched.
///
/// Ascending order is stable (ties keep insertion order); descending order is
/// the exact reverse of the ascending projection.
pub fn project<'a>(records: &'a [FileRecord], query: &ViewQuery) -> Vec<&'a FileRecord> {
    arrange(records, query, |record| record.handle.name(), |a, b| {
        compare_records(a, b, query.sort_by)
    })
}

/// Shared filter-then-order pass behind every projection.
pub(crate) fn arrange<'a, T>(
    items: &'a [T],
    query: &ViewQuery,
    name: impl Fn(&T) -> &str,
    compare: impl Fn(&T, &T) -> Ordering,
) -> Vec<&'a T> {
    let needle = query.query.trim().to_lowercase();

    let mut view: Vec<&T> = items
        .iter()
        .filter(|item| needle.is_empty() || name(item).to_lowercase().contains(&needle))
        .collect();

    view.sort_by(|a, b| compare(a, b));

    if query.direction == SortDirection::Desc {
        view.reverse();
    }

    view
}

fn compare_records(a: &FileRecord, b: &FileRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => compare_names(a.handle.name(), b.handle.name()),
        SortKey::Size => a.handle.size().cmp(&b.handle.size()),
        SortKey::Date => a.handle.last_modified_ms().cmp(&b.handle.last_modified_ms()),
        SortKey::Status => Ordering::Equal,
    }
}

/// Case-insensitive name ordering with a byte-order tiebreak.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let folded = a.chars().flat_map(char::to_lowercase).cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| a.cmp(b))
}

/// Memoized projection keyed by the store revision and the query.
#[derive(Debug, Default)]
pub struct ProjectionCache {
    key: Option<(u64, ViewQuery)>,
    ids: Vec<RecordId>,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&mut self, store: &FileStore, query: &ViewQuery) -> &[RecordId] {
        let fresh = matches!(&self.key, Some((revision, cached)) if *revision == store.revision() && cached == query);

        if !fresh {
            self.ids = project(store.records(), query).into_iter().map(|record| record.id).collect();
            self.key = Some((store.revision(), query.clone()));
        }

        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FileHandle, Incoming};

    fn store_with(files: &[(&str, usize, i64)]) -> FileStore {
        let mut store = FileStore::new();
        store.add(files.iter().map(|(name, size, modified)| {
            Incoming::new(FileHandle::from_bytes(*name, vec![0_u8; *size], *modified), false)
        }));
        store
    }

    fn names(view: &[&FileRecord]) -> Vec<String> {
        view.iter().map(|record| record.handle.name().to_owned()).collect()
    }

    #[test]
    fn empty_query_passes_everything() {
        let store = store_with(&[("b.pdf", 1, 0), ("a.pdf", 2, 0), ("c.pdf", 3, 0)]);
        let view = project(store.records(), &ViewQuery::default());

        assert_eq!(view.len(), store.len());
        assert_eq!(names(&view), vec!["a.pdf", "b.pdf", "c.pdf"]);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let store = store_with(&[("Invoice-May.pdf", 1, 0), ("receipt.pdf", 2, 0), ("INVOICE-june.PDF", 3, 0)]);
        let view = project(store.records(), &ViewQuery::new("invoice", SortKey::Name, SortDirection::Asc));

        assert_eq!(names(&view), vec!["INVOICE-june.PDF", "Invoice-May.pdf"]);
        assert!(view.len() <= store.len());
    }

    #[test]
    fn size_and_date_sort_numerically() {
        let store = store_with(&[("a.pdf", 30, 3), ("b.pdf", 4, 1), ("c.pdf", 200, 2)]);

        let by_size = project(store.records(), &ViewQuery::new("", SortKey::Size, SortDirection::Asc));
        assert_eq!(names(&by_size), vec!["b.pdf", "a.pdf", "c.pdf"]);

        let by_date = project(store.records(), &ViewQuery::new("", SortKey::Date, SortDirection::Desc));
        assert_eq!(names(&by_date), vec!["a.pdf", "c.pdf", "b.pdf"]);
    }

    #[test]
    fn ascending_ties_keep_insertion_order() {
        let store = store_with(&[("x.pdf", 5, 0), ("y.pdf", 5, 0), ("w.pdf", 1, 0), ("z.pdf", 5, 0)]);
        let view = project(store.records(), &ViewQuery::new("", SortKey::Size, SortDirection::Asc));

        assert_eq!(names(&view), vec!["w.pdf", "x.pdf", "y.pdf", "z.pdf"]);
    }

    #[test]
    fn descending_is_exact_reverse_of_ascending() {
        let store = store_with(&[
            ("x.pdf", 5, 0),
            ("y.pdf", 5, 0),
            ("w.pdf", 1, 0),
            ("z.pdf", 5, 0),
            ("v.pdf", 9, 0),
        ]);

        let mut asc = names(&project(store.records(), &ViewQuery::new("", SortKey::Size, SortDirection::Asc)));
        let desc = names(&project(store.records(), &ViewQuery::new("", SortKey::Size, SortDirection::Desc)));

        asc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn projection_does_not_mutate_input() {
        let store = store_with(&[("c.pdf", 1, 0), ("a.pdf", 2, 0)]);
        let before: Vec<RecordId> = store.records().iter().map(|r| r.id).collect();

        let _ = project(store.records(), &ViewQuery::new("", SortKey::Name, SortDirection::Desc));

        let after: Vec<RecordId> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn unknown_sort_key_falls_back_to_name() {
        assert_eq!(SortKey::parse_lossy("SIZE"), SortKey::Size);
        assert_eq!(SortKey::parse_lossy("date"), SortKey::Date);
        assert_eq!(SortKey::parse_lossy("Status"), SortKey::Status);
        assert_eq!(SortKey::parse_lossy("color"), SortKey::Name);
    }

    #[test]
    fn status_sort_keeps_staged_files_in_insertion_order() {
        let store = store_with(&[("b.pdf", 1, 0), ("a.pdf", 2, 0), ("c.pdf", 3, 0)]);
        let view = project(store.records(), &ViewQuery::new("", SortKey::Status, SortDirection::Asc));

        assert_eq!(names(&view), vec!["b.pdf", "a.pdf", "c.pdf"]);
    }

    #[test]
    fn names_compare_case_insensitively() {
        assert_eq!(compare_names("apple.pdf", "Banana.pdf"), Ordering::Less);
        assert_eq!(compare_names("B.pdf", "a.pdf"), Ordering::Greater);
        assert_ne!(compare_names("A.pdf", "a.pdf"), Ordering::Equal);
    }

    #[test]
    fn cache_recomputes_after_store_or_query_change() {
        let mut store = store_with(&[("b.pdf", 1, 0), ("a.pdf", 2, 0)]);
        let mut cache = ProjectionCache::new();
        let query = ViewQuery::default();

        let first = cache.ids(&store, &query).to_vec();
        assert_eq!(first.len(), 2);

        store.remove(first[0]);
        assert_eq!(cache.ids(&store, &query).len(), 1);

        let filtered = ViewQuery::new("zzz", SortKey::Name, SortDirection::Asc);
        assert!(cache.ids(&store, &filtered).is_empty());
    }
}

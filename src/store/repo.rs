use crate::domain::email::SearchHit;

/// How many neighbours a query returns unless told otherwise.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Inserted,
    /// The id was already present; the stored document was left untouched.
    AlreadyIndexed,
    /// Embedding or storage failed; the failure has been logged.
    Failed,
}

/// Best-effort semantic index over email documents. Neither operation fails.
pub trait DocumentIndex {
    fn index(&self, id: &str, body: &str, summary: &str) -> IndexOutcome;

    /// Up to `k` nearest documents, closest first. Empty on any failure.
    fn search(&self, query: &str, k: usize) -> Vec<SearchHit>;
}

use serde::{Deserialize, Serialize};

/// Gmail message id.
pub type EmailId = String;

/// One fetched message, normalized to plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecord {
    pub id: EmailId,
    pub from: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: EmailId,
}

/// What the vector index stores per message.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub id: EmailId,
    pub document: String,
    pub metadata: DocumentMetadata,
}

impl IndexedDocument {
    pub fn new(id: &str, body: &str, summary: &str) -> Self {
        Self {
            id: id.to_string(),
            document: format!("{body}\nSummary:\n{summary}"),
            metadata: DocumentMetadata { id: id.to_string() },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: EmailId,
    pub document: String,
    pub metadata: DocumentMetadata,
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_joins_body_and_summary() {
        let doc = IndexedDocument::new("18c2", "Lunch at noon?", "- lunch invite");
        assert_eq!(doc.document, "Lunch at noon?\nSummary:\n- lunch invite");
        assert_eq!(doc.metadata.id, "18c2");
    }
}

use std::future::Future;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid legal document identifier {0}")]
    InvalidDocument(String),
    #[error("Couldn't query {endpoint} got: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Query to {endpoint} got status {status}")]
    Status {
        endpoint: String,
        status: StatusCode,
    },
    #[error("Malformed query results: {0}")]
    Malformed(String),
}

/// What the graph knows about one legal document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalNode {
    /// Retrievable text of the document, if it has one in the requested form.
    pub resource: Option<String>,
    /// Related documents along the walked relations, without duplicates.
    pub related: Vec<String>,
}

/// Source of legal documents and their declared dependency relations.
pub trait LegalGraph {
    fn describe(&self, document: &str) -> impl Future<Output = Result<LegalNode, QueryError>>;
}

impl<T: LegalGraph> LegalGraph for &T {
    fn describe(&self, document: &str) -> impl Future<Output = Result<LegalNode, QueryError>> {
        (**self).describe(document)
    }
}

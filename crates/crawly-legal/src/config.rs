use std::time::Duration;

use crawly_crawler::{deserialize_delay_secs, OnError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalConfig {
    /// SPARQL endpoint answering JoLux queries.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Three letter EU authority code of the expression language.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_relations")]
    pub relations: Vec<LegalRelation>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_retries")]
    pub retries: usize,

    #[serde(
        default = "default_retry_delay_secs",
        deserialize_with = "deserialize_delay_secs"
    )]
    pub retry_delay_secs: f32,

    #[serde(default = "default_write")]
    pub write: bool,

    #[serde(default)]
    pub max_documents: Option<usize>,

    #[serde(default = "default_on_error")]
    pub on_query_error: OnError,

    #[serde(default = "default_on_error")]
    pub on_fetch_error: OnError,

    #[serde(default = "default_on_error")]
    pub on_storage_error: OnError,
}

impl Default for LegalConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            language: default_language(),
            relations: default_relations(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            write: default_write(),
            max_documents: None,
            on_query_error: default_on_error(),
            on_fetch_error: default_on_error(),
            on_storage_error: default_on_error(),
        }
    }
}

impl LegalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f32(self.retry_delay_secs).unwrap_or_default()
    }

    pub fn language_iri(&self) -> String {
        format!(
            "http://publications.europa.eu/resource/authority/language/{}",
            self.language.to_uppercase()
        )
    }
}

fn default_endpoint() -> String {
    String::from("https://fedlex.data.admin.ch/sparqlendpoint")
}

fn default_language() -> String {
    String::from("DEU")
}

fn default_relations() -> Vec<LegalRelation> {
    vec![LegalRelation::Cites]
}

fn default_user_agent() -> String {
    String::from("crawlybot")
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retries() -> usize {
    1
}

fn default_retry_delay_secs() -> f32 {
    5.0
}

fn default_write() -> bool {
    true
}

fn default_on_error() -> OnError {
    OnError::SkipAndLog
}

/// Dependency relation walked between legal documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LegalRelation {
    /// Documents cited by the document.
    Cites,
    /// Documents citing the document.
    CitedBy,
}

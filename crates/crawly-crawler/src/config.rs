use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
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

    #[serde(default = "default_same_host")]
    pub same_host: bool,

    #[serde(default)]
    pub link_filter: Option<String>,

    #[serde(default = "default_legal_markers")]
    pub legal_markers: Vec<String>,

    #[serde(default)]
    pub max_depth: Option<usize>,

    #[serde(default)]
    pub max_pages: Option<usize>,

    #[serde(default)]
    pub revisit_unchanged: bool,

    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: Option<usize>,

    #[serde(default = "default_on_fetch_error")]
    pub on_fetch_error: OnError,

    #[serde(default = "default_on_storage_error")]
    pub on_storage_error: OnError,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            write: default_write(),
            same_host: default_same_host(),
            link_filter: None,
            legal_markers: default_legal_markers(),
            max_depth: None,
            max_pages: None,
            revisit_unchanged: false,
            checkpoint_every: default_checkpoint_every(),
            on_fetch_error: default_on_fetch_error(),
            on_storage_error: default_on_storage_error(),
        }
    }
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Falls back to no delay at all when `retry_delay_secs` isn't a valid duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f32(self.retry_delay_secs).unwrap_or_default()
    }
}

/// Reads a delay in seconds, rejecting negative, infinite and NaN values.
pub fn deserialize_delay_secs<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f32::deserialize(deserializer)?;
    match Duration::try_from_secs_f32(secs) {
        Ok(_) => Ok(secs),
        Err(e) => Err(serde::de::Error::custom(format!(
            "invalid delay of {secs} seconds: {e}"
        ))),
    }
}

fn default_user_agent() -> String {
    String::from("crawlybot")
}

fn default_timeout_secs() -> u64 {
    30
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

fn default_same_host() -> bool {
    true
}

fn default_legal_markers() -> Vec<String> {
    vec!["fedlex".into(), "classified-compilation".into()]
}

fn default_checkpoint_every() -> Option<usize> {
    Some(400)
}

fn default_on_fetch_error() -> OnError {
    OnError::SkipAndLog
}

fn default_on_storage_error() -> OnError {
    OnError::SkipAndLog
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OnError {
    Fail,
    SkipAndLog,
}

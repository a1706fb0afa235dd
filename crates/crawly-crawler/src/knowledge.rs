use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const OVERVIEW_DIR: &str = "_overview";
pub const KNOWLEDGE_FILE: &str = "knowledge_base.json";
pub const LINK_GRAPH_FILE: &str = "link_graph.csv";

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("No knowledge entry registered for {0}")]
    NotFound(String),
    #[error("Couldn't read or write knowledge export: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid knowledge export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Couldn't write link graph: {0}")]
    Csv(#[from] csv::Error),
}

/// What is known about one canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub storage_location: PathBuf,
    pub hash: String,
    pub neighbours: Vec<String>,
}

/// Hex encoded SHA-256 of some content.
pub fn content_digest(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Mapping from canonical URL to [`KnowledgeEntry`], the single source of truth for
/// whether a node was processed and whether its content changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeStore {
    entries: BTreeMap<String, KnowledgeEntry>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn get(&self, url: &str) -> Option<&KnowledgeEntry> {
        self.entries.get(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &KnowledgeEntry)> {
        self.entries.iter()
    }

    /// Whether `url` is registered with exactly this content.
    pub fn is_current(&self, url: &str, content: &[u8]) -> bool {
        self.entries
            .get(url)
            .map(|entry| entry.hash == content_digest(content))
            .unwrap_or(false)
    }

    /// Registers `content` for `url`.
    ///
    /// Returns `changed = false` and leaves the entry untouched when the stored digest
    /// matches, otherwise the hash and location are (re)written.
    pub fn upsert(
        &mut self,
        url: &str,
        content: &[u8],
        storage_location: PathBuf,
    ) -> (&KnowledgeEntry, bool) {
        let hash = content_digest(content);
        let changed = match self.entries.get_mut(url) {
            Some(entry) if entry.hash == hash => false,
            Some(entry) => {
                entry.hash = hash;
                entry.storage_location = storage_location;
                true
            }
            None => {
                self.entries.insert(
                    url.to_string(),
                    KnowledgeEntry {
                        storage_location,
                        hash,
                        neighbours: vec![],
                    },
                );
                true
            }
        };
        (&self.entries[url], changed)
    }

    /// Appends the neighbours not yet recorded for `url`, keeping discovery order.
    ///
    /// Returns how many were added.
    pub fn add_neighbours<I, S>(
        &mut self,
        url: &str,
        neighbours: I,
    ) -> Result<usize, KnowledgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .entries
            .get_mut(url)
            .ok_or_else(|| KnowledgeError::NotFound(url.to_string()))?;

        let before = entry.neighbours.len();
        for neighbour in neighbours {
            let neighbour = neighbour.into();
            if !entry.neighbours.contains(&neighbour) {
                entry.neighbours.push(neighbour);
            }
        }
        Ok(entry.neighbours.len() - before)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let file = fs_err::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(io::BufReader::new(file))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), KnowledgeError> {
        let file = fs_err::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(io::BufWriter::new(file), self)?;
        Ok(())
    }

    /// Writes the `source,target` edge list of the link graph.
    pub fn save_link_graph(&self, path: impl AsRef<Path>) -> Result<(), KnowledgeError> {
        let mut wtr = csv::Writer::from_writer(fs_err::File::create(path.as_ref())?);
        wtr.write_record(["source", "target"])?;
        for (source, entry) in &self.entries {
            for target in &entry.neighbours {
                wtr.write_record([source, target])?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes both exports into `write_dir/_overview`.
    pub fn export(&self, write_dir: impl AsRef<Path>) -> Result<(), KnowledgeError> {
        let overview = write_dir.as_ref().join(OVERVIEW_DIR);
        fs_err::create_dir_all(&overview)?;
        self.save(overview.join(KNOWLEDGE_FILE))?;
        self.save_link_graph(overview.join(LINK_GRAPH_FILE))?;
        log::info!(
            "Exported {} knowledge entries to {}",
            self.len(),
            overview.display()
        );
        Ok(())
    }
}

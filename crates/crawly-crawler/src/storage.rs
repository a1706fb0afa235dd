use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::classify::{self, ContentKind};
use crate::knowledge::OVERVIEW_DIR;

const MAX_STEM_LEN: usize = 64;
const MAX_EXT_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Couldn't write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Storage path {path} already holds {existing}, refusing to store {incoming}")]
    Collision {
        path: PathBuf,
        existing: String,
        incoming: String,
    },
}

/// Persists fetched resources below a write directory, one file per distinct URL.
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    write: bool,
    claimed: HashMap<PathBuf, String>,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, write: bool) -> Self {
        Self {
            root: root.into(),
            write,
            claimed: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the category directories and `_overview`, keeping whatever already exists.
    pub fn prepare(&self) -> Result<(), StorageError> {
        if !self.write {
            return Ok(());
        }
        let mut dirs = ContentKind::ALL
            .iter()
            .map(|kind| kind.dir_name())
            .collect::<Vec<_>>();
        dirs.push(OVERVIEW_DIR);

        for dir in dirs {
            let path = self.root.join(dir);
            if !path.is_dir() {
                log::debug!("Creating {}", path.display());
            }
            fs_err::create_dir_all(&path).map_err(|source| StorageError::Io { path, source })?;
        }
        Ok(())
    }

    /// Where the resource at `url` of kind `kind` is stored.
    pub fn location(&self, url: &str, kind: ContentKind, content_type: Option<&str>) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(file_name_for(url, kind, content_type))
    }

    /// Writes `content` to the location of `url` and returns that location.
    ///
    /// When writing is disabled only the location is computed.
    pub fn persist(
        &mut self,
        url: &str,
        kind: ContentKind,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.location(url, kind, content_type);
        match self.claimed.get(&path) {
            Some(existing) if existing != url => {
                return Err(StorageError::Collision {
                    path,
                    existing: existing.clone(),
                    incoming: url.to_string(),
                })
            }
            Some(_) => (),
            None => {
                self.claimed.insert(path.clone(), url.to_string());
            }
        }

        if self.write {
            if let Some(parent) = path.parent() {
                fs_err::create_dir_all(parent).map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs_err::write(&path, content).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(path)
    }
}

/// `<sanitized stem>-<url digest>.<ext>`, injective over canonical URLs since the digest
/// covers the whole URL.
///
/// URLs without an extension get the default one of `kind` served as `content_type`.
pub fn file_name_for(url: &str, kind: ContentKind, content_type: Option<&str>) -> String {
    let name = classify::file_name(url);
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem.to_string(), Some(sanitize(&ext.to_lowercase())))
        }
        _ => (name.clone(), None),
    };
    let ext = ext
        .map(|mut ext| {
            ext.truncate(MAX_EXT_LEN);
            ext
        })
        .or_else(|| kind.default_extension(content_type).map(String::from));

    let mut stem = sanitize(&stem);
    stem.truncate(MAX_STEM_LEN);
    if stem.is_empty() {
        stem.push_str("index");
    }

    let digest = hex::encode(&Sha256::digest(url.as_bytes())[..8]);
    match ext {
        Some(ext) => format!("{stem}-{digest}.{ext}"),
        None => format!("{stem}-{digest}"),
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

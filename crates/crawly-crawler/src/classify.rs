use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// The closed set of content categories a crawled resource can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Html,
    Pdf,
    Xml,
    LegalDocument,
    Archive,
    Spreadsheet,
    WordDocument,
    Presentation,
    Image,
    Cad,
    Unknown,
}

impl ContentKind {
    pub const ALL: [ContentKind; 11] = [
        Self::Html,
        Self::Pdf,
        Self::Xml,
        Self::LegalDocument,
        Self::Archive,
        Self::Spreadsheet,
        Self::WordDocument,
        Self::Presentation,
        Self::Image,
        Self::Cad,
        Self::Unknown,
    ];

    /// Only markup documents are parsed for outbound links, everything else is a leaf.
    pub fn yields_links(self) -> bool {
        matches!(self, Self::Html | Self::LegalDocument)
    }

    /// Directory below the write dir where resources of this kind are persisted.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Xml => "xml",
            Self::LegalDocument => "legal",
            Self::Archive => "zip",
            Self::Spreadsheet => "excel",
            Self::WordDocument => "word",
            Self::Presentation => "powerpoint",
            Self::Image => "images",
            Self::Cad => "cad",
            Self::Unknown => "else",
        }
    }

    /// Extension appended to stored files whose URL carries none.
    ///
    /// Legal documents come as HTML or as XML, `content_type` tells which.
    pub fn default_extension(self, content_type: Option<&str>) -> Option<&'static str> {
        match self {
            Self::Html => Some("html"),
            Self::Pdf => Some("pdf"),
            Self::Xml => Some("xml"),
            Self::LegalDocument => match content_type.and_then(kind_of_mime) {
                Some(Self::Html) => Some("html"),
                _ => Some("xml"),
            },
            Self::Archive => Some("zip"),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Xml => "xml",
            Self::LegalDocument => "legal-document",
            Self::Archive => "archive",
            Self::Spreadsheet => "spreadsheet",
            Self::WordDocument => "word-document",
            Self::Presentation => "presentation",
            Self::Image => "image",
            Self::Cad => "cad",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// Declaration order is the precedence order for partial extension matches.
const EXTENSIONS: &[(&str, ContentKind)] = &[
    ("pdf", ContentKind::Pdf),
    ("html", ContentKind::Html),
    ("htm", ContentKind::Html),
    ("xml", ContentKind::Xml),
    ("zip", ContentKind::Archive),
    ("xlsx", ContentKind::Spreadsheet),
    ("xls", ContentKind::Spreadsheet),
    ("docx", ContentKind::WordDocument),
    ("doc", ContentKind::WordDocument),
    ("dotx", ContentKind::WordDocument),
    ("pptx", ContentKind::Presentation),
    ("ppt", ContentKind::Presentation),
    ("jpg", ContentKind::Image),
    ("jpeg", ContentKind::Image),
    ("png", ContentKind::Image),
    ("mpg", ContentKind::Image),
    ("dxf", ContentKind::Cad),
    ("dwg", ContentKind::Cad),
];

const MIME_TYPES: &[(&str, ContentKind)] = &[
    ("text/html", ContentKind::Html),
    ("application/xhtml+xml", ContentKind::Html),
    ("application/pdf", ContentKind::Pdf),
    ("application/xml", ContentKind::Xml),
    ("text/xml", ContentKind::Xml),
    ("application/zip", ContentKind::Archive),
    ("application/vnd.ms-excel", ContentKind::Spreadsheet),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ContentKind::Spreadsheet,
    ),
    ("application/msword", ContentKind::WordDocument),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ContentKind::WordDocument,
    ),
    ("application/vnd.ms-powerpoint", ContentKind::Presentation),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ContentKind::Presentation,
    ),
    ("image/jpeg", ContentKind::Image),
    ("image/png", ContentKind::Image),
    ("video/mpeg", ContentKind::Image),
    ("image/vnd.dxf", ContentKind::Cad),
    ("image/vnd.dwg", ContentKind::Cad),
];

/// Maps a resource to its [`ContentKind`] from its URL and, optionally, its response
/// content-type.
///
/// The file extension of the last path segment wins. When it is absent or unknown the
/// content-type is consulted, so a generated page like `/index` served as `text/html` is
/// still `html`. URLs containing one of the legal markers are promoted from `html`/`xml`
/// to `legal-document`.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    legal_markers: Vec<String>,
}

impl Classifier {
    pub fn new(legal_markers: Vec<String>) -> Self {
        Self { legal_markers }
    }

    pub fn classify(&self, url: &str, content_type: Option<&str>) -> ContentKind {
        let kind = file_extension(url)
            .and_then(|ext| kind_of_extension(&ext))
            .or_else(|| content_type.and_then(kind_of_mime))
            .unwrap_or(ContentKind::Unknown);

        match kind {
            ContentKind::Html | ContentKind::Xml if self.is_legal(url) => {
                ContentKind::LegalDocument
            }
            kind => kind,
        }
    }

    fn is_legal(&self, url: &str) -> bool {
        self.legal_markers
            .iter()
            .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
    }
}

/// Lower-cased extension of the (percent-decoded) last path segment, if it has one.
pub(crate) fn file_extension(url: &str) -> Option<String> {
    let name = file_name(url);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Percent-decoded last path segment, empty for directory-like URLs.
pub(crate) fn file_name(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    urlencoding::decode(segment)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| segment.to_string())
}

fn kind_of_extension(ext: &str) -> Option<ContentKind> {
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .or_else(|| EXTENSIONS.iter().find(|(known, _)| ext.contains(known)))
        .map(|(_, kind)| *kind)
}

fn kind_of_mime(content_type: &str) -> Option<ContentKind> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == mime)
        .map(|(_, kind)| *kind)
}

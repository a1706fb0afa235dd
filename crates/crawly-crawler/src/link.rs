use std::collections::HashSet;

use select::document::Document;
use select::predicate::{Name, Or};
use url::Url;

/// Normalized form of an absolute URL used as the knowledge store key.
///
/// Only `http` and `https` URLs have a canonical form. The fragment is dropped; scheme
/// and host case as well as default ports are normalized by the parser.
pub fn canonicalize(url: &str) -> Option<Url> {
    let mut url = Url::parse(url.trim()).ok()?;
    match url.scheme() {
        "http" | "https" => (),
        _ => return None,
    }
    url.set_fragment(None);
    Some(url)
}

/// Resolves an `href` found in `base` to a canonical URL.
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("javascript:")
        || href.starts_with("tel:")
    {
        return None;
    }
    let joined = base.join(href).ok()?;
    canonicalize(joined.as_str())
}

/// Outbound links of a markup document, resolved against `base`, deduplicated in
/// document order.
///
/// Both HTML anchors and the `<ref href>` elements of legal XML are considered.
pub fn extract_links(base: &Url, body: &[u8]) -> Vec<String> {
    let markup = String::from_utf8_lossy(body);
    let document = Document::from(markup.as_ref());

    let mut seen = HashSet::new();
    document
        .find(Or(Name("a"), Name("ref")))
        .filter_map(|node| node.attr("href"))
        .filter_map(|href| resolve(base, href))
        .map(String::from)
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

use std::io::prelude::*;

use anyhow::{anyhow, Result};
use flate2::read::GzDecoder;
use futures::future::{FutureExt, LocalBoxFuture};
use lazy_static::lazy_static;
use sxd_document::{dom, parser};

use crate::fetch::{Fetched, Fetcher};

lazy_static! {
    static ref XP_FACTORY: sxd_xpath::Factory = sxd_xpath::Factory::new();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sitemap {
    Index,
    Urlset,
}

impl Sitemap {
    fn new(root: &dom::Root) -> Result<Self> {
        let kind = root
            .children()
            .into_iter()
            .find_map(|child| child.element())
            .ok_or_else(|| anyhow!("Sitemap has no root element"))?
            .name()
            .local_part();

        match kind {
            "sitemapindex" => Ok(Self::Index),
            "urlset" => Ok(Self::Urlset),
            _ => Err(anyhow!("Unknown sitemap root node kind: {kind}")),
        }
    }
}

/// Page URLs listed by the sitemap at `sitemap_url`, following sitemap indexes.
pub async fn gather_urls<F>(fetcher: &F, sitemap_url: &str) -> Result<Vec<String>>
where
    F: Fetcher,
{
    let mut urls = vec![];
    gather_into(fetcher, sitemap_url, &mut urls).await?;
    Ok(urls)
}

fn gather_into<'a, F>(
    fetcher: &'a F,
    sitemap_url: &'a str,
    urls: &'a mut Vec<String>,
) -> LocalBoxFuture<'a, Result<()>>
where
    F: Fetcher,
{
    async move {
        let fetched = fetcher.fetch(sitemap_url).await?;
        let sitemap_xml = decode(&fetched)?;
        let (kind, locs) = parse_sitemap(&sitemap_xml)
            .map_err(|e| anyhow!("Couldn't parse sitemap {sitemap_url} got: {e}"))?;

        match kind {
            Sitemap::Index => {
                for sm_url in locs {
                    if let Err(e) = gather_into(fetcher, &sm_url, urls).await {
                        log::warn!("Skipping sitemap: {sm_url} got: {e}");
                    }
                }
            }
            Sitemap::Urlset => urls.extend(locs),
        }
        Ok(())
    }
    .boxed_local()
}

fn decode(fetched: &Fetched) -> Result<String> {
    let gzipped = matches!(
        fetched.content_type.as_deref(),
        Some("application/x-gzip") | Some("application/gzip")
    ) || fetched.url.path().ends_with(".gz");

    if gzipped {
        let mut gz = GzDecoder::new(&fetched.body[..]);
        let mut page = String::new();
        gz.read_to_string(&mut page)?;
        Ok(page)
    } else {
        Ok(String::from_utf8_lossy(&fetched.body).into_owned())
    }
}

/// The kind of a sitemap document and its `<loc>` entries.
pub fn parse_sitemap(sitemap_xml: &str) -> Result<(Sitemap, Vec<String>)> {
    let package = parser::parse(sitemap_xml)?;
    let document = package.as_document();

    let kind = Sitemap::new(&document.root())?;

    let mut context = sxd_xpath::Context::new();
    context.set_namespace("sm", "http://www.sitemaps.org/schemas/sitemap/0.9");
    let xpath = XP_FACTORY
        .build("//sm:loc")?
        .ok_or_else(|| anyhow!("Missing XPath"))?;

    let locs = match xpath.evaluate(&context, document.root())? {
        sxd_xpath::Value::Nodeset(nodes) => nodes
            .document_order()
            .iter()
            .map(|node| node.string_value().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect(),
        _ => vec![],
    };

    Ok((kind, locs))
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::classify::{Classifier, ContentKind};
use crate::config::{CrawlerConfig, OnError};
use crate::fetch::{fetch_with_retries, Fetched, Fetcher, HttpFetcher};
use crate::frontier::Frontier;
use crate::knowledge::KnowledgeStore;
use crate::link::canonicalize;
use crate::sitemap;
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub enum Seed {
    Pages(Vec<String>),
    Sitemaps(Vec<String>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    /// Nodes fetched whose content was new or changed.
    pub processed: usize,
    /// Nodes fetched whose content matched the knowledge store.
    pub unchanged: usize,
    /// Discovered URLs left out because of the depth or page bounds.
    pub skipped: usize,
    /// Nodes that couldn't be fetched or stored.
    pub failed: usize,
}

impl CrawlSummary {
    pub fn fetched(&self) -> usize {
        self.processed + self.unchanged
    }
}

#[derive(Debug)]
pub struct Crawl {
    pub store: KnowledgeStore,
    pub summary: CrawlSummary,
}

/// Crawls from `seed_url` into `write_dir` with the default configuration over HTTP.
pub async fn crawl(seed_url: &str, write_dir: impl AsRef<Path>) -> Result<KnowledgeStore> {
    let config = CrawlerConfig::default();
    let fetcher = HttpFetcher::new(&config)?;
    let seed = Seed::Pages(vec![seed_url.to_string()]);
    let Crawl { store, .. } =
        crawl_site(&config, fetcher, &seed, write_dir, KnowledgeStore::new()).await?;
    Ok(store)
}

/// Runs a full crawl, starting from a possibly preloaded knowledge `store`.
pub async fn crawl_site<F>(
    config: &CrawlerConfig,
    fetcher: F,
    seed: &Seed,
    write_dir: impl AsRef<Path>,
    store: KnowledgeStore,
) -> Result<Crawl>
where
    F: Fetcher,
{
    let mut crawler = Crawler::new(config, fetcher, write_dir)?.with_knowledge(store);
    crawler.seed(seed).await?;
    crawler.run().await?;
    Ok(crawler.finish())
}

/// Sequential crawl engine: pulls one URL at a time from the frontier, classifies and
/// persists it, records it in the knowledge store and enqueues its in-scope neighbours.
pub struct Crawler<'a, F> {
    config: &'a CrawlerConfig,
    fetcher: F,
    classifier: Classifier,
    link_filter: Option<Regex>,
    hosts: HashSet<String>,
    storage: Storage,
    store: KnowledgeStore,
    frontier: Frontier,
    /// URLs left out for being beyond `max_depth`, counted once each.
    too_deep: HashSet<String>,
    summary: CrawlSummary,
}

impl<'a, F> Crawler<'a, F>
where
    F: Fetcher,
{
    pub fn new(
        config: &'a CrawlerConfig,
        fetcher: F,
        write_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let link_filter = config
            .link_filter
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| anyhow!("Invalid link filter: {e}"))?;

        let storage = Storage::new(write_dir.as_ref(), config.write);
        storage.prepare()?;

        Ok(Self {
            config,
            fetcher,
            classifier: Classifier::new(config.legal_markers.clone()),
            link_filter,
            hosts: HashSet::new(),
            storage,
            store: KnowledgeStore::new(),
            frontier: Frontier::new(),
            too_deep: HashSet::new(),
            summary: CrawlSummary::default(),
        })
    }

    /// Detects change against a knowledge store from a previous run.
    pub fn with_knowledge(mut self, store: KnowledgeStore) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn summary(&self) -> CrawlSummary {
        self.summary
    }

    /// Enqueues the seed pages, or the pages listed by the seed sitemaps, at depth 0.
    pub async fn seed(&mut self, seed: &Seed) -> Result<()> {
        let urls = match seed {
            Seed::Pages(urls) => urls.clone(),
            Seed::Sitemaps(sitemaps) => {
                let mut urls = vec![];
                for sm_url in sitemaps {
                    self.allow_host(sm_url);
                    match sitemap::gather_urls(&self.fetcher, sm_url).await {
                        Ok(found) => urls.extend(found),
                        Err(e) => match self.config.on_fetch_error {
                            OnError::SkipAndLog => {
                                log::warn!("Skipping sitemap: {sm_url} got: {e}")
                            }
                            OnError::Fail => return Err(e),
                        },
                    }
                }
                urls
            }
        };

        for url in urls {
            match canonicalize(&url) {
                Some(canonical) => {
                    self.allow_host(canonical.as_str());
                    self.frontier.push(canonical, 0);
                }
                None => log::warn!("Skipping seed: {url} is not an http(s) URL"),
            }
        }
        Ok(())
    }

    /// Processes the frontier until it is empty or the page bound is reached.
    pub async fn run(&mut self) -> Result<()> {
        let mut since_checkpoint = 0;

        while let Some((url, depth)) = self.frontier.pop() {
            if let Some(max_pages) = self.config.max_pages {
                if self.summary.fetched() + self.summary.failed >= max_pages {
                    self.summary.skipped += 1 + self.frontier.clear();
                    log::info!("Reached the bound of {max_pages} pages");
                    break;
                }
            }

            self.process(&url, depth).await?;

            since_checkpoint += 1;
            if let Some(every) = self.config.checkpoint_every {
                if self.config.write && every > 0 && since_checkpoint >= every {
                    since_checkpoint = 0;
                    match self.store.export(self.storage.root()) {
                        Ok(()) => log::info!("Checkpoint of {} entries", self.store.len()),
                        Err(e) => log::warn!("Couldn't write checkpoint: {e}"),
                    }
                }
            }
        }

        Ok(())
    }

    /// Exports the knowledge store when writing and hands back the results.
    pub fn finish(self) -> Crawl {
        if self.config.write {
            if let Err(e) = self.store.export(self.storage.root()) {
                log::error!("Couldn't export knowledge: {e}");
            }
        }
        let summary = self.summary;
        log::info!(
            "Crawl done: {} processed, {} unchanged, {} skipped, {} failed",
            summary.processed,
            summary.unchanged,
            summary.skipped,
            summary.failed
        );
        Crawl {
            store: self.store,
            summary,
        }
    }

    async fn process(&mut self, url: &str, depth: usize) -> Result<()> {
        let fetched = match fetch_with_retries(
            &self.fetcher,
            url,
            self.config.retries,
            self.config.retry_delay(),
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(e) => return self.node_failure(url, e.into(), self.config.on_fetch_error),
        };

        if let Some(target) = canonicalize(fetched.url.as_str()) {
            if target.as_str() != url {
                log::debug!("{url} redirected to {target}");
                // A seed moving to another host brings that host in scope.
                if depth == 0 {
                    self.allow_host(target.as_str());
                }
                self.frontier.mark_visited(target);
            }
        }

        let kind = self
            .classifier
            .classify(fetched.url.as_str(), fetched.content_type.as_deref());

        let location = match self.locate(url, kind, &fetched) {
            Ok(location) => location,
            Err(e) => return self.node_failure(url, e, self.config.on_storage_error),
        };

        let (_, changed) = self.store.upsert(url, &fetched.body, location);
        if changed {
            self.summary.processed += 1;
            log::info!("Processed {url} as {kind}");
        } else {
            self.summary.unchanged += 1;
            log::debug!("Unchanged {url}");
        }

        if !kind.yields_links() {
            return Ok(());
        }

        let links = fetched
            .outbound_links()
            .into_iter()
            .filter(|link| self.in_scope(link))
            .collect::<Vec<_>>();
        self.store.add_neighbours(url, links.iter().cloned())?;

        let follow = changed || self.config.revisit_unchanged;
        for link in links {
            if self.frontier.is_visited(&link) || (!follow && self.store.has(&link)) {
                continue;
            }
            if self.config.max_depth.map_or(false, |max| depth + 1 > max) {
                if self.too_deep.insert(link) {
                    self.summary.skipped += 1;
                }
                continue;
            }
            self.frontier.push(link, depth + 1);
        }

        Ok(())
    }

    /// Location of the content, written to disk unless it is already stored as is.
    fn locate(&mut self, url: &str, kind: ContentKind, fetched: &Fetched) -> Result<PathBuf> {
        match self.store.get(url) {
            Some(entry) if self.store.is_current(url, &fetched.body) => {
                Ok(entry.storage_location.clone())
            }
            _ => Ok(self.storage.persist(
                url,
                kind,
                fetched.content_type.as_deref(),
                &fetched.body,
            )?),
        }
    }

    fn node_failure(&mut self, url: &str, e: anyhow::Error, on_error: OnError) -> Result<()> {
        match on_error {
            OnError::SkipAndLog => {
                log::warn!("Skipping {url} got: {e}");
                self.summary.failed += 1;
                Ok(())
            }
            OnError::Fail => Err(e.context(format!("Couldn't process {url}"))),
        }
    }

    fn allow_host(&mut self, url: &str) {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(String::from));
        if let Some(host) = host {
            self.hosts.insert(host);
        }
    }

    fn in_scope(&self, link: &str) -> bool {
        if self.config.same_host {
            let host = Url::parse(link)
                .ok()
                .and_then(|u| u.host_str().map(String::from));
            if !host.map_or(false, |h| self.hosts.contains(&h)) {
                return false;
            }
        }
        self.link_filter
            .as_ref()
            .map_or(true, |filter| filter.is_match(link))
    }
}

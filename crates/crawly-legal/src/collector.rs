use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use crawly_crawler::{
    fetch_with_retries, ContentKind, CrawlSummary, CrawlerConfig, Fetched, Fetcher, Frontier,
    HttpFetcher, KnowledgeStore, OnError, Storage,
};

use crate::config::LegalConfig;
use crate::graph::LegalGraph;
use crate::sparql::SparqlEndpoint;

#[derive(Debug)]
pub struct Collection {
    pub store: KnowledgeStore,
    pub summary: CrawlSummary,
}

/// Collects `root_document_id` and everything it depends on into `write_dir`, with the
/// default configuration against the public endpoint.
pub async fn collect(
    root_document_id: &str,
    write_dir: impl AsRef<Path>,
) -> Result<KnowledgeStore> {
    let config = LegalConfig::default();
    let graph = SparqlEndpoint::new(&config)?;
    let fetcher = HttpFetcher::new(&fetcher_config(&config))?;
    let roots = [root_document_id.to_string()];
    let Collection { store, .. } =
        collect_corpus(&config, graph, fetcher, &roots, write_dir, KnowledgeStore::new()).await?;
    Ok(store)
}

/// Runs a full collection from `roots`, starting from a possibly preloaded knowledge `store`.
pub async fn collect_corpus<G, F>(
    config: &LegalConfig,
    graph: G,
    fetcher: F,
    roots: &[String],
    write_dir: impl AsRef<Path>,
    store: KnowledgeStore,
) -> Result<Collection>
where
    G: LegalGraph,
    F: Fetcher,
{
    let mut collector =
        Collector::new(config, graph, fetcher, write_dir)?.with_knowledge(store);
    for root in roots {
        collector.add_root(root);
    }
    collector.run().await?;
    Ok(collector.finish())
}

/// Settings for downloading legal texts with [`HttpFetcher`].
pub fn fetcher_config(config: &LegalConfig) -> CrawlerConfig {
    CrawlerConfig {
        user_agent: config.user_agent.clone(),
        timeout_secs: config.timeout_secs,
        ..Default::default()
    }
}

/// Walks the dependency relations of legal documents, one document at a time.
///
/// Documents are keyed by their identifier in the graph, their text is stored as a
/// legal document and their related documents become their neighbours.
pub struct Collector<'a, G, F> {
    config: &'a LegalConfig,
    graph: G,
    fetcher: F,
    storage: Storage,
    store: KnowledgeStore,
    frontier: Frontier,
    summary: CrawlSummary,
}

impl<'a, G, F> Collector<'a, G, F>
where
    G: LegalGraph,
    F: Fetcher,
{
    pub fn new(
        config: &'a LegalConfig,
        graph: G,
        fetcher: F,
        write_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let storage = Storage::new(write_dir.as_ref(), config.write);
        storage.prepare()?;

        Ok(Self {
            config,
            graph,
            fetcher,
            storage,
            store: KnowledgeStore::new(),
            frontier: Frontier::new(),
            summary: CrawlSummary::default(),
        })
    }

    pub fn with_knowledge(mut self, store: KnowledgeStore) -> Self {
        self.store = store;
        self
    }

    pub fn add_root(&mut self, document: &str) {
        self.frontier.push(document.trim(), 0);
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub async fn run(&mut self) -> Result<()> {
        while let Some((document, depth)) = self.frontier.pop() {
            if let Some(max) = self.config.max_documents {
                if self.summary.fetched() + self.summary.failed >= max {
                    self.summary.skipped += 1 + self.frontier.clear();
                    log::info!("Reached the bound of {max} documents");
                    break;
                }
            }
            self.process(&document, depth).await?;
        }
        Ok(())
    }

    pub fn finish(self) -> Collection {
        if self.config.write {
            if let Err(e) = self.store.export(self.storage.root()) {
                log::error!("Couldn't export knowledge: {e}");
            }
        }
        let summary = self.summary;
        log::info!(
            "Collection done: {} processed, {} unchanged, {} skipped, {} failed",
            summary.processed,
            summary.unchanged,
            summary.skipped,
            summary.failed
        );
        Collection {
            store: self.store,
            summary,
        }
    }

    async fn process(&mut self, document: &str, depth: usize) -> Result<()> {
        let node = match self.graph.describe(document).await {
            Ok(node) => node,
            Err(e) => return self.node_failure(document, e.into(), self.config.on_query_error),
        };

        let Some(resource) = node.resource else {
            let e = anyhow!("No applicable XML text in {}", self.config.language);
            return self.node_failure(document, e, self.config.on_query_error);
        };

        let fetched = match fetch_with_retries(
            &self.fetcher,
            &resource,
            self.config.retries,
            self.config.retry_delay(),
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(e) => return self.node_failure(document, e.into(), self.config.on_fetch_error),
        };

        let location = match self.locate(document, &fetched) {
            Ok(location) => location,
            Err(e) => return self.node_failure(document, e, self.config.on_storage_error),
        };

        let (_, changed) = self.store.upsert(document, &fetched.body, location);
        if changed {
            self.summary.processed += 1;
            log::info!("Processed {document} from {resource}");
        } else {
            self.summary.unchanged += 1;
            log::debug!("Unchanged {document}");
        }

        self.store.add_neighbours(document, node.related.iter().cloned())?;

        for related in node.related {
            if self.frontier.is_visited(&related) || (!changed && self.store.has(&related)) {
                continue;
            }
            self.frontier.push(related, depth + 1);
        }
        Ok(())
    }

    fn locate(&mut self, document: &str, fetched: &Fetched) -> Result<PathBuf> {
        match self.store.get(document) {
            Some(entry) if self.store.is_current(document, &fetched.body) => {
                Ok(entry.storage_location.clone())
            }
            _ => Ok(self.storage.persist(
                document,
                ContentKind::LegalDocument,
                fetched.content_type.as_deref(),
                &fetched.body,
            )?),
        }
    }

    fn node_failure(&mut self, document: &str, e: anyhow::Error, on_error: OnError) -> Result<()> {
        match on_error {
            OnError::SkipAndLog => {
                log::warn!("Skipping {document} got: {e}");
                self.summary.failed += 1;
                Ok(())
            }
            OnError::Fail => Err(e.context(format!("Couldn't collect {document}"))),
        }
    }
}

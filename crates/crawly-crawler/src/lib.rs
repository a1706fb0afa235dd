mod classify;
mod config;
mod crawler;
mod fetch;
mod frontier;
mod knowledge;
mod link;
mod sitemap;
mod storage;

pub use classify::{Classifier, ContentKind};
pub use config::{deserialize_delay_secs, CrawlerConfig, OnError};
pub use crawler::{crawl, crawl_site, Crawl, CrawlSummary, Crawler, Seed};
pub use fetch::{fetch_with_retries, FetchError, Fetched, Fetcher, HttpFetcher};
pub use frontier::Frontier;
pub use knowledge::{
    content_digest, KnowledgeEntry, KnowledgeError, KnowledgeStore, KNOWLEDGE_FILE,
    LINK_GRAPH_FILE, OVERVIEW_DIR,
};
pub use link::{canonicalize, extract_links, resolve};
pub use sitemap::{gather_urls, parse_sitemap, Sitemap};
pub use storage::{file_name_for, Storage, StorageError};

pub use anyhow;

use std::cell::RefCell;
use std::collections::HashMap;

use crawly_crawler::{
    crawl_site, CrawlSummary, Crawler, CrawlerConfig, FetchError, Fetched, Fetcher,
    KnowledgeStore, OnError, Seed, KNOWLEDGE_FILE, OVERVIEW_DIR,
};
use url::Url;

#[derive(Default)]
struct StaticSite {
    pages: HashMap<String, (&'static str, Vec<u8>)>,
    redirects: HashMap<String, String>,
    hits: RefCell<Vec<String>>,
}

impl StaticSite {
    fn page(mut self, url: &str, content_type: &'static str, body: &str) -> Self {
        self.pages
            .insert(url.to_string(), (content_type, body.as_bytes().to_vec()));
        self
    }

    fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.borrow().iter().filter(|hit| *hit == url).count()
    }
}

impl Fetcher for StaticSite {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        self.hits.borrow_mut().push(url.to_string());
        let location = self.redirects.get(url).map_or(url, String::as_str);
        let (content_type, body) = self
            .pages
            .get(location)
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        Ok(Fetched::new(
            Url::parse(location).unwrap(),
            Some(content_type.to_string()),
            body.clone(),
        ))
    }
}

const HOME: &str = "https://example.com/de/home.html";
const REPORT: &str = "https://example.com/de/report.pdf";
const ABOUT: &str = "https://example.com/de/about";

fn config() -> CrawlerConfig {
    CrawlerConfig {
        retries: 0,
        ..Default::default()
    }
}

fn pages(urls: &[&str]) -> Seed {
    Seed::Pages(urls.iter().map(|u| u.to_string()).collect())
}

#[tokio::test]
async fn self_link_and_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::default()
        .page(
            HOME,
            "text/html",
            r#"<a href="report.pdf">Report</a> <a href="home.html">Home</a>
               <a href="/de/report.pdf#page=2">Report again</a>"#,
        )
        .page(REPORT, "application/pdf", "%PDF-1.4");

    let crawl = crawl_site(&config(), &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    assert_eq!(crawl.store.len(), 2);
    let home = crawl.store.get(HOME).unwrap();
    assert_eq!(home.neighbours.iter().filter(|n| *n == REPORT).count(), 1);
    assert_eq!(site.hits(HOME), 1);
    assert_eq!(site.hits(REPORT), 1);

    let report = crawl.store.get(REPORT).unwrap();
    assert!(report.neighbours.is_empty());
    assert!(report.storage_location.starts_with(dir.path().join("pdf")));
    assert_eq!(std::fs::read(&report.storage_location).unwrap(), b"%PDF-1.4");
    assert!(home.storage_location.starts_with(dir.path().join("html")));

    assert_eq!(
        crawl.summary,
        CrawlSummary {
            processed: 2,
            ..Default::default()
        }
    );
    assert!(dir
        .path()
        .join(OVERVIEW_DIR)
        .join("knowledge_base.json")
        .is_file());
}

#[tokio::test]
async fn cycles_are_visited_once() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::default()
        .page(HOME, "text/html", r#"<a href="about">About</a>"#)
        .page(ABOUT, "text/html", r#"<a href="home.html">Home</a>"#);

    let crawl = crawl_site(&config(), &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    assert_eq!(crawl.store.len(), 2);
    assert_eq!(site.hits(HOME), 1);
    assert_eq!(site.hits(ABOUT), 1);
    assert_eq!(crawl.store.get(ABOUT).unwrap().neighbours, vec![HOME]);
}

#[tokio::test]
async fn failures_are_node_local() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::default()
        .page(
            HOME,
            "text/html",
            r#"<a href="missing.pdf">Gone</a> <a href="report.pdf">Report</a>"#,
        )
        .page(REPORT, "application/pdf", "%PDF");

    let crawl = crawl_site(&config(), &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    assert_eq!(crawl.store.len(), 2);
    assert!(!crawl.store.has("https://example.com/de/missing.pdf"));
    assert_eq!(crawl.summary.failed, 1);
    assert_eq!(crawl.summary.processed, 2);

    let failing = CrawlerConfig {
        on_fetch_error: OnError::Fail,
        ..config()
    };
    let res = crawl_site(&failing, &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new()).await;
    assert!(res.is_err());
}

#[tokio::test]
async fn unknown_content_is_stored_as_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::default()
        .page(HOME, "text/html", r#"<a href="data.xyz">Data</a>"#)
        .page(
            "https://example.com/de/data.xyz",
            "application/octet-stream",
            r#"<a href="never.html">not followed</a>"#,
        );

    let crawl = crawl_site(&config(), &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    let data = crawl.store.get("https://example.com/de/data.xyz").unwrap();
    assert!(data.neighbours.is_empty());
    assert!(data.storage_location.starts_with(dir.path().join("else")));
    assert_eq!(site.hits("https://example.com/de/never.html"), 0);
}

#[tokio::test]
async fn scope_and_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::default()
        .page(
            HOME,
            "text/html",
            r#"<a href="https://elsewhere.org/x.pdf">External</a>
               <a href="/fr/accueil.html">French</a>
               <a href="about">About</a>"#,
        )
        .page(ABOUT, "text/html", r#"<a href="report.pdf">Report</a>"#)
        .page(REPORT, "application/pdf", "%PDF");

    let conf = CrawlerConfig {
        link_filter: Some("/de/".into()),
        max_depth: Some(1),
        write: false,
        ..config()
    };
    let crawl = crawl_site(&conf, &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    assert_eq!(crawl.store.get(HOME).unwrap().neighbours, vec![ABOUT]);
    assert!(crawl.store.has(ABOUT));
    assert!(!crawl.store.has(REPORT));
    assert_eq!(crawl.summary.skipped, 1);
    assert_eq!(site.hits("https://elsewhere.org/x.pdf"), 0);
    assert!(!dir.path().join("html").exists());

    let conf = CrawlerConfig {
        max_pages: Some(1),
        write: false,
        ..config()
    };
    let crawl = crawl_site(&conf, &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();
    assert_eq!(crawl.store.len(), 1);
    assert_eq!(crawl.summary.skipped, 2);
}

#[tokio::test]
async fn revisit_detects_change() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::default()
        .page(HOME, "text/html", r#"<a href="report.pdf">Report</a>"#)
        .page(REPORT, "application/pdf", "%PDF v1");

    let first = crawl_site(&config(), &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    // Same content: nothing below the seed is fetched again.
    let second = crawl_site(&config(), &site, &pages(&[HOME]), dir.path(), first.store.clone())
        .await
        .unwrap();
    assert_eq!(second.store, first.store);
    assert_eq!(second.summary.unchanged, 1);
    assert_eq!(second.summary.processed, 0);
    assert_eq!(site.hits(REPORT), 1);

    // Changed seed: neighbours are traversed again and the new PDF is picked up.
    let site = site
        .page(HOME, "text/html", r#"<a href="report.pdf">New report</a>"#)
        .page(REPORT, "application/pdf", "%PDF v2");
    let third = crawl_site(&config(), &site, &pages(&[HOME]), dir.path(), second.store)
        .await
        .unwrap();
    assert_eq!(third.summary.processed, 2);
    let report = third.store.get(REPORT).unwrap();
    assert_ne!(report.hash, first.store.get(REPORT).unwrap().hash);
    assert_eq!(std::fs::read(&report.storage_location).unwrap(), b"%PDF v2");
}

#[tokio::test]
async fn seed_redirect_to_other_host_is_followed() {
    let dir = tempfile::tempdir().unwrap();
    let root = "https://example.com/";
    let site = StaticSite::default()
        .redirect(root, "https://www.example.com/de/home.html")
        .page(
            "https://www.example.com/de/home.html",
            "text/html",
            r#"<a href="report.pdf">Report</a> <a href="home.html">Home</a>"#,
        )
        .page("https://www.example.com/de/report.pdf", "application/pdf", "%PDF");

    let crawl = crawl_site(&config(), &site, &pages(&[root]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    assert_eq!(crawl.store.len(), 2);
    assert_eq!(
        crawl.store.get(root).unwrap().neighbours,
        vec![
            "https://www.example.com/de/report.pdf",
            "https://www.example.com/de/home.html"
        ]
    );
    assert_eq!(site.hits("https://www.example.com/de/report.pdf"), 1);
    // The redirect target counts as visited.
    assert_eq!(site.hits("https://www.example.com/de/home.html"), 0);
}

#[tokio::test]
async fn checkpoints_export_during_run() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::default()
        .page(HOME, "text/html", r#"<a href="report.pdf">Report</a>"#)
        .page(REPORT, "application/pdf", "%PDF");
    let knowledge = dir.path().join(OVERVIEW_DIR).join(KNOWLEDGE_FILE);

    let conf = CrawlerConfig {
        checkpoint_every: Some(1),
        ..config()
    };
    let mut crawler = Crawler::new(&conf, &site, dir.path()).unwrap();
    crawler.seed(&pages(&[HOME])).await.unwrap();
    crawler.run().await.unwrap();
    let checkpoint = KnowledgeStore::load(&knowledge).unwrap();
    assert_eq!(checkpoint.len(), 2);
    assert_eq!(&checkpoint, crawler.store());

    // Disabled checkpoints and dry runs leave the export to the end of the run.
    for conf in [
        CrawlerConfig {
            checkpoint_every: None,
            ..config()
        },
        CrawlerConfig {
            checkpoint_every: Some(0),
            ..config()
        },
    ] {
        let dir = tempfile::tempdir().unwrap();
        let knowledge = dir.path().join(OVERVIEW_DIR).join(KNOWLEDGE_FILE);
        let mut crawler = Crawler::new(&conf, &site, dir.path()).unwrap();
        crawler.seed(&pages(&[HOME])).await.unwrap();
        crawler.run().await.unwrap();
        assert!(!knowledge.exists());
        crawler.finish();
        assert!(knowledge.is_file());
    }

    let dry = CrawlerConfig {
        checkpoint_every: Some(1),
        write: false,
        ..config()
    };
    let out = dir.path().join("dry");
    let mut crawler = Crawler::new(&dry, &site, &out).unwrap();
    crawler.seed(&pages(&[HOME])).await.unwrap();
    crawler.run().await.unwrap();
    assert!(!out.exists());
}

#[tokio::test]
async fn sitemap_seeds() {
    let dir = tempfile::tempdir().unwrap();
    let sitemap = "https://cdn.example.com/sitemap.xml";
    let missing = "https://cdn.example.com/missing.xml";
    let site = StaticSite::default()
        .page(
            sitemap,
            "application/xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc> https://example.com/de/home.html#top </loc></url>
  <url><loc>https://example.com/de/report.pdf</loc></url>
  <url><loc>ftp://example.com/de/old.zip</loc></url>
</urlset>"#,
        )
        .page(
            HOME,
            "text/html",
            r#"<a href="https://cdn.example.com/de/guide.pdf">Guide</a>"#,
        )
        .page(REPORT, "application/pdf", "%PDF")
        .page("https://cdn.example.com/de/guide.pdf", "application/pdf", "%PDF guide");
    let seed = Seed::Sitemaps(vec![sitemap.to_string(), missing.to_string()]);

    let crawl = crawl_site(&config(), &site, &seed, dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    assert_eq!(crawl.store.len(), 3);
    assert!(crawl.store.has(HOME));
    assert!(crawl.store.has(REPORT));
    // The sitemap host is in scope too.
    assert!(crawl.store.has("https://cdn.example.com/de/guide.pdf"));
    assert_eq!(site.hits(missing), 1);
    assert_eq!(crawl.summary.processed, 3);
    assert_eq!(crawl.summary.failed, 0);

    let failing = CrawlerConfig {
        on_fetch_error: OnError::Fail,
        ..config()
    };
    let res = crawl_site(&failing, &site, &seed, dir.path(), KnowledgeStore::new()).await;
    assert!(res.is_err());
    assert_eq!(site.hits(HOME), 1);
}

#[tokio::test]
async fn skipped_urls_are_counted_once() {
    let dir = tempfile::tempdir().unwrap();
    let contact = "https://example.com/de/contact";
    let site = StaticSite::default()
        .page(HOME, "text/html", r#"<a href="about">About</a> <a href="contact">Contact</a>"#)
        .page(ABOUT, "text/html", r#"<a href="report.pdf">Report</a>"#)
        .page(contact, "text/html", r#"<a href="report.pdf">Report</a>"#)
        .page(REPORT, "application/pdf", "%PDF");

    let conf = CrawlerConfig {
        max_depth: Some(1),
        write: false,
        ..config()
    };
    let crawl = crawl_site(&conf, &site, &pages(&[HOME]), dir.path(), KnowledgeStore::new())
        .await
        .unwrap();

    assert_eq!(crawl.store.len(), 3);
    assert_eq!(crawl.summary.skipped, 1);
    assert_eq!(site.hits(REPORT), 0);
}

use std::fs::File;
use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use crawly_crawler::{crawl_site, CrawlerConfig, HttpFetcher, KnowledgeStore, OnError, Seed};
use crawly_legal::{collect_corpus, fetcher_config, LegalConfig, LegalRelation, SparqlEndpoint};
use tokio::runtime;

/// Crawls a site or a legal corpus into a local knowledge base
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "crawl")]
    Crawl(CrawlArgs),
    #[command(name = "legal")]
    Legal(LegalArgs),
    #[command(hide = true)]
    Completion,
}

/// Crawl a site from seed pages or sitemaps and store every document found
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("start").required(true))]
pub struct CrawlArgs {
    /// Directory receiving the documents and the knowledge export
    #[arg(long, short)]
    pub write_dir: PathBuf,
    /// Page to start crawling from
    #[arg(long, group = "start")]
    pub seed: Vec<String>,
    /// Sitemap listing the pages to start crawling from
    #[arg(long, group = "start")]
    pub sitemap: Vec<String>,
    /// Optional crawler yaml configuration file
    #[arg(env = "CRAWLY_CONFIG", long)]
    pub config: Option<PathBuf>,
    /// Knowledge export of a previous run, to detect changed documents
    #[arg(long)]
    pub knowledge: Option<PathBuf>,
    /// Override crawler's user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override crawler's link filter regex
    #[arg(long)]
    pub link_filter: Option<String>,
    /// Override crawler's maximum link depth from the seeds
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Override crawler's maximum number of fetched pages
    #[arg(long)]
    pub max_pages: Option<usize>,
    /// Override crawler's number of retries of a failed download
    #[arg(long)]
    pub retries: Option<usize>,
    /// Also follow links to other hosts
    #[arg(long)]
    pub any_host: bool,
    /// Traverse neighbours of unchanged pages again
    #[arg(long)]
    pub revisit_unchanged: bool,
    /// Record the knowledge without writing anything to disk
    #[arg(long)]
    pub dry_run: bool,
    /// Override crawler's download error handling strategy
    #[arg(value_enum, long)]
    pub on_fetch_error: Option<OnError>,
    /// Override crawler's storage error handling strategy
    #[arg(value_enum, long)]
    pub on_storage_error: Option<OnError>,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(file) = args.config.as_ref().map(File::open) {
            serde_yaml::from_reader(file?)?
        } else {
            CrawlerConfig::default()
        };
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(link_filter) = &args.link_filter {
            conf.link_filter = Some(link_filter.to_string());
        }
        if let Some(max_depth) = args.max_depth {
            conf.max_depth = Some(max_depth);
        }
        if let Some(max_pages) = args.max_pages {
            conf.max_pages = Some(max_pages);
        }
        if let Some(retries) = args.retries {
            conf.retries = retries;
        }
        if args.any_host {
            conf.same_host = false;
        }
        if args.revisit_unchanged {
            conf.revisit_unchanged = true;
        }
        if args.dry_run {
            conf.write = false;
        }
        if let Some(on_fetch_error) = args.on_fetch_error {
            conf.on_fetch_error = on_fetch_error;
        }
        if let Some(on_storage_error) = args.on_storage_error {
            conf.on_storage_error = on_storage_error;
        }
        Ok(conf)
    }
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let conf: CrawlerConfig = (&args).try_into()?;
    let store = load_knowledge(args.knowledge.as_ref())?;
    let seed = if args.sitemap.is_empty() {
        Seed::Pages(args.seed)
    } else {
        Seed::Sitemaps(args.sitemap)
    };

    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async {
        let fetcher = HttpFetcher::new(&conf)?;
        crawl_site(&conf, fetcher, &seed, &args.write_dir, store).await
    })?;
    Ok(())
}

/// Collect legal documents and the documents they depend on from a SPARQL endpoint
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("start").required(true))]
pub struct LegalArgs {
    /// Directory receiving the documents and the knowledge export
    #[arg(long, short)]
    pub write_dir: PathBuf,
    /// Identifier of a document to start collecting from
    #[arg(long, group = "start")]
    pub root: Vec<String>,
    /// Start from every document currently in force
    #[arg(long, group = "start")]
    pub all: bool,
    /// Optional legal collector yaml configuration file
    #[arg(env = "CRAWLY_LEGAL_CONFIG", long)]
    pub config: Option<PathBuf>,
    /// Knowledge export of a previous run, to detect changed documents
    #[arg(long)]
    pub knowledge: Option<PathBuf>,
    /// Override collector's SPARQL endpoint
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Override collector's document language, e.g. DEU or FRA
    #[arg(long)]
    pub language: Option<String>,
    /// Override collector's relations to follow
    #[arg(value_enum, long)]
    pub relation: Vec<LegalRelation>,
    /// Override collector's maximum number of fetched documents
    #[arg(long)]
    pub max_documents: Option<usize>,
    /// Record the knowledge without writing anything to disk
    #[arg(long)]
    pub dry_run: bool,
    /// Override collector's query error handling strategy
    #[arg(value_enum, long)]
    pub on_query_error: Option<OnError>,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&LegalArgs> for LegalConfig {
    type Error = anyhow::Error;

    fn try_from(args: &LegalArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(file) = args.config.as_ref().map(File::open) {
            serde_yaml::from_reader(file?)?
        } else {
            LegalConfig::default()
        };
        if let Some(endpoint) = &args.endpoint {
            conf.endpoint = endpoint.to_string();
        }
        if let Some(language) = &args.language {
            conf.language = language.to_string();
        }
        if !args.relation.is_empty() {
            conf.relations = args.relation.clone();
        }
        if let Some(max_documents) = args.max_documents {
            conf.max_documents = Some(max_documents);
        }
        if args.dry_run {
            conf.write = false;
        }
        if let Some(on_query_error) = args.on_query_error {
            conf.on_query_error = on_query_error;
        }
        Ok(conf)
    }
}

pub fn legal(args: LegalArgs) -> anyhow::Result<()> {
    let conf: LegalConfig = (&args).try_into()?;
    let store = load_knowledge(args.knowledge.as_ref())?;

    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async {
        let graph = SparqlEndpoint::new(&conf)?;
        let fetcher = HttpFetcher::new(&fetcher_config(&conf))?;

        let roots = if args.all {
            let docs = graph.in_force_documents().await?;
            log::info!("Found {} documents in force", docs.len());
            docs.into_iter().map(|doc| doc.uri).collect()
        } else {
            args.root.clone()
        };

        collect_corpus(&conf, &graph, fetcher, &roots, &args.write_dir, store).await
    })?;
    Ok(())
}

fn load_knowledge(path: Option<&PathBuf>) -> anyhow::Result<KnowledgeStore> {
    match path {
        Some(path) => {
            let store = KnowledgeStore::load(path)?;
            log::info!("Loaded {} known documents from {}", store.len(), path.display());
            Ok(store)
        }
        None => Ok(KnowledgeStore::new()),
    }
}

fn init_logger(quiet: bool) {
    if !quiet {
        let env = env_logger::Env::default()
            .default_filter_or("crawly=info,crawly_crawler=info,crawly_legal=info");
        env_logger::Builder::from_env(env).init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            init_logger(args.quiet);
            crawl(args)
        }
        SubCommand::Legal(args) => {
            init_logger(args.quiet);
            legal(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "crawly", &mut io::stdout());
            Ok(())
        }
    }
}

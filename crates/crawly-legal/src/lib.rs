mod collector;
mod config;
mod graph;
mod sparql;

pub use collector::{collect, collect_corpus, fetcher_config, Collection, Collector};
pub use config::{LegalConfig, LegalRelation};
pub use graph::{LegalGraph, LegalNode, QueryError};
pub use sparql::{parse_results, InForceDocument, Solution, SparqlEndpoint};

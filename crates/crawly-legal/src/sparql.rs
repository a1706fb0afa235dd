use std::collections::HashMap;

use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::config::{LegalConfig, LegalRelation};
use crate::graph::{LegalGraph, LegalNode, QueryError};

const RESULTS_FORMAT: &str = "application/sparql-results+json";

const PREFIXES: &str = r#"
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX jolux: <http://data.legilux.public.lu/resource/ontology/jolux#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
"#;

// Latest applicable consolidation of a document, as XML in the wanted language.
const RESOURCE_QUERY: &str = r#"
SELECT ?resource ?date WHERE {
    ?consolidation jolux:isMemberOf <{document}> ;
                   jolux:dateApplicability ?date ;
                   jolux:isRealizedBy ?expression .
    ?expression jolux:language <{language}> ;
                jolux:isEmbodiedBy ?manifestation .
    ?manifestation jolux:userFormat <https://fedlex.data.admin.ch/vocabulary/user-format/xml> ;
                   jolux:isExemplifiedBy ?resource .
    FILTER( xsd:date(?date) <= xsd:date(now()) )
}
ORDER BY DESC(?date)
LIMIT 1
"#;

const CITES_QUERY: &str = r#"
SELECT DISTINCT ?related WHERE {
    ?consolidation jolux:isMemberOf <{document}> .
    ?subdivision jolux:legalResourceSubdivisionIsPartOf ?consolidation .
    ?citation jolux:citationFromLegalResource ?subdivision ;
              jolux:language <{language}> ;
              jolux:citationToLegalResource/jolux:legalResourceSubdivisionIsPartOf ?related .
    ?related rdf:type jolux:ConsolidationAbstract ;
             jolux:dateEntryInForce ?inForce .
    FILTER( xsd:date(?inForce) <= xsd:date(now()) )
    OPTIONAL { ?related jolux:dateNoLongerInForce ?repealed . }
    FILTER( !bound(?repealed) || xsd:date(?repealed) >= xsd:date(now()) )
}
"#;

const CITED_BY_QUERY: &str = r#"
SELECT DISTINCT ?related WHERE {
    ?subdivision jolux:legalResourceSubdivisionIsPartOf <{document}> .
    ?citation jolux:citationToLegalResource ?subdivision ;
              jolux:language <{language}> ;
              jolux:citationFromLegalResource/jolux:legalResourceSubdivisionIsPartOf/jolux:isMemberOf ?related .
    ?related rdf:type jolux:ConsolidationAbstract ;
             jolux:dateEntryInForce ?inForce .
    FILTER( xsd:date(?inForce) <= xsd:date(now()) )
    OPTIONAL { ?related jolux:dateNoLongerInForce ?repealed . }
    FILTER( !bound(?repealed) || xsd:date(?repealed) >= xsd:date(now()) )
}
"#;

const IN_FORCE_QUERY: &str = r#"
SELECT DISTINCT ?uri ?srNumber ?title ?abbreviation WHERE {
    ?uri rdf:type jolux:ConsolidationAbstract ;
         jolux:classifiedByTaxonomyEntry ?entry ;
         jolux:isRealizedBy ?expression ;
         jolux:dateEntryInForce ?inForce .
    ?entry skos:notation ?srNumber .
    ?expression jolux:language <{language}> ;
                jolux:title ?title .
    OPTIONAL { ?expression jolux:titleShort ?abbreviation . }
    FILTER( xsd:date(?inForce) <= xsd:date(now()) )
    OPTIONAL { ?uri jolux:dateNoLongerInForce ?repealed . }
    FILTER( !bound(?repealed) || xsd:date(?repealed) >= xsd:date(now()) )
}
"#;

/// One solution of a SELECT query: variable name to bound value.
pub type Solution = HashMap<String, String>;

#[derive(Debug, Deserialize)]
struct SparqlResults {
    results: Bindings,
}

#[derive(Debug, Deserialize)]
struct Bindings {
    bindings: Vec<HashMap<String, Term>>,
}

#[derive(Debug, Deserialize)]
struct Term {
    value: String,
}

/// Parses a `application/sparql-results+json` document.
///
/// Values have their non-breaking spaces removed.
pub fn parse_results(body: &[u8]) -> Result<Vec<Solution>, QueryError> {
    let results: SparqlResults =
        serde_json::from_slice(body).map_err(|e| QueryError::Malformed(e.to_string()))?;

    Ok(results
        .results
        .bindings
        .into_iter()
        .map(|binding| {
            binding
                .into_iter()
                .map(|(var, term)| (var, term.value.replace('\u{a0}', "")))
                .collect()
        })
        .collect())
}

/// A consolidated legal text currently in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InForceDocument {
    pub uri: String,
    /// Number in the classified compilation.
    pub sr_number: String,
    pub title: String,
    pub abbreviation: Option<String>,
}

/// JoLux graph served by a SPARQL endpoint.
#[derive(Debug, Clone)]
pub struct SparqlEndpoint {
    client: reqwest::Client,
    endpoint: String,
    user_agent: String,
    language: String,
    relations: Vec<LegalRelation>,
}

impl SparqlEndpoint {
    pub fn new(config: &LegalConfig) -> anyhow::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .gzip(true)
            .deflate(true)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            user_agent: config.user_agent.clone(),
            language: config.language_iri(),
            relations: config.relations.clone(),
        })
    }

    /// Runs a SELECT `query`, the common prefixes are prepended.
    pub async fn select(&self, query: &str) -> Result<Vec<Solution>, QueryError> {
        let transport = |source| QueryError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        };
        let query = format!("{PREFIXES}{query}");

        let resp = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, RESULTS_FORMAT)
            .header(USER_AGENT, &self.user_agent)
            .form(&[("query", query.as_str())])
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                endpoint: self.endpoint.clone(),
                status,
            });
        }

        let body = resp.bytes().await.map_err(transport)?;
        parse_results(&body)
    }

    /// Location of the latest applicable XML text of `document`.
    pub async fn resource_of(&self, document: &str) -> Result<Option<String>, QueryError> {
        let query = self.render(RESOURCE_QUERY, document)?;
        let mut solutions = self.select(&query).await?;
        Ok(solutions
            .first_mut()
            .and_then(|solution| solution.remove("resource")))
    }

    /// Documents related to `document` along `relation`.
    pub async fn related(
        &self,
        document: &str,
        relation: LegalRelation,
    ) -> Result<Vec<String>, QueryError> {
        let template = match relation {
            LegalRelation::Cites => CITES_QUERY,
            LegalRelation::CitedBy => CITED_BY_QUERY,
        };
        let query = self.render(template, document)?;
        let solutions = self.select(&query).await?;

        let mut related = vec![];
        for mut solution in solutions {
            let doc = solution
                .remove("related")
                .ok_or_else(|| QueryError::Malformed("missing ?related binding".into()))?;
            if doc != document && !related.contains(&doc) {
                related.push(doc);
            }
        }
        Ok(related)
    }

    /// Every consolidation in force in the configured language.
    pub async fn in_force_documents(&self) -> Result<Vec<InForceDocument>, QueryError> {
        let query = IN_FORCE_QUERY.replace("{language}", &self.language);
        let solutions = self.select(&query).await?;

        solutions
            .into_iter()
            .map(|mut solution| {
                let mut take = |var: &str| {
                    solution
                        .remove(var)
                        .ok_or_else(|| QueryError::Malformed(format!("missing ?{var} binding")))
                };
                Ok(InForceDocument {
                    uri: take("uri")?,
                    sr_number: take("srNumber")?,
                    title: take("title")?,
                    abbreviation: take("abbreviation").ok(),
                })
            })
            .collect()
    }

    fn render(&self, template: &str, document: &str) -> Result<String, QueryError> {
        let is_iri = url::Url::parse(document).is_ok()
            && !document
                .chars()
                .any(|c| c.is_whitespace() || "<>\"{}|^`\\".contains(c));
        if !is_iri {
            return Err(QueryError::InvalidDocument(document.to_string()));
        }
        Ok(template
            .replace("{document}", document)
            .replace("{language}", &self.language))
    }
}

impl LegalGraph for SparqlEndpoint {
    async fn describe(&self, document: &str) -> Result<LegalNode, QueryError> {
        let resource = self.resource_of(document).await?;

        let mut related: Vec<String> = vec![];
        for relation in &self.relations {
            for doc in self.related(document, *relation).await? {
                if !related.contains(&doc) {
                    related.push(doc);
                }
            }
        }

        Ok(LegalNode { resource, related })
    }
}

//! Career discovery against the Wikidata SPARQL endpoint.
//!
//! Discovery enumerates items that are an instance of one of the cached
//! career classes and have an English Wikipedia article. A single query over
//! every class times out the endpoint, so classes are sent in batches of
//! [`CLASS_BATCH_SIZE`] and the merged bindings are deduplicated by item id.

use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use careers_core::{
  career::{is_entity_id, NewCareer, WikidataId},
  category::{category_for_class, BASE_CLASSES},
};

use crate::{Error, Result};

pub const DEFAULT_SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";

/// Classes per discovery query.
pub const CLASS_BATCH_SIZE: usize = 50;

/// Hierarchies left out of the class cache: automobile manufacturer, city.
pub const EXCLUDED_CLASSES: [&str; 2] = ["Q786820", "Q515"];

// ─── Class cache ─────────────────────────────────────────────────────────────

/// On-disk cache of every class whose instances count as careers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerClassCache {
  #[serde(default)]
  pub generated:    String,
  #[serde(default)]
  pub description:  String,
  #[serde(default)]
  pub excluded:     Vec<String>,
  #[serde(default)]
  pub base_classes: Vec<String>,
  pub classes:      Vec<String>,
}

impl CareerClassCache {
  pub async fn write(&self, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(self)?;
    tokio::fs::write(path, json).await?;
    Ok(())
  }
}

/// Read the class list from `path`.
///
/// A missing file falls back to [`BASE_CLASSES`]; a file that exists but does
/// not parse is an error.
pub async fn load_career_classes(path: &Path) -> Result<Vec<String>> {
  let text = match tokio::fs::read_to_string(path).await {
    Ok(text) => text,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      tracing::warn!(path = %path.display(), "career class cache not found, using base classes");
      tracing::warn!("run `careers refresh-classes` to generate it");
      return Ok(BASE_CLASSES.iter().map(|c| (*c).to_owned()).collect());
    }
    Err(e) => return Err(e.into()),
  };

  let cache: CareerClassCache = serde_json::from_str(&text)
    .map_err(|source| Error::ClassCache { path: PathBuf::from(path), source })?;
  Ok(cache.classes)
}

// ─── SPARQL wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SparqlResponse {
  #[serde(default)]
  pub results: SparqlResults,
}

#[derive(Debug, Default, Deserialize)]
pub struct SparqlResults {
  #[serde(default)]
  pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SparqlValue {
  pub value: String,
}

/// One result row, keyed by variable name.
pub type Binding = HashMap<String, SparqlValue>;

fn binding_value<'a>(b: &'a Binding, key: &str) -> &'a str {
  b.get(key).map_or("", |v| v.value.as_str())
}

fn last_segment(uri: &str) -> &str { uri.rsplit('/').next().unwrap_or_default() }

// ─── Queries ─────────────────────────────────────────────────────────────────

fn careers_query(classes: &[String]) -> String {
  let values = classes
    .iter()
    .map(|c| format!("wd:{c}"))
    .collect::<Vec<_>>()
    .join(" ");

  format!(
    r#"SELECT DISTINCT ?item ?itemLabel ?categoryId ?article WHERE {{
  VALUES ?categoryId {{ {values} }}
  ?item wdt:P31 ?categoryId .
  ?article schema:about ?item ;
           schema:isPartOf <https://en.wikipedia.org/> .
  SERVICE wikibase:label {{
    bd:serviceParam wikibase:language "en".
    ?item rdfs:label ?itemLabel .
  }}
  FILTER(LANG(?itemLabel) = "en")
}}"#
  )
}

fn classes_query() -> String {
  let unions = BASE_CLASSES
    .iter()
    .map(|c| format!("{{ ?class wdt:P279* wd:{c} . }}"))
    .collect::<Vec<_>>()
    .join(" UNION ");
  let exclusions = EXCLUDED_CLASSES
    .iter()
    .map(|c| format!("FILTER NOT EXISTS {{ ?class wdt:P279* wd:{c} . }}"))
    .collect::<Vec<_>>()
    .join("\n  ");

  format!(
    r#"SELECT DISTINCT ?class WHERE {{
  {unions}
  {exclusions}
  FILTER EXISTS {{
    ?item wdt:P31 ?class .
    ?article schema:about ?item ;
             schema:isPartOf <https://en.wikipedia.org/> .
  }}
}}"#
  )
}

/// Turn raw bindings into careers.
///
/// Items are deduplicated by id with the first occurrence winning, even when
/// that occurrence is later discarded. Rows whose label is still a bare item
/// id (no English label) or that lack an article are dropped. The category
/// comes from the class the row matched, not from the item itself.
pub fn parse_career_bindings(bindings: &[Binding], limit: Option<usize>) -> Vec<NewCareer> {
  let mut careers = Vec::new();
  let mut seen = HashSet::new();

  for b in bindings {
    if limit.is_some_and(|n| careers.len() >= n) {
      break;
    }

    let Ok(wikidata_id) = WikidataId::from_entity_uri(binding_value(b, "item")) else {
      continue;
    };
    if !seen.insert(wikidata_id.clone()) {
      continue;
    }

    let name = binding_value(b, "itemLabel");
    if name.is_empty() || is_entity_id(name) {
      continue;
    }
    let article = binding_value(b, "article");
    if article.is_empty() {
      continue;
    }

    careers.push(NewCareer {
      wikidata_id,
      name: name.to_owned(),
      category: category_for_class(last_segment(binding_value(b, "categoryId"))),
      wikipedia_url: Some(article.to_owned()),
    });
  }

  careers
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Client for a Wikidata SPARQL endpoint.
#[derive(Clone)]
pub struct WikidataClient {
  http:     reqwest::Client,
  endpoint: String,
}

impl WikidataClient {
  pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
    Self { http, endpoint: endpoint.into() }
  }

  /// `POST <endpoint>` with a form-encoded query.
  pub async fn sparql(&self, query: &str) -> Result<SparqlResponse> {
    let resp = self
      .http
      .post(&self.endpoint)
      .header(reqwest::header::ACCEPT, "application/sparql-results+json")
      .form(&[("query", query)])
      .send()
      .await?
      .error_for_status()?;
    Ok(resp.json().await?)
  }

  /// Discover careers typed as an instance of any of `classes`.
  ///
  /// A failing batch is logged and skipped. With a `limit`, querying stops
  /// once enough raw rows have arrived and the deduplicated list is cut to
  /// `limit` again. A total outage yields an empty list.
  pub async fn discover_careers(&self, classes: &[String], limit: Option<usize>) -> Vec<NewCareer> {
    tracing::info!(classes = classes.len(), "querying Wikidata for career articles");

    let total_batches = classes.len().div_ceil(CLASS_BATCH_SIZE);
    let mut bindings = Vec::new();

    for (i, batch) in classes.chunks(CLASS_BATCH_SIZE).enumerate() {
      let batch_num = i + 1;
      tracing::info!(batch = batch_num, total_batches, size = batch.len(), "querying class batch");

      match self.sparql(&careers_query(batch)).await {
        Ok(resp) => {
          tracing::info!(batch = batch_num, results = resp.results.bindings.len(), "batch done");
          bindings.extend(resp.results.bindings);
        }
        Err(e) => {
          tracing::warn!(batch = batch_num, error = %e, "class batch failed, skipping");
          continue;
        }
      }

      if limit.is_some_and(|n| bindings.len() >= n) {
        break;
      }
    }

    tracing::info!(results = bindings.len(), "Wikidata query complete");
    let careers = parse_career_bindings(&bindings, limit);
    tracing::info!(careers = careers.len(), "parsed valid careers");
    careers
  }

  /// Query every transitive subclass of the base classes that has at least
  /// one instance with an English article.
  pub async fn refresh_career_classes(&self) -> Result<CareerClassCache> {
    tracing::info!("querying Wikidata for all career-related classes");
    let resp = self.sparql(&classes_query()).await?;

    let mut classes: Vec<String> = resp
      .results
      .bindings
      .iter()
      .map(|b| last_segment(binding_value(b, "class")).to_owned())
      .filter(|c| is_entity_id(c))
      .collect();
    classes.sort();
    classes.dedup();
    tracing::info!(classes = classes.len(), "found career-related classes");

    Ok(CareerClassCache {
      generated:    Utc::now().to_rfc3339(),
      description:  "Pre-computed Wikidata classes for career/occupation/profession articles".into(),
      excluded:     EXCLUDED_CLASSES.iter().map(|c| (*c).to_owned()).collect(),
      base_classes: BASE_CLASSES.iter().map(|c| (*c).to_owned()).collect(),
      classes,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use axum::{extract::State, http::StatusCode, routing::post, Form, Json, Router};
  use careers_core::career::Category;
  use serde_json::{json, Value};

  use super::*;
  use crate::testing::{client, serve};

  fn row(item: &str, label: &str, class: &str, article: &str) -> Value {
    let mut r = json!({
      "item": { "type": "uri", "value": format!("http://www.wikidata.org/entity/{item}") },
      "itemLabel": { "type": "literal", "value": label },
      "categoryId": { "type": "uri", "value": format!("http://www.wikidata.org/entity/{class}") },
    });
    if !article.is_empty() {
      r["article"] = json!({ "type": "uri", "value": article });
    }
    r
  }

  fn bindings(rows: Vec<Value>) -> Vec<Binding> {
    serde_json::from_value(Value::Array(rows)).unwrap()
  }

  // ── Parsing ───────────────────────────────────────────────────────────────

  #[test]
  fn first_occurrence_wins_and_labels_are_checked() {
    let b = bindings(vec![
      row("Q1", "Nurse", "Q12737077", "https://en.wikipedia.org/wiki/Nurse"),
      row("Q1", "Nurse (dup)", "Q28640", "https://en.wikipedia.org/wiki/Nurse"),
      row("Q2", "Q2", "Q28640", "https://en.wikipedia.org/wiki/Q2"),
      row("Q3", "Quarry worker", "Q192581", "https://en.wikipedia.org/wiki/Quarry_worker"),
      row("Q4", "Notary", "Q999", "https://en.wikipedia.org/wiki/Notary"),
      row("Q5", "Ghost", "Q28640", ""),
    ]);

    let careers = parse_career_bindings(&b, None);
    let ids: Vec<&str> = careers.iter().map(|c| c.wikidata_id.as_str()).collect();
    assert_eq!(ids, ["Q1", "Q3", "Q4"]);
    assert_eq!(careers[0].name, "Nurse");
    assert_eq!(careers[0].category, Category::Occupation);
    assert_eq!(careers[1].category, Category::Job);
    // Unmapped subclass defaults.
    assert_eq!(careers[2].category, Category::Profession);
  }

  #[test]
  fn discarded_first_occurrence_still_claims_the_id() {
    let b = bindings(vec![
      row("Q7", "Q7", "Q28640", "https://en.wikipedia.org/wiki/X"),
      row("Q7", "Welder", "Q28640", "https://en.wikipedia.org/wiki/Welder"),
    ]);
    assert!(parse_career_bindings(&b, None).is_empty());
  }

  #[test]
  fn limit_applies_after_dedup() {
    let b = bindings(vec![
      row("Q1", "A", "Q28640", "https://en.wikipedia.org/wiki/A"),
      row("Q1", "A", "Q28640", "https://en.wikipedia.org/wiki/A"),
      row("Q2", "B", "Q28640", "https://en.wikipedia.org/wiki/B"),
      row("Q3", "C", "Q28640", "https://en.wikipedia.org/wiki/C"),
    ]);
    let careers = parse_career_bindings(&b, Some(2));
    let ids: Vec<&str> = careers.iter().map(|c| c.wikidata_id.as_str()).collect();
    assert_eq!(ids, ["Q1", "Q2"]);
  }

  #[test]
  fn queries_name_their_classes() {
    let q = careers_query(&["Q1".into(), "Q2".into()]);
    assert!(q.contains("VALUES ?categoryId { wd:Q1 wd:Q2 }"));
    let q = classes_query();
    for c in BASE_CLASSES.iter().chain(EXCLUDED_CLASSES.iter()) {
      assert!(q.contains(&format!("wd:{c} ")), "{c}");
    }
  }

  // ── Class cache ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_cache_falls_back_to_base_classes() {
    let path = std::env::temp_dir().join("careers-no-such-cache.json");
    let classes = load_career_classes(&path).await.unwrap();
    assert_eq!(classes, BASE_CLASSES);
  }

  #[tokio::test]
  async fn cache_round_trips_and_malformed_errors() {
    let dir = std::env::temp_dir().join(format!("careers-cache-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let path = dir.join("career_classes.json");
    let cache = CareerClassCache {
      generated:    "now".into(),
      description:  String::new(),
      excluded:     vec![],
      base_classes: vec![],
      classes:      vec!["Q1".into(), "Q2".into()],
    };
    cache.write(&path).await.unwrap();
    assert_eq!(load_career_classes(&path).await.unwrap(), ["Q1", "Q2"]);

    let bad = dir.join("bad.json");
    tokio::fs::write(&bad, "{ not json").await.unwrap();
    assert!(matches!(load_career_classes(&bad).await, Err(Error::ClassCache { .. })));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
  }

  // ── Endpoint ──────────────────────────────────────────────────────────────

  /// Batch 1 answers, batch 2 fails, batch 3 answers with a duplicate.
  async fn sparql_fixture(
    State(hits): State<Arc<AtomicUsize>>,
    Form(form): Form<HashMap<String, String>>,
  ) -> Result<Json<Value>, StatusCode> {
    hits.fetch_add(1, Ordering::SeqCst);
    let q = &form["query"];
    let rows = if q.contains("wd:Q1000 ") {
      vec![
        row("Q1", "Nurse", "Q1000", "https://en.wikipedia.org/wiki/Nurse"),
        row("Q2", "Baker", "Q1001", "https://en.wikipedia.org/wiki/Baker"),
      ]
    } else if q.contains("wd:Q1050 ") {
      return Err(StatusCode::GATEWAY_TIMEOUT);
    } else {
      vec![
        row("Q2", "Baker again", "Q1100", "https://en.wikipedia.org/wiki/Baker"),
        row("Q3", "Pilot", "Q1101", "https://en.wikipedia.org/wiki/Pilot"),
      ]
    };
    Ok(Json(json!({ "head": { "vars": [] }, "results": { "bindings": rows } })))
  }

  async fn fixture_client() -> (WikidataClient, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
      .route("/sparql", post(sparql_fixture))
      .with_state(hits.clone());
    let base = serve(router).await;
    (WikidataClient::new(client(), format!("{base}/sparql")), hits)
  }

  fn classes(n: usize) -> Vec<String> { (1000..1000 + n).map(|i| format!("Q{i}")).collect() }

  #[tokio::test]
  async fn failed_batch_is_skipped() {
    let (wd, hits) = fixture_client().await;
    let careers = wd.discover_careers(&classes(120), None).await;

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    let ids: Vec<&str> = careers.iter().map(|c| c.wikidata_id.as_str()).collect();
    assert_eq!(ids, ["Q1", "Q2", "Q3"]);
    assert_eq!(careers[1].name, "Baker");
  }

  #[tokio::test]
  async fn limit_stops_querying_early() {
    let (wd, hits) = fixture_client().await;
    let careers = wd.discover_careers(&classes(120), Some(1)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(careers.len(), 1);
  }

  #[tokio::test]
  async fn unreachable_endpoint_yields_nothing() {
    let wd = WikidataClient::new(client(), "http://127.0.0.1:9/sparql");
    assert!(wd.discover_careers(&classes(3), None).await.is_empty());
  }

  #[tokio::test]
  async fn refresh_sorts_and_filters_classes() {
    async fn handler() -> Json<Value> {
      Json(json!({ "results": { "bindings": [
        { "class": { "type": "uri", "value": "http://www.wikidata.org/entity/Q30" } },
        { "class": { "type": "uri", "value": "http://www.wikidata.org/entity/Q100" } },
        { "class": { "type": "uri", "value": "http://www.wikidata.org/entity/Q30" } },
        { "class": { "type": "uri", "value": "http://www.wikidata.org/.well-known/genid/x" } },
      ] } }))
    }
    let base = serve(Router::new().route("/sparql", post(handler))).await;
    let wd = WikidataClient::new(client(), format!("{base}/sparql"));

    let cache = wd.refresh_career_classes().await.unwrap();
    assert_eq!(cache.classes, ["Q100", "Q30"]);
    assert_eq!(cache.base_classes, BASE_CLASSES);
    assert_eq!(cache.excluded, EXCLUDED_CLASSES);
  }
}

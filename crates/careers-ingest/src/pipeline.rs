//! The fetch and resume jobs.
//!
//! `ingest` persists freshly discovered careers and fills in their traffic.
//! `resume` only touches careers whose pageviews were never fetched, so it
//! can be rerun after an interruption without disturbing finished rows.

use std::time::Instant;

use careers_core::{career::NewCareer, store::CareerStore};

use crate::{
  pageviews::PageviewSource,
  scheduler::{fetch_pageviews_batch, BatchOptions, BatchProgress, PageviewTarget},
  Error, Result,
};

/// Counts from one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
  /// Careers written to the store (zero for `resume`).
  pub upserted: usize,
  /// Careers whose traffic was fetched.
  pub fetched:  usize,
  /// Rows updated with traffic.
  pub updated:  usize,
}

async fn fetch_and_store<S, P, F>(
  store: &S,
  source: &P,
  targets: &[PageviewTarget],
  options: BatchOptions,
  on_progress: F,
) -> Result<(usize, usize)>
where
  S: CareerStore,
  P: PageviewSource,
  F: FnMut(BatchProgress),
{
  let started = Instant::now();
  let updates = fetch_pageviews_batch(source, targets, options, on_progress).await;
  tracing::info!(
    fetched = updates.len(),
    "fetched pageviews in {:.1} seconds",
    started.elapsed().as_secs_f64()
  );

  let fetched = updates.len();
  let updated = store.update_pageviews_batch(updates).await.map_err(Error::store)?;
  Ok((fetched, updated))
}

/// Store `careers` and fetch traffic for all of them.
///
/// An empty list is [`Error::NoCareersDiscovered`] and leaves the store
/// untouched.
pub async fn ingest<S, P, F>(
  store: &S,
  source: &P,
  careers: Vec<NewCareer>,
  options: BatchOptions,
  on_progress: F,
) -> Result<IngestReport>
where
  S: CareerStore,
  P: PageviewSource,
  F: FnMut(BatchProgress),
{
  if careers.is_empty() {
    tracing::error!("no careers found");
    return Err(Error::NoCareersDiscovered);
  }

  let targets: Vec<PageviewTarget> = careers.iter().map(PageviewTarget::from).collect();

  tracing::info!(careers = careers.len(), "storing careers");
  let upserted = store.upsert_careers(careers).await.map_err(Error::store)?;

  tracing::info!("fetching pageviews (this may take a few minutes)");
  let (fetched, updated) = fetch_and_store(store, source, &targets, options, on_progress).await?;

  Ok(IngestReport { upserted, fetched, updated })
}

/// Fetch traffic for careers that have never had it.
pub async fn resume<S, P, F>(
  store: &S,
  source: &P,
  options: BatchOptions,
  on_progress: F,
) -> Result<IngestReport>
where
  S: CareerStore,
  P: PageviewSource,
  F: FnMut(BatchProgress),
{
  let pending = store.get_careers_needing_pageviews().await.map_err(Error::store)?;
  if pending.is_empty() {
    tracing::info!("all careers have pageview data");
    return Ok(IngestReport::default());
  }

  tracing::info!(careers = pending.len(), "found careers needing pageviews");
  let targets: Vec<PageviewTarget> = pending.iter().map(PageviewTarget::from).collect();
  let (fetched, updated) = fetch_and_store(store, source, &targets, options, on_progress).await?;
  tracing::info!(updated, "updated careers");

  Ok(IngestReport { upserted: 0, fetched, updated })
}

#[cfg(test)]
mod tests {
  use std::{
    future::Future,
    sync::atomic::{AtomicI64, AtomicUsize, Ordering},
  };

  use careers_core::career::{Category, WikidataId};
  use careers_store_sqlite::SqliteStore;

  use super::*;
  use crate::pageviews::PageviewTotals;

  /// Returns `scale * title.len()` views and counts calls.
  struct ScaledSource {
    scale: AtomicI64,
    calls: AtomicUsize,
  }

  impl ScaledSource {
    fn new(scale: i64) -> Self { Self { scale: AtomicI64::new(scale), calls: AtomicUsize::new(0) } }
  }

  impl PageviewSource for ScaledSource {
    fn pageviews<'a>(&'a self, title: &'a str) -> impl Future<Output = PageviewTotals> + Send + 'a {
      async move {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let len = i64::try_from(title.len()).unwrap();
        PageviewTotals::from_monthly(&[self.scale.load(Ordering::SeqCst) * len])
      }
    }
  }

  fn career(id: &str, title: &str) -> NewCareer {
    NewCareer {
      wikidata_id:   WikidataId::parse(id).unwrap(),
      name:          title.replace('_', " "),
      category:      Category::Profession,
      wikipedia_url: Some(format!("https://en.wikipedia.org/wiki/{title}")),
    }
  }

  fn careers() -> Vec<NewCareer> {
    vec![career("Q1", "Nurse"), career("Q2", "Software_engineer"), career("Q3", "Baker")]
  }

  #[tokio::test]
  async fn ingest_stores_and_fetches_everything() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let source = ScaledSource::new(1000);
    let mut steps = 0;

    let report = ingest(&store, &source, careers(), BatchOptions { concurrency: 2, chunk_size: 2 }, |_| {
      steps += 1
    })
    .await
    .unwrap();

    assert_eq!(report, IngestReport { upserted: 3, fetched: 3, updated: 3 });
    assert_eq!(steps, 2);
    assert!(store.get_careers_needing_pageviews().await.unwrap().is_empty());

    let se = store.get_career(WikidataId::parse("Q2").unwrap()).await.unwrap().unwrap();
    assert_eq!(se.pageviews_total, 17_000);
  }

  #[tokio::test]
  async fn empty_discovery_is_fatal_and_writes_nothing() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let source = ScaledSource::new(1);

    let err = ingest(&store, &source, vec![], BatchOptions::default(), |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::NoCareersDiscovered));
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn resume_is_idempotent() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    // An interrupted run: careers stored, traffic never fetched.
    store.upsert_careers(careers()).await.unwrap();
    store
      .upsert_career(NewCareer { wikipedia_url: None, ..career("Q4", "Orphan") })
      .await
      .unwrap();

    let source = ScaledSource::new(10);
    let first = resume(&store, &source, BatchOptions::default(), |_| {}).await.unwrap();
    assert_eq!(first.fetched, 4);
    assert_eq!(first.updated, 4);
    assert!(store.get_careers_needing_pageviews().await.unwrap().is_empty());

    let before = store.get_all_careers().await.unwrap();

    // Different traffic now, but nothing is pending so nothing changes.
    source.scale.store(99, Ordering::SeqCst);
    let second = resume(&store, &source, BatchOptions::default(), |_| {}).await.unwrap();
    assert_eq!(second, IngestReport::default());
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    let after = store.get_all_careers().await.unwrap();
    let views = |v: &[careers_core::bucket::RankedCareer]| {
      v.iter()
        .map(|r| (r.career.wikidata_id.clone(), r.career.pageviews_total, r.career.avg_daily_views))
        .collect::<Vec<_>>()
    };
    assert_eq!(views(&before), views(&after));

    let orphan = store.get_career(WikidataId::parse("Q4").unwrap()).await.unwrap().unwrap();
    assert_eq!(orphan.pageviews_total, 0);
    assert!(orphan.last_pageview_update.is_some());
  }

  #[tokio::test]
  async fn ingest_then_resume_leaves_fetched_rows_alone() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let source = ScaledSource::new(5);
    ingest(&store, &source, careers(), BatchOptions::default(), |_| {}).await.unwrap();
    let nurse = store.get_career(WikidataId::parse("Q1").unwrap()).await.unwrap().unwrap();

    for _ in 0..2 {
      let r = resume(&store, &source, BatchOptions::default(), |_| {}).await.unwrap();
      assert_eq!(r.fetched, 0);
    }
    let again = store.get_career(WikidataId::parse("Q1").unwrap()).await.unwrap().unwrap();
    assert_eq!(again.pageviews_total, nurse.pageviews_total);
    assert_eq!(again.last_pageview_update, nurse.last_pageview_update);
  }
}

//! Chunked, bounded-concurrency pageview fetching.
//!
//! All fetches run as futures on the calling task; nothing is spawned. A
//! [`Semaphore`] caps in-flight requests at `concurrency`, and targets are
//! dispatched in chunks of `chunk_size`. Each chunk is a barrier: the next one
//! starts only after every fetch in the current chunk has finished, so the
//! effective peak is `min(concurrency, chunk_size)` and progress is reported
//! once per chunk.

use futures::future::join_all;
use tokio::sync::Semaphore;

use careers_core::career::{Career, NewCareer, PageviewUpdate, WikidataId};

use crate::pageviews::{article_title, PageviewSource, PageviewTotals};

pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
  /// Maximum simultaneous requests.
  pub concurrency: usize,
  /// Targets per progress step.
  pub chunk_size:  usize,
}

impl Default for BatchOptions {
  fn default() -> Self {
    Self { concurrency: DEFAULT_CONCURRENCY, chunk_size: DEFAULT_CHUNK_SIZE }
  }
}

/// Reported after each completed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
  pub completed: usize,
  pub total:     usize,
}

impl BatchProgress {
  pub fn percent(&self) -> usize {
    if self.total == 0 { 100 } else { self.completed * 100 / self.total }
  }
}

/// A career to fetch traffic for.
#[derive(Debug, Clone, PartialEq)]
pub struct PageviewTarget {
  pub wikidata_id:   WikidataId,
  pub wikipedia_url: Option<String>,
}

impl From<&Career> for PageviewTarget {
  fn from(c: &Career) -> Self {
    Self { wikidata_id: c.wikidata_id.clone(), wikipedia_url: c.wikipedia_url.clone() }
  }
}

impl From<&NewCareer> for PageviewTarget {
  fn from(c: &NewCareer) -> Self {
    Self { wikidata_id: c.wikidata_id.clone(), wikipedia_url: c.wikipedia_url.clone() }
  }
}

async fn fetch_one<S: PageviewSource>(
  source: &S,
  gate: &Semaphore,
  target: &PageviewTarget,
) -> PageviewUpdate {
  let title = target.wikipedia_url.as_deref().and_then(article_title);

  let totals = match title {
    // No title, no request.
    None => PageviewTotals::ZERO,
    Some(title) => match gate.acquire().await {
      Ok(_permit) => source.pageviews(&title).await,
      Err(_) => PageviewTotals::ZERO,
    },
  };

  PageviewUpdate {
    wikidata_id:     target.wikidata_id.clone(),
    total_views:     totals.total_views,
    avg_daily_views: totals.avg_daily_views,
  }
}

/// Fetch traffic for every target, returning one update per target in input
/// order. `on_progress` is called after each chunk.
pub async fn fetch_pageviews_batch<S, F>(
  source: &S,
  targets: &[PageviewTarget],
  options: BatchOptions,
  mut on_progress: F,
) -> Vec<PageviewUpdate>
where
  S: PageviewSource,
  F: FnMut(BatchProgress),
{
  let total = targets.len();
  let gate = Semaphore::new(options.concurrency.clamp(1, Semaphore::MAX_PERMITS));
  let mut results = Vec::with_capacity(total);

  for chunk in targets.chunks(options.chunk_size.max(1)) {
    let updates = join_all(chunk.iter().map(|t| fetch_one(source, &gate, t))).await;
    results.extend(updates);

    let progress = BatchProgress { completed: results.len(), total };
    tracing::info!(
      completed = progress.completed,
      total,
      "pageviews: {}/{} ({}%)",
      progress.completed,
      total,
      progress.percent()
    );
    on_progress(progress);
  }

  results
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashSet,
    future::Future,
    sync::{
      atomic::{AtomicUsize, Ordering},
      Mutex,
    },
    time::Duration,
  };

  use super::*;

  /// Records how many fetches are in flight at once.
  #[derive(Default)]
  struct FakeSource {
    in_flight: AtomicUsize,
    peak:      AtomicUsize,
    calls:     Mutex<Vec<String>>,
  }

  impl PageviewSource for FakeSource {
    fn pageviews<'a>(&'a self, title: &'a str) -> impl Future<Output = PageviewTotals> + Send + 'a {
      async move {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(title.to_owned());

        // Later titles finish first, so completion order differs from input.
        let n: u64 = title.trim_start_matches("Title_").parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(20 - n % 10)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if title.ends_with("_0") {
          return PageviewTotals::ZERO;
        }
        PageviewTotals::from_monthly(&[i64::try_from(n).unwrap() * 100])
      }
    }
  }

  fn targets(n: usize) -> Vec<PageviewTarget> {
    (0..n)
      .map(|i| PageviewTarget {
        wikidata_id:   WikidataId::parse(&format!("Q{}", i + 1)).unwrap(),
        wikipedia_url: Some(format!("https://en.wikipedia.org/wiki/Title_{i}")),
      })
      .collect()
  }

  async fn run(
    n: usize,
    concurrency: usize,
    chunk_size: usize,
  ) -> (Vec<PageviewUpdate>, Vec<BatchProgress>, usize) {
    let source = FakeSource::default();
    let mut progress = Vec::new();
    let results = fetch_pageviews_batch(
      &source,
      &targets(n),
      BatchOptions { concurrency, chunk_size },
      |p| progress.push(p),
    )
    .await;
    (results, progress, source.peak.load(Ordering::SeqCst))
  }

  #[tokio::test]
  async fn peak_concurrency_is_min_of_gate_and_chunk() {
    assert_eq!(run(40, 8, 20).await.2, 8);
    assert_eq!(run(40, 50, 5).await.2, 5);
    assert_eq!(run(40, 1, 40).await.2, 1);
  }

  #[tokio::test]
  async fn progress_is_reported_per_chunk() {
    let (_, progress, _) = run(23, 4, 10).await;
    let completed: Vec<usize> = progress.iter().map(|p| p.completed).collect();
    assert_eq!(completed, [10, 20, 23]);
    assert!(progress.iter().all(|p| p.total == 23));
    assert_eq!(progress.last().unwrap().percent(), 100);
  }

  #[tokio::test]
  async fn results_are_complete_and_in_input_order() {
    for (concurrency, chunk_size) in [(1, 1), (3, 7), (50, 500), (16, 4)] {
      let input = targets(30);
      let (results, _, _) = run(30, concurrency, chunk_size).await;

      assert_eq!(results.len(), input.len());
      let ids: Vec<&WikidataId> = results.iter().map(|r| &r.wikidata_id).collect();
      let expected: Vec<&WikidataId> = input.iter().map(|t| &t.wikidata_id).collect();
      assert_eq!(ids, expected);
      assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 30);
    }
  }

  #[tokio::test]
  async fn per_target_results_follow_their_title() {
    let (results, _, _) = run(12, 4, 5).await;
    assert_eq!(results[0].total_views, 0);
    assert_eq!(results[7].total_views, 700);
    assert_eq!(results[10].total_views, 1000);
    assert_eq!(results[11].total_views, 1100);
  }

  #[tokio::test]
  async fn missing_titles_skip_the_source() {
    let source = FakeSource::default();
    let targets = vec![
      PageviewTarget {
        wikidata_id:   WikidataId::parse("Q1").unwrap(),
        wikipedia_url: None,
      },
      PageviewTarget {
        wikidata_id:   WikidataId::parse("Q2").unwrap(),
        wikipedia_url: Some("https://en.wikipedia.org/wiki/".into()),
      },
      PageviewTarget {
        wikidata_id:   WikidataId::parse("Q3").unwrap(),
        wikipedia_url: Some("https://en.wikipedia.org/wiki/Title_3".into()),
      },
    ];

    let results = fetch_pageviews_batch(&source, &targets, BatchOptions::default(), |_| {}).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].total_views, 0);
    assert_eq!(results[1].total_views, 0);
    assert_eq!(results[2].total_views, 300);
    assert_eq!(*source.calls.lock().unwrap(), ["Title_3"]);
  }

  #[tokio::test]
  async fn oversized_concurrency_is_capped_at_the_permit_limit() {
    let (results, progress, peak) = run(12, usize::MAX, 6).await;
    assert_eq!(results.len(), 12);
    assert_eq!(progress.len(), 2);
    assert_eq!(peak, 6);
  }

  #[tokio::test]
  async fn empty_input_reports_nothing() {
    let (results, progress, peak) = run(0, 4, 10).await;
    assert!(results.is_empty());
    assert!(progress.is_empty());
    assert_eq!(peak, 0);
  }
}

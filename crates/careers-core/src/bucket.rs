//! Traffic buckets used for display ordering.
//!
//! Buckets are never stored; they are recomputed from `avg_daily_views`
//! whenever a list is ranked. Lists are ordered highest-traffic bucket first,
//! then alphabetically by name within a bucket, which is deliberately not the
//! same as a numeric sort on `avg_daily_views`.

use serde::Serialize;

use crate::career::Career;

/// A traffic tier: every value at or above `lower_bound` (and below the
/// previous bucket's bound) belongs to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageviewBucket {
  pub lower_bound: f64,
  pub label:       &'static str,
}

/// Buckets ordered by descending lower bound; the last bound is zero.
pub const PAGEVIEW_BUCKETS: [PageviewBucket; 7] = [
  PageviewBucket { lower_bound: 2000.0, label: ">2,000" },
  PageviewBucket { lower_bound: 1000.0, label: "1,000–2,000" },
  PageviewBucket { lower_bound: 500.0,  label: "500–1,000" },
  PageviewBucket { lower_bound: 200.0,  label: "200–500" },
  PageviewBucket { lower_bound: 100.0,  label: "100–200" },
  PageviewBucket { lower_bound: 50.0,   label: "50–100" },
  PageviewBucket { lower_bound: 0.0,    label: "<50" },
];

/// Index of the bucket `avg_daily_views` falls in; lower is busier.
///
/// Negative and NaN values land in the last bucket.
pub fn bucket_index(avg_daily_views: f64) -> usize {
  PAGEVIEW_BUCKETS
    .iter()
    .position(|b| avg_daily_views >= b.lower_bound)
    .unwrap_or(PAGEVIEW_BUCKETS.len() - 1)
}

pub fn bucket_for(avg_daily_views: f64) -> (usize, &'static PageviewBucket) {
  let idx = bucket_index(avg_daily_views);
  (idx, &PAGEVIEW_BUCKETS[idx])
}

/// A career annotated with its display bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCareer {
  #[serde(flatten)]
  pub career:       Career,
  pub bucket_index: usize,
  pub bucket_label: &'static str,
}

impl RankedCareer {
  pub fn new(career: Career) -> Self {
    let (bucket_index, bucket) = bucket_for(career.avg_daily_views);
    Self { career, bucket_index, bucket_label: bucket.label }
  }
}

/// Annotate and sort by `(bucket_index, lowercased name)`.
///
/// The sort is stable, so callers that pre-order by traffic get a
/// deterministic result for names that compare equal.
pub fn rank_careers(careers: Vec<Career>) -> Vec<RankedCareer> {
  let mut ranked: Vec<RankedCareer> = careers.into_iter().map(RankedCareer::new).collect();
  ranked.sort_by_cached_key(|r| (r.bucket_index, r.career.name.to_lowercase()));
  ranked
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::career::{Category, CareerStatus, WikidataId};

  fn career(id: &str, name: &str, avg: f64) -> Career {
    let now = Utc::now();
    Career {
      wikidata_id:          WikidataId::parse(id).unwrap(),
      name:                 name.into(),
      category:             Category::Profession,
      wikipedia_url:        None,
      pageviews_total:      0,
      avg_daily_views:      avg,
      last_pageview_update: None,
      status:               CareerStatus::Unreviewed,
      reviewed_by:          None,
      reviewed_at:          None,
      notes:                None,
      lede_text:            None,
      lede_fetched_at:      None,
      images_fetched_at:    None,
      created_at:           now,
      updated_at:           now,
    }
  }

  #[test]
  fn boundaries_map_to_their_own_bucket() {
    assert_eq!(bucket_index(2000.0), 0);
    assert_eq!(bucket_index(1999.0), 1);
    assert_eq!(bucket_index(1999.99), 1);
    assert_eq!(bucket_index(1000.0), 1);
    assert_eq!(bucket_index(500.0), 2);
    assert_eq!(bucket_index(200.0), 3);
    assert_eq!(bucket_index(100.0), 4);
    assert_eq!(bucket_index(50.0), 5);
    assert_eq!(bucket_index(49.99), 6);
    assert_eq!(bucket_index(0.0), 6);
  }

  #[test]
  fn out_of_range_values_fall_into_last_bucket() {
    assert_eq!(bucket_index(-3.0), 6);
    assert_eq!(bucket_index(f64::NAN), 6);
    assert_eq!(bucket_index(f64::INFINITY), 0);
  }

  #[test]
  fn labels_follow_bounds() {
    assert_eq!(bucket_for(15000.0).1.label, ">2,000");
    assert_eq!(bucket_for(1500.0).1.label, "1,000–2,000");
    assert_eq!(bucket_for(25.0).1.label, "<50");
  }

  #[test]
  fn higher_traffic_never_sorts_into_a_later_bucket() {
    let samples: Vec<f64> = (0..=5000).map(|v| f64::from(v) * 0.5).collect();
    for pair in samples.windows(2) {
      let (lo, hi) = (pair[0], pair[1]);
      assert!(bucket_index(hi) <= bucket_index(lo), "{hi} vs {lo}");
    }
  }

  #[test]
  fn bucket_first_then_alphabetical() {
    let ranked = rank_careers(vec![
      career("Q1", "Teacher", 250.0),
      career("Q2", "zoologist", 2100.0),
      career("Q3", "Doctor", 5000.0),
      career("Q4", "accountant", 300.0),
      career("Q5", "Baker", 499.0),
    ]);
    let names: Vec<&str> = ranked.iter().map(|r| r.career.name.as_str()).collect();
    // Doctor outranks zoologist numerically, but both share the top bucket.
    assert_eq!(names, ["Doctor", "zoologist", "accountant", "Baker", "Teacher"]);
    assert_eq!(ranked[0].bucket_index, 0);
    assert_eq!(ranked[2].bucket_label, "200–500");

    for pair in ranked.windows(2) {
      let (a, b) = (&pair[0], &pair[1]);
      assert!(
        a.bucket_index < b.bucket_index
          || (a.bucket_index == b.bucket_index
            && a.career.name.to_lowercase() <= b.career.name.to_lowercase())
      );
    }
  }

  #[test]
  fn ranked_career_serializes_flat() {
    let json = serde_json::to_value(RankedCareer::new(career("Q9", "Nurse", 1200.0))).unwrap();
    assert_eq!(json["wikidata_id"], "Q9");
    assert_eq!(json["bucket_index"], 1);
    assert_eq!(json["bucket_label"], "1,000–2,000");
  }
}

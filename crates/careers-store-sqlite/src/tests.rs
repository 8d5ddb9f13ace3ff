//! Integration tests for `SqliteStore` against an in-memory database.

use careers_core::{
  career::{Category, NewCareer, PageviewUpdate, WikidataId},
  contract,
  image::{NewCareerImage, ReplacementImage},
  store::CareerStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn qid(s: &str) -> WikidataId { WikidataId::parse(s).unwrap() }

fn new_career(id: &str, name: &str) -> NewCareer {
  NewCareer {
    wikidata_id:   qid(id),
    name:          name.into(),
    category:      Category::Profession,
    wikipedia_url: Some(format!("https://en.wikipedia.org/wiki/{}", name.replace(' ', "_"))),
  }
}

// ─── Shared contract ─────────────────────────────────────────────────────────

macro_rules! contract_tests {
  ($($name:ident),* $(,)?) => {
    $(
      #[tokio::test]
      async fn $name() {
        contract::$name(&store().await).await;
      }
    )*
  };
}

contract_tests!(
  upsert_twice_yields_one_row,
  upsert_updates_descriptive_fields_only,
  upsert_batch_reports_rows_written,
  needing_pageviews_tracks_last_update,
  pageview_batch_skips_unknown_ids,
  writes_to_missing_career_fail,
  status_update_keeps_omitted_notes,
  any_status_reaches_any_other,
  lede_is_cached,
  all_careers_sorted_by_bucket_then_name,
  status_listing_filters_and_limits_busiest_first,
  search_is_case_insensitive_substring,
  search_folds_non_ascii_case,
  search_wildcards_match_literally,
  top_careers_use_numeric_order_and_skip_zero_traffic,
  stats_summarise_dataset,
  stats_top_career_includes_zero_traffic,
  bulk_images_default_position_and_stamp_fetch_time,
  clear_and_delete_images,
  replacement_is_unique_and_latest_wins,
  replacement_without_metadata_stores_none,
  plain_images_never_displace_the_replacement,
);

// ─── Errors ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_career_writes_name_the_id() {
  let s = store().await;

  let err = s
    .update_pageviews(PageviewUpdate { wikidata_id: qid("Q7"), total_views: 1, avg_daily_views: 0.0 })
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::CareerNotFound(id) if id == qid("Q7")));

  let err = s.update_career_lede(qid("Q2"), String::new()).await.unwrap_err();
  assert!(matches!(err, crate::Error::CareerNotFound(_)));

  let err = s
    .add_career_images(qid("Q9"), vec![NewCareerImage::wikipedia("x", None)])
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::CareerNotFound(_)));

  let err = s
    .set_replacement_image(qid("Q5"), ReplacementImage {
      image_url: "https://ov.example/1.jpg".into(),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::CareerNotFound(_)));
}

// ─── Backend behaviour ───────────────────────────────────────────────────────

#[tokio::test]
async fn casefold_leaves_null_alone() {
  let s = store().await;
  let folded: Option<String> = s
    .conn
    .call(|conn| Ok(conn.query_row("SELECT casefold(NULL)", [], |r| r.get(0))?))
    .await
    .unwrap();
  assert!(folded.is_none());
}

#[tokio::test]
async fn concurrent_replacements_leave_exactly_one() {
  let s = store().await;
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();

  let tasks: Vec<_> = (0..8)
    .map(|n| {
      let s = s.clone();
      tokio::spawn(async move {
        s.set_replacement_image(qid("Q1"), ReplacementImage {
          image_url: format!("https://ov.example/{n}.jpg"),
          ..Default::default()
        })
        .await
        .unwrap()
      })
    })
    .collect();
  for t in tasks {
    t.await.unwrap();
  }

  let images = s.get_career_images(qid("Q1"), None).await.unwrap();
  assert_eq!(images.iter().filter(|i| i.is_replacement).count(), 1);
}

#[tokio::test]
async fn open_on_disk_persists() {
  let dir = std::env::temp_dir().join(format!("careers-store-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("careers.db");
  let _ = std::fs::remove_file(&path);

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  }
  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.count().await.unwrap(), 1);
  // Search works on a reopened file too.
  assert_eq!(s.search_careers("NURSE", None).await.unwrap().len(), 1);

  let _ = std::fs::remove_dir_all(&dir);
}

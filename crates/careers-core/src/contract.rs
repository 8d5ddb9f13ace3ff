//! Behavioural checks every [`CareerStore`] backend must pass.
//!
//! Each check takes a freshly opened, empty store and panics on the first
//! violation. Backends call them from their own test suites so the SQLite
//! and PostgreSQL implementations are held to the same contract.

use strum::IntoEnumIterator as _;

use crate::{
  career::{Category, CareerStatus, NewCareer, PageviewUpdate, WikidataId},
  image::{ImageMetadata, ImageSource, NewCareerImage, ReplacementImage},
  store::CareerStore,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn qid(s: &str) -> WikidataId { WikidataId::parse(s).unwrap() }

fn new_career(id: &str, name: &str) -> NewCareer {
  NewCareer {
    wikidata_id:   qid(id),
    name:          name.into(),
    category:      Category::Profession,
    wikipedia_url: Some(format!("https://en.wikipedia.org/wiki/{}", name.replace(' ', "_"))),
  }
}

fn views(id: &str, total: i64, avg: f64) -> PageviewUpdate {
  PageviewUpdate { wikidata_id: qid(id), total_views: total, avg_daily_views: avg }
}

/// Insert careers with the given average daily views.
async fn seed<S: CareerStore>(s: &S, rows: &[(&str, &str, f64)]) {
  s.upsert_careers(rows.iter().map(|(id, name, _)| new_career(id, name)).collect())
    .await
    .unwrap();
  let updates = rows
    .iter()
    .map(|(id, _, avg)| views(id, (*avg * 30.44 * 24.0) as i64, *avg))
    .collect();
  s.update_pageviews_batch(updates).await.unwrap();
}

fn replacement(url: &str, creator: &str) -> ReplacementImage {
  ReplacementImage {
    image_url: url.into(),
    caption:   Some(format!("photo by {creator}")),
    metadata:  ImageMetadata {
      creator:     Some(creator.into()),
      license:     Some("by-sa".into()),
      license_url: Some("https://creativecommons.org/licenses/by-sa/4.0/".into()),
      source_url:  Some("https://www.flickr.com/photos/1".into()),
    },
  }
}

async fn names_matching<S: CareerStore>(s: &S, query: &str) -> Vec<String> {
  s.search_careers(query, None)
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.career.name)
    .collect()
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

pub async fn upsert_twice_yields_one_row<S: CareerStore>(s: &S) {
  let c = new_career("Q1", "Nurse");

  s.upsert_career(c.clone()).await.unwrap();
  s.upsert_career(c.clone()).await.unwrap();

  assert_eq!(s.count().await.unwrap(), 1);
  let fetched = s.get_career(qid("Q1")).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Nurse");
  assert_eq!(fetched.category, Category::Profession);
  assert_eq!(fetched.wikipedia_url, c.wikipedia_url);
  assert_eq!(fetched.status, CareerStatus::Unreviewed);
  assert!(fetched.last_pageview_update.is_none());
}

pub async fn upsert_updates_descriptive_fields_only<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  s.update_pageviews(views("Q1", 90_000, 98.55)).await.unwrap();
  s.update_career_status(
    qid("Q1"),
    CareerStatus::NeedsDiverseImages,
    Some("alex".into()),
    Some("all images show one gender".into()),
  )
  .await
  .unwrap();

  let mut renamed = new_career("Q1", "Registered nurse");
  renamed.category = Category::Occupation;
  s.upsert_career(renamed).await.unwrap();

  let c = s.get_career(qid("Q1")).await.unwrap().unwrap();
  assert_eq!(c.name, "Registered nurse");
  assert_eq!(c.category, Category::Occupation);
  assert_eq!(c.status, CareerStatus::NeedsDiverseImages);
  assert_eq!(c.notes.as_deref(), Some("all images show one gender"));
  assert_eq!(c.reviewed_by.as_deref(), Some("alex"));
  assert_eq!(c.pageviews_total, 90_000);
  assert_eq!(c.avg_daily_views, 98.55);
  assert!(c.last_pageview_update.is_some());
  assert!(c.updated_at >= c.created_at);
}

pub async fn upsert_batch_reports_rows_written<S: CareerStore>(s: &S) {
  let n = s
    .upsert_careers(vec![new_career("Q1", "Nurse"), new_career("Q2", "Baker")])
    .await
    .unwrap();
  assert_eq!(n, 2);
  assert_eq!(s.upsert_careers(vec![]).await.unwrap(), 0);
  assert_eq!(s.count().await.unwrap(), 2);
  assert!(s.get_career(qid("Q404")).await.unwrap().is_none());
}

// ─── Pageviews ───────────────────────────────────────────────────────────────

pub async fn needing_pageviews_tracks_last_update<S: CareerStore>(s: &S) {
  s.upsert_careers(vec![
    new_career("Q1", "Nurse"),
    new_career("Q2", "Baker"),
    new_career("Q3", "Pilot"),
  ])
  .await
  .unwrap();

  // A zero-traffic fetch still counts as fetched.
  let updated = s
    .update_pageviews_batch(vec![views("Q2", 0, 0.0), views("Q3", 700, 0.96)])
    .await
    .unwrap();
  assert_eq!(updated, 2);

  let pending = s.get_careers_needing_pageviews().await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].wikidata_id, qid("Q1"));
}

pub async fn pageview_batch_skips_unknown_ids<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  let updated = s
    .update_pageviews_batch(vec![views("Q1", 10, 0.01), views("Q999", 10, 0.01)])
    .await
    .unwrap();
  assert_eq!(updated, 1);
  assert_eq!(s.count().await.unwrap(), 1);
}

/// Every single-career write against an unknown id fails and leaves no rows.
pub async fn writes_to_missing_career_fail<S: CareerStore>(s: &S) {
  assert!(s.update_pageviews(views("Q7", 1, 0.0)).await.is_err());
  assert!(s
    .update_career_status(qid("Q7"), CareerStatus::NotACareer, None, None)
    .await
    .is_err());
  assert!(s.update_career_lede(qid("Q7"), String::new()).await.is_err());
  assert!(s
    .add_career_image(qid("Q7"), NewCareerImage::wikipedia("x", None))
    .await
    .is_err());
  assert!(s
    .add_career_images(qid("Q7"), vec![NewCareerImage::wikipedia("x", None)])
    .await
    .is_err());
  assert!(s
    .set_replacement_image(qid("Q7"), replacement("https://ov.example/1.jpg", "x"))
    .await
    .is_err());

  assert_eq!(s.count().await.unwrap(), 0);
  assert!(s.get_career_images(qid("Q7"), None).await.unwrap().is_empty());
}

// ─── Review ──────────────────────────────────────────────────────────────────

pub async fn status_update_keeps_omitted_notes<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  s.update_career_status(qid("Q1"), CareerStatus::HasDiverseImages, Some("sam".into()), Some("fine".into()))
    .await
    .unwrap();

  s.update_career_status(qid("Q1"), CareerStatus::NeedsDiverseImages, None, None)
    .await
    .unwrap();

  let c = s.get_career(qid("Q1")).await.unwrap().unwrap();
  assert_eq!(c.status, CareerStatus::NeedsDiverseImages);
  assert_eq!(c.notes.as_deref(), Some("fine"));
  assert_eq!(c.reviewed_by.as_deref(), Some("sam"));
  assert!(c.reviewed_at.is_some());
}

pub async fn any_status_reaches_any_other<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  for from in CareerStatus::iter() {
    for to in CareerStatus::iter() {
      s.update_career_status(qid("Q1"), from, None, None).await.unwrap();
      s.update_career_status(qid("Q1"), to, None, None).await.unwrap();
      assert_eq!(s.get_career(qid("Q1")).await.unwrap().unwrap().status, to);
    }
  }
}

pub async fn lede_is_cached<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  s.update_career_lede(qid("Q1"), "A nurse is a health care provider.".into())
    .await
    .unwrap();

  let c = s.get_career(qid("Q1")).await.unwrap().unwrap();
  assert_eq!(c.lede_text.as_deref(), Some("A nurse is a health care provider."));
  assert!(c.lede_fetched_at.is_some());
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

pub async fn all_careers_sorted_by_bucket_then_name<S: CareerStore>(s: &S) {
  seed(s, &[
    ("Q1", "teacher", 250.0),
    ("Q2", "Zoologist", 2100.0),
    ("Q3", "doctor", 5000.0),
    ("Q4", "Accountant", 300.0),
    ("Q5", "baker", 499.99),
    ("Q6", "Miner", 12.0),
  ])
  .await;

  let all = s.get_all_careers().await.unwrap();
  let names: Vec<&str> = all.iter().map(|r| r.career.name.as_str()).collect();
  assert_eq!(names, ["doctor", "Zoologist", "Accountant", "baker", "teacher", "Miner"]);
  assert_eq!(all[0].bucket_label, ">2,000");
  assert_eq!(all[5].bucket_index, 6);

  for pair in all.windows(2) {
    let (a, b) = (&pair[0], &pair[1]);
    assert!(
      a.bucket_index < b.bucket_index
        || (a.bucket_index == b.bucket_index
          && a.career.name.to_lowercase() <= b.career.name.to_lowercase())
    );
  }
}

pub async fn status_listing_filters_and_limits_busiest_first<S: CareerStore>(s: &S) {
  seed(s, &[
    ("Q1", "Nurse", 900.0),
    ("Q2", "Baker", 100.0),
    ("Q3", "Pilot", 600.0),
    ("Q4", "Farmer", 50.0),
  ])
  .await;
  s.update_career_status(qid("Q4"), CareerStatus::NotACareer, None, None)
    .await
    .unwrap();

  let unreviewed = s
    .get_careers_by_status(CareerStatus::Unreviewed, None)
    .await
    .unwrap();
  let names: Vec<&str> = unreviewed.iter().map(|r| r.career.name.as_str()).collect();
  assert_eq!(names, ["Nurse", "Pilot", "Baker"]);

  // The limit keeps the two busiest, which are then re-ranked.
  let top2 = s
    .get_careers_by_status(CareerStatus::Unreviewed, Some(2))
    .await
    .unwrap();
  let names: Vec<&str> = top2.iter().map(|r| r.career.name.as_str()).collect();
  assert_eq!(names, ["Nurse", "Pilot"]);

  let rejected = s
    .get_careers_by_status(CareerStatus::NotACareer, None)
    .await
    .unwrap();
  assert_eq!(rejected.len(), 1);
  assert_eq!(rejected[0].career.name, "Farmer");
}

pub async fn search_is_case_insensitive_substring<S: CareerStore>(s: &S) {
  seed(s, &[
    ("Q1", "Software engineer", 900.0),
    ("Q2", "Civil Engineer", 400.0),
    ("Q3", "Baker", 100.0),
  ])
  .await;

  assert_eq!(names_matching(s, "ENGINEER").await, ["Software engineer", "Civil Engineer"]);
  assert!(names_matching(s, "plumber").await.is_empty());
}

pub async fn search_folds_non_ascii_case<S: CareerStore>(s: &S) {
  seed(s, &[
    ("Q1", "Éboueur", 40.0),
    ("Q2", "Straßenbahnfahrer", 30.0),
    ("Q3", "Ingénieur", 20.0),
  ])
  .await;

  assert_eq!(names_matching(s, "éboueur").await, ["Éboueur"]);
  assert_eq!(names_matching(s, "ÉBOUEUR").await, ["Éboueur"]);
  assert_eq!(names_matching(s, "INGÉNIEUR").await, ["Ingénieur"]);
  assert_eq!(names_matching(s, "straß").await, ["Straßenbahnfahrer"]);
}

pub async fn search_wildcards_match_literally<S: CareerStore>(s: &S) {
  seed(s, &[
    ("Q1", "Nurse", 900.0),
    ("Q2", "100% agent", 10.0),
    ("Q3", "snake_charmer", 20.0),
    ("Q4", "Baker", 30.0),
    ("Q5", "back\\slash", 5.0),
  ])
  .await;

  assert_eq!(names_matching(s, "%").await, ["100% agent"]);
  assert_eq!(names_matching(s, "_").await, ["snake_charmer"]);
  assert_eq!(names_matching(s, "\\").await, ["back\\slash"]);
}

pub async fn top_careers_use_numeric_order_and_skip_zero_traffic<S: CareerStore>(s: &S) {
  seed(s, &[
    ("Q1", "Zoologist", 2100.0),
    ("Q2", "Doctor", 5000.0),
    ("Q3", "Nurse", 150.0),
    ("Q4", "Idle", 0.0),
  ])
  .await;

  let top = s.get_top_careers(10).await.unwrap();
  let names: Vec<&str> = top.iter().map(|c| c.name.as_str()).collect();
  assert_eq!(names, ["Doctor", "Zoologist", "Nurse"]);
  assert_eq!(s.get_top_careers(1).await.unwrap().len(), 1);
}

// ─── Statistics ──────────────────────────────────────────────────────────────

pub async fn stats_summarise_dataset<S: CareerStore>(s: &S) {
  let empty = s.get_stats().await.unwrap();
  assert_eq!(empty.total_careers, 0);
  assert_eq!(empty.total_views, 0);
  assert!(empty.top_career.is_none());

  let mut job = new_career("Q3", "Cashier");
  job.category = Category::Job;
  s.upsert_careers(vec![new_career("Q1", "Nurse"), new_career("Q2", "Baker"), job])
    .await
    .unwrap();
  s.update_pageviews_batch(vec![views("Q1", 1000, 40.0), views("Q2", 500, 20.0)])
    .await
    .unwrap();
  s.update_career_status(qid("Q2"), CareerStatus::GenderSpecific, None, None)
    .await
    .unwrap();

  let stats = s.get_stats().await.unwrap();
  assert_eq!(stats.total_careers, 3);
  assert_eq!(stats.with_pageviews, 2);
  assert_eq!(stats.total_views, 1500);
  assert_eq!(stats.by_category["profession"], 2);
  assert_eq!(stats.by_category["job"], 1);
  assert_eq!(stats.by_status["unreviewed"], 2);
  assert_eq!(stats.by_status["gender_specific"], 1);
  let top = stats.top_career.unwrap();
  assert_eq!(top.name, "Nurse");
  assert_eq!(top.views, 1000);
}

/// A dataset with no traffic yet still names its first career.
pub async fn stats_top_career_includes_zero_traffic<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();

  let stats = s.get_stats().await.unwrap();
  assert_eq!(stats.with_pageviews, 0);
  let top = stats.top_career.unwrap();
  assert_eq!(top.name, "Nurse");
  assert_eq!(top.views, 0);
}

// ─── Images ──────────────────────────────────────────────────────────────────

pub async fn bulk_images_default_position_and_stamp_fetch_time<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();

  let n = s
    .add_career_images(qid("Q1"), vec![
      NewCareerImage::wikipedia("https://upload.example/a.jpg", Some("A".into())),
      NewCareerImage::wikipedia("https://upload.example/b.jpg", None),
      NewCareerImage::wikipedia("https://upload.example/c.jpg", None),
    ])
    .await
    .unwrap();
  assert_eq!(n, 3);

  let images = s.get_career_images(qid("Q1"), None).await.unwrap();
  let positions: Vec<i64> = images.iter().map(|i| i.position).collect();
  assert_eq!(positions, [0, 1, 2]);
  assert_eq!(images[0].caption.as_deref(), Some("A"));
  assert!(images.iter().all(|i| i.source == ImageSource::Wikipedia && !i.is_replacement));

  let c = s.get_career(qid("Q1")).await.unwrap().unwrap();
  assert!(c.images_fetched_at.is_some());
}

pub async fn clear_and_delete_images<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  s.add_career_images(qid("Q1"), vec![
    NewCareerImage::wikipedia("https://upload.example/a.jpg", None),
    NewCareerImage::wikipedia("https://upload.example/b.jpg", None),
  ])
  .await
  .unwrap();
  let single = s
    .add_career_image(qid("Q1"), NewCareerImage {
      image_url: "https://openverse.example/c.jpg".into(),
      position: Some(5),
      source: ImageSource::Openverse,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(single.position, 5);

  let openverse = s
    .get_career_images(qid("Q1"), Some(ImageSource::Openverse))
    .await
    .unwrap();
  assert_eq!(openverse.len(), 1);

  assert!(s.delete_career_image(single.id).await.unwrap());
  assert!(!s.delete_career_image(single.id).await.unwrap());

  let cleared = s
    .clear_career_images(qid("Q1"), Some(ImageSource::Wikipedia))
    .await
    .unwrap();
  assert_eq!(cleared, 2);
  assert!(s.get_career_images(qid("Q1"), None).await.unwrap().is_empty());
}

pub async fn replacement_is_unique_and_latest_wins<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  s.add_career_images(qid("Q1"), vec![NewCareerImage::wikipedia("https://upload.example/a.jpg", None)])
    .await
    .unwrap();

  for n in 1..=4 {
    s.set_replacement_image(qid("Q1"), replacement(&format!("https://ov.example/{n}.jpg"), &format!("c{n}")))
      .await
      .unwrap();
  }

  let images = s.get_career_images(qid("Q1"), None).await.unwrap();
  let replacements: Vec<_> = images.iter().filter(|i| i.is_replacement).collect();
  assert_eq!(replacements.len(), 1);
  let r = replacements[0];
  assert_eq!(r.image_url, "https://ov.example/4.jpg");
  assert_eq!(r.caption.as_deref(), Some("photo by c4"));
  assert_eq!(r.source, ImageSource::Openverse);
  assert_eq!(r.metadata.as_ref().and_then(|m| m.creator.as_deref()), Some("c4"));
  // The Wikipedia image is untouched.
  assert_eq!(images.len(), 2);
}

pub async fn replacement_without_metadata_stores_none<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  let img = s
    .set_replacement_image(qid("Q1"), ReplacementImage {
      image_url: "https://ov.example/1.jpg".into(),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(img.metadata.is_none());
  assert!(img.is_replacement);
}

/// Plain image writes after a replacement is set neither fail nor take its
/// place, and the next replacement still swaps cleanly.
pub async fn plain_images_never_displace_the_replacement<S: CareerStore>(s: &S) {
  s.upsert_career(new_career("Q1", "Nurse")).await.unwrap();
  s.set_replacement_image(qid("Q1"), replacement("https://ov.example/1.jpg", "c1"))
    .await
    .unwrap();

  let single = s
    .add_career_image(qid("Q1"), NewCareerImage {
      image_url: "https://openverse.example/extra.jpg".into(),
      source: ImageSource::Openverse,
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(!single.is_replacement);

  let added = s
    .add_career_images(qid("Q1"), vec![
      NewCareerImage::wikipedia("https://upload.example/a.jpg", None),
      NewCareerImage::wikipedia("https://upload.example/b.jpg", None),
    ])
    .await
    .unwrap();
  assert_eq!(added, 2);

  let images = s.get_career_images(qid("Q1"), None).await.unwrap();
  assert_eq!(images.len(), 4);
  let replacements: Vec<_> = images.iter().filter(|i| i.is_replacement).collect();
  assert_eq!(replacements.len(), 1);
  assert_eq!(replacements[0].image_url, "https://ov.example/1.jpg");

  s.set_replacement_image(qid("Q1"), replacement("https://ov.example/2.jpg", "c2"))
    .await
    .unwrap();
  let images = s.get_career_images(qid("Q1"), None).await.unwrap();
  assert_eq!(images.len(), 4);
  let replacements: Vec<_> = images.iter().filter(|i| i.is_replacement).collect();
  assert_eq!(replacements.len(), 1);
  assert_eq!(replacements[0].image_url, "https://ov.example/2.jpg");
}

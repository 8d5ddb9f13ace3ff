//! Plain-text tables for terminal output.

use careers_core::{
  bucket::RankedCareer,
  career::Career,
  image::CareerImage,
  store::DatasetStats,
};
use careers_ingest::openverse::OpenverseSearch;

/// Cut `s` to `width` characters, marking the cut with `…`.
fn fit(s: &str, width: usize) -> String {
  if s.chars().count() <= width {
    return s.to_owned();
  }
  let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
  out.push('…');
  out
}

/// Thousands separators for view counts.
pub fn thousands(n: i64) -> String {
  let digits = n.unsigned_abs().to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(c);
  }
  if n < 0 { format!("-{out}") } else { out }
}

fn career_row(rank: usize, c: &Career) -> String {
  format!(
    "{:>4}  {:<12} {:<40} {:>12} {:>10.1}  {}",
    rank,
    c.wikidata_id.as_str(),
    fit(&c.name, 40),
    thousands(c.pageviews_total),
    c.avg_daily_views,
    c.status,
  )
}

fn career_header() -> String {
  format!(
    "{:>4}  {:<12} {:<40} {:>12} {:>10}  {}",
    "#", "ID", "Name", "Views", "Daily", "Status"
  )
}

/// Careers in plain numeric order.
pub fn print_careers(careers: &[Career]) {
  if careers.is_empty() {
    println!("No careers.");
    return;
  }
  println!("{}", career_header());
  for (i, c) in careers.iter().enumerate() {
    println!("{}", career_row(i + 1, c));
  }
}

/// Careers grouped under their traffic bucket headings.
pub fn print_ranked(careers: &[RankedCareer]) {
  if careers.is_empty() {
    println!("No careers.");
    return;
  }
  let mut current = None;
  for (i, r) in careers.iter().enumerate() {
    if current != Some(r.bucket_index) {
      current = Some(r.bucket_index);
      println!();
      println!("── {} ──", r.bucket_label);
      println!("{}", career_header());
    }
    println!("{}", career_row(i + 1, &r.career));
  }
}

pub fn print_career(c: &Career) {
  println!("{} ({})", c.name, c.wikidata_id.as_str());
  println!("  category:  {}", c.category);
  println!("  status:    {}", c.status);
  if let Some(url) = &c.wikipedia_url {
    println!("  article:   {url}");
  }
  println!("  views:     {} ({:.2}/day)", thousands(c.pageviews_total), c.avg_daily_views);
  if let Some(by) = &c.reviewed_by {
    println!("  reviewer:  {by}");
  }
  if let Some(notes) = &c.notes {
    println!("  notes:     {notes}");
  }
}

pub fn print_stats(stats: &DatasetStats) {
  println!("{}", "=".repeat(50));
  println!("DATASET SUMMARY");
  println!("{}", "=".repeat(50));
  println!("Total careers:          {}", stats.total_careers);
  println!("With pageview data:     {}", stats.with_pageviews);
  println!("Total pageviews:        {}", thousands(stats.total_views));

  println!();
  println!("By category:");
  for (category, n) in &stats.by_category {
    println!("  {category:<12} {n}");
  }

  println!();
  println!("By status:");
  for (status, n) in &stats.by_status {
    println!("  {status:<22} {n}");
  }

  if let Some(top) = &stats.top_career {
    println!();
    println!("Top career: {} ({} views)", top.name, thousands(top.views));
  }
}

pub fn print_images(images: &[CareerImage]) {
  if images.is_empty() {
    println!("No images.");
    return;
  }
  for img in images {
    let marker = if img.is_replacement { "*" } else { " " };
    println!("{marker}{:>6}  [{}] {}", img.id, img.source, img.image_url);
    if let Some(caption) = &img.caption {
      println!("         {}", fit(caption, 100));
    }
    if let Some(meta) = &img.metadata {
      let creator = meta.creator.as_deref().unwrap_or("unknown");
      let license = meta.license.as_deref().unwrap_or("unknown");
      println!("         by {creator}, {license}");
    }
  }
}

pub fn print_openverse(search: &OpenverseSearch) {
  println!("{} results ({} pages)", search.result_count, search.page_count);
  for img in &search.results {
    let commons = if img.is_commons() { "commons" } else { "" };
    println!(
      "{:<38} {:<8} {:<20} {:<8} {}",
      img.id,
      img.license.as_deref().unwrap_or("-"),
      fit(&img.creator, 20),
      commons,
      fit(&img.title, 50),
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formats_thousands() {
    assert_eq!(thousands(0), "0");
    assert_eq!(thousands(999), "999");
    assert_eq!(thousands(1000), "1,000");
    assert_eq!(thousands(1234567), "1,234,567");
    assert_eq!(thousands(-45000), "-45,000");
  }

  #[test]
  fn fits_long_names() {
    assert_eq!(fit("nurse", 10), "nurse");
    assert_eq!(fit("software engineer", 8), "softwar…");
  }
}

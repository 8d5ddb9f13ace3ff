//! Subcommands, generic over the store backend.

use anyhow::{Context as _, Result, bail};
use clap::Subcommand;

use careers_core::{
  career::{CareerStatus, WikidataId},
  image::{ImageSource, NewCareerImage},
  store::{CareerStore, DEFAULT_LIST_LIMIT},
};
use careers_ingest::{
  http::build_client,
  openverse::{OpenverseClient, DEFAULT_PAGE_SIZE},
  pageviews::PageviewClient,
  pipeline,
  wikidata::{load_career_classes, WikidataClient},
  wikipedia::{display_title, WikipediaClient},
};

use crate::{output, settings::Settings};

fn parse_id(s: &str) -> Result<WikidataId, careers_core::Error> { WikidataId::parse(s) }

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Discover careers on Wikidata and fetch their pageviews.
  Fetch {
    /// Stop after this many careers.
    #[arg(long)]
    limit: Option<usize>,
  },
  /// Fetch pageviews for careers that do not have them yet.
  Resume,
  /// Print dataset statistics.
  Stats,
  /// Print the most viewed careers.
  Top {
    #[arg(default_value_t = 20)]
    n: usize,
  },
  /// Rebuild the career class cache from Wikidata.
  RefreshClasses,
  /// List careers by traffic bucket.
  List {
    #[arg(long)]
    status: Option<CareerStatus>,
    #[arg(long)]
    limit:  Option<usize>,
  },
  /// Find careers by name.
  Search {
    query: String,
    #[arg(long)]
    limit: Option<usize>,
  },
  /// Record a review decision.
  Review {
    #[arg(value_parser = parse_id)]
    id:     WikidataId,
    status: CareerStatus,
    #[arg(long = "by")]
    by:     Option<String>,
    #[arg(long)]
    notes:  Option<String>,
  },
  /// Show a career's article introduction.
  Lede {
    #[arg(value_parser = parse_id)]
    id:      WikidataId,
    /// Fetch again even if cached.
    #[arg(long)]
    refresh: bool,
  },
  /// Show a career's images, fetching them from Wikipedia on first use.
  Images {
    #[arg(value_parser = parse_id)]
    id:      WikidataId,
    #[arg(long)]
    refresh: bool,
  },
  /// Search Openverse for compatible images.
  Openverse {
    query:     String,
    #[arg(long, default_value_t = 1)]
    page:      u32,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
  },
  /// Use an Openverse image as a career's replacement image.
  Replace {
    #[arg(value_parser = parse_id)]
    id:           WikidataId,
    openverse_id: String,
    #[arg(long)]
    caption:      Option<String>,
  },
  /// Delete one image row.
  RemoveImage { image_id: i64 },
}

pub async fn run<S: CareerStore>(store: &S, settings: &Settings, command: Command) -> Result<()> {
  let http = || build_client(&settings.user_agent, settings.http_timeout()).context("failed to build HTTP client");

  match command {
    Command::Fetch { limit } => {
      let classes = load_career_classes(&settings.classes_file).await?;
      let sparql = build_client(&settings.user_agent, settings.sparql_timeout())
        .context("failed to build HTTP client")?;
      let wikidata = WikidataClient::new(sparql, &settings.wikidata_endpoint);
      let careers = wikidata.discover_careers(&classes, limit).await;

      let pageviews = PageviewClient::new(http()?, &settings.pageviews_base_url, settings.pageview_window());
      let report = pipeline::ingest(store, &pageviews, careers, settings.batch_options(), |_| {})
        .await
        .context("fetch failed")?;
      println!(
        "Stored {} careers, updated pageviews for {}.",
        report.upserted, report.updated
      );
      print_stats(store).await
    }

    Command::Resume => {
      let pageviews = PageviewClient::new(http()?, &settings.pageviews_base_url, settings.pageview_window());
      let report = pipeline::resume(store, &pageviews, settings.batch_options(), |_| {})
        .await
        .context("resume failed")?;
      println!("Updated pageviews for {} careers.", report.updated);
      print_stats(store).await
    }

    Command::Stats => print_stats(store).await,

    Command::Top { n } => {
      let top = store.get_top_careers(n).await.context("failed to load top careers")?;
      output::print_careers(&top);
      Ok(())
    }

    Command::RefreshClasses => {
      let sparql = build_client(&settings.user_agent, settings.sparql_timeout())
        .context("failed to build HTTP client")?;
      let cache = WikidataClient::new(sparql, &settings.wikidata_endpoint)
        .refresh_career_classes()
        .await
        .context("failed to query career classes")?;
      cache.write(&settings.classes_file).await.with_context(|| {
        format!("failed to write {}", settings.classes_file.display())
      })?;
      println!(
        "Saved {} career classes to {}",
        cache.classes.len(),
        settings.classes_file.display()
      );
      Ok(())
    }

    Command::List { status, limit } => {
      let careers = match status {
        Some(status) => store
          .get_careers_by_status(status, Some(limit.unwrap_or(DEFAULT_LIST_LIMIT)))
          .await
          .context("failed to list careers")?,
        None => {
          let mut all = store.get_all_careers().await.context("failed to list careers")?;
          if let Some(n) = limit {
            all.truncate(n);
          }
          all
        }
      };
      output::print_ranked(&careers);
      Ok(())
    }

    Command::Search { query, limit } => {
      let found = store
        .search_careers(&query, Some(limit.unwrap_or(DEFAULT_LIST_LIMIT)))
        .await
        .context("search failed")?;
      output::print_ranked(&found);
      Ok(())
    }

    Command::Review { id, status, by, notes } => {
      store
        .update_career_status(id.clone(), status, by, notes)
        .await
        .with_context(|| format!("failed to review {}", id.as_str()))?;
      let career = store.get_career(id).await.context("failed to reload career")?;
      if let Some(career) = career {
        output::print_career(&career);
      }
      Ok(())
    }

    Command::Lede { id, refresh } => {
      let career = require_career(store, &id).await?;
      if let Some(lede) = career.lede_text.filter(|_| !refresh) {
        println!("{lede}");
        return Ok(());
      }

      let title = career.wikipedia_url.as_deref().map(display_title).unwrap_or_default();
      if title.is_empty() {
        bail!("{} has no Wikipedia article", id.as_str());
      }
      let lede = WikipediaClient::new(http()?, &settings.wikipedia_api_url)
        .fetch_lede(&title)
        .await
        .with_context(|| format!("failed to fetch lede for {title}"))?;
      store.update_career_lede(id, lede.clone()).await.context("failed to cache lede")?;
      println!("{lede}");
      Ok(())
    }

    Command::Images { id, refresh } => {
      let career = require_career(store, &id).await?;
      let cached = store
        .get_career_images(id.clone(), Some(ImageSource::Wikipedia))
        .await
        .context("failed to load images")?;

      if refresh || (cached.is_empty() && career.images_fetched_at.is_none()) {
        let title = career.wikipedia_url.as_deref().map(display_title).unwrap_or_default();
        if title.is_empty() {
          bail!("{} has no Wikipedia article", id.as_str());
        }
        let found = WikipediaClient::new(http()?, &settings.wikipedia_api_url)
          .fetch_article_images(&title)
          .await
          .with_context(|| format!("failed to fetch images for {title}"))?;
        store
          .clear_career_images(id.clone(), Some(ImageSource::Wikipedia))
          .await
          .context("failed to clear images")?;
        let rows: Vec<NewCareerImage> = found.into_iter().map(Into::into).collect();
        let added = store.add_career_images(id.clone(), rows).await.context("failed to store images")?;
        tracing::info!(career = id.as_str(), added, "stored article images");
      }

      let images = store.get_career_images(id, None).await.context("failed to load images")?;
      output::print_images(&images);
      Ok(())
    }

    Command::Openverse { query, page, page_size } => {
      let search = OpenverseClient::new(http()?, &settings.openverse_api_url)
        .search_images(&query, page, page_size)
        .await
        .context("openverse search failed")?;
      output::print_openverse(&search);
      Ok(())
    }

    Command::Replace { id, openverse_id, caption } => {
      let image = OpenverseClient::new(http()?, &settings.openverse_api_url)
        .get_image(&openverse_id)
        .await
        .context("openverse lookup failed")?
        .with_context(|| format!("no Openverse image {openverse_id}"))?;
      let Some(replacement) = image.to_replacement(caption) else {
        bail!("Openverse image {openverse_id} has no image URL");
      };
      let row = store
        .set_replacement_image(id.clone(), replacement)
        .await
        .with_context(|| format!("failed to set replacement for {}", id.as_str()))?;
      println!("Replacement image {} set for {}", row.id, id.as_str());
      println!("Attribution: {}", image.attribution_text());
      Ok(())
    }

    Command::RemoveImage { image_id } => {
      if !store.delete_career_image(image_id).await.context("failed to delete image")? {
        bail!("no image with id {image_id}");
      }
      println!("Deleted image {image_id}");
      Ok(())
    }
  }
}

async fn require_career<S: CareerStore>(store: &S, id: &WikidataId) -> Result<careers_core::career::Career> {
  store
    .get_career(id.clone())
    .await
    .context("failed to load career")?
    .with_context(|| format!("no career {}", id.as_str()))
}

async fn print_stats<S: CareerStore>(store: &S) -> Result<()> {
  let stats = store.get_stats().await.context("failed to compute stats")?;
  output::print_stats(&stats);
  Ok(())
}

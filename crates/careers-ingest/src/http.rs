//! Shared HTTP client construction.
//!
//! Every external API receives the same user agent; timeouts are fixed per
//! client and there are no retries beyond what `reqwest` does itself.

use std::time::Duration;

use reqwest::Client;

use crate::Result;

pub const DEFAULT_USER_AGENT: &str =
  "WikipediaCareerDiversityTool/1.0 (https://github.com/tieguy/wikipedia-career-images)";

/// Build a client carrying `user_agent` with a per-request `timeout`.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
  Ok(Client::builder().user_agent(user_agent).timeout(timeout).build()?)
}

/// Join `base` and `path` with exactly one slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
  format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

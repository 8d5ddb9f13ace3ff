//! Local HTTP fixtures for client tests.

use std::time::Duration;

use axum::Router;

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn serve(router: Router) -> String {
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
  format!("http://{addr}")
}

pub fn client() -> reqwest::Client {
  crate::http::build_client("careers-test/0", Duration::from_secs(5)).unwrap()
}

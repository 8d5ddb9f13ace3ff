//! Data ingestion for the career store.
//!
//! Discovers careers on Wikidata, aggregates their Wikipedia pageviews under a
//! bounded-concurrency scheduler, and writes the results to any
//! [`CareerStore`](careers_core::store::CareerStore). Also hosts the thin
//! Wikipedia and Openverse clients used while reviewing a career.

pub mod error;
pub mod http;
pub mod openverse;
pub mod pageviews;
pub mod pipeline;
pub mod scheduler;
pub mod wikidata;
pub mod wikipedia;

pub use error::{Error, Result};

#[cfg(test)]
mod testing;

//! Core types and trait definitions for the career image review store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends and the ingestion pipeline depend on it; it depends on
//! nothing but serialisation and time crates.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod bucket;
pub mod career;
pub mod category;
#[cfg(feature = "contract-tests")]
pub mod contract;
pub mod error;
pub mod image;
pub mod store;

pub use error::{Error, Result};

//! stakeholder-acquire - stakeholder document acquisition pipeline.
//!
//! Searches the web for documents published by a list of organizations,
//! records candidate URLs in SQLite, downloads them with bounded concurrency
//! and extracts their text into JSON artifacts.

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod cli;
pub mod config;
pub mod discovery;
pub mod extraction;
pub mod http_client;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod schema;
pub mod services;

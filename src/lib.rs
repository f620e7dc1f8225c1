//! courseharvest - scheduled course catalog ingestion.
//!
//! Fetches university course listings (plain HTTP or a headless browser),
//! extracts candidate records through per-target selector maps, validates
//! them, and stores the accepted ones. A cron scheduler drives recurring
//! ingestion jobs and a monitoring sink keeps bounded operation metrics.

// Model enums use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod cli;
pub mod config;
pub mod context;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod services;
pub mod utils;
pub mod validation;

//! gztarchiver - resumable, crash-safe archiver for government gazettes.
//!
//! Takes the document list produced by an upstream table scraper, fetches
//! each language's PDF into a deterministic `year/month/day/doc_id` tree and
//! keeps per-year CSV ledgers and a batch checkpoint so repeated or
//! interrupted runs pick up where they left off.

pub mod cli;
pub mod config;
pub mod http_client;
pub mod models;
pub mod repository;
pub mod services;
pub mod storage;

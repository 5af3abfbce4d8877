//! Client code for vidrec.
//!
//! This crate provides the HTTP fetch pipeline that populates cache
//! generations and serves network fallbacks, plus URL resolution for
//! manifest entries.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, parse_origin, resolve, resolve_manifest};

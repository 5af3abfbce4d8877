//! SQLite-backed durable store shared by the counter and the asset cache.
//!
//! This module provides a persistent store using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Idempotent schema migrations on every open
//! - WAL mode so cache lookups read a consistent snapshot during activation

pub mod connection;
pub mod migrations;

pub use connection::StoreDb;

//! Cache generation storage: install, activation sweep, listing and deletion.
//!
//! A generation moves through `Installing -> Installed -> Active ->
//! Superseded -> Deleted`. Only `installed` and `active` are persisted; the
//! other states exist for the duration of a single operation. A partial
//! unique index guarantees at most one `active` row.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

use super::fetcher::FetchedAsset;
use super::hash::compute_body_digest;
use super::lookup::request_key;
use crate::Error;
use crate::store::StoreDb;

/// Lifecycle state of a cache generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Installing,
    Installed,
    Active,
    Superseded,
    Deleted,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Installing => "installing",
            GenerationState::Installed => "installed",
            GenerationState::Active => "active",
            GenerationState::Superseded => "superseded",
            GenerationState::Deleted => "deleted",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "active" => GenerationState::Active,
            _ => GenerationState::Installed,
        }
    }
}

/// A stored cache generation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGeneration {
    pub name: String,
    pub state: GenerationState,
    pub entry_count: u64,
    pub installed_at: String,
    pub activated_at: Option<String>,
}

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    pub generation: String,
    pub entries: u64,
    pub bytes: u64,
}

/// Outcome of an activation sweep.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivationReport {
    pub active: String,
    /// Generation that was active before, if it changed.
    pub superseded: Option<String>,
    pub deleted: Vec<String>,
}

fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct EntryRow {
    url: String,
    status: i64,
    content_type: Option<String>,
    headers_json: String,
    body: Vec<u8>,
    digest: String,
}

impl StoreDb {
    /// Write a fully fetched generation in one transaction.
    ///
    /// Reinstalling an existing name replaces its entries atomically and
    /// keeps its current state, so an active generation stays active.
    pub(crate) async fn store_generation(
        &self, name: &str, assets: Vec<(Url, FetchedAsset)>,
    ) -> Result<InstallReport, Error> {
        let name = name.to_string();
        let now = Utc::now().to_rfc3339();

        let mut rows = Vec::with_capacity(assets.len());
        for (url, asset) in assets {
            let headers_json = serde_json::to_string(&asset.headers)
                .map_err(|e| Error::InvalidInput(format!("failed to serialize headers for {url}: {e}")))?;
            rows.push(EntryRow {
                url: request_key(&url),
                status: i64::from(asset.status),
                content_type: asset.content_type,
                headers_json,
                digest: compute_body_digest(&asset.body),
                body: asset.body.to_vec(),
            });
        }

        self.conn
            .call(move |conn| -> Result<InstallReport, Error> {
                let tx = conn.transaction()?;

                let existing: Option<String> = optional(tx.query_row(
                    "SELECT state FROM cache_generations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                ))?;

                if existing.is_some() {
                    tx.execute("DELETE FROM cache_entries WHERE generation = ?1", params![name])?;
                    tx.execute(
                        "UPDATE cache_generations SET installed_at = ?2 WHERE name = ?1",
                        params![name, now],
                    )?;
                } else {
                    tx.execute(
                        "INSERT INTO cache_generations (name, state, installed_at) VALUES (?1, 'installed', ?2)",
                        params![name, now],
                    )?;
                }

                let mut bytes = 0u64;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO cache_entries (
                            generation, method, url, status_code, content_type,
                            headers_json, body, digest, stored_at
                        ) VALUES (?1, 'GET', ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            name,
                            row.url,
                            row.status,
                            row.content_type,
                            row.headers_json,
                            row.body,
                            row.digest,
                            now,
                        ])?;
                        bytes += row.body.len() as u64;
                    }
                }

                let entries: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE generation = ?1",
                    params![name],
                    |row| row.get(0),
                )?;

                tx.commit()?;

                Ok(InstallReport { generation: name, entries: entries as u64, bytes })
            })
            .await
            .map_err(Error::from)
    }

    /// Make `name` the active generation and delete every generation not in
    /// `retain` (the new generation itself is always kept).
    pub async fn activate_generation(&self, name: &str, retain: &[String]) -> Result<ActivationReport, Error> {
        let name = name.to_string();
        let retain = retain.to_vec();
        let now = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<ActivationReport, Error> {
                let tx = conn.transaction()?;

                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(Error::UnknownGeneration(name));
                }

                let previous: Option<String> = optional(tx.query_row(
                    "SELECT name FROM cache_generations WHERE state = 'active'",
                    [],
                    |row| row.get(0),
                ))?;

                let superseded = previous.filter(|prev| *prev != name);
                if let Some(prev) = &superseded {
                    tx.execute(
                        "UPDATE cache_generations SET state = 'installed', activated_at = NULL WHERE name = ?1",
                        params![prev],
                    )?;
                    tx.execute(
                        "UPDATE cache_generations SET state = 'active', activated_at = ?2 WHERE name = ?1",
                        params![name, now],
                    )?;
                } else {
                    tx.execute(
                        "UPDATE cache_generations SET state = 'active', activated_at = COALESCE(activated_at, ?2)
                         WHERE name = ?1",
                        params![name, now],
                    )?;
                }

                let names: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT name FROM cache_generations ORDER BY installed_at")?;
                    let names = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
                    names
                };

                let mut deleted = Vec::new();
                for stale in names {
                    if stale == name || retain.contains(&stale) {
                        continue;
                    }
                    tx.execute("DELETE FROM cache_entries WHERE generation = ?1", params![stale])?;
                    tx.execute("DELETE FROM cache_generations WHERE name = ?1", params![stale])?;
                    deleted.push(stale);
                }

                tx.commit()?;

                Ok(ActivationReport { active: name, superseded, deleted })
            })
            .await
            .map_err(Error::from)
    }

    /// Name of the generation currently serving requests.
    pub async fn active_generation(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                optional(conn.query_row(
                    "SELECT name FROM cache_generations WHERE state = 'active'",
                    [],
                    |row| row.get(0),
                ))
            })
            .await
            .map_err(Error::from)
    }

    /// All stored generations, oldest install first.
    pub async fn list_generations(&self) -> Result<Vec<CacheGeneration>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheGeneration>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.state, g.installed_at, g.activated_at,
                            (SELECT COUNT(*) FROM cache_entries e WHERE e.generation = g.name)
                     FROM cache_generations g
                     ORDER BY g.installed_at, g.name",
                )?;

                let generations = stmt
                    .query_map([], |row| {
                        Ok(CacheGeneration {
                            name: row.get(0)?,
                            state: GenerationState::from_db(&row.get::<_, String>(1)?),
                            installed_at: row.get(2)?,
                            activated_at: row.get(3)?,
                            entry_count: row.get::<_, i64>(4)? as u64,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(generations)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete an inactive generation.
    ///
    /// Returns false if no generation had that name. The active generation
    /// cannot be deleted; activate another one first.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;

                let state: Option<String> = optional(tx.query_row(
                    "SELECT state FROM cache_generations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                ))?;

                match state.as_deref() {
                    None => return Ok(false),
                    Some("active") => {
                        return Err(Error::InvalidInput(format!("cannot delete active generation {name}")));
                    }
                    Some(_) => {}
                }

                tx.execute("DELETE FROM cache_entries WHERE generation = ?1", params![name])?;
                tx.execute("DELETE FROM cache_generations WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }
}

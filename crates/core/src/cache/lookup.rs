//! Cache-first request lookup against the active generation.

use bytes::Bytes;
use regex::Regex;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

use crate::Error;
use crate::store::StoreDb;

/// Lookup key for a URL: the full URL without its fragment.
pub fn request_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: String,
    pub url: Url,
}

impl AssetRequest {
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }
}

/// A response served from a cache generation.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub generation: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub digest: String,
    pub stored_at: String,
}

/// Result of handling an intercepted request.
#[derive(Debug, Clone)]
pub enum CacheOutcome {
    /// Served from the active generation.
    Hit(CachedResponse),
    /// Not in the active generation (or no generation is active).
    Miss,
    /// Excluded from interception; the request goes straight to the network.
    Bypass,
}

/// Path patterns that are never intercepted (live-reload tooling and the like).
#[derive(Debug, Clone, Default)]
pub struct BypassRules {
    patterns: Vec<Regex>,
}

impl BypassRules {
    pub fn from_patterns(patterns: &[String]) -> Result<Self, Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| Error::InvalidInput(format!("bypass pattern {p}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, url: &Url) -> bool {
        self.patterns.iter().any(|re| re.is_match(url.path()))
    }
}

impl StoreDb {
    /// Look up a request in whichever generation is active at the moment of the query.
    ///
    /// The join runs as one statement, so an activation committing at the
    /// same time is seen either entirely or not at all.
    pub async fn match_active(&self, request: &AssetRequest) -> Result<Option<CachedResponse>, Error> {
        let method = request.method.clone();
        let key = request_key(&request.url);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let result = conn.query_row(
                    "SELECT e.generation, e.method, e.url, e.status_code, e.content_type,
                            e.headers_json, e.body, e.digest, e.stored_at
                     FROM cache_entries e
                     JOIN cache_generations g ON g.name = e.generation
                     WHERE g.state = 'active' AND e.method = ?1 AND e.url = ?2",
                    params![method, key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, Option<String>>(5)?,
                            row.get::<_, Vec<u8>>(6)?,
                            row.get::<_, String>(7)?,
                            row.get::<_, String>(8)?,
                        ))
                    },
                );

                let (generation, method, url, status, content_type, headers_json, body, digest, stored_at) =
                    match result {
                        Ok(row) => row,
                        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                        Err(e) => return Err(e.into()),
                    };

                let headers = match headers_json {
                    Some(json) => serde_json::from_str(&json)
                        .map_err(|e| Error::InvalidInput(format!("corrupt headers for {url}: {e}")))?,
                    None => Vec::new(),
                };

                let status = u16::try_from(status)
                    .map_err(|_| Error::InvalidInput(format!("corrupt status {status} for {url}")))?;

                Ok(Some(CachedResponse {
                    generation,
                    method,
                    url,
                    status,
                    content_type,
                    headers,
                    body: Bytes::from(body),
                    digest,
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key_drops_fragment() {
        let url = Url::parse("http://localhost:3000/index.html?x=1#top").unwrap();
        assert_eq!(request_key(&url), "http://localhost:3000/index.html?x=1");
    }

    #[test]
    fn test_request_method_normalized() {
        let url = Url::parse("http://localhost:3000/").unwrap();
        assert_eq!(AssetRequest::new(" get ", url).method, "GET");
    }

    #[test]
    fn test_bypass_rules_match_path() {
        let rules = BypassRules::from_patterns(&[r"browser-sync-client\.js".to_string()]).unwrap();
        let tooling = Url::parse("http://localhost:3000/browser-sync/browser-sync-client.js?v=2.29").unwrap();
        let asset = Url::parse("http://localhost:3000/assets/scripts/main.js").unwrap();
        assert!(rules.matches(&tooling));
        assert!(!rules.matches(&asset));
    }

    #[test]
    fn test_bypass_rules_invalid_pattern() {
        assert!(BypassRules::from_patterns(&["[".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_match_active_without_generation() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let request = AssetRequest::get(Url::parse("http://localhost:3000/").unwrap());
        assert!(db.match_active(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_active_rejects_corrupt_status() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_generations (name, state, installed_at) VALUES ('v1', 'active', 'now')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO cache_entries (generation, method, url, status_code, body, digest, stored_at)
                     VALUES ('v1', 'GET', 'http://localhost:3000/', 70000, x'', '', 'now')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let request = AssetRequest::get(Url::parse("http://localhost:3000/").unwrap());
        let err = db.match_active(&request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(msg) if msg.contains("corrupt status")));
    }
}

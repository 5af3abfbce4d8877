//! SQLite implementation of the counter store.

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::{CounterRecord, CounterStore};
use crate::Error;
use crate::store::StoreDb;

fn to_sql_count(count: u64) -> Result<i64, Error> {
    i64::try_from(count).map_err(|_| Error::InvalidInput(format!("count {count} exceeds storage range")))
}

#[async_trait]
impl CounterStore for StoreDb {
    async fn read(&self, key: &str) -> Result<Option<CounterRecord>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CounterRecord>, Error> {
                let result = conn.query_row("SELECT id, count FROM counters WHERE id = ?1", params![key], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                });

                match result {
                    Ok((id, count)) => Ok(Some(CounterRecord { id, count: count.max(0) as u64 })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn upsert(&self, key: &str, count: u64) -> Result<(), Error> {
        let key = key.to_string();
        let count = to_sql_count(count)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO counters (id, count, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET
                        count = excluded.count,
                        updated_at = excluded.updated_at",
                    params![key, count, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn init(&self, key: &str) -> Result<CounterRecord, Error> {
        let key = key.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<CounterRecord, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO counters (id, count, updated_at) VALUES (?1, 0, ?2)
                     ON CONFLICT(id) DO NOTHING",
                    params![key, now],
                )?;
                let count: i64 = tx.query_row("SELECT count FROM counters WHERE id = ?1", params![key], |row| {
                    row.get(0)
                })?;
                tx.commit()?;
                Ok(CounterRecord { id: key, count: count.max(0) as u64 })
            })
            .await
            .map_err(Error::from)
    }

    /// Single read-modify-write transaction, so concurrent writers never lose an update.
    async fn increment(&self, key: &str) -> Result<u64, Error> {
        let key = key.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO counters (id, count, updated_at) VALUES (?1, 1, ?2)
                     ON CONFLICT(id) DO UPDATE SET
                        count = count + 1,
                        updated_at = excluded.updated_at",
                    params![key, now],
                )?;
                let count: i64 = tx.query_row("SELECT count FROM counters WHERE id = ?1", params![key], |row| {
                    row.get(0)
                })?;
                tx.commit()?;
                Ok(count.max(0) as u64)
            })
            .await
            .map_err(Error::from)
    }

    fn is_durable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::VIDEO_COUNTER;

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let db = StoreDb::open_in_memory().await.unwrap();
        assert!(db.read(VIDEO_COUNTER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_value() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.upsert(VIDEO_COUNTER, 3).await.unwrap();
        db.upsert(VIDEO_COUNTER, 7).await.unwrap();

        let record = db.read(VIDEO_COUNTER).await.unwrap().unwrap();
        assert_eq!(record, CounterRecord { id: VIDEO_COUNTER.to_string(), count: 7 });
    }

    #[tokio::test]
    async fn test_upsert_out_of_range() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let err = db.upsert(VIDEO_COUNTER, u64::MAX).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(db.read(VIDEO_COUNTER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_init_creates_zero_then_leaves_value() {
        let db = StoreDb::open_in_memory().await.unwrap();
        assert_eq!(db.init(VIDEO_COUNTER).await.unwrap().count, 0);
        assert_eq!(db.read(VIDEO_COUNTER).await.unwrap().unwrap().count, 0);

        db.increment(VIDEO_COUNTER).await.unwrap();
        db.increment(VIDEO_COUNTER).await.unwrap();
        assert_eq!(db.init(VIDEO_COUNTER).await.unwrap().count, 2);
        assert_eq!(db.read(VIDEO_COUNTER).await.unwrap().unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_increment_from_absent() {
        let db = StoreDb::open_in_memory().await.unwrap();
        assert_eq!(db.increment(VIDEO_COUNTER).await.unwrap(), 1);
        assert_eq!(db.increment(VIDEO_COUNTER).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_increments_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.sqlite");

        for n in [0u64, 1, 5] {
            let name = format!("key-{n}");
            let db = StoreDb::open(&path).await.unwrap();
            for _ in 0..n {
                db.increment(&name).await.unwrap();
            }
            drop(db);

            let reopened = StoreDb::open(&path).await.unwrap();
            let count = reopened.read(&name).await.unwrap().map(|r| r.count).unwrap_or(0);
            assert_eq!(count, n);
        }
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let db = db.clone();
            handles.push(tokio::spawn(async move { db.increment(VIDEO_COUNTER).await.unwrap() }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(db.read(VIDEO_COUNTER).await.unwrap().unwrap().count, 16);
    }
}

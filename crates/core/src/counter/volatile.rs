//! In-memory counter backend for sessions without durable storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CounterRecord, CounterStore};
use crate::Error;

/// Counters that live only as long as the process.
#[derive(Debug, Default, Clone)]
pub struct VolatileCounters {
    values: Arc<RwLock<HashMap<String, u64>>>,
}

#[async_trait]
impl CounterStore for VolatileCounters {
    async fn read(&self, key: &str) -> Result<Option<CounterRecord>, Error> {
        let values = self.values.read().await;
        Ok(values.get(key).map(|&count| CounterRecord { id: key.to_string(), count }))
    }

    async fn upsert(&self, key: &str, count: u64) -> Result<(), Error> {
        self.values.write().await.insert(key.to_string(), count);
        Ok(())
    }

    async fn init(&self, key: &str) -> Result<CounterRecord, Error> {
        let mut values = self.values.write().await;
        let count = *values.entry(key.to_string()).or_insert(0);
        Ok(CounterRecord { id: key.to_string(), count })
    }

    async fn increment(&self, key: &str) -> Result<u64, Error> {
        let mut values = self.values.write().await;
        let count = values.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    fn is_durable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_volatile_increment_and_upsert() {
        let counters = VolatileCounters::default();
        assert_eq!(counters.increment("videoCounter").await.unwrap(), 1);
        assert_eq!(counters.increment("videoCounter").await.unwrap(), 2);

        counters.upsert("videoCounter", 10).await.unwrap();
        let record = counters.read("videoCounter").await.unwrap().unwrap();
        assert_eq!(record.count, 10);
        assert!(counters.read("other").await.unwrap().is_none());

        assert_eq!(counters.init("videoCounter").await.unwrap().count, 10);
        assert_eq!(counters.init("other").await.unwrap().count, 0);
    }
}

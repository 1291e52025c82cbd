use std::{collections::HashMap, convert::Infallible};

use super::MediaCache;

#[derive(Default)]
pub struct MemoryCache {
    map: tokio::sync::Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryCache {
    pub async fn len(&self) -> usize {
        self.map.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.lock().await.is_empty()
    }
}

impl MediaCache for MemoryCache {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, Self::Error> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), Self::Error> {
        self.map.lock().await.insert(key.to_owned(), value);
        Ok(())
    }
}

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::KeyValueCache;

/// In-process TTL cache. Entries expire lazily on read; writes sweep the
/// table once it grows past a soft cap so long-running workers don't
/// accumulate dead entries.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, Vec<u8>)>>,
}

const SWEEP_THRESHOLD: usize = 4096;

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((deadline, value)) if *deadline > Instant::now() => {
                debug!("Cache hit for {}", &key[..key.len().min(24)]);
                Some(value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        if entries.len() >= SWEEP_THRESHOLD {
            let now = Instant::now();
            entries.retain(|_, (deadline, _)| *deadline > now);
        }
        entries.insert(key.to_string(), (Instant::now() + ttl, value));
    }
}

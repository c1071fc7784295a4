use dashmap::DashMap;
use std::time::{Duration, Instant};
use crate::data::types::{ProbabilitySource, ProbabilityTable};

/// Model probabilities kept for a bounded time, so odds refreshes can keep
/// using recent estimates while the model output is being rewritten.
pub struct ProbabilityCache {
    cache: DashMap<String, CachedProbability>,
    ttl: Duration,
}

struct CachedProbability {
    probability: f64,
    timestamp: Instant,
}

fn key(market_id: &str, outcome_label: &str) -> String {
    format!("{}|{}", market_id, outcome_label)
}

impl ProbabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, market_id: &str, outcome_label: &str, probability: f64) {
        self.cache.insert(
            key(market_id, outcome_label),
            CachedProbability {
                probability,
                timestamp: Instant::now(),
            },
        );
    }

    /// Insert every estimate in the table, refreshing timestamps of existing ones.
    pub fn insert_table(&self, table: &ProbabilityTable) {
        for (market_id, outcome, probability) in table.iter() {
            self.insert(market_id, outcome, probability);
        }
    }

    /// Get probability if not expired (evict on read)
    pub fn get(&self, market_id: &str, outcome_label: &str) -> Option<f64> {
        let key = key(market_id, outcome_label);
        self.cache.get(&key).and_then(|entry| {
            if entry.timestamp.elapsed() > self.ttl {
                drop(entry); // Drop the read lock
                self.cache.remove(&key);
                None
            } else {
                Some(entry.probability)
            }
        })
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.timestamp.elapsed() <= self.ttl);
        before - self.cache.len()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl ProbabilitySource for ProbabilityCache {
    fn probability(&self, market_id: &str, outcome_label: &str) -> Option<f64> {
        self.get(market_id, outcome_label)
    }
}

/// Append-only store of `TokenRecord`s.
///
/// Records live in a Redis list under `rb:v1:tokens`, one JSON document per entry.
/// Every append is also kept in process so the store keeps working, for the life of
/// the process, when Redis is absent or unreachable. A record whose push fails is
/// held back and pushed again, in order, on the next append.
use std::collections::VecDeque;

use tokio::sync::Mutex;
use tracing::warn;

use band_common::redis::RedisCache;

use crate::model::TokenRecord;

pub const RECORDS_KEY: &str = "rb:v1:tokens";

#[derive(Default)]
struct Entries {
    /// Everything appended by this process, oldest first.
    local: Vec<TokenRecord>,
    /// Appended but not yet in Redis.
    pending: VecDeque<TokenRecord>,
}

pub struct RecordStore {
    redis: RedisCache,
    entries: Mutex<Entries>,
}

impl RecordStore {
    pub fn new(redis: RedisCache) -> Self {
        Self {
            redis,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub async fn append(&self, record: TokenRecord) {
        let mut entries = self.entries.lock().await;
        entries.local.push(record.clone());
        if self.redis.is_configured() {
            entries.pending.push_back(record);
            self.flush(&mut entries.pending).await;
        }
    }

    /// All records, oldest first. Empty when nothing has been appended.
    ///
    /// With Redis reachable this is the stored list followed by any records still
    /// waiting to be pushed.
    pub async fn list(&self) -> Vec<TokenRecord> {
        let entries = self.entries.lock().await;
        let Some(raw) = self.redis.lrange_all(RECORDS_KEY).await else {
            return entries.local.clone();
        };
        raw.iter()
            .filter_map(|entry| {
                serde_json::from_str(entry)
                    .inspect_err(|e| warn!(error = %e, "skipping unreadable record"))
                    .ok()
            })
            .chain(entries.pending.iter().cloned())
            .collect()
    }

    /// Push held records head first, stopping at the first failure.
    async fn flush(&self, pending: &mut VecDeque<TokenRecord>) {
        while let Some(record) = pending.front() {
            let json = match serde_json::to_string(record) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, name = %record.name, "record serialization failed");
                    pending.pop_front();
                    continue;
                }
            };
            if !self.redis.rpush(RECORDS_KEY, &json).await {
                warn!(held = pending.len(), "records kept in process until redis accepts them");
                return;
            }
            pending.pop_front();
        }
    }
}

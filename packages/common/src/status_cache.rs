use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::job_status::JobStatus;

/// Keyed status cache consumed by the management UI to poll async-job
/// progress. The production implementation is an external service; this
/// crate only owns the contract and an in-memory stand-in.
#[async_trait]
pub trait StatusCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<JobStatus>>;

    async fn set(&self, key: &str, status: JobStatus, ttl: Duration) -> anyhow::Result<()>;
}

/// In-process cache for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryStatusCache {
    entries: DashMap<String, (JobStatus, Instant)>,
}

impl MemoryStatusCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusCache for MemoryStatusCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<JobStatus>> {
        if let Some(entry) = self.entries.get(key) {
            let (status, deadline) = *entry;
            if Instant::now() < deadline {
                return Ok(Some(status));
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, status: JobStatus, ttl: Duration) -> anyhow::Result<()> {
        self.entries
            .insert(key.to_string(), (status, Instant::now() + ttl));
        Ok(())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use common::JobStatus;
use common::channel_job::ChannelProvisionJob;
use common::status_cache::StatusCache;
use tracing::{info, warn};

/// How long job status entries stay visible to the management UI.
pub const STATUS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The third-party chat-channel provider. Production deployments plug in a
/// real backend; the contract is all this worker knows about it.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Create a channel and invite the given profiles. Returns the
    /// provider-side channel reference.
    async fn create_channel(&self, name: &str, member_ids: &[i32]) -> anyhow::Result<String>;
}

/// Provider used when no chat backend is configured. Creation succeeds
/// without contacting anything, so local runs don't wedge the queue.
pub struct NoopChannelProvider;

#[async_trait]
impl ChannelProvider for NoopChannelProvider {
    async fn create_channel(&self, name: &str, member_ids: &[i32]) -> anyhow::Result<String> {
        info!(
            name,
            members = member_ids.len(),
            "Channel provider disabled; skipping channel creation"
        );
        Ok(format!("noop:{name}"))
    }
}

/// Derive a provider-safe channel name from the competition title.
pub fn channel_name(competition_id: i32, title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        format!("comp-{competition_id}")
    } else {
        format!("comp-{competition_id}-{slug}")
    }
}

/// Execute a channel-provisioning job: create the channel with the creator
/// and judges as members, recording progress in the status cache. Status
/// writes are advisory; a cache fault never fails the job.
pub async fn handle_channel_job(
    job: &ChannelProvisionJob,
    provider: &dyn ChannelProvider,
    cache: &dyn StatusCache,
) -> anyhow::Result<()> {
    record_status(cache, &job.status_key(), JobStatus::Running).await;

    let mut members = Vec::with_capacity(job.judge_ids.len() + 1);
    members.push(job.creator_id);
    members.extend(
        job.judge_ids
            .iter()
            .copied()
            .filter(|id| *id != job.creator_id),
    );

    let channel_ref = provider
        .create_channel(&channel_name(job.competition_id, &job.title), &members)
        .await?;

    info!(
        competition_id = job.competition_id,
        channel = %channel_ref,
        "Channel provisioned"
    );
    record_status(cache, &job.status_key(), JobStatus::Succeeded).await;
    Ok(())
}

pub async fn record_status(cache: &dyn StatusCache, key: &str, status: JobStatus) {
    if let Err(e) = cache.set(key, status, STATUS_TTL).await {
        warn!(key, error = %e, "Failed to record job status");
    }
}

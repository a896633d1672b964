mod config;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::JobStatus;
use common::channel_job::ChannelProvisionJob;
use common::mq::Message;
use common::retry::{
    RetryCleanupGuard, RetryDecision, RetryTracker, calculate_backoff, spawn_cleanup_task,
};
use common::status_cache::{MemoryStatusCache, StatusCache};
use common::task::Task;
use handlers::channel::{
    ChannelProvider, NoopChannelProvider, handle_channel_job, record_status,
};
use mq::{BroccoliError, BrokerMessage, MqConfig, init_mq};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Stale retry entries are swept on this cadence.
const RETRY_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
const RETRY_MAX_AGE: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = config::WorkerAppConfig::load().context("Failed to load config")?;
    info!("Worker starting: {}", config.worker.id);

    let mq = Arc::new(
        init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        .context("Failed to initialize MQ")?,
    );

    info!(
        queue_name = %config.mq.queue_name,
        max_retries = config.worker.max_retries,
        "MQ connected"
    );

    let provider: Arc<dyn ChannelProvider> = match config.worker.channel_provider.as_str() {
        "noop" => Arc::new(NoopChannelProvider),
        other => anyhow::bail!("Unknown channel provider '{other}'"),
    };
    let cache: Arc<dyn StatusCache> = Arc::new(MemoryStatusCache::new());

    let retry_tracker = Arc::new(Mutex::new(RetryTracker::new(config.worker.max_retries)));

    // TODO: Store handle for graceful shutdown. Currently the task runs until process exit.
    let _cleanup_handle = spawn_cleanup_task(
        retry_tracker.clone(),
        RETRY_CLEANUP_INTERVAL,
        RETRY_MAX_AGE,
    );

    let backoff = (config.worker.base_delay_ms, config.worker.max_delay_ms);

    let result = mq
        .process_messages(
            &config.mq.queue_name,
            Some(config.worker.batch_size), // concurrent workers
            None,
            move |message: BrokerMessage<Task>| {
                let provider = Arc::clone(&provider);
                let cache = Arc::clone(&cache);
                let retry_tracker = Arc::clone(&retry_tracker);
                async move {
                    process_message(
                        message,
                        provider.as_ref(),
                        cache.as_ref(),
                        &retry_tracker,
                        backoff,
                    )
                    .await
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Worker stopped unexpectedly");
    }

    Ok(())
}

async fn process_message(
    message: BrokerMessage<Task>,
    provider: &dyn ChannelProvider,
    cache: &dyn StatusCache,
    retry_tracker: &Arc<Mutex<RetryTracker>>,
    (base_delay_ms, max_delay_ms): (u64, u64),
) -> Result<(), BroccoliError> {
    let task = message.payload;
    let job_id = task.id.clone();

    if task.task_type != ChannelProvisionJob::message_type() {
        warn!(task_type = %task.task_type, "Unknown task type, skipping");
        return Ok(());
    }

    let job: ChannelProvisionJob = match serde_json::from_value(task.payload) {
        Ok(j) => j,
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to parse ChannelProvisionJob; dropping");
            return Ok(());
        }
    };

    let mut cleanup_guard = RetryCleanupGuard::new(retry_tracker, &job_id);

    loop {
        match handle_channel_job(&job, provider, cache).await {
            Ok(()) => {
                retry_tracker.lock().await.clear(&job_id);
                cleanup_guard.defuse();
                return Ok(());
            }
            Err(e) => {
                let decision = retry_tracker.lock().await.record_failure(&job_id);

                match decision {
                    RetryDecision::Retry { attempt } => {
                        let delay = calculate_backoff(attempt, base_delay_ms, max_delay_ms);
                        warn!(
                            job_id = %job_id,
                            competition_id = job.competition_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying channel provisioning"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Exhausted { attempts } => {
                        error!(
                            job_id = %job_id,
                            competition_id = job.competition_id,
                            attempts,
                            error = %e,
                            "Channel provisioning failed; giving up"
                        );
                        record_status(cache, &job.status_key(), JobStatus::Failed).await;
                        cleanup_guard.defuse();
                        return Ok(());
                    }
                }
            }
        }
    }
}

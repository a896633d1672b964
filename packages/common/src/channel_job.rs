use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mq::Message;

/// A deferred request to provision an external discussion channel for a
/// freshly created competition. Published after the aggregate is durable;
/// the worker consumes it off the deferred-task queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelProvisionJob {
    /// Job identifier (UUID)
    pub job_id: String,
    /// Competition the channel belongs to
    pub competition_id: i32,
    /// Competition title, used to derive the channel name
    pub title: String,
    /// Profile that created the competition
    pub creator_id: i32,
    /// Judges to invite into the channel
    pub judge_ids: Vec<i32>,
}

impl ChannelProvisionJob {
    /// Create a new job with a generated UUID.
    pub fn new(competition_id: i32, title: String, creator_id: i32, judge_ids: Vec<i32>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            competition_id,
            title,
            creator_id,
            judge_ids,
        }
    }

    /// Cache key under which the worker records this job's status.
    pub fn status_key(&self) -> String {
        format!("competition:{}:channel", self.competition_id)
    }
}

impl Message for ChannelProvisionJob {
    fn message_type() -> &'static str {
        "channel_provision"
    }

    fn message_id(&self) -> &str {
        &self.job_id
    }
}

use broccoli_queue::queue::BroccoliQueueBuilder;
pub use broccoli_queue::{
    brokers::broker::BrokerMessage,
    error::BroccoliError,
    queue::{BroccoliQueue, ConsumeOptions},
};
use common::BuildJob;
use tracing::info;

use crate::error::MqError;

pub type MqQueue = BroccoliQueue;
pub type MqBuilder = BroccoliQueueBuilder;

pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
}

impl From<&common::config::MqAppConfig> for MqConfig {
    fn from(config: &common::config::MqAppConfig) -> Self {
        Self {
            url: config.url.clone(),
            pool_size: config.pool_size,
        }
    }
}

pub async fn init_mq(config: MqConfig) -> Result<MqQueue, MqError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(|e| MqError::Connection(e.to_string()))
}

/// Publish a build job, keyed by its run ID.
pub async fn publish_build_job(mq: &MqQueue, queue: &str, job: &BuildJob) -> Result<(), MqError> {
    mq.publish(queue, None, job, None)
        .await
        .map_err(|e| MqError::Publish {
            queue: queue.to_string(),
            reason: e.to_string(),
        })?;
    info!(queue, run_id = %job.run_id, app = %job.app, "Build job enqueued");
    Ok(())
}

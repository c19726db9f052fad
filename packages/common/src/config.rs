use serde::Deserialize;

/// App-level MQ configuration shared by the server and any build agent.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Whether build jobs are dispatched over the MQ. Default: false.
    /// When disabled, build runs are only recorded and completions must be reported directly.
    #[serde(default)]
    pub enabled: bool,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Queue the server publishes build jobs to. Default: "build_jobs".
    #[serde(default = "default_mq_job_queue")]
    pub job_queue: String,
    /// Queue the build pipeline reports completions on. Default: "build_reports".
    #[serde(default = "default_mq_report_queue")]
    pub report_queue: String,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_mq_job_queue() -> String {
    "build_jobs".into()
}
fn default_mq_report_queue() -> String {
    "build_reports".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            job_queue: default_mq_job_queue(),
            report_queue: default_mq_report_queue(),
        }
    }
}

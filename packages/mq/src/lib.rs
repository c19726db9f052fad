pub mod error;
pub mod models;

pub use error::MqError;
pub use models::{
    BrokerMessage, BroccoliError, ConsumeOptions, MqBuilder, MqConfig, MqQueue, init_mq,
    publish_build_job,
};

pub type Mq = MqQueue;

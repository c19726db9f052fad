use common::BuildOutcome;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "build_run")]
pub struct Model {
    /// UUIDv7 in canonical string form.
    #[sea_orm(primary_key, auto_increment = false)]
    pub run_id: String,

    #[sea_orm(indexed)]
    pub namespace: String,
    #[sea_orm(indexed)]
    pub app_name: String,

    pub blob_uid: String,
    pub builder_image: String,
    pub image_url: String,

    pub outcome: BuildOutcome,
    pub message: Option<String>,

    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    pub created_by: String,
    pub builder_image: Option<String>,

    /// JSON array of route strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub routes: Json,
    pub instances: i32,
    /// JSON object of environment variables.
    #[sea_orm(column_type = "JsonBinary")]
    pub environment: Json,

    /// Hex UID of the blob the application currently builds from.
    pub current_blob: Option<String>,
    pub latest_stage: Option<String>,
    pub deployed_stage: Option<String>,
    pub deployed_image: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

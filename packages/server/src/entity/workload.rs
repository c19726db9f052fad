use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "workload")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    /// The applied deploy record.
    #[sea_orm(column_type = "JsonBinary")]
    pub record: Json,
    pub revision: i64,
    pub pod_identity: String,
    pub applied_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::DependentKind;

/// A configuration or service.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dependent")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub kind: DependentKind,
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    pub catalog_service: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,

    pub created_by: String,
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

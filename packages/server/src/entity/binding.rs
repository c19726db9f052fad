use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::DependentKind;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "binding")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub app_name: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub kind: DependentKind,
    #[sea_orm(primary_key, auto_increment = false)]
    pub dependent_name: String,

    /// Content fingerprint the application last started with.
    pub fingerprint: String,
    pub bound_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

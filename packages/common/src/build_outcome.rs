#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of a build run.
///
/// A run starts `Pending` and moves to `Succeeded` or `Failed` exactly once.
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
    /// Submitted to the build pipeline, not finished yet.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// The pipeline produced an image.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "succeeded"))]
    Succeeded,
    /// The pipeline gave up.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failed"))]
    Failed,
}

impl BuildOutcome {
    /// Returns true once the run can no longer change.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub const ALL: &'static [BuildOutcome] = &[Self::Pending, Self::Succeeded, Self::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for BuildOutcome {
    fn default() -> Self {
        Self::Pending
    }
}

/// Error when parsing an invalid outcome string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcomeError {
    invalid: String,
}

impl fmt::Display for ParseOutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid build outcome '{}'. Valid values: {}",
            self.invalid,
            BuildOutcome::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseOutcomeError {}

impl FromStr for BuildOutcome {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseOutcomeError {
                invalid: s.to_string(),
            }),
        }
    }
}

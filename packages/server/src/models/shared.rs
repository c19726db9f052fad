use serde::{Deserialize, Serialize};

/// Reference to a build run on the wire.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StageRef {
    pub id: String,
}

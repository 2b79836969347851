use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Typed wrapper for the UUID of one review run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub Uuid);

impl ReviewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ReviewId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

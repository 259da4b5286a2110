use serde::{Deserialize, Serialize};

use crate::id::RecordId;

/// Character or monster overlaid on the panoramic window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotlightCharacter {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    /// Portrait as a URL or data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl SpotlightCharacter {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
        }
    }
}

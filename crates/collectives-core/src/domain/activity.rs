//! Activity and event type reference data

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Activity,
    Service,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Activity => "activity",
            ActivityKind::Service => "service",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "activity" => Some(ActivityKind::Activity),
            "service" => Some(ActivityKind::Service),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityType {
    pub id: Uuid,
    pub short_name: String,
    pub name: String,
    pub kind: ActivityKind,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
    pub id: Uuid,
    pub short_name: String,
    pub name: String,
    pub requires_activity: bool,
}

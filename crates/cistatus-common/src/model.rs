use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single CI job as reported by the upstream server.
///
/// Only the four states that influence the traffic light are named; every
/// other upstream value (`canceled`, `skipped`, `manual`, ...) decodes to
/// [`BuildState::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Failed,
    Pending,
    Running,
    Success,
    #[serde(other)]
    Other,
}

impl BuildState {
    /// Map an upstream status string onto a known state.
    pub fn from_upstream(status: &str) -> Self {
        match status {
            "failed" => BuildState::Failed,
            "pending" => BuildState::Pending,
            "running" => BuildState::Running,
            "success" => BuildState::Success,
            _ => BuildState::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::Failed => "failed",
            BuildState::Pending => "pending",
            BuildState::Running => "running",
            BuildState::Success => "success",
            BuildState::Other => "other",
        }
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single commit status (one CI job) on a branch head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub name: String,
    pub status: BuildState,
    #[serde(rename = "created", alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(rename = "commit")]
    pub commit_id: String,
    /// Statuses in the order the upstream returned them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<BuildStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<Branch>,
}

/// The reduced traffic-light signal.
///
/// Variants are declared in ascending severity so the derived ordering gives
/// `Red > Yellow > Green > Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[serde(alias = "question")]
    Unknown,
    Green,
    Yellow,
    Red,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Unknown => "unknown",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Red => "red",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The aggregate state served to every consumer.
///
/// `projects` is only populated on the authorized pull endpoint; frames on
/// the watch channel always carry an empty list, which is omitted from the
/// JSON entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<Project>,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Summary {
    /// The state a server starts in before its first successful fetch.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            projects: Vec::new(),
            color: Color::Unknown,
            last_updated: Some(now),
        }
    }

    /// A client-side placeholder surfaced while the watch channel is down.
    pub fn unknown() -> Self {
        Self {
            projects: Vec::new(),
            color: Color::Unknown,
            last_updated: None,
        }
    }

    /// Copy of this summary with the detailed project list stripped.
    pub fn without_projects(&self) -> Self {
        Self {
            projects: Vec::new(),
            color: self.color,
            last_updated: self.last_updated,
        }
    }
}

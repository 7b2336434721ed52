use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use cistatus_common::Project;

use crate::errors::FetchError;

/// Source of the current CI project/branch/status tree.
/// Real implementation: `GitLabFetcher`. Test double: `ScriptedFetcher`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_status(&self) -> Result<Vec<Project>, FetchError>;
}

/// Fetcher that replays a fixed sequence of results.
///
/// Once the script is exhausted the last result is repeated, which lets a
/// test drive the fetch loop for as many ticks as it needs.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Vec<Project>, String>>>,
    last: Mutex<Result<Vec<Project>, String>>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<Vec<Project>, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Ok(Vec::new())),
        }
    }

    /// A fetcher that always returns the same projects.
    pub fn constant(projects: Vec<Project>) -> Self {
        Self::new(vec![Ok(projects)])
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_status(&self) -> Result<Vec<Project>, FetchError> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = script.pop_front() {
            *last = next;
        }
        last.clone().map_err(FetchError::Other)
    }
}

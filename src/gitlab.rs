//! GitLab-backed [`Fetcher`].
//!
//! Walks projects → branches → commit statuses of each branch head and maps
//! them onto the shared status model. A failure anywhere aborts the whole
//! fetch; the fetch loop keeps the previous summary and tries again on the
//! next tick.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cistatus_common::{Branch, BuildState, BuildStatus, Project};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::errors::FetchError;
use crate::fetcher::Fetcher;

const PER_PAGE: usize = 100;

/// Per-request timeout against GitLab.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A GitLab project (subset of fields we care about).
#[derive(Debug, Deserialize)]
pub struct GitLabProject {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GitLabCommitRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct GitLabBranch {
    pub name: String,
    pub commit: GitLabCommitRef,
}

#[derive(Debug, Deserialize)]
pub struct GitLabUser {
    pub username: String,
}

/// A commit status as returned by `/repository/commits/:sha/statuses`.
#[derive(Debug, Deserialize)]
pub struct GitLabCommitStatus {
    pub name: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub author: Option<GitLabUser>,
}

impl From<GitLabCommitStatus> for BuildStatus {
    fn from(status: GitLabCommitStatus) -> Self {
        BuildStatus {
            name: status.name,
            status: BuildState::from_upstream(&status.status),
            created_at: status.created_at,
            author: status.author.map(|a| a.username).unwrap_or_default(),
        }
    }
}

pub struct GitLabFetcher {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl GitLabFetcher {
    pub fn new(base_url: &str, token: &str, api_path: &str) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, token, api_path, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        token: &str,
        api_path: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let api_base = api_base(base_url, api_path);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::Http {
                url: api_base.clone(),
                source,
            })?;

        Ok(Self {
            client,
            api_base,
            token: token.to_string(),
        })
    }

    /// GET every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, FetchError> {
        let url = format!("{}{}", self.api_base, path);
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let resp = self
                .client
                .get(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await
                .map_err(|source| FetchError::Http {
                    url: url.clone(),
                    source,
                })?;

            if !resp.status().is_success() {
                return Err(FetchError::Status {
                    url,
                    status: resp.status().as_u16(),
                });
            }

            let batch: Vec<T> = resp.json().await.map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

            let count = batch.len();
            items.extend(batch);
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl Fetcher for GitLabFetcher {
    async fn fetch_status(&self) -> Result<Vec<Project>, FetchError> {
        let projects: Vec<GitLabProject> = self
            .get_all("/projects")
            .await
            .map_err(|e| e.context("projects"))?;

        let mut results = Vec::with_capacity(projects.len());
        for project in projects {
            let branches: Vec<GitLabBranch> = self
                .get_all(&format!("/projects/{}/repository/branches", project.id))
                .await
                .map_err(|e| e.context(format!("branches for {} project", project.name)))?;

            let mut p = Project {
                name: project.name,
                branches: Vec::with_capacity(branches.len()),
            };

            for branch in branches {
                let statuses: Vec<GitLabCommitStatus> = self
                    .get_all(&format!(
                        "/projects/{}/repository/commits/{}/statuses",
                        project.id, branch.commit.id
                    ))
                    .await
                    .map_err(|e| {
                        e.context(format!(
                            "statuses for {} project, {} branch, {} commit",
                            p.name, branch.name, branch.commit.id
                        ))
                    })?;

                p.branches.push(Branch {
                    name: branch.name,
                    commit_id: branch.commit.id,
                    statuses: statuses.into_iter().map(BuildStatus::from).collect(),
                });
            }

            results.push(p);
        }

        tracing::debug!(projects = results.len(), "fetched GitLab status tree");
        Ok(results)
    }
}

/// Join a server base URL and API path without doubling slashes.
fn api_base(base_url: &str, api_path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = api_path.trim().trim_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

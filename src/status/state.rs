use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use cistatus_common::{Color, Project, Summary, classify};

/// Holder of the single process-wide [`Summary`].
///
/// Written only by the fetch loop, read by request handlers. The lock is
/// never held across an await point.
pub struct SummaryStore {
    inner: RwLock<Summary>,
}

impl Default for SummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryStore {
    /// Starts out `unknown`, stamped with the current time.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Summary::initial(Utc::now())),
        }
    }

    pub fn snapshot(&self) -> Summary {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn color(&self) -> Color {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).color
    }

    /// Replace the project list with a freshly fetched one.
    ///
    /// The projects are always stored. Returns the new summary only when the
    /// classified color differs from the previous one, i.e. when a broadcast
    /// is due. `last_updated` never moves backwards.
    pub fn update(&self, projects: Vec<Project>, now: DateTime<Utc>) -> Option<Summary> {
        let color = classify(&projects);
        let mut summary = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        summary.projects = projects;
        summary.last_updated = Some(match summary.last_updated {
            Some(previous) if previous > now => previous,
            _ => now,
        });

        if summary.color == color {
            return None;
        }
        summary.color = color;
        Some(summary.clone())
    }
}

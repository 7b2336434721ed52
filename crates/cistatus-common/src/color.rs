use crate::model::{BuildState, Color, Project};

/// Reduce a project tree to a single traffic-light color.
///
/// Any failed status makes the result red and ends the scan. Otherwise a
/// pending or running status makes it yellow. Everything else, including an
/// empty tree, is green. Never returns [`Color::Unknown`].
pub fn classify(projects: &[Project]) -> Color {
    let mut color = Color::Green;

    let statuses = projects
        .iter()
        .flat_map(|project| &project.branches)
        .flat_map(|branch| &branch.statuses);

    for status in statuses {
        match status.status {
            BuildState::Failed => return Color::Red,
            BuildState::Pending | BuildState::Running => color = Color::Yellow,
            BuildState::Success | BuildState::Other => {}
        }
    }

    color
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Branch, BuildStatus};

    fn status(state: BuildState) -> BuildStatus {
        BuildStatus {
            name: format!("job-{}", state),
            status: state,
            created_at: None,
            author: "ci".to_string(),
        }
    }

    fn project(name: &str, branches: Vec<Vec<BuildState>>) -> Project {
        Project {
            name: name.to_string(),
            branches: branches
                .into_iter()
                .enumerate()
                .map(|(i, states)| Branch {
                    name: format!("branch-{}", i),
                    commit_id: format!("{:040}", i),
                    statuses: states.into_iter().map(status).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_list_is_green() {
        assert_eq!(classify(&[]), Color::Green);
    }

    #[test]
    fn test_projects_without_statuses_are_green() {
        let projects = vec![project("no-branches", vec![]), project("empty", vec![vec![]])];
        assert_eq!(classify(&projects), Color::Green);
    }

    #[test]
    fn test_all_success_is_green() {
        let projects = vec![
            project("a", vec![vec![BuildState::Success, BuildState::Success]]),
            project("b", vec![vec![BuildState::Success], vec![BuildState::Other]]),
        ];
        assert_eq!(classify(&projects), Color::Green);
    }

    #[test]
    fn test_pending_or_running_is_yellow() {
        let pending = vec![project("a", vec![vec![BuildState::Success, BuildState::Pending]])];
        assert_eq!(classify(&pending), Color::Yellow);

        let running = vec![
            project("a", vec![vec![BuildState::Success]]),
            project("b", vec![vec![BuildState::Running]]),
        ];
        assert_eq!(classify(&running), Color::Yellow);
    }

    #[test]
    fn test_any_failure_is_red() {
        let projects = vec![
            project("a", vec![vec![BuildState::Running, BuildState::Pending]]),
            project("b", vec![vec![BuildState::Success], vec![BuildState::Failed]]),
        ];
        assert_eq!(classify(&projects), Color::Red);
    }

    #[test]
    fn test_failure_after_yellow_still_escalates() {
        let projects = vec![
            project("first", vec![vec![BuildState::Pending]]),
            project("last", vec![vec![BuildState::Success, BuildState::Failed]]),
        ];
        assert_eq!(classify(&projects), Color::Red);
    }

    #[test]
    fn test_order_does_not_matter() {
        let mut projects = vec![
            project("a", vec![vec![BuildState::Failed]]),
            project("b", vec![vec![BuildState::Running]]),
            project("c", vec![vec![BuildState::Success]]),
        ];
        assert_eq!(classify(&projects), Color::Red);
        projects.reverse();
        assert_eq!(classify(&projects), Color::Red);
    }
}

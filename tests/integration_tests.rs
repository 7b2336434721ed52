//! Integration tests for cistatus
//!
//! CLI smoke tests drive the real binary; the end-to-end tests run the
//! server in-process on an ephemeral port and talk to it over the wire.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const SERVER_ENV: &[&str] = &[
    "GITLAB_API_BASE_URL",
    "GITLAB_API_TOKEN",
    "GITLAB_REFRESH_PERIOD",
    "CI_STATUS_HTTP_SERVER_ADDRESS",
    "CI_STATUS_HTTP_SERVER_JWT_ALGORITHM",
    "CI_STATUS_HTTP_SERVER_JWT_SECRET",
    "CI_STATUS_TOKEN",
    "VERBOSE",
];

/// Helper to create a cistatus Command with a clean environment, run from
/// an empty directory so no stray `.env` file is picked up.
fn cistatus(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("cistatus");
    cmd.current_dir(dir.path());
    for name in SERVER_ENV {
        cmd.env_remove(name);
    }
    cmd
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_cistatus_help() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("watch"))
            .stdout(predicate::str::contains("summary"));
    }

    #[test]
    fn test_cistatus_version() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_serve_help_lists_env_names() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .args(["serve", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("GITLAB_API_BASE_URL"))
            .stdout(predicate::str::contains("CI_STATUS_HTTP_SERVER_JWT_SECRET"));
    }

    #[test]
    fn test_serve_without_gitlab_url_fails() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .arg("serve")
            .assert()
            .failure()
            .stderr(predicate::str::contains("GITLAB_API_BASE_URL is required"));
    }

    #[test]
    fn test_serve_without_token_fails() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .arg("serve")
            .env("GITLAB_API_BASE_URL", "https://gitlab.example.com")
            .assert()
            .failure()
            .stderr(predicate::str::contains("GITLAB_API_TOKEN is required"));
    }

    #[test]
    fn test_invalid_refresh_period_is_rejected_by_parser() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .args(["serve", "--refresh-period", "soon"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("soon"));
    }

    #[test]
    fn test_verbose_env_accepts_numeric_flag() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .args(["watch", ""])
            .env("VERBOSE", "1")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Hostname must be set"))
            .stderr(predicate::str::contains("invalid value").not());
    }

    #[test]
    fn test_verbose_env_accepts_false() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .arg("--version")
            .env("VERBOSE", "0")
            .assert()
            .success();
    }

    #[test]
    fn test_watch_with_empty_host_fails_fast() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .args(["watch", ""])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Hostname must be set"));
    }
}

// =============================================================================
// Configuration File Tests
// =============================================================================

mod config_files {
    use super::*;

    #[test]
    fn test_missing_config_file_is_reported() {
        let dir = TempDir::new().unwrap();
        cistatus(&dir)
            .args(["serve", "--config", "does-not-exist.toml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to load configuration"));
    }

    #[test]
    fn test_config_file_with_unsupported_algorithm_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("cistatus.toml"),
            r#"
[auth]
algorithm = "RS256"
secret = "s3cret"

[gitlab]
base_url = "https://gitlab.example.com"
token = "glpat-test"
"#,
        )
        .unwrap();

        cistatus(&dir)
            .args(["serve", "--config", "cistatus.toml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("RS256"));
    }

    #[test]
    fn test_flag_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("cistatus.toml"),
            r#"
[auth]
algorithm = "RS256"

[gitlab]
base_url = "https://gitlab.example.com"
token = "glpat-test"
"#,
        )
        .unwrap();

        // The flag fixes the algorithm, so validation moves on to the zero
        // poll interval.
        cistatus(&dir)
            .args([
                "serve",
                "--config",
                "cistatus.toml",
                "--jwt-algorithm",
                "HS256",
                "--refresh-period",
                "0",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("greater than zero"));
    }

    #[test]
    fn test_malformed_config_file_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cistatus.toml"), "poll_interval = [").unwrap();
        cistatus(&dir)
            .args(["serve", "--config", "cistatus.toml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse config file"));
    }
}

// =============================================================================
// End-to-End Server Tests
// =============================================================================

mod end_to_end {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use cistatus::client::{ReconnectingClient, StatusClient};
    use cistatus::config::ClientConfig;
    use cistatus::errors::FetchError;
    use cistatus::fetcher::{Fetcher, ScriptedFetcher};
    use cistatus::status::api::AppState;
    use cistatus::status::auth::AuthGate;
    use cistatus::status::fetch_loop::FetchLoop;
    use cistatus::status::server;
    use cistatus::{Branch, BuildState, BuildStatus, Color, Project, Summary};
    use futures_util::StreamExt;
    use tokio::net::TcpListener;
    use tokio::sync::{mpsc, oneshot};
    use tokio_tungstenite::tungstenite::Message;

    /// Fetcher whose answer the test can change between polls.
    struct SwitchableFetcher {
        state: Mutex<BuildState>,
    }

    impl SwitchableFetcher {
        fn new(state: BuildState) -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(state),
            })
        }

        fn set(&self, state: BuildState) {
            *self.state.lock().unwrap() = state;
        }
    }

    #[async_trait]
    impl Fetcher for SwitchableFetcher {
        async fn fetch_status(&self) -> Result<Vec<Project>, FetchError> {
            let state = *self.state.lock().unwrap();
            Ok(vec![Project {
                name: "api".to_string(),
                branches: vec![Branch {
                    name: "main".to_string(),
                    commit_id: "0123abcd".to_string(),
                    statuses: vec![BuildStatus {
                        name: "test".to_string(),
                        status: state,
                        created_at: None,
                        author: "ci-bot".to_string(),
                    }],
                }],
            }])
        }
    }

    struct RunningServer {
        addr: SocketAddr,
        state: Arc<AppState>,
        shutdown: Option<oneshot::Sender<()>>,
    }

    impl Drop for RunningServer {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    async fn start(fetcher: Arc<dyn Fetcher>) -> RunningServer {
        let state = Arc::new(AppState::new(AuthGate::disabled()));
        let fetch_loop = FetchLoop::new(
            fetcher,
            state.store.clone(),
            state.hub.clone(),
            Duration::from_millis(20),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server_state = state.clone();
        tokio::spawn(async move {
            server::serve(listener, server_state, fetch_loop, false, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        RunningServer {
            addr,
            state,
            shutdown: Some(tx),
        }
    }

    async fn wait_for_broadcast(server: &RunningServer, color: Color) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if server.state.hub.last_broadcast().map(|s| s.color) == Some(color) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("server never reached expected color");
    }

    async fn next_summary<S>(socket: &mut S) -> Summary
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
                .await
                .expect("no frame within timeout")
                .expect("socket closed")
                .expect("socket error");
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_watcher_gets_current_color_then_transitions() {
        let fetcher = SwitchableFetcher::new(BuildState::Success);
        let server = start(fetcher.clone()).await;
        wait_for_broadcast(&server, Color::Green).await;

        let url = format!("ws://{}/api/watch", server.addr);
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        let first = next_summary(&mut socket).await;
        assert_eq!(first.color, Color::Green);
        assert!(first.projects.is_empty());
        assert!(first.last_updated.is_some());

        fetcher.set(BuildState::Failed);
        let second = next_summary(&mut socket).await;
        assert_eq!(second.color, Color::Red);
        assert!(second.projects.is_empty());
    }

    #[tokio::test]
    async fn test_pull_returns_projects_and_headers() {
        let fetcher = SwitchableFetcher::new(BuildState::Running);
        let server = start(fetcher).await;
        wait_for_broadcast(&server, Color::Yellow).await;

        let response = reqwest::get(format!("http://{}/api", server.addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["server"], "cistatus");
        assert_eq!(
            response.headers()["x-server-version"],
            env!("CARGO_PKG_VERSION")
        );

        let summary: Summary = response.json().await.unwrap();
        assert_eq!(summary.color, Color::Yellow);
        assert_eq!(summary.projects.len(), 1);
        assert_eq!(summary.projects[0].branches[0].statuses[0].status, BuildState::Running);
    }

    #[tokio::test]
    async fn test_status_client_pull_and_watch() {
        let fetcher = SwitchableFetcher::new(BuildState::Success);
        let server = start(fetcher.clone()).await;
        wait_for_broadcast(&server, Color::Green).await;

        let mut config = ClientConfig::new("127.0.0.1");
        config.port = Some(server.addr.port());
        let client = StatusClient::new(&config).unwrap();

        let pulled = client.summary().await.unwrap();
        assert_eq!(pulled.color, Color::Green);

        let mut stream = client.connect().await.unwrap();
        assert_eq!(stream.next_summary().await.unwrap().color, Color::Green);
        fetcher.set(BuildState::Pending);
        assert_eq!(stream.next_summary().await.unwrap().color, Color::Yellow);
    }

    #[tokio::test]
    async fn test_reconnecting_client_reports_unknown_when_server_stops() {
        let fetcher = SwitchableFetcher::new(BuildState::Success);
        let mut server = start(fetcher).await;
        wait_for_broadcast(&server, Color::Green).await;

        let mut config = ClientConfig::new("127.0.0.1");
        config.port = Some(server.addr.port());
        config.backoff.initial_interval = Duration::from_millis(20);
        config.backoff.max_elapsed = Some(Duration::from_millis(500));

        let mut client = ReconnectingClient::new(&config).unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { client.run(tx).await });

        assert_eq!(rx.recv().await.unwrap().color, Color::Green);

        if let Some(shutdown) = server.shutdown.take() {
            let _ = shutdown.send(());
        }

        let after = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.color, Color::Unknown);

        drop(rx);
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    #[tokio::test]
    async fn test_many_watchers_all_receive_transition() {
        let fetcher = SwitchableFetcher::new(BuildState::Success);
        let server = start(fetcher.clone()).await;
        wait_for_broadcast(&server, Color::Green).await;

        let url = format!("ws://{}/api/watch", server.addr);
        let mut sockets = Vec::new();
        for _ in 0..5 {
            let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
            assert_eq!(next_summary(&mut socket).await.color, Color::Green);
            sockets.push(socket);
        }
        assert_eq!(server.state.hub.subscriber_count(), 5);

        fetcher.set(BuildState::Failed);
        for socket in sockets.iter_mut() {
            assert_eq!(next_summary(socket).await.color, Color::Red);
        }
    }

    #[tokio::test]
    async fn test_watcher_gets_unknown_while_upstream_is_down() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![Err("gitlab unavailable".to_string())]));
        let server = start(fetcher).await;

        let url = format!("ws://{}/api/watch", server.addr);
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let first = next_summary(&mut socket).await;
        assert_eq!(first.color, Color::Unknown);
        assert!(first.projects.is_empty());

        let pulled: Summary = reqwest::get(format!("http://{}/api", server.addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(pulled.color, Color::Unknown);
    }
}

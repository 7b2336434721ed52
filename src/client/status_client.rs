use std::time::Duration;

use cistatus_common::Summary;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::errors::ClientError;

/// Request timeout for a one-shot pull.
pub const SUMMARY_TIMEOUT: Duration = Duration::from_secs(5);

/// Give up on a watch socket that has been silent this long. The server
/// pings every 40s, so this only trips on a dead connection.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);

/// Pull and watch access to one status server.
#[derive(Debug, Clone)]
pub struct StatusClient {
    host: String,
    port: Option<u16>,
    tls: bool,
    token: Option<String>,
    http: reqwest::Client,
    heartbeat_timeout: Duration,
}

impl StatusClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(SUMMARY_TIMEOUT)
            .user_agent(concat!("cistatus/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            host: config.host.trim().to_string(),
            port: config.port,
            tls: config.tls,
            token: config.token.clone().filter(|t| !t.is_empty()),
            http,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
        })
    }

    /// Override the silence limit on watch sockets.
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    fn authority(&self) -> Result<String, ClientError> {
        if self.host.is_empty() {
            return Err(ClientError::MissingHostname);
        }
        Ok(match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        })
    }

    /// `http(s)://host[:port]/api`
    pub fn summary_url(&self) -> Result<String, ClientError> {
        let scheme = if self.tls { "https" } else { "http" };
        Ok(format!("{}://{}/api", scheme, self.authority()?))
    }

    /// `ws(s)://host[:port]/api/watch`
    pub fn watch_url(&self) -> Result<String, ClientError> {
        let scheme = if self.tls { "wss" } else { "ws" };
        Ok(format!("{}://{}/api/watch", scheme, self.authority()?))
    }

    /// Fetch the current summary once. Projects are only present when the
    /// server accepted our token (or has auth disabled).
    pub async fn summary(&self) -> Result<Summary, ClientError> {
        let url = self.summary_url()?;
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("bearer {}", token));
        }

        let summary = request
            .send()
            .await?
            .error_for_status()?
            .json::<Summary>()
            .await?;
        Ok(summary)
    }

    /// Open the watch socket.
    pub async fn connect(&self) -> Result<WatchStream, ClientError> {
        let url = self.watch_url()?;
        let mut request = url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("bearer {}", token)) {
                request.headers_mut().insert("Authorization", value);
            }
        }

        let (socket, _response) = tokio_tungstenite::connect_async(request).await?;
        tracing::debug!(url = %url, "watch socket connected");
        Ok(WatchStream {
            socket,
            heartbeat_timeout: self.heartbeat_timeout,
        })
    }

    /// Connect and forward every summary into `sink` until the socket or the
    /// sink goes away.
    pub async fn watch(&self, sink: &mpsc::Sender<Summary>) -> Result<(), ClientError> {
        let mut stream = self.connect().await?;
        loop {
            let summary = stream.next_summary().await?;
            sink.send(summary)
                .await
                .map_err(|_| ClientError::ConsumerGone)?;
        }
    }
}

/// An open `/api/watch` socket.
pub struct WatchStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    heartbeat_timeout: Duration,
}

impl WatchStream {
    /// Next summary frame from the server.
    ///
    /// Control frames are consumed here; pings are answered by the socket
    /// on the next read.
    pub async fn next_summary(&mut self) -> Result<Summary, ClientError> {
        loop {
            let frame = tokio::time::timeout(self.heartbeat_timeout, self.socket.next())
                .await
                .map_err(|_| ClientError::HeartbeatTimeout(self.heartbeat_timeout))?;

            match frame {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str::<Summary>(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => return Err(ClientError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

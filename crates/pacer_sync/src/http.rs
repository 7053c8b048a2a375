//! HTTP transport to the PACER API
//!
//! [`HttpDispatcher`] turns queued actions into API calls; [`HttpProbe`]
//! polls the health endpoint and feeds the connectivity monitor.

use crate::action::{PendingAction, QueuedAction};
use crate::config::SyncConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::watch;

/// Longest slice of a response body kept in a rejection reason
const MAX_REASON_BODY: usize = 200;

/// Upper bound for a single reachability check
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Method, path and body of the API call replaying one action
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn for_action(action: &PendingAction) -> Self {
        match action {
            PendingAction::SaveProgress(data) => Self::post("/progress", Some(data.clone())),
            PendingAction::SaveSession(data) => Self::post("/game/sessions", Some(data.clone())),
            PendingAction::CreateTeamChallenge { team_id, challenge } => {
                let body = match challenge {
                    Value::Object(fields) => {
                        let mut fields = fields.clone();
                        fields.insert("team_id".to_string(), json!(team_id));
                        Value::Object(fields)
                    }
                    other => json!({ "team_id": team_id, "challenge": other }),
                };
                Self::post("/team/challenges", Some(body))
            }
            PendingAction::JoinTeam { team_id, .. } => {
                Self::post(&format!("/team/teams/{}/join", team_id), None)
            }
            PendingAction::LeaveTeam { team_id, .. } => {
                Self::post(&format!("/team/teams/{}/leave", team_id), None)
            }
        }
    }

    fn post(path: &str, body: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            body,
        }
    }
}

/// Replays actions with reqwest
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    config: SyncConfig,
}

impl HttpDispatcher {
    pub fn new(config: &SyncConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Send `request`, retrying network failures with a linear backoff
    pub async fn send(&self, request: &ApiRequest) -> Result<(), DispatchError> {
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(request).await {
                Err(e) if e.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay * attempt;
                    tracing::debug!(
                        "Retry attempt #{} for {} in {:?}: {}",
                        attempt,
                        request.path,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<(), DispatchError> {
        let url = self.config.endpoint(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        tracing::debug!("API response: {} {} {}", status.as_u16(), request.method, request.path);

        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(DispatchError::Rejected(
                "unauthorized (HTTP 401), sign in again".to_string(),
            ));
        }

        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_REASON_BODY)
            .collect();
        Err(DispatchError::Rejected(if body.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), body.trim())
        }))
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, action: &QueuedAction) -> Result<(), DispatchError> {
        self.send(&ApiRequest::for_action(&action.action)).await
    }
}

/// Periodic reachability check against the API health path
///
/// Any HTTP answer counts as online; only transport failures mean offline.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: String,
    interval: Duration,
}

impl HttpProbe {
    pub fn new(config: &SyncConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout.min(PROBE_TIMEOUT))
            .build()?;
        Ok(Self {
            client,
            url: config.health_url(),
            interval: config.probe_interval,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn check(&self) -> Connectivity {
        match self.client.get(&self.url).send().await {
            Ok(_) => Connectivity::Online,
            Err(e) => {
                tracing::debug!("Probe {} failed: {}", self.url, e);
                Connectivity::Offline
            }
        }
    }

    /// Poll until `shutdown` flips to true, reporting state changes to `monitor`
    pub async fn run(&self, monitor: ConnectivityMonitor, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let status = self.check().await;
                    if status != monitor.status() {
                        monitor.set_status(status);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Connectivity probe stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// What the test server does with one accepted connection
    #[derive(Clone, Copy)]
    enum Reply {
        Status(u16),
        Hangup,
    }

    /// Serve `replies` in order, one per connection, returning the raw requests
    async fn serve(replies: Vec<Reply>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                requests.push(request);

                if let Reply::Status(code) = reply {
                    let body = "{\"detail\":\"test\"}";
                    let response = format!(
                        "HTTP/1.1 {} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        code,
                        body.len(),
                        body
                    );
                    socket.write_all(response.as_bytes()).await.unwrap();
                    socket.shutdown().await.ok();
                }
            }
            requests
        });

        (base, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let lower = line.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn config_for(base_url: &str) -> SyncConfig {
        SyncConfig {
            base_url: base_url.to_string(),
            auth_token: Some("secret-token".to_string()),
            request_timeout: Duration::from_secs(5),
            retries: 0,
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/api", addr)
    }

    #[test]
    fn test_request_mapping() {
        let progress = ApiRequest::for_action(&PendingAction::SaveProgress(json!({ "xp": 5 })));
        assert_eq!(progress.method, Method::POST);
        assert_eq!(progress.path, "/progress");
        assert_eq!(progress.body, Some(json!({ "xp": 5 })));

        let session = ApiRequest::for_action(&PendingAction::SaveSession(json!({ "id": 1 })));
        assert_eq!(session.path, "/game/sessions");

        let join = ApiRequest::for_action(&PendingAction::JoinTeam {
            team_id: 7,
            user_id: 1,
        });
        assert_eq!(join.path, "/team/teams/7/join");
        assert_eq!(join.body, None);

        let leave = ApiRequest::for_action(&PendingAction::LeaveTeam {
            team_id: 7,
            user_id: 1,
        });
        assert_eq!(leave.path, "/team/teams/7/leave");
    }

    #[test]
    fn test_challenge_body_carries_team_id() {
        let request = ApiRequest::for_action(&PendingAction::CreateTeamChallenge {
            team_id: 3,
            challenge: json!({ "title": "Close 5 deals", "team_id": 99 }),
        });
        assert_eq!(request.path, "/team/challenges");
        assert_eq!(
            request.body,
            Some(json!({ "title": "Close 5 deals", "team_id": 3 }))
        );

        let scalar = ApiRequest::for_action(&PendingAction::CreateTeamChallenge {
            team_id: 3,
            challenge: json!("sprint"),
        });
        assert_eq!(scalar.body, Some(json!({ "team_id": 3, "challenge": "sprint" })));
    }

    #[tokio::test]
    async fn test_dispatch_sends_bearer_and_body() {
        let (base, server) = serve(vec![Reply::Status(201)]).await;
        let dispatcher = HttpDispatcher::new(&config_for(&base)).unwrap();

        let action = QueuedAction::new(PendingAction::CreateTeamChallenge {
            team_id: 12,
            challenge: json!({ "title": "Cold calls" }),
        });
        dispatcher.dispatch(&action).await.unwrap();

        let requests = server.await.unwrap();
        let request = &requests[0];
        assert!(request.starts_with("POST /api/team/challenges HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: bearer secret-token"));
        assert!(request.contains("\"team_id\":12"));
        assert!(request.contains("Cold calls"));
    }

    #[tokio::test]
    async fn test_server_error_is_rejected_without_retry() {
        let (base, server) = serve(vec![Reply::Status(500)]).await;
        let config = SyncConfig {
            retries: 3,
            ..config_for(&base)
        };
        let dispatcher = HttpDispatcher::new(&config).unwrap();

        let action = QueuedAction::new(PendingAction::SaveProgress(json!({})));
        let err = dispatcher.dispatch(&action).await.unwrap_err();

        // A retry would hit the closed listener and come back as Transport
        match err {
            DispatchError::Rejected(reason) => assert!(reason.starts_with("HTTP 500")),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let (base, server) = serve(vec![Reply::Status(401)]).await;
        let dispatcher = HttpDispatcher::new(&config_for(&base)).unwrap();

        let action = QueuedAction::new(PendingAction::JoinTeam {
            team_id: 1,
            user_id: 1,
        });
        let err = dispatcher.dispatch(&action).await.unwrap_err();
        assert!(err.to_string().contains("unauthorized"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport() {
        let dispatcher = HttpDispatcher::new(&config_for(&closed_port_url().await)).unwrap();

        let action = QueuedAction::new(PendingAction::SaveSession(json!({ "id": 1 })));
        let err = dispatcher.dispatch(&action).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried() {
        let (base, server) = serve(vec![Reply::Hangup, Reply::Status(200)]).await;
        let config = SyncConfig {
            retries: 2,
            ..config_for(&base)
        };
        let dispatcher = HttpDispatcher::new(&config).unwrap();

        let action = QueuedAction::new(PendingAction::SaveProgress(json!({ "xp": 1 })));
        dispatcher.dispatch(&action).await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.starts_with("POST /api/progress")));
    }

    #[tokio::test]
    async fn test_probe_check() {
        let (base, server) = serve(vec![Reply::Status(404)]).await;
        let probe = HttpProbe::new(&config_for(&base)).unwrap();
        assert!(probe.url().ends_with("/api/health"));
        assert_eq!(probe.check().await, Connectivity::Online);
        server.await.unwrap();

        let offline = HttpProbe::new(&config_for(&closed_port_url().await)).unwrap();
        assert_eq!(offline.check().await, Connectivity::Offline);
    }

    #[tokio::test]
    async fn test_probe_run_reports_and_stops() {
        let config = SyncConfig {
            probe_interval: Duration::from_millis(10),
            ..config_for(&closed_port_url().await)
        };
        let probe = HttpProbe::new(&config).unwrap();
        let monitor = ConnectivityMonitor::new(Connectivity::Online);
        let mut events = monitor.subscribe();
        let (stop, shutdown) = watch::channel(false);

        let task = tokio::spawn({
            let monitor = monitor.clone();
            async move { probe.run(monitor, shutdown).await }
        });

        let change = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(change.is_disconnect());
        assert!(!monitor.is_online());

        stop.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}

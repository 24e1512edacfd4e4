use std::time::Duration;

use carrier_sync::{
    Command, Coordinator, Energy, Error, ErrorClass, Profile, PushBridge, PushEvent, RemoteClient,
    Result, SyncPhase, System,
};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Minimal HTTP facade over a mock service.
struct HttpClient {
    base: String,
    http: reqwest::Client,
}

impl HttpClient {
    fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
        }
    }
}

impl RemoteClient for HttpClient {
    async fn fetch_full_state(&self) -> Result<Vec<System>> {
        let resp = self
            .http
            .get(format!("{}/systems", self.base))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn fetch_energy(&self, serial: &str) -> Result<Energy> {
        let resp = self
            .http
            .get(format!("{}/energy/{serial}", self.base))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn send_command(
        &self,
        serial: &str,
        _zone_id: Option<&str>,
        command: &Command,
    ) -> Result<()> {
        self.http
            .post(format!("{}/systems/{serial}/{}", self.base, command.name()))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

struct NoPush;

impl PushBridge for NoPush {
    fn attach(&self, _sink: mpsc::Sender<PushEvent>) {}
    fn detach(&self) {}
}

async fn http_error(status: u16) -> Error {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    HttpClient::new(server.uri())
        .fetch_full_state()
        .await
        .unwrap_err()
}

fn systems_body() -> serde_json::Value {
    let system = System {
        profile: Profile {
            serial: "2419X00001".into(),
            name: "Home".into(),
            ..Default::default()
        },
        ..Default::default()
    };
    json!([system])
}

#[tokio::test]
async fn server_errors_are_transport() {
    for status in [500, 502, 503, 504] {
        let err = http_error(status).await;
        assert!(matches!(err, Error::Http(_)), "got {err:?}");
        assert_eq!(err.class(), ErrorClass::Transport, "status {status}");
    }
}

#[tokio::test]
async fn throttling_is_transport() {
    assert!(http_error(429).await.is_transport());
    assert!(http_error(408).await.is_transport());
}

#[tokio::test]
async fn client_errors_are_unclassified() {
    for status in [400, 401, 403, 404] {
        assert_eq!(
            http_error(status).await.class(),
            ErrorClass::Unclassified,
            "status {status}"
        );
    }
}

#[tokio::test]
async fn connection_refused_is_transport() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = HttpClient::new(format!("http://{addr}"))
        .fetch_full_state()
        .await
        .unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
}

#[tokio::test]
async fn malformed_body_is_unclassified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/systems"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = HttpClient::new(server.uri())
        .fetch_full_state()
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Unclassified, "got {err:?}");
}

#[tokio::test]
async fn unavailable_service_puts_coordinator_in_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/systems"))
        .respond_with(ResponseTemplate::new(200).set_body_json(systems_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/energy/.+"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let c = Coordinator::builder(HttpClient::new(server.uri()), NoPush)
        .backoff_interval(Duration::from_secs(45))
        .build()
        .unwrap();

    c.run_cycle().await.unwrap();
    let err = c.run_cycle().await.unwrap_err();

    assert!(err.is_transport());
    let status = c.status();
    assert_eq!(status.phase, SyncPhase::Backoff);
    assert!(status.next_cycle_full);
    assert_eq!(status.next_interval, Duration::from_secs(45));
}

#[tokio::test]
async fn rejected_request_keeps_regular_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/systems"))
        .respond_with(ResponseTemplate::new(200).set_body_json(systems_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/energy/.+"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let c = Coordinator::builder(HttpClient::new(server.uri()), NoPush)
        .update_interval(Duration::from_secs(900))
        .build()
        .unwrap();

    c.run_cycle().await.unwrap();
    c.run_cycle().await.unwrap_err();

    let status = c.status();
    assert!(status.next_cycle_full);
    assert_eq!(status.next_interval, Duration::from_secs(900));
}

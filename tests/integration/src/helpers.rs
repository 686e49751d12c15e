//! Test helpers for integration tests
//!
//! Provides utilities for spawning a gateway on an ephemeral port, fake
//! backend services, and making HTTP and WebSocket requests against them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::Request,
    http::{HeaderMap, Method, Uri},
    Json, Router,
};
use gatehouse_cache::{ChannelPublisher, ChannelSource, MemoryStore, StorePolicy};
use gatehouse_common::{AppConfig, ServiceRoute};
use gatehouse_gateway::{create_app, spawn_consumer, GatewayState, MemoryUserDirectory};
use reqwest::{header, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::fixtures::{seeded_records, Fixture};

/// Signing key shared by every test gateway
pub const TEST_SIGNING_KEY: &str = "integration-test-key";

/// Client side of a gateway WebSocket
pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Test server instance that manages lifecycle
///
/// Runs the full application with an in-memory session store, the seeded
/// fixture users, and a channel-backed notification queue.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: GatewayState,
    pub publisher: ChannelPublisher,
    pub source: Arc<ChannelSource>,
    _handle: JoinHandle<()>,
    _consumer: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()).await
    }

    /// Start a test server proxying `routes`
    pub async fn start_with_services(routes: Vec<ServiceRoute>) -> Result<Self> {
        let mut config = test_config();
        config.services = routes;
        Self::start_with_config(config).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new(StorePolicy::from(&config.session)));

        let directory = MemoryUserDirectory::new();
        for record in seeded_records() {
            directory.insert(record);
        }

        let state = GatewayState::build(config, store, Arc::new(directory)).await?;

        let (source, publisher) = ChannelSource::new();
        let source = Arc::new(source);
        let consumer = spawn_consumer(Arc::clone(state.notifier()), source.clone());

        let app = create_app(state.clone());
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .ok();
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            addr,
            client,
            state,
            publisher,
            source,
            _handle: handle,
            _consumer: consumer,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL for the notification endpoint
    pub fn ws_url(&self) -> String {
        format!("ws://{}/v1/ws", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a GET request with a session token
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, token)
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).json(body).send().await?)
    }

    /// Make a DELETE request with a session token
    pub async fn delete_auth(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .delete(&url)
            .header(header::AUTHORIZATION, token)
            .send()
            .await?)
    }

    /// Sign in as `user` and return the `Authorization` value to send back
    pub async fn login(&self, user: &Fixture) -> Result<String> {
        let response = self.post("/v1/sessions", &user.login()).await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await?;
            anyhow::bail!("Login as {} failed with {}: {}", user.email, status, body);
        }

        let token = response
            .headers()
            .get(header::AUTHORIZATION)
            .ok_or_else(|| anyhow::anyhow!("login response has no Authorization header"))?
            .to_str()?
            .to_string();
        Ok(token)
    }

    /// Open a WebSocket carrying `token` in the `Authorization` header
    pub async fn connect_ws(&self, token: &str) -> Result<WsClient> {
        let mut request = self.ws_url().into_client_request()?;
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, token.parse()?);
        let (stream, _) = connect_async(request).await?;
        Ok(stream)
    }

    /// Wait until the notifier holds exactly `expected` connections
    pub async fn wait_for_connections(&self, expected: usize) -> Result<()> {
        let notifier = self.state.notifier();
        for _ in 0..100 {
            if notifier.connection_count() == expected {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!(
            "Expected {} connections, found {}",
            expected,
            notifier.connection_count()
        )
    }

    /// Wait until the queue has acknowledged `expected` deliveries
    pub async fn wait_for_acks(&self, expected: usize) -> Result<Vec<String>> {
        for _ in 0..100 {
            let acked = self.source.acked();
            if acked.len() >= expected {
                return Ok(acked);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!(
            "Expected {} acks, found {:?}",
            expected,
            self.source.acked()
        )
    }
}

/// Create a test configuration
pub fn test_config() -> AppConfig {
    AppConfig::local(TEST_SIGNING_KEY)
}

/// What a fake backend saw of a proxied request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    pub backend: String,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub x_user: Option<String>,
    pub body: String,
}

/// Fake backend service bound to an ephemeral port
pub struct TestBackend {
    pub addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl TestBackend {
    /// Start a backend that answers every request with an [`EchoResponse`]
    pub async fn start(name: &str) -> Result<Self> {
        let name = name.to_string();
        let app = Router::new().fallback(move |request: Request| {
            let name = name.clone();
            async move { echo(name, request).await }
        });

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            _handle: handle,
        })
    }

    /// `host:port` for a service route
    pub fn address(&self) -> String {
        self.addr.to_string()
    }
}

async fn echo(backend: String, request: Request) -> Json<EchoResponse> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();

    Json(EchoResponse {
        backend,
        method: method_name(&parts.method),
        path: parts.uri.path().to_string(),
        query: query(&parts.uri),
        x_user: x_user(&parts.headers),
        body,
    })
}

fn method_name(method: &Method) -> String {
    method.as_str().to_string()
}

fn query(uri: &Uri) -> Option<String> {
    uri.query().map(String::from)
}

fn x_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(response: Response, expected_status: StatusCode) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(())
}

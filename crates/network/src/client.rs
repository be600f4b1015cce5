// crates/network/src/client.rs
//! HTTP client wrapper for the backend REST API
//!
//! No retries happen here: a failed call is classified and handed back. Retry
//! decisions belong to the scheduler.

use crate::error::{NetworkError, NetworkResult};
use reparto_core::SessionStore;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `http://localhost:5000/api/`
    pub base_url: String,
    /// TCP connect deadline
    pub connect_timeout: Duration,
    /// Deadline between two reads of the response
    pub read_timeout: Duration,
    /// Deadline for the whole request, body upload included
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api/".to_string(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            user_agent: format!("Reparto/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets connect, read and overall timeouts at once
    pub fn with_timeouts(mut self, connect: Duration, read: Duration, overall: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self.timeout = overall;
        self
    }
}

/// JSON-over-HTTP client bound to one API base URL
///
/// Adds `Authorization: Bearer <token>` whenever the shared [`SessionStore`]
/// holds a session. Clones share the connection pool and the session.
#[derive(Clone)]
pub struct HttpClient {
    inner: ReqwestClient,
    base_url: Url,
    config: ClientConfig,
    session: SessionStore,
}

impl HttpClient {
    /// Creates a client for `config.base_url`
    pub fn new(config: ClientConfig, session: SessionStore) -> NetworkResult<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let inner = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        Ok(Self {
            inner,
            base_url,
            config,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Resolves an endpoint path against the base URL
    pub fn url(&self, path: &str) -> NetworkResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// GET returning a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> NetworkResult<T> {
        self.get_json_with_query(path, &[]).await
    }

    /// GET with query parameters returning a JSON body
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> NetworkResult<T> {
        let operation = format!("GET {}", path);
        let mut request = self.request(Method::GET, path)?;
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.execute(request, &operation).await?;
        read_json(response, &operation, self.config.timeout.as_secs()).await
    }

    /// POST a JSON body, returning the created resource
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> NetworkResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let operation = format!("POST {}", path);
        let request = self.request(Method::POST, path)?.json(body);
        let response = self.execute(request, &operation).await?;
        read_json(response, &operation, self.config.timeout.as_secs()).await
    }

    /// POST a JSON body, ignoring whatever comes back
    pub async fn post_unit<B>(&self, path: &str, body: &B) -> NetworkResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send_unit(Method::POST, path, Some(body)).await
    }

    /// PUT a JSON body; the backend answers 204 or echoes the resource
    pub async fn put_unit<B>(&self, path: &str, body: &B) -> NetworkResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send_unit(Method::PUT, path, Some(body)).await
    }

    /// PATCH a JSON body
    pub async fn patch_unit<B>(&self, path: &str, body: &B) -> NetworkResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send_unit(Method::PATCH, path, Some(body)).await
    }

    /// DELETE a resource
    pub async fn delete(&self, path: &str) -> NetworkResult<()> {
        self.send_unit::<()>(Method::DELETE, path, None).await
    }

    /// Sends a HEAD request to the base URL; any HTTP answer counts as reachable
    pub async fn ping(&self) -> NetworkResult<()> {
        let request = self.inner.head(self.base_url.clone());
        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) => Err(NetworkError::from_reqwest(
                &e,
                "HEAD",
                self.config.connect_timeout.as_secs(),
            )),
        }
    }

    async fn send_unit<B>(&self, method: Method, path: &str, body: Option<&B>) -> NetworkResult<()>
    where
        B: Serialize + ?Sized,
    {
        let operation = format!("{} {}", method, path);
        let mut request = self.request(method, path)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request, &operation).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> NetworkResult<RequestBuilder> {
        let url = self.url(path)?;
        let mut request = self.inner.request(method, url);
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    /// Sends the request and maps non-2xx answers to `NetworkError::Http`
    async fn execute(&self, request: RequestBuilder, operation: &str) -> NetworkResult<Response> {
        log::debug!("{}", operation);

        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(&e, operation, self.config.timeout.as_secs()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

        log::debug!("{} failed with HTTP {}: {}", operation, status.as_u16(), message);
        Err(NetworkError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.session.is_authenticated())
            .finish()
    }
}

/// Parses the base URL, forcing a trailing slash so endpoint paths join under it
pub(crate) fn parse_base_url(raw: &str) -> NetworkResult<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(NetworkError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Reads a JSON body, distinguishing "nothing" from "garbage"
async fn read_json<T: DeserializeOwned>(
    response: Response,
    operation: &str,
    timeout_secs: u64,
) -> NetworkResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| NetworkError::from_reqwest(&e, operation, timeout_secs))?;

    if bytes.iter().all(u8::is_ascii_whitespace) || &bytes[..] == b"null" {
        return Err(NetworkError::EmptyBody(operation.to_string()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| NetworkError::Decode(format!("{}: {}", operation, e)))
}

/// Picks a readable message out of an error body
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["message", "mensaje", "title", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
        if let Some(text) = value.as_str() {
            return Some(text.to_string());
        }
    }

    Some(trimmed.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000/api/");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("Reparto/"));
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new(ClientConfig::default(), SessionStore::new());
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpClient::new(ClientConfig::new("not a url"), SessionStore::new());
        assert!(matches!(result, Err(NetworkError::InvalidUrl(_))));
    }

    #[test]
    fn test_paths_join_under_base() {
        let client =
            HttpClient::new(ClientConfig::new("http://localhost:5000/api"), SessionStore::new())
                .unwrap();

        assert_eq!(
            client.url("Productos/3").unwrap().as_str(),
            "http://localhost:5000/api/Productos/3"
        );
        assert_eq!(
            client.url("/Pedidos").unwrap().as_str(),
            "http://localhost:5000/api/Pedidos"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message":"Credenciales inválidas"}"#),
            Some("Credenciales inválidas".to_string())
        );
        assert_eq!(
            error_message(r#"{"title":"Not Found","status":404}"#),
            Some("Not Found".to_string())
        );
        assert_eq!(error_message("plain text"), Some("plain text".to_string()));
        assert_eq!(error_message("   "), None);
    }
}

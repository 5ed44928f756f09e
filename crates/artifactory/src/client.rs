//! REST client.
//!
//! A [`Client`] owns the base URL, the authentication header, the default
//! headers and the retry budget. Requests are built with
//! [`Client::request`] and sent through the configured [`Transport`].
//! Responses with a status of 400 or above become [`Error::Http`].

use crate::error::{Error, Result};
use crate::retry::{RetryPredicate, with_retry};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::types::RetryConfig;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use declarative::CancellationToken;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// Sent as `user-agent` on every request.
pub const USER_AGENT: &str = concat!("artprov/", env!("CARGO_PKG_VERSION"));

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <token>`
    AccessToken(String),
    /// `X-JFrog-Art-Api: <key>`
    ApiKey(String),
    /// `Authorization: Basic <base64(user:password)>`
    Basic { username: String, password: String },
}

impl Auth {
    /// Pick credentials by precedence: access token, then API key, then
    /// username and password.
    pub fn select(
        access_token: Option<&str>,
        api_key: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self> {
        let given = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);

        if let Some(token) = given(access_token) {
            return Ok(Self::AccessToken(token));
        }
        if let Some(key) = given(api_key) {
            return Ok(Self::ApiKey(key));
        }
        if let (Some(username), Some(password)) = (given(username), given(password)) {
            return Ok(Self::Basic { username, password });
        }
        Err(Error::Config("no authentication details supplied".into()))
    }

    fn header(&self) -> (&'static str, String) {
        match self {
            Self::AccessToken(token) => ("Authorization", format!("Bearer {token}")),
            Self::ApiKey(key) => ("X-JFrog-Art-Api", key.clone()),
            Self::Basic { username, password } => (
                "Authorization",
                format!("Basic {}", BASE64.encode(format!("{username}:{password}"))),
            ),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessToken(_) => "access token",
            Self::ApiKey(_) => "API key",
            Self::Basic { .. } => "basic auth",
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Auth({})", self.kind())
    }
}

/// Shared, read-only REST client.
#[derive(Clone)]
pub struct Client {
    base_url: String,
    auth: Auth,
    headers: Vec<(String, String)>,
    retry: RetryConfig,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client for the server at `url`.
    ///
    /// Only the scheme, host and port of `url` are kept; request paths are
    /// always given from the server root (`artifactory/api/...`).
    pub fn new(url: &str, auth: Auth, transport: Arc<dyn Transport>) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid URL {url:?}: {e}")))?;
        if !parsed.has_host() {
            return Err(Error::Config(format!("invalid URL {url:?}: no host")));
        }
        let base_url = parsed.origin().ascii_serialization();

        Ok(Self {
            base_url,
            auth,
            headers: vec![
                ("content-type".into(), "application/json".into()),
                ("accept".into(), "*/*".into()),
                ("user-agent".into(), USER_AGENT.into()),
            ],
            retry: RetryConfig::default(),
            transport,
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Add or replace a header sent with every request
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            method,
            path: path.into(),
            body: None,
            predicate: None,
            cancel: None,
        }
    }

    pub fn get(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Get, path)
    }

    pub fn head(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Head, path)
    }

    pub fn put(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Put, path)
    }

    pub fn post(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Post, path)
    }

    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::Delete, path)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// One request under construction
pub struct RequestBuilder<'a> {
    client: &'a Client,
    method: Method,
    path: String,
    body: Option<String>,
    predicate: Option<Box<dyn RetryPredicate>>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> RequestBuilder<'a> {
    /// Serialize `payload` as the JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        self.body = Some(serde_json::to_string(payload)?);
        Ok(self)
    }

    /// Retry responses matching `predicate`
    #[must_use]
    pub fn retry_if(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Stop before any further attempt once `cancel` fires
    #[must_use]
    pub fn cancel(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Send the request, turning statuses of 400 and above into errors
    pub fn send(self) -> Result<HttpResponse> {
        let client = self.client;
        let mut request = HttpRequest::new(self.method, client.url(&self.path));
        request.headers.clone_from(&client.headers);
        let (name, value) = client.auth.header();
        request.headers.push((name.to_string(), value));
        request.body = self.body;

        let what = format!("{} {}", self.method, self.path);
        let response = with_retry(
            &client.retry,
            self.cancel,
            self.predicate.as_deref(),
            &what,
            |attempt| {
                log::debug!("{what} (attempt {})", attempt + 1);
                client.transport.send(&request)
            },
        )?;

        if response.status >= 400 {
            return Err(Error::Http {
                status: response.status,
                method: self.method,
                url: request.url,
                body: response.body,
            });
        }
        Ok(response)
    }

    /// Send the request and decode the JSON response
    pub fn send_json<T: DeserializeOwned>(self) -> Result<T> {
        let url = self.client.url(&self.path);
        let response = self.send()?;
        serde_json::from_str(&response.body).map_err(|source| Error::Decode { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{MergeRace, StatusIs};
    use crate::transport::MockTransport;
    use serde_json::{Value, json};

    fn client(mock: &MockTransport) -> Client {
        Client::new(
            "https://example.jfrog.io/artifactory/webapp/#/home",
            Auth::AccessToken("tok".into()),
            Arc::new(mock.clone()),
        )
        .unwrap()
        .with_retry(RetryConfig::immediate(5))
    }

    #[test]
    fn test_base_url_keeps_only_origin() {
        let c = client(&MockTransport::new());
        assert_eq!(c.base_url(), "https://example.jfrog.io");

        let with_port = Client::new(
            "http://localhost:8081/artifactory",
            Auth::ApiKey("k".into()),
            Arc::new(MockTransport::new()),
        )
        .unwrap();
        assert_eq!(with_port.base_url(), "http://localhost:8081");

        assert!(Client::new("not a url", Auth::ApiKey("k".into()), Arc::new(MockTransport::new())).is_err());
    }

    #[test]
    fn test_auth_precedence() {
        let token = Auth::select(Some("t"), Some("k"), Some("u"), Some("p")).unwrap();
        assert_eq!(token, Auth::AccessToken("t".into()));

        let key = Auth::select(Some(""), Some("k"), Some("u"), Some("p")).unwrap();
        assert_eq!(key, Auth::ApiKey("k".into()));

        let basic = Auth::select(None, None, Some("u"), Some("p")).unwrap();
        assert_eq!(basic.header().1, "Basic dTpw");

        let err = Auth::select(None, None, Some("u"), None).unwrap_err();
        assert_eq!(err.to_string(), "no authentication details supplied");
    }

    #[test]
    fn test_auth_debug_hides_secret() {
        let auth = Auth::Basic {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{auth:?}").contains("hunter2"));
    }

    #[test]
    fn test_headers_injected() {
        let mock = MockTransport::new();
        let _ = client(&mock).get("artifactory/api/repositories/x").send();

        let sent = &mock.requests()[0];
        assert_eq!(sent.url, "https://example.jfrog.io/artifactory/api/repositories/x");
        assert_eq!(sent.header("content-type"), Some("application/json"));
        assert_eq!(sent.header("accept"), Some("*/*"));
        assert_eq!(sent.header("user-agent"), Some(USER_AGENT));
        assert_eq!(sent.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn test_error_status_becomes_http_error() {
        let mock = MockTransport::new();
        let err = client(&mock)
            .get("artifactory/api/repositories/missing")
            .send()
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(
            err.to_string()
                .starts_with("\n404 GET https://example.jfrog.io/artifactory/api/repositories/missing\n")
        );
    }

    #[test]
    fn test_merge_race_retried_with_identical_body() {
        let mock = MockTransport::new();
        mock.respond_with(
            Some(Method::Put),
            "artifactory/api/repositories/libs",
            500,
            "Could not merge and save new descriptor",
            1,
        );

        client(&mock)
            .put("artifactory/api/repositories/libs")
            .json(&json!({"key": "libs", "rclass": "local"}))
            .unwrap()
            .retry_if(MergeRace)
            .send()
            .unwrap();

        let puts = mock.requests_with(Method::Put);
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].body, puts[1].body);
    }

    #[test]
    fn test_service_unavailable_retried_once() {
        let mock = MockTransport::new();
        mock.insert(
            "artifactory/api/repositories/libs",
            json!({"key": "libs", "rclass": "local"}),
        );
        mock.respond_with(
            Some(Method::Get),
            "artifactory/api/repositories/libs",
            503,
            "Service Unavailable",
            1,
        );

        let response = client(&mock)
            .get("artifactory/api/repositories/libs")
            .send()
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(mock.requests_with(Method::Get).len(), 2);
    }

    #[test]
    fn test_merge_race_exhausted_surfaces_server_error() {
        let mock = MockTransport::new();
        mock.respond_with(
            Some(Method::Put),
            "artifactory/api/repositories/libs",
            500,
            "Could not merge and save new descriptor",
            10,
        );

        let err = client(&mock)
            .put("artifactory/api/repositories/libs")
            .json(&json!({"key": "libs"}))
            .unwrap()
            .retry_if(MergeRace)
            .send()
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().ends_with("Could not merge and save new descriptor"));
        assert_eq!(mock.requests_with(Method::Put).len(), 5);
    }

    #[test]
    fn test_head_retries_on_400() {
        let mock = MockTransport::new();
        let err = client(&mock)
            .head("artifactory/api/repositories/nope")
            .retry_if(StatusIs(400))
            .send()
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert_eq!(mock.requests_with(Method::Head).len(), 5);
    }

    #[test]
    fn test_send_json_decodes() {
        let mock = MockTransport::new();
        mock.insert(
            "artifactory/api/repositories/libs",
            json!({"key": "libs", "rclass": "local"}),
        );

        let body: Value = client(&mock)
            .get("artifactory/api/repositories/libs")
            .send_json()
            .unwrap();
        assert_eq!(body["key"], "libs");
    }
}

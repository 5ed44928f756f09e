//! ureq-backed transport.

use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use std::time::Duration;

/// Maximum response size (repository listings can be large).
const MAX_BODY_SIZE: u64 = 32 * 1024 * 1024;

/// Blocking HTTP transport built on a shared [`ureq::Agent`].
///
/// The agent is configured not to treat 4xx/5xx as errors, so every
/// response reaches the client's status handling.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport with a global per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn network(e: &ureq::Error) -> Error {
    Error::Network {
        message: e.to_string(),
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.url.as_str();
        let body = request.body.as_deref().unwrap_or("");

        let result = match request.method {
            Method::Get => with_headers(self.agent.get(url), request).call(),
            Method::Head => with_headers(self.agent.head(url), request).call(),
            Method::Delete => with_headers(self.agent.delete(url), request).call(),
            Method::Put => with_headers(self.agent.put(url), request).send(body),
            Method::Post => with_headers(self.agent.post(url), request).send(body),
        };
        let mut response = result.map_err(|e| network(&e))?;

        let status = response.status().as_u16();
        let body = if request.method == Method::Head {
            String::new()
        } else {
            response
                .body_mut()
                .with_config()
                .limit(MAX_BODY_SIZE)
                .read_to_string()
                .map_err(|e| network(&e))?
        };

        Ok(HttpResponse { status, body })
    }
}

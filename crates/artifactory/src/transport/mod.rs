//! HTTP transports.
//!
//! The [`Transport`] trait sends one fully-built request and returns the raw
//! response, whatever its status. Status handling, retries and
//! authentication live in [`crate::client`]. [`agent::UreqTransport`] is the
//! real implementation.
//!
//! # Testing
//!
//! Use [`MockTransport`] for testing without network access. It behaves
//! like a small Artifactory/Xray server holding objects in memory:
//!
//! ```
//! use artifactory::transport::{HttpRequest, Method, MockTransport, Transport};
//!
//! let mock = MockTransport::new();
//! let get = HttpRequest::new(Method::Get, "http://mock/artifactory/api/repositories/libs");
//! assert_eq!(mock.send(&get).unwrap().status, 404);
//! ```

pub mod agent;

use crate::error::Result;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to send
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body parsed as JSON (`Null` when absent or not JSON)
    pub fn json(&self) -> Value {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
            .unwrap_or(Value::Null)
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // headers carry credentials
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// Raw response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Sends requests.
///
/// Only failures to get any response are errors; every status code is
/// returned as a response.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// A canned response returned instead of the normal handling
#[derive(Debug, Clone)]
struct ScriptedResponse {
    method: Option<Method>,
    path_prefix: String,
    response: HttpResponse,
    remaining: u32,
}

#[derive(Debug, Default)]
struct MockState {
    /// Stored objects by path, e.g. `artifactory/api/repositories/libs`
    objects: HashMap<String, Value>,
    requests: Vec<HttpRequest>,
    scripted: VecDeque<ScriptedResponse>,
}

const REPOSITORIES: &str = "artifactory/api/repositories/";
const USAGE: &str = "artifactory/api/system/usage";
const XRAY_COLLECTIONS: [&str; 2] = ["xray/api/v2/policies", "xray/api/v2/watches"];

/// In-memory Artifactory/Xray stand-in for testing without network access.
///
/// Repositories are created with PUT (400 if the key exists) and updated
/// with POST. Xray objects are created by POSTing to their collection and
/// updated with PUT. GET and DELETE answer 404 for unknown objects and HEAD
/// answers 400, as the real server does. Stored passwords are never
/// returned. Every request is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new empty mock server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer the next `times` requests matching `method` and `path_prefix`
    /// with the given response instead of handling them.
    pub fn respond_with(
        &self,
        method: Option<Method>,
        path_prefix: impl Into<String>,
        status: u16,
        body: impl Into<String>,
        times: u32,
    ) {
        self.lock().scripted.push_back(ScriptedResponse {
            method,
            path_prefix: path_prefix.into(),
            response: HttpResponse::new(status, body),
            remaining: times,
        });
    }

    /// Store an object directly, bypassing the API
    pub fn insert(&self, path: impl Into<String>, object: Value) {
        self.lock().objects.insert(path.into(), object);
    }

    /// Stored object at `path`, as the server holds it
    pub fn object(&self, path: &str) -> Option<Value> {
        self.lock().objects.get(path).cloned()
    }

    /// Remove an object directly, as if deleted out of band
    pub fn remove(&self, path: &str) -> Option<Value> {
        self.lock().objects.remove(path)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Requests received with the given method
    pub fn requests_with(&self, method: Method) -> Vec<HttpRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    fn scripted(state: &mut MockState, method: Method, path: &str) -> Option<HttpResponse> {
        let index = state.scripted.iter().position(|s| {
            s.method.is_none_or(|m| m == method) && path.starts_with(&s.path_prefix)
        })?;
        let entry = &mut state.scripted[index];
        let response = entry.response.clone();
        entry.remaining = entry.remaining.saturating_sub(1);
        if entry.remaining == 0 {
            state.scripted.remove(index);
        }
        Some(response)
    }

    fn handle(objects: &mut HashMap<String, Value>, request: &HttpRequest, path: &str) -> HttpResponse {
        if path == USAGE {
            return match request.method {
                Method::Post => HttpResponse::new(200, ""),
                _ => HttpResponse::new(405, ""),
            };
        }
        if let Some(key) = path.strip_prefix(REPOSITORIES) {
            return Self::repository(objects, request, path, key);
        }
        if let Some(collection) = XRAY_COLLECTIONS.iter().find(|c| path.starts_with(*c)) {
            return Self::xray(objects, request, collection, path);
        }
        not_found(path)
    }

    fn repository(
        objects: &mut HashMap<String, Value>,
        request: &HttpRequest,
        path: &str,
        key: &str,
    ) -> HttpResponse {
        match request.method {
            Method::Put if objects.contains_key(path) => HttpResponse::new(
                400,
                json!({"errors": [{"status": 400, "message": format!("Case insensitive repository key already exists: '{key}'")}]}).to_string(),
            ),
            Method::Put => {
                let mut body = request.json();
                apply_repository_defaults(&mut body);
                objects.insert(path.to_string(), body);
                HttpResponse::new(200, format!("Successfully created repository '{key}'"))
            }
            Method::Post => match objects.get_mut(path) {
                Some(stored) => {
                    let mut update = request.json();
                    apply_repository_defaults(&mut update);
                    merge(stored, update);
                    HttpResponse::new(200, format!("Repository {key} update successfully."))
                }
                None => not_found(path),
            },
            Method::Get => match objects.get(path) {
                Some(stored) => {
                    let mut shown = stored.clone();
                    if let Some(map) = shown.as_object_mut() {
                        map.remove("password");
                    }
                    HttpResponse::new(200, shown.to_string())
                }
                None => not_found(path),
            },
            Method::Head if objects.contains_key(path) => HttpResponse::new(200, ""),
            Method::Head => HttpResponse::new(400, ""),
            Method::Delete => match objects.remove(path) {
                Some(_) => HttpResponse::new(200, format!("Repository '{key}' and all its content have been removed successfully.")),
                None => not_found(path),
            },
        }
    }

    fn xray(
        objects: &mut HashMap<String, Value>,
        request: &HttpRequest,
        collection: &str,
        path: &str,
    ) -> HttpResponse {
        if path == collection {
            if request.method != Method::Post {
                return HttpResponse::new(405, "");
            }
            let body = request.json();
            let name = body
                .get("general_data")
                .unwrap_or(&body)
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let item = format!("{collection}/{name}");
            if objects.contains_key(&item) {
                return HttpResponse::new(409, json!({"error": format!("{name} already exists")}).to_string());
            }
            objects.insert(item, body);
            return HttpResponse::new(201, json!({"info": format!("{name} created successfully")}).to_string());
        }

        match request.method {
            Method::Get => match objects.get(path) {
                Some(stored) => HttpResponse::new(200, stored.to_string()),
                None => not_found(path),
            },
            Method::Put => match objects.get_mut(path) {
                Some(stored) => {
                    *stored = request.json();
                    HttpResponse::new(200, json!({"info": "updated successfully"}).to_string())
                }
                None => not_found(path),
            },
            Method::Delete => match objects.remove(path) {
                Some(_) => HttpResponse::new(200, json!({"info": "deleted successfully"}).to_string()),
                None => not_found(path),
            },
            _ => HttpResponse::new(405, ""),
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let path = url::Url::parse(&request.url)
            .map(|u| u.path().trim_start_matches('/').to_string())
            .unwrap_or_default();

        let mut state = self.lock();
        state.requests.push(request.clone());
        if let Some(response) = Self::scripted(&mut state, request.method, &path) {
            return Ok(response);
        }
        Ok(Self::handle(&mut state.objects, request, &path))
    }
}

fn not_found(path: &str) -> HttpResponse {
    HttpResponse::new(
        404,
        json!({"errors": [{"status": 404, "message": format!("Item {path} does not exist")}]}).to_string(),
    )
}

/// Fill the values a real server computes when the client leaves them out
fn apply_repository_defaults(body: &mut Value) {
    let Some(map) = body.as_object_mut() else {
        return;
    };
    let rclass = map.get("rclass").and_then(Value::as_str).unwrap_or("local").to_string();
    default(map, "repoLayoutRef", json!("simple-default"));
    default(map, "includesPattern", json!("**/*"));
    default(map, "excludesPattern", json!(""));
    if rclass != "virtual" {
        default(map, "blackedOut", json!(false));
        default(map, "xrayIndex", json!(false));
    }
    if rclass == "remote" {
        if let Some(Value::String(description)) = map.get_mut("description")
            && !description.ends_with(" (local file cache)")
        {
            description.push_str(" (local file cache)");
        }
        default(map, "retrievalCachePeriodSecs", json!(7200));
        default(map, "socketTimeoutMillis", json!(15000));
        default(map, "offline", json!(false));
        default(map, "hardFail", json!(false));
        default(map, "storeArtifactsLocally", json!(true));
    }
}

fn default(map: &mut Map<String, Value>, key: &str, value: Value) {
    map.entry(key).or_insert(value);
}

/// Shallow merge of `update` into `stored`
fn merge(stored: &mut Value, update: Value) {
    match (stored.as_object_mut(), update) {
        (Some(target), Value::Object(source)) => {
            for (k, v) in source {
                target.insert(k, v);
            }
        }
        (_, other) => *stored = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, path: &str, body: Option<Value>) -> HttpRequest {
        let mut req = HttpRequest::new(method, format!("http://mock/{path}"));
        req.body = body.map(|b| b.to_string());
        req
    }

    #[test]
    fn test_repository_lifecycle() {
        let mock = MockTransport::new();
        let path = "artifactory/api/repositories/libs";

        let put = request(Method::Put, path, Some(json!({"key": "libs", "rclass": "local", "packageType": "generic"})));
        assert_eq!(mock.send(&put).unwrap().status, 200);
        assert_eq!(mock.send(&put).unwrap().status, 400);

        let got = mock.send(&request(Method::Get, path, None)).unwrap();
        let body: Value = serde_json::from_str(&got.body).unwrap();
        assert_eq!(body["repoLayoutRef"], "simple-default");

        assert_eq!(mock.send(&request(Method::Head, path, None)).unwrap().status, 200);
        assert_eq!(mock.send(&request(Method::Delete, path, None)).unwrap().status, 200);
        assert_eq!(mock.send(&request(Method::Delete, path, None)).unwrap().status, 404);
        assert_eq!(mock.send(&request(Method::Head, path, None)).unwrap().status, 400);
        assert_eq!(mock.requests().len(), 7);
    }

    #[test]
    fn test_password_never_returned() {
        let mock = MockTransport::new();
        let path = "artifactory/api/repositories/remote";
        let put = request(
            Method::Put,
            path,
            Some(json!({"key": "remote", "rclass": "remote", "url": "https://x", "password": "s3cret", "description": "d"})),
        );
        mock.send(&put).unwrap();

        let got = mock.send(&request(Method::Get, path, None)).unwrap();
        assert!(!got.body.contains("s3cret"));
        assert!(got.body.contains("d (local file cache)"));
        assert_eq!(mock.object(path).unwrap()["password"], "s3cret");
    }

    #[test]
    fn test_scripted_responses() {
        let mock = MockTransport::new();
        mock.respond_with(Some(Method::Get), "artifactory/api/repositories/", 503, "busy", 2);

        let get = request(Method::Get, "artifactory/api/repositories/x", None);
        assert_eq!(mock.send(&get).unwrap().status, 503);
        assert_eq!(mock.send(&get).unwrap().status, 503);
        assert_eq!(mock.send(&get).unwrap().status, 404);
    }

    #[test]
    fn test_xray_collection_create() {
        let mock = MockTransport::new();
        let post = request(
            Method::Post,
            "xray/api/v2/watches",
            Some(json!({"general_data": {"name": "all", "active": true}})),
        );
        assert_eq!(mock.send(&post).unwrap().status, 201);
        assert_eq!(mock.send(&post).unwrap().status, 409);

        let got = mock.send(&request(Method::Get, "xray/api/v2/watches/all", None)).unwrap();
        assert_eq!(got.status, 200);
    }
}

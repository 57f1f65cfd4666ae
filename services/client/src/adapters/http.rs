//! services/client/src/adapters/http.rs
//!
//! The shared `reqwest` transport used by every backend adapter, plus the
//! helpers that turn the backend's JSON envelopes into `ServiceResult`s.
//!
//! The backend answers `{ success, message, data | story | scenario, ... }`.
//! A call fails when the status is not 2xx or `success` is `false`; the
//! message is taken from `message`, then `error`, then the joined `errors`
//! array, then a per-operation default.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use decipher_core::ports::{ServiceError, ServiceResult, SessionStorage, Slot};

pub const CONNECT_FAILED: &str =
    "Cannot connect to server. Please check if the backend is running and the URL is correct.";
const NGROK_SKIP_WARNING: &str = "ngrok-skip-browser-warning";

//=========================================================================================
// Requests
//=========================================================================================

/// A single backend call, relative to the transport's base URL.
///
/// `path` is the fixed route; ids and other caller-supplied values go in
/// through [`ApiRequest::segment`] so they are percent-encoded.
#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    method: Method,
    path: String,
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
    token: Option<&'a str>,
}

impl<'a> ApiRequest<'a> {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            segments: Vec::new(),
            query: Vec::new(),
            body,
            token: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path, Some(body))
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path, None)
    }

    /// Appends one path segment. Reserved characters such as `/` and `?`
    /// are encoded, so the value can never change the route.
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    /// Attaches `Authorization: Bearer <token>` when a token is present.
    pub fn bearer(mut self, token: Option<&'a str>) -> Self {
        self.token = token;
        self
    }
}

//=========================================================================================
// Transport
//=========================================================================================

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(NGROK_SKIP_WARNING),
            HeaderValue::from_static("true"),
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends the request. Only transport failures are errors here; any HTTP
    /// status comes back as a `RawReply`.
    pub async fn execute(&self, request: ApiRequest<'_>) -> ServiceResult<RawReply> {
        let url = self.url_for(&request)?;
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = request.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!("Failed to reach {}: {:?}", url, e);
            network_error(&e)
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            error!("Failed to read the response from {}: {:?}", url, e);
            network_error(&e)
        })?;

        Ok(RawReply { status, body })
    }

    fn url_for(&self, request: &ApiRequest<'_>) -> ServiceResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, request.path))
            .map_err(|e| ServiceError::Internal(format!("Invalid request URL: {}", e)))?;
        if !request.segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| {
                    ServiceError::Internal(format!("{} cannot take a path", self.base_url))
                })?
                .pop_if_empty()
                .extend(&request.segments);
        }
        Ok(url)
    }
}

/// The persisted token, if there is a usable one.
pub async fn bearer_token(storage: &dyn SessionStorage) -> ServiceResult<Option<String>> {
    Ok(storage
        .read(Slot::Token)
        .await?
        .filter(|t| !t.is_empty() && t != "undefined"))
}

pub fn to_body(value: &impl Serialize) -> ServiceResult<Value> {
    serde_json::to_value(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

fn network_error(err: &reqwest::Error) -> ServiceError {
    if err.is_connect() {
        ServiceError::Network(CONNECT_FAILED.to_string())
    } else {
        ServiceError::Network(format!(
            "Network error: {}. Please check your connection and try again.",
            err
        ))
    }
}

//=========================================================================================
// Replies
//=========================================================================================

#[derive(Debug, Clone)]
pub struct RawReply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawReply {
    /// Parses the body as JSON, refusing empty and HTML bodies.
    pub fn json(&self) -> ServiceResult<Value> {
        let text = String::from_utf8_lossy(&self.body);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::Malformed(
                "Server returned empty response".to_string(),
            ));
        }
        if looks_like_html(trimmed) {
            error!(
                "Received HTML instead of JSON: {}",
                trimmed.chars().take(200).collect::<String>()
            );
            return Err(ServiceError::Malformed(
                "Received HTML response. Please check ngrok configuration or try again."
                    .to_string(),
            ));
        }
        serde_json::from_str(trimmed).map_err(|e| {
            error!("Failed to parse response JSON: {:?}", e);
            ServiceError::Malformed("Invalid JSON response from server".to_string())
        })
    }

    /// Unwraps the backend envelope, returning the whole JSON document on
    /// success and a `Rejected` error otherwise.
    pub fn envelope(&self, default_message: &str) -> ServiceResult<Value> {
        let value = match self.json() {
            Ok(value) => value,
            Err(_) if !self.status.is_success() => {
                return Err(ServiceError::rejected(format!(
                    "Server error: {}",
                    self.status
                )));
            }
            Err(e) => return Err(e),
        };

        let refused = value.get("success").and_then(Value::as_bool) == Some(false);
        if !self.status.is_success() || refused {
            return Err(ServiceError::Rejected {
                message: message_of(&value).unwrap_or_else(|| default_message.to_string()),
                requires_verification: value
                    .get("requiresVerification")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                email: value
                    .get("email")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        Ok(value)
    }
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.chars().take(14).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// The human-readable message of a backend envelope, if it carries one.
pub fn message_of(value: &Value) -> Option<String> {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };
    non_empty(value.get("message"))
        .or_else(|| non_empty(value.get("error")))
        .or_else(|| {
            let errors: Vec<&str> = value
                .get("errors")?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .collect();
            (!errors.is_empty()).then(|| errors.join(", "))
        })
}

/// Deserializes the value at `pointer` (e.g. `/data/user`).
pub fn field<T: DeserializeOwned>(value: &Value, pointer: &str) -> ServiceResult<T> {
    let raw = value.pointer(pointer).ok_or_else(|| {
        ServiceError::Malformed(format!("Response is missing {}", pointer))
    })?;
    T::deserialize(raw).map_err(|e| {
        error!("Failed to decode {}: {:?}", pointer, e);
        ServiceError::Malformed(format!("Response has an invalid {}", pointer))
    })
}

/// Like [`field`], but a missing or `null` value is `None`.
pub fn optional_field<T: DeserializeOwned>(value: &Value, pointer: &str) -> ServiceResult<Option<T>> {
    match value.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => field(value, pointer).map(Some),
    }
}

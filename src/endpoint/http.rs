//! Blocking HTTP implementation of [`ApiClient`] on top of `ureq`.
//!
//! Calls run on tokio's blocking pool so the scheduler's runtime threads
//! stay free while requests are in flight.

use crate::endpoint::client::{ApiClient, ApiRequest, ApiResponse};
use crate::error::{Error, Result};
use crate::hlog_trace;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use std::sync::{OnceLock, RwLock};

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}|:([A-Za-z_][A-Za-z0-9_]*)")
            .expect("placeholder pattern is valid")
    })
}

#[derive(Debug, Clone)]
enum Auth {
    Basic { login: String, password: String },
    Bearer(String),
}

impl Auth {
    fn header(&self) -> String {
        match self {
            Auth::Basic { login, password } => {
                format!("Basic {}", STANDARD.encode(format!("{}:{}", login, password)))
            }
            Auth::Bearer(token) => format!("Bearer {}", token),
        }
    }
}

/// REST client for the remote API.
pub struct HttpClient {
    base_url: String,
    auth: RwLock<Auth>,
}

impl HttpClient {
    /// Client authenticating with basic credentials until [`ApiClient::authorize`].
    pub fn new(base_url: &str, login: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: RwLock::new(Auth::Basic {
                login: login.to_string(),
                password: password.to_string(),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorization(&self) -> String {
        match self.auth.read() {
            Ok(auth) => auth.header(),
            Err(poisoned) => poisoned.into_inner().header(),
        }
    }
}

/// Fill the endpoint's placeholders with the leading positional arguments.
///
/// Returns the URL path and the remaining arguments.
pub fn expand_endpoint<'a>(endpoint: &str, args: &'a [Value]) -> Result<(String, &'a [Value])> {
    let mut path = String::with_capacity(endpoint.len());
    let mut last = 0;
    let mut used = 0;

    for caps in placeholder_pattern().captures_iter(endpoint) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let arg = args.get(used).ok_or_else(|| Error::MissingValue {
            task: endpoint.to_string(),
            detail: format!("no argument for placeholder {}", name),
        })?;
        path.push_str(&endpoint[last..whole.0]);
        path.push_str(&urlencoded(&render_segment(arg)));
        last = whole.1;
        used += 1;
    }
    path.push_str(&endpoint[last..]);

    Ok((path, &args[used..]))
}

fn render_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Percent-encode a path segment.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Decode a response body: empty is `null`, non-JSON is kept as a string.
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn remote_error(target: &str, err: ureq::Error) -> Error {
    let status = match &err {
        ureq::Error::StatusCode(code) => Some(*code),
        _ => None,
    };
    Error::RemoteCall {
        operation: target.to_string(),
        status,
        message: err.to_string(),
    }
}

#[async_trait]
impl ApiClient for HttpClient {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        let target = request.target();
        let (path, rest) = expand_endpoint(&request.descriptor.endpoint, &request.args)?;
        let url = format!("{}{}", self.base_url, path);
        let verb = request.descriptor.verb.to_uppercase();
        let body = rest.first().cloned();
        let authorization = self.authorization();
        hlog_trace!("{} {} {}", target, verb, url);

        let blocking_target = target.clone();
        tokio::task::spawn_blocking(move || -> Result<ApiResponse> {
            let agent = ureq::Agent::new_with_defaults();
            let payload = body.unwrap_or(Value::Object(Default::default()));
            let response = match verb.as_str() {
                "POST" => agent
                    .post(&url)
                    .header("Authorization", &authorization)
                    .send_json(&payload),
                "PUT" => agent
                    .put(&url)
                    .header("Authorization", &authorization)
                    .send_json(&payload),
                "PATCH" => agent
                    .patch(&url)
                    .header("Authorization", &authorization)
                    .send_json(&payload),
                "DELETE" => agent
                    .delete(&url)
                    .header("Authorization", &authorization)
                    .call(),
                _ => agent
                    .get(&url)
                    .header("Authorization", &authorization)
                    .call(),
            }
            .map_err(|e| remote_error(&blocking_target, e))?;

            let status = response.status().as_u16();
            let text = response
                .into_body()
                .read_to_string()
                .map_err(|e| remote_error(&blocking_target, e))?;
            Ok(ApiResponse::new(status, decode_body(&text)))
        })
        .await
        .map_err(|e| Error::TaskJoin(format!("{}: {}", target, e)))?
    }

    fn authorize(&self, token: &str) {
        let bearer = Auth::Bearer(token.to_string());
        match self.auth.write() {
            Ok(mut auth) => *auth = bearer,
            Err(poisoned) => *poisoned.into_inner() = bearer,
        }
    }
}

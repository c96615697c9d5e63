//! HTTP seam of the document store.

use crate::{config::ConfigurationList, error::InternalError};
use reqwest::blocking::Client;
use serde_json::Value as Json;
use std::{fmt, time::Duration};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

///
/// Method
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    const fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Put => reqwest::Method::PUT,
            Self::Post => reqwest::Method::POST,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        };
        f.write_str(label)
    }
}

///
/// HttpResponse
/// Status code plus the decoded JSON body (`Null` when the body is empty).
///

#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Json,
}

impl HttpResponse {
    #[must_use]
    pub const fn new(status: u16, body: Json) -> Self {
        Self { status, body }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// The server's `reason` or `error` text, for error messages.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.body
            .get("reason")
            .or_else(|| self.body.get("error"))
            .and_then(Json::as_str)
            .unwrap_or("")
    }
}

///
/// DocumentTransport
///
/// One request against the database URL. `path` starts with `/` and is
/// already percent-encoded.
///

pub trait DocumentTransport: Send + Sync {
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Json>,
    ) -> Result<HttpResponse, InternalError>;
}

///
/// HttpTransport
///

pub struct HttpTransport {
    client: Client,
    base: String,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, InternalError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base: url.trim_end_matches('/').to_string(),
        })
    }

    /// Build from the `url` and `timeout` (seconds) configuration keys.
    pub fn from_config(config: &ConfigurationList) -> Result<Self, InternalError> {
        let url = config.require("url")?;
        let timeout = config.parse_or("timeout", DEFAULT_TIMEOUT_SECS)?;

        Self::new(url, Duration::from_secs(timeout))
    }
}

impl DocumentTransport for HttpTransport {
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Json>,
    ) -> Result<HttpResponse, InternalError> {
        let url = format!("{}{path}", self.base);
        let mut request = self.client.request(method.to_reqwest(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        tracing::trace!(%method, path, status, bytes = text.len(), "couchdb request");

        let body = if text.trim().is_empty() {
            Json::Null
        } else {
            serde_json::from_str(&text)?
        };

        Ok(HttpResponse::new(status, body))
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

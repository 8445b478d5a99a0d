//! HTTP access to the time-indexed data server
//!
//! Requests follow the CloudTurbine servlet conventions:
//!
//! ```text
//! GET <base><root>/<path>?dt=s&f=b&d=<sec>&r=absolute&t=<sec>
//! ```
//!
//! The server answers with the data plus `time`, `duration`, `oldest`,
//! `newest` and `lagtime` headers in float seconds.

use crate::config::ServerConfig;
use crate::constants::{SERVER_BASE_URL, SERVER_TIMEOUT_SECONDS, SERVLET_ROOT, USER_AGENT};
use crate::error::{Error, Result};
use crate::models::{format_seconds, FetchRequest, FetchResponse, Millis, ReferenceMode, ResponseMeta};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Something that can answer a [`FetchRequest`]
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    servlet_root: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for `base_url` with default settings
    pub async fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build().await
    }

    pub fn builder() -> TransportBuilder {
        TransportBuilder::new()
    }

    /// Build a transport from the `scan.server` configuration
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::builder()
            .base_url(&config.base_url)
            .servlet_root(&config.servlet_root)
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .await
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL of a request; `now` feeds the cache-buster
    pub fn request_url(&self, request: &FetchRequest, now: Millis) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::other(format!("{} cannot be a base URL", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(self.servlet_root.split('/').filter(|s| !s.is_empty()));
            segments.extend(request.channel_path.split('/').filter(|s| !s.is_empty()));
        }

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dt", request.media_kind.data_type());
            if request.time_only {
                query.append_pair("f", "t");
            } else if request.media_kind.data_type() == "s" {
                query.append_pair("f", "b");
            }
            query.append_pair("d", &format_seconds(request.fetch_duration));
            query.append_pair("r", request.reference.as_str());
            if request.reference.carries_time() {
                query.append_pair("t", &format_seconds(request.fetch_time.max(0.0)));
            }
            if request.reference != ReferenceMode::Absolute {
                query.append_pair("refresh", &format!("{}", now.round() as i64));
            }
        }
        Ok(url)
    }

    fn now_ms() -> Millis {
        chrono::Utc::now().timestamp_millis() as f64
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let url = self.request_url(request, Self::now_ms())?;
        debug!(channel = %request.channel_path, %url, "GET");

        let mut builder = self.client.get(url).timeout(self.timeout);
        if let Some(token) = &request.dedupe_token {
            builder = builder.header(IF_NONE_MATCH, token.as_str());
        }
        let response = builder.send().await?;

        match response.status() {
            StatusCode::OK => {
                let meta = parse_meta(response.headers())?;
                let body = response.bytes().await?.to_vec();
                Ok(FetchResponse::Data { meta, body })
            }
            StatusCode::NOT_MODIFIED => Ok(FetchResponse::NotModified),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(FetchResponse::NoData),
            status => Err(Error::Status(status.as_u16())),
        }
    }
}

/// Read the metadata headers. Absent headers are `None`; unparsable ones fail.
pub fn parse_meta(headers: &HeaderMap) -> Result<ResponseMeta> {
    Ok(ResponseMeta {
        time: seconds_header(headers, "time")?,
        duration: seconds_header(headers, "duration")?,
        oldest: seconds_header(headers, "oldest")?,
        newest: seconds_header(headers, "newest")?,
        lag_time: seconds_header(headers, "lagtime")?,
    })
}

fn seconds_header(headers: &HeaderMap, name: &str) -> Result<Option<Millis>> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| Error::invalid_header(name, String::from_utf8_lossy(value.as_bytes())))?;
    match text.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() => Ok(Some(seconds * 1000.0)),
        _ => Err(Error::invalid_header(name, text)),
    }
}

/// Builder for [`HttpTransport`]
#[derive(Debug)]
pub struct TransportBuilder {
    client: Option<Client>,
    base_url: String,
    servlet_root: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self {
            client: None,
            base_url: SERVER_BASE_URL.to_string(),
            servlet_root: SERVLET_ROOT.to_string(),
            timeout: Duration::from_secs(SERVER_TIMEOUT_SECONDS),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl TransportBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the server address
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the servlet root prefixed to channel paths
    pub fn servlet_root(mut self, root: impl Into<String>) -> Self {
        self.servlet_root = root.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the transport
    pub async fn build(self) -> Result<HttpTransport> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()?,
        };

        Ok(HttpTransport {
            client,
            base_url: Url::parse(&self.base_url)?,
            servlet_root: self.servlet_root,
            timeout: self.timeout,
        })
    }
}

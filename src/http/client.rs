use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, Url};
use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, TransportError};

use super::request::RequestInput;
use super::response::CapturedResponse;

/// Thin adapter over `reqwest` that turns every HTTP status into a value and
/// only reports network-level problems as errors.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    retry_count: u32,
    retry_delay: Duration,
}

impl ApiClient {
    pub fn new(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let mut builder = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_millis(config.timeout_ms));

        match config
            .proxy_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(proxy_url) => {
                let proxy = Proxy::all(proxy_url)
                    .map_err(|err| HarnessError::Client(format!("Invalid proxy URL: {err}")))?;
                builder = builder.proxy(proxy);
            }
            None => builder = builder.no_proxy(),
        }

        let client = builder
            .build()
            .map_err(|err| HarnessError::Client(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry_count: config.retry_count,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one logical request, retrying transport failures up to the
    /// configured retry count.
    pub async fn send(&self, request: &RequestInput) -> Result<CapturedResponse, TransportError> {
        let url = self.resolve_url(request)?;
        let headers = build_headers(&request.headers)?;

        let mut last_error: Option<TransportError> = None;

        for attempt in 0..=self.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.send_once(request, url.clone(), headers.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if !err.is_retryable() || attempt == self.retry_count {
                        return Err(err);
                    }
                    warn!(
                        request = %request.label(),
                        attempt = attempt + 1,
                        error = %err,
                        "Transport failure, retrying"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| TransportError::Read("Request failed".into())))
    }

    async fn send_once(
        &self,
        request: &RequestInput,
        url: Url,
        headers: HeaderMap,
    ) -> Result<CapturedResponse, TransportError> {
        debug!(method = %request.method, %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(headers);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let headers = collect_headers(response.headers());
        let bytes = response.bytes().await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            status = status.as_u16(),
            size = bytes.len(),
            duration_ms,
            "Received response"
        );

        Ok(CapturedResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            headers,
            raw_body: String::from_utf8_lossy(&bytes).into_owned(),
            duration_ms,
        })
    }

    fn resolve_url(&self, request: &RequestInput) -> Result<Url, TransportError> {
        let raw = join_url(&self.base_url, &request.path);
        let mut url = Url::parse(&raw)
            .map_err(|err| TransportError::InvalidRequest(format!("Invalid URL `{raw}`: {err}")))?;

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let path = path.trim();
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn build_headers(input: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        let key = key.trim();
        if key.is_empty() {
            return Err(TransportError::InvalidRequest("Header key is empty".into()));
        }

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            TransportError::InvalidRequest(format!("Invalid header name `{key}`: {err}"))
        })?;
        let header_value = HeaderValue::from_str(value.trim()).map_err(|err| {
            TransportError::InvalidRequest(format!("Invalid header value for `{key}`: {err}"))
        })?;
        headers.append(header_name, header_value);
    }

    Ok(headers)
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = value.to_str().unwrap_or("<binary>");
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}

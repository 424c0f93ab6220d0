use std::time::Duration;

use oarc_core::{HttpRequest, HttpResponse, Transport, TransportError};
use reqwest::Method;
use reqwest::blocking::Client;

/// Blocking HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::with_source("failed to build HTTP client", e))?;
        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| TransportError::with_source("invalid HTTP method", e))?;
        let url = request.full_url();

        let mut builder = self.http.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = request.cookie_header() {
            builder = builder.header("cookie", cookies);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| TransportError::with_source(format!("request to {url} failed"), e))?;

        let mut out = HttpResponse::new(response.status().as_u16());
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(value) => out = out.with_header(name.as_str(), value),
                Err(_) => log::debug!("dropping non-ASCII response header `{name}`"),
            }
        }
        let body = response
            .bytes()
            .map_err(|e| TransportError::with_source("failed to read response body", e))?;
        Ok(out.with_body(body.to_vec()))
    }
}

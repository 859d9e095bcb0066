//! HTTP transport implementations.

use crate::errors::{GatewayError, GatewayResult};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, Response, StatusCode};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// HTTP transport trait for making requests to the Mealie API.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request and return the response body
    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> GatewayResult<Response<Bytes>>;
}

/// Reqwest-based HTTP transport implementation
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new reqwest transport with the given request timeout
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    fn to_reqwest_method(method: &Method) -> reqwest::Method {
        match *method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::DELETE => reqwest::Method::DELETE,
            Method::PATCH => reqwest::Method::PATCH,
            _ => reqwest::Method::GET,
        }
    }

    fn to_reqwest_headers(headers: HeaderMap) -> reqwest::header::HeaderMap {
        let mut reqwest_headers = reqwest::header::HeaderMap::new();
        for (name, value) in headers.iter() {
            if let Ok(header_name) =
                reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes())
            {
                if let Ok(header_value) = reqwest::header::HeaderValue::from_bytes(value.as_bytes())
                {
                    reqwest_headers.insert(header_name, header_value);
                }
            }
        }
        reqwest_headers
    }

    fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> GatewayResult<Response<Bytes>> {
        let reqwest_method = Self::to_reqwest_method(&method);
        let reqwest_headers = Self::to_reqwest_headers(headers);

        let mut request = self
            .client
            .request(reqwest_method, url.as_str())
            .headers(reqwest_headers);

        if let Some(body_data) = body {
            request = request.body(body_data.to_vec());
        }

        let response = request.send().await?;

        let status = response.status();
        let response_headers = response.headers().clone();
        let body_bytes = response.bytes().await?;

        if !status.is_success() {
            let retry_after = Self::retry_after(&response_headers);
            return Err(GatewayError::from_status(
                status.as_u16(),
                &String::from_utf8_lossy(&body_bytes),
                retry_after,
            ));
        }

        let mut http_response = Response::builder().status(
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK),
        );

        for (name, value) in response_headers.iter() {
            http_response = http_response.header(name.as_str(), value.as_bytes());
        }

        http_response
            .body(body_bytes)
            .map_err(|e| GatewayError::Unknown {
                message: format!("Failed to build response: {}", e),
                status_code: None,
            })
    }
}

//! HTTP transport used by the runner.
//!
//! [`Transport`] is the seam between the runner and the network; the
//! production implementation is [`HttpTransport`] over a blocking reqwest
//! client.

use crate::config::RunConfig;
use crate::error::{Result, VerdictError};
use crate::scenario::Method;
use reqwest::blocking::Client;
use serde_json::Value;
use std::error::Error as _;

/// A fully rendered request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

/// Sends one request and waits for the response.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking HTTP/1.1 transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client honouring the run's timeout.
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| VerdictError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    let timed_out = err.is_timeout();
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransportError { message, timed_out }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport_error)?;
        Ok(HttpResponse { status, body })
    }
}

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use textterm_core::{InputKind, InputRequest, SessionId, TermResponse, Transport, TransportError};
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

use crate::config::HttpTransportConfig;

#[derive(Debug, Error)]
pub enum HttpTransportError {
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),
    #[error("http client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
struct Endpoints {
    init: Url,
    data: Url,
    input: Url,
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
    endpoints: Endpoints,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, HttpTransportError> {
        let join = |path: &str| {
            config.base_url.join(path).map_err(|err| {
                HttpTransportError::InvalidConfig(format!("invalid endpoint {path}: {err}"))
            })
        };
        let endpoints = Endpoints {
            init: join(&config.init_path)?,
            data: join(&config.data_path)?,
            input: join(&config.input_path)?,
        };
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .no_proxy()
            .build()?;
        debug!(
            target = "textterm.http",
            init = %endpoints.init,
            data = %endpoints.data,
            input = %endpoints.input,
            "http transport configured"
        );
        Ok(Self {
            client,
            config,
            endpoints,
        })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn with_session(&self, builder: RequestBuilder, session: &SessionId) -> RequestBuilder {
        builder.header(self.config.session_header.as_str(), session.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn init(&self, session: &SessionId, payload: &Value) -> Result<TermResponse, TransportError> {
        let builder = self.with_session(self.client.post(self.endpoints.init.clone()), session);
        let response = builder.json(payload).send().await.map_err(request_failed)?;
        decode(response).await
    }

    async fn poll(&self, session: &SessionId, nonce: &str) -> Result<TermResponse, TransportError> {
        let builder = self.with_session(self.client.get(self.endpoints.data.clone()), session);
        let response = builder
            .query(&[("rnd", nonce)])
            .send()
            .await
            .map_err(request_failed)?;
        decode(response).await
    }

    async fn send_input(&self, session: &SessionId, input: &InputRequest) -> Result<(), TransportError> {
        let mut builder = self
            .with_session(self.client.post(self.endpoints.input.clone()), session)
            .header(CONTENT_TYPE, "text/plain");
        match &input.kind {
            InputKind::Line => {}
            InputKind::Interrupt => {
                builder = builder.header(self.config.interrupt_header.as_str(), "true");
            }
            InputKind::Handler(id) => {
                builder = builder.header(self.config.handler_header.as_str(), id.as_str());
            }
        }
        let response = builder
            .body(input.text.clone())
            .send()
            .await
            .map_err(request_failed)?;
        body(response).await.map(|_| ())
    }
}

fn request_failed(err: reqwest::Error) -> TransportError {
    TransportError::Request(err.to_string())
}

/// Only a 200 carries a body worth applying.
async fn body(response: Response) -> Result<String, TransportError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response.text().await.map_err(request_failed)
}

async fn decode(response: Response) -> Result<TermResponse, TransportError> {
    let text = body(response).await?;
    if text.trim().is_empty() {
        return Ok(TermResponse::default());
    }
    trace!(target = "textterm.http", bytes = text.len(), "decoding response");
    serde_json::from_str(&text).map_err(|err| TransportError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unjoinable_paths() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        let err = HttpTransport::new(HttpTransportConfig::new(base)).unwrap_err();
        assert!(matches!(err, HttpTransportError::InvalidConfig(_)));
    }

    #[test]
    fn paths_are_joined_onto_the_base() {
        let base = Url::parse("http://127.0.0.1:8080/console/").unwrap();
        let config = HttpTransportConfig::new(base).with_data_path("poll");
        let transport = HttpTransport::new(config).unwrap();
        assert_eq!(
            transport.endpoints.init.as_str(),
            "http://127.0.0.1:8080/textTerminalInit"
        );
        assert_eq!(transport.endpoints.data.as_str(), "http://127.0.0.1:8080/console/poll");
    }
}

//! Reqwest Transport
//!
//! The network request-executor at the bottom of the outbound stack.

use crate::config::ClientConfig;
use crate::domain::entities::{OutboundRequest, Response};
use crate::domain::errors::TransportError;
use crate::domain::ports::Transport;
use async_trait::async_trait;

/// Errors raised while building the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientConfigError {
    #[error("invalid PEM certificate: {0}")]
    Pem(String),

    #[error("failed to build http client: {0}")]
    Build(String),
}

/// Build a `reqwest::Client` from [`ClientConfig`].
///
/// Extra PEM roots are added on top of the built-in roots and ignored
/// when certificate verification is disabled.
pub fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ClientConfigError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout())
        .pool_idle_timeout(config.idle_conn_timeout())
        .pool_max_idle_per_host(config.max_idle_conns_per_host)
        .danger_accept_invalid_certs(config.insecure_skip_verify);

    if config.disable_compression {
        builder = builder.no_gzip();
    }

    if !config.insecure_skip_verify {
        for cert in parse_pem_certificates(&config.pem_certificates)? {
            builder = builder.add_root_certificate(cert);
        }
    }

    builder
        .build()
        .map_err(|e| ClientConfigError::Build(e.to_string()))
}

/// Parse every certificate in a PEM bundle.
pub fn parse_pem_certificates(pem: &[u8]) -> Result<Vec<reqwest::Certificate>, ClientConfigError> {
    let mut reader = pem;
    rustls_pemfile::certs(&mut reader)
        .map(|der| {
            let der = der.map_err(|e| ClientConfigError::Pem(e.to_string()))?;
            reqwest::Certificate::from_der(der.as_ref())
                .map_err(|e| ClientConfigError::Pem(e.to_string()))
        })
        .collect()
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Transport backed by a shared `reqwest::Client` (and its connection pool).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientConfigError> {
        Ok(Self::new(build_http_client(config)?))
    }

    async fn send(&self, request: &OutboundRequest) -> Result<Response, TransportError> {
        let url = request.target()?;
        tracing::debug!("outbound request: method {} url {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &OutboundRequest) -> Result<Response, TransportError> {
        if request.url.is_none() {
            tracing::error!("outbound request has no url, cannot execute request");
            return Err(TransportError::MissingUrl);
        }

        match &request.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(TransportError::Cancelled),
                outcome = self.send(request) => outcome,
            },
            None => self.send(request).await,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_build_client_with_defaults() {
        assert!(build_http_client(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_build_client_with_compression_disabled_and_insecure() {
        let config = ClientConfig {
            disable_compression: true,
            insecure_skip_verify: true,
            pem_certificates: b"garbage that is ignored".to_vec(),
            ..ClientConfig::default()
        };
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_parse_empty_pem_bundle() {
        assert!(parse_pem_certificates(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_pem_bundle() {
        let pem = b"-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n";
        assert!(matches!(
            parse_pem_certificates(pem),
            Err(ClientConfigError::Pem(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_url_fails_fast() {
        let transport = ReqwestTransport::new(reqwest::Client::new());
        let err = transport
            .execute(&OutboundRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::MissingUrl);
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = ReqwestTransport::new(reqwest::Client::new());
        let request = OutboundRequest::get(&format!("http://{}/", addr)).unwrap();
        let err = transport.execute(&request).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error {:?}", err);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_call() {
        // Accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let transport = ReqwestTransport::new(reqwest::Client::new());
        let request = OutboundRequest::get(&format!("http://{}/", addr))
            .unwrap()
            .with_cancellation(token);
        let err = tokio::time::timeout(Duration::from_secs(5), transport.execute(&request))
            .await
            .expect("cancellation did not interrupt the call")
            .unwrap_err();
        assert_eq!(err, TransportError::Cancelled);

        server.abort();
    }

    #[tokio::test]
    async fn test_buffers_response_body() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(reqwest::Client::new());
        let request = OutboundRequest::get(&format!("{}/hello", mock_server.uri())).unwrap();
        let resp = transport.execute(&request).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.text(), "hello");
    }
}

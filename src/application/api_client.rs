//! API Client
//!
//! Thin REST/SOAP convenience layer over any [`Transport`]: joins paths
//! onto a base URL, merges query parameters and applies the standard
//! headers for each verb.

use crate::domain::entities::OutboundRequest;
use crate::domain::errors::TransportError;
use crate::domain::ports::Transport;
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Errors surfaced by [`ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Response returned by [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
    /// Final URL the request was sent to
    pub url: Url,
}

impl ApiResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
struct Credentials {
    header: HeaderName,
    value: HeaderValue,
}

/// Client bound to one base URL.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    user_agent: HeaderValue,
    credentials: Option<Credentials>,
    cancellation: Option<CancellationToken>,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    /// Create a client. `base_url` must be an absolute URL.
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &str,
        user_agent: &str,
    ) -> Result<Self, ApiClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ApiClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ApiClientError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "url cannot be used as a base".to_string(),
            });
        }
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| ApiClientError::InvalidHeader(format!("user agent: {}", e)))?;

        Ok(Self {
            base_url: parsed,
            user_agent,
            credentials: None,
            cancellation: None,
            transport,
        })
    }

    /// Send `key` in the `Authorization` header on every request.
    pub fn with_authorization(self, key: &str) -> Result<Self, ApiClientError> {
        self.with_auth_header(AUTHORIZATION.as_str(), key)
    }

    /// Send `key` in a custom header on every request.
    pub fn with_auth_header(mut self, header: &str, key: &str) -> Result<Self, ApiClientError> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| ApiClientError::InvalidHeader(format!("{}: {}", header, e)))?;
        let mut value = HeaderValue::from_str(key)
            .map_err(|e| ApiClientError::InvalidHeader(format!("{}: {}", header, e)))?;
        value.set_sensitive(true);
        self.credentials = Some(Credentials { header, value });
        Ok(self)
    }

    /// Copy of this client whose calls are cancelled by `token`, e.g.
    /// `client.with_cancellation(token).get("roles", &[])`.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.to_str().unwrap_or_default()
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse, ApiClientError> {
        let request = self
            .request(Method::GET, path, query)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        self.send(request).await
    }

    pub async fn post(&self, path: &str, body: impl Into<Bytes>) -> Result<ApiResponse, ApiClientError> {
        self.post_with_query(path, &[], body).await
    }

    pub async fn post_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse, ApiClientError> {
        let request = self.json_request(Method::POST, path, query, body.into());
        self.send(request).await
    }

    pub async fn put(&self, path: &str, body: impl Into<Bytes>) -> Result<ApiResponse, ApiClientError> {
        let request = self.json_request(Method::PUT, path, &[], body.into());
        self.send(request).await
    }

    pub async fn delete(&self, path: &str, body: impl Into<Bytes>) -> Result<ApiResponse, ApiClientError> {
        let request = self.json_request(Method::DELETE, path, &[], body.into());
        self.send(request).await
    }

    /// POST a SOAP envelope.
    pub async fn post_xml(
        &self,
        path: &str,
        body: impl Into<Bytes>,
        soap_action: &str,
    ) -> Result<ApiResponse, ApiClientError> {
        let action = HeaderValue::from_str(soap_action)
            .map_err(|e| ApiClientError::InvalidHeader(format!("SOAPAction: {}", e)))?;
        let request = self
            .request(Method::POST, path, &[])
            .header(CONTENT_TYPE, HeaderValue::from_static("text/xml;charset=utf-8"))
            .header(HeaderName::from_static("soapaction"), action)
            .body(body.into());
        self.send(request).await
    }

    /// Execute an arbitrary request, adding credentials when configured.
    ///
    /// A token already attached to `request` takes precedence over the
    /// client's own.
    pub async fn send(&self, mut request: OutboundRequest) -> Result<ApiResponse, ApiClientError> {
        let url = request.target()?;
        if let Some(credentials) = &self.credentials {
            request
                .headers
                .insert(credentials.header.clone(), credentials.value.clone());
        }
        if request.cancellation.is_none() {
            request.cancellation = self.cancellation.clone();
        }

        tracing::debug!("api client send: method {} url {}", request.method, url);

        let response = self.transport.execute(&request).await.map_err(|e| {
            tracing::error!("error sending HTTP request to {}: {}", url, e);
            e
        })?;

        Ok(ApiResponse {
            status: response.status,
            body: response.body,
            url,
        })
    }

    fn json_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Bytes,
    ) -> OutboundRequest {
        self.request(method, path, query)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body)
    }

    fn request(&self, method: Method, path: &str, query: &[(&str, &str)]) -> OutboundRequest {
        OutboundRequest::from_url(method, self.url_for(path, query))
            .header(USER_AGENT, self.user_agent.clone())
    }

    /// Join `path` onto the base path and merge `query` over the base query.
    ///
    /// Keys given in `query` replace the base URL's values for that key.
    fn url_for(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&join_path(self.base_url.path(), path));

        if !query.is_empty() {
            let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (key, value) in self.base_url.query_pairs() {
                merged.entry(key.into_owned()).or_default().push(value.into_owned());
            }
            let mut overridden: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for &(key, value) in query {
                overridden.entry(key).or_default().push(value);
            }
            for (key, values) in overridden {
                merged.insert(
                    key.to_string(),
                    values.into_iter().map(str::to_string).collect(),
                );
            }

            url.query_pairs_mut()
                .clear()
                .extend_pairs(merged.iter().flat_map(|(k, vs)| vs.iter().map(move |v| (k, v))));
        }
        url
    }
}

/// Join two URL paths, collapsing duplicate slashes and resolving `.`/`..`.
fn join_path(base: &str, path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::Response;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and answers 200 "OK".
    #[derive(Default)]
    struct CapturingTransport {
        seen: Mutex<Vec<OutboundRequest>>,
    }

    #[async_trait]
    impl Transport for CapturingTransport {
        async fn execute(&self, request: &OutboundRequest) -> Result<Response, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(Response::new(StatusCode::OK, "OK"))
        }
    }

    fn client(base: &str) -> (ApiClient, Arc<CapturingTransport>) {
        let transport = Arc::new(CapturingTransport::default());
        let client = ApiClient::new(transport.clone(), base, "test").unwrap();
        (client, transport)
    }

    #[test]
    fn test_new_sets_user_agent() {
        let (client, _) = client("https://test.com/");
        assert_eq!(client.user_agent(), "test");
    }

    #[test]
    fn test_new_rejects_relative_base() {
        let err = ApiClient::new(Arc::new(CapturingTransport::default()), "roles/bus", "test")
            .err()
            .unwrap();
        assert!(matches!(err, ApiClientError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_new_rejects_non_base_url() {
        let err = ApiClient::new(Arc::new(CapturingTransport::default()), "mailto:a@b.c", "test")
            .err()
            .unwrap();
        assert!(matches!(err, ApiClientError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "roles/bus"), "/roles/bus");
        assert_eq!(join_path("/v2", "roles/bus"), "/v2/roles/bus");
        assert_eq!(join_path("/v2/", "/roles//bus/"), "/v2/roles/bus");
        assert_eq!(join_path("/v2", "../roles"), "/roles");
        assert_eq!(join_path("", ""), "/");
    }

    #[test]
    fn test_url_for_merges_query() {
        let (client, _) = client("http://localhost/v2?name=Bob&keep=1");
        let url = client.url_for("roles/bus", &[("name", "Ava"), ("friend", "Jess")]);
        assert_eq!(
            url.as_str(),
            "http://localhost/v2/roles/bus?friend=Jess&keep=1&name=Ava"
        );
    }

    #[test]
    fn test_url_for_without_query_keeps_base_query() {
        let (client, _) = client("http://localhost/v2?keep=1");
        let url = client.url_for("roles", &[]);
        assert_eq!(url.as_str(), "http://localhost/v2/roles?keep=1");
    }

    #[tokio::test]
    async fn test_get_sets_accept_and_user_agent() {
        let (client, transport) = client("http://localhost/v2");
        let resp = client.get("roles/bus", &[]).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.url.path(), "/v2/roles/bus");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].headers[ACCEPT], "application/json");
        assert_eq!(seen[0].headers[USER_AGENT], "test");
        assert!(seen[0].headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_json_verbs_set_content_type_and_body() {
        let (client, transport) = client("http://localhost");
        client.post("roles", r#"{"roles":["LOL"]}"#).await.unwrap();
        client.put("roles", "{}").await.unwrap();
        client.delete("roles", "").await.unwrap();

        let seen = transport.seen.lock().unwrap();
        let methods: Vec<Method> = seen.iter().map(|r| r.method.clone()).collect();
        assert_eq!(methods, vec![Method::POST, Method::PUT, Method::DELETE]);
        for request in seen.iter() {
            assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        }
        assert_eq!(seen[0].body, Bytes::from_static(br#"{"roles":["LOL"]}"#));
    }

    #[tokio::test]
    async fn test_post_xml_headers() {
        let (client, transport) = client("http://localhost/soap");
        client
            .post_xml("endpoint", "<Envelope/>", "urn:DoThing")
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].headers[CONTENT_TYPE], "text/xml;charset=utf-8");
        assert_eq!(seen[0].headers["soapaction"], "urn:DoThing");
    }

    #[tokio::test]
    async fn test_authorization_header() {
        let (client, transport) = client("http://localhost");
        let client = client.with_authorization("secret").unwrap();
        client.get("x", &[]).await.unwrap();

        let custom = client.with_auth_header("X-Api-Key", "key-1").unwrap();
        custom.get("x", &[]).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].headers[AUTHORIZATION], "secret");
        assert_eq!(seen[1].headers["x-api-key"], "key-1");
    }

    #[tokio::test]
    async fn test_with_cancellation_attaches_token_to_every_verb() {
        let (client, transport) = client("http://localhost");
        let token = CancellationToken::new();
        let bound = client.with_cancellation(token.clone());

        bound.get("a", &[]).await.unwrap();
        bound.post_with_query("a", &[("q", "1")], "{}").await.unwrap();
        bound.post_xml("a", "<Envelope/>", "urn:A").await.unwrap();
        client.get("a", &[]).await.unwrap();

        token.cancel();
        let seen = transport.seen.lock().unwrap();
        assert!(seen[..3].iter().all(|r| r.is_cancelled()));
        assert!(seen[3].cancellation.is_none());
    }

    #[tokio::test]
    async fn test_send_keeps_request_token() {
        let (client, transport) = client("http://localhost");
        let own = CancellationToken::new();
        let client = client.with_cancellation(CancellationToken::new());
        let request = OutboundRequest::get("http://localhost/x")
            .unwrap()
            .with_cancellation(own.clone());
        client.send(request).await.unwrap();

        own.cancel();
        assert!(transport.seen.lock().unwrap()[0].is_cancelled());
    }

    #[tokio::test]
    async fn test_send_without_url_fails_fast() {
        let (client, transport) = client("http://localhost");
        let err = client.send(OutboundRequest::default()).await.unwrap_err();
        assert!(matches!(err, ApiClientError::Transport(TransportError::MissingUrl)));
        assert!(transport.seen.lock().unwrap().is_empty());
    }
}

// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! HTTP/JSON gateway in front of the gRPC services.
//!
//! Each service registers its HTTP bindings on a [`ServeMuxBuilder`]. Handlers
//! translate the HTTP request into an RPC message, call the service through a
//! client channel dialing the local gRPC server, and render the response (or
//! the RPC status) as JSON. The finished [`ServeMux`] is a plain axum router so
//! it can be served by the HTTP listener or handed to the serverless adapter.

mod status;
mod unescape;

use std::collections::HashSet;
use std::future::Future;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, MatchedPath, Query, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::{Extension, Json, Router};
use http::request::Parts;
use http::{HeaderMap, HeaderName, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tonic::metadata::MetadataMap;
use tracing::debug;

use crate::error::InitError;

pub use status::{GatewayError, http_status};
pub use unescape::{UnescapeError, UnescapingMode, unescape};

const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

/// Collects the HTTP bindings of every service.
#[derive(Debug, Default)]
pub struct ServeMuxBuilder {
    mode: UnescapingMode,
    router: Router,
    bindings: HashSet<(Method, &'static str)>,
}

impl ServeMuxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unescaping_mode(mut self, mode: UnescapingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Binds `method path` to `handler` on behalf of `service`.
    ///
    /// `path` uses axum syntax (`/v1/things/{id}`). Binding the same method
    /// and path twice is an error.
    pub fn handle(
        &mut self,
        service: &'static str,
        method: Method,
        path: &'static str,
        handler: MethodRouter,
    ) -> Result<&mut Self, InitError> {
        if !path.starts_with('/') {
            return Err(InitError::Gateway {
                service,
                reason: format!("path {path:?} must start with '/'"),
            });
        }
        if !self.bindings.insert((method.clone(), path)) {
            return Err(InitError::Gateway {
                service,
                reason: format!("{method} {path} is already bound"),
            });
        }

        debug!(service, %method, path, "Registered gateway binding");
        let router = std::mem::take(&mut self.router);
        self.router = router.route(path, handler);
        Ok(self)
    }

    pub fn build(self) -> ServeMux {
        let router = self
            .router
            .fallback(|| async { GatewayError::not_found() })
            .method_not_allowed_fallback(|| async { GatewayError::method_not_allowed() })
            .layer(Extension(self.mode));
        ServeMux { router }
    }
}

/// The gateway translator: an HTTP handler that forwards to the RPC services.
#[derive(Debug, Clone)]
pub struct ServeMux {
    router: Router,
}

impl ServeMux {
    pub fn builder() -> ServeMuxBuilder {
        ServeMuxBuilder::new()
    }

    /// The axum router serving every registered binding.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Path parameters, unescaped according to the mux [`UnescapingMode`].
#[derive(Debug, Clone, Default)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl<S> FromRequestParts<S> for PathParams
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mode = parts
            .extensions
            .get::<UnescapingMode>()
            .copied()
            .unwrap_or_default();
        // The router percent-decodes its captures, so the values are read from
        // the raw request path instead, segment by segment against the route.
        let Some(template) = parts.extensions.get::<MatchedPath>() else {
            return Ok(PathParams::default());
        };
        let raw = raw_path_params(template.as_str(), parts.uri.path()).ok_or_else(|| {
            GatewayError::invalid_argument(format!(
                "path {:?} does not match route {:?}",
                parts.uri.path(),
                template.as_str()
            ))
        })?;

        raw.into_iter()
            .map(|(name, value)| {
                unescape(&value, mode)
                    .map(|value| (name, value))
                    .map_err(|e| GatewayError::invalid_argument(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(PathParams)
    }
}

/// Pairs each `{name}` (or trailing `{*name}`) segment of a route template
/// with the still-escaped segment of `path` at the same position.
fn raw_path_params(template: &str, path: &str) -> Option<Vec<(String, String)>> {
    let segments: Vec<&str> = path.split('/').collect();
    let mut params = Vec::new();

    for (index, pattern) in template.split('/').enumerate() {
        let Some(name) = pattern
            .strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
        else {
            if segments.get(index) != Some(&pattern) {
                return None;
            }
            continue;
        };
        if let Some(name) = name.strip_prefix('*') {
            let rest = segments.get(index..)?.join("/");
            params.push((name.to_string(), rest));
            return Some(params);
        }
        params.push((name.to_string(), (*segments.get(index)?).to_string()));
    }

    (template.split('/').count() == segments.len()).then_some(params)
}

/// An RPC message populated from the query string.
#[derive(Debug)]
pub struct QueryMessage<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryMessage<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Query::try_from_uri(&parts.uri)
            .map(|Query(message)| QueryMessage(message))
            .map_err(|e| GatewayError::invalid_argument(e.body_text()))
    }
}

/// An RPC message decoded from a JSON request body. An empty body decodes to
/// the default message.
#[derive(Debug)]
pub struct JsonMessage<T>(pub T);

impl<T, S> FromRequest<S> for JsonMessage<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| GatewayError::invalid_argument(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonMessage(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(JsonMessage)
            .map_err(|e| GatewayError::invalid_argument(e.to_string()))
    }
}

/// Request headers forwarded to the RPC as metadata.
///
/// `Grpc-Metadata-<key>` becomes `<key>` and `Authorization` is passed
/// through. Everything else stays at the HTTP layer.
#[derive(Debug, Default)]
pub struct ForwardedMetadata(pub MetadataMap);

impl<S> FromRequestParts<S> for ForwardedMetadata
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ForwardedMetadata(incoming_metadata(&parts.headers)))
    }
}

fn incoming_metadata(headers: &HeaderMap) -> MetadataMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if name == http::header::AUTHORIZATION {
            forwarded.append(name.clone(), value.clone());
            continue;
        }
        let Some(key) = name.as_str().strip_prefix(METADATA_HEADER_PREFIX) else {
            continue;
        };
        if let Ok(key) = HeaderName::from_bytes(key.as_bytes()) {
            forwarded.append(key, value.clone());
        }
    }
    MetadataMap::from_headers(forwarded)
}

fn outgoing_metadata(metadata: MetadataMap, headers: &mut HeaderMap) {
    for (name, value) in metadata.into_headers() {
        // Continuation entries of a multi-valued header carry no name.
        let Some(name) = name else { continue };
        let prefixed = format!("{METADATA_HEADER_PREFIX}{name}");
        if let Ok(name) = HeaderName::from_bytes(prefixed.as_bytes()) {
            headers.append(name, value);
        }
    }
}

/// Calls a unary RPC on behalf of an HTTP request and renders the outcome.
///
/// A successful response is returned as JSON with its response metadata in
/// `Grpc-Metadata-*` headers; a failed call becomes a [`GatewayError`].
pub async fn forward_unary<Req, Res, F, Fut>(
    metadata: ForwardedMetadata,
    message: Req,
    call: F,
) -> Response
where
    F: FnOnce(tonic::Request<Req>) -> Fut,
    Fut: Future<Output = Result<tonic::Response<Res>, tonic::Status>>,
    Res: Serialize,
{
    let mut request = tonic::Request::new(message);
    *request.metadata_mut() = metadata.0;

    match call(request).await {
        Ok(response) => {
            let (metadata, message, _) = response.into_parts();
            let mut response = Json(message).into_response();
            outgoing_metadata(metadata, response.headers_mut());
            response
        }
        Err(status) => GatewayError::from(status).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::routing::get;
    use http::HeaderValue;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn echo_mux(mode: UnescapingMode) -> ServeMux {
        let mut builder = ServeMux::builder().unescaping_mode(mode);
        builder
            .handle(
                "test.Echo",
                Method::GET,
                "/v1/echo/{value}",
                get(|params: PathParams| async move {
                    params.get("value").unwrap_or_default().to_string()
                }),
            )
            .unwrap();
        builder.build()
    }

    async fn get_text(mux: &ServeMux, uri: &str) -> (http::StatusCode, String) {
        let response = mux
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_path_param_escaped_slash_preserved() {
        let mux = echo_mux(UnescapingMode::AllExceptReserved);
        assert_eq!(
            get_text(&mux, "/v1/echo/a%2Fb").await,
            (http::StatusCode::OK, "a%2Fb".to_string())
        );
        assert_eq!(
            get_text(&mux, "/v1/echo/hello%20world").await,
            (http::StatusCode::OK, "hello world".to_string())
        );
    }

    #[tokio::test]
    async fn test_path_param_reserved_characters_kept() {
        let mux = echo_mux(UnescapingMode::AllExceptReserved);
        assert_eq!(
            get_text(&mux, "/v1/echo/users%2F42%3Aprofile").await,
            (http::StatusCode::OK, "users%2F42%3Aprofile".to_string())
        );
        let mux = echo_mux(UnescapingMode::AllExceptSlash);
        assert_eq!(
            get_text(&mux, "/v1/echo/users%2F42%3Aprofile").await,
            (http::StatusCode::OK, "users%2F42:profile".to_string())
        );
    }

    #[test]
    fn test_raw_path_params_alignment() {
        assert_eq!(
            raw_path_params("/v1/ping/{target}", "/v1/ping/a%2Fb"),
            Some(vec![("target".to_string(), "a%2Fb".to_string())])
        );
        assert_eq!(
            raw_path_params("/v1/{kind}/x/{id}", "/v1/users/x/a%20b"),
            Some(vec![
                ("kind".to_string(), "users".to_string()),
                ("id".to_string(), "a%20b".to_string()),
            ])
        );
        assert_eq!(
            raw_path_params("/files/{*rest}", "/files/a/b%2Fc"),
            Some(vec![("rest".to_string(), "a/b%2Fc".to_string())])
        );
        assert_eq!(raw_path_params("/v1/ping/{target}", "/v1/ping/a/b"), None);
        assert_eq!(raw_path_params("/v1/ping", "/v2/ping"), None);
    }

    #[tokio::test]
    async fn test_path_param_all_characters() {
        let mux = echo_mux(UnescapingMode::AllCharacters);
        assert_eq!(
            get_text(&mux, "/v1/echo/a%2Fb").await,
            (http::StatusCode::OK, "a/b".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_escape_is_bad_request() {
        let mux = echo_mux(UnescapingMode::AllExceptReserved);
        let (status, body) = get_text(&mux, "/v1/echo/a%zz").await;
        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["code"], 3);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let mux = echo_mux(UnescapingMode::AllExceptReserved);
        let (status, body) = get_text(&mux, "/v1/nope").await;
        assert_eq!(status, http::StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, serde_json::json!({"code": 5, "message": "Not Found", "details": []}));
    }

    #[tokio::test]
    async fn test_wrong_method_is_not_allowed() {
        let mux = echo_mux(UnescapingMode::AllExceptReserved);
        let response = mux
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/v1/echo/x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut builder = ServeMux::builder();
        builder
            .handle("test.Echo", Method::GET, "/v1/echo", get(|| async { "a" }))
            .unwrap();
        let err = builder
            .handle("test.Echo", Method::GET, "/v1/echo", get(|| async { "b" }))
            .unwrap_err();
        assert!(matches!(err, InitError::Gateway { service: "test.Echo", .. }));
    }

    #[test]
    fn test_incoming_metadata_forwarding() {
        let mut headers = HeaderMap::new();
        headers.insert("grpc-metadata-request-id", HeaderValue::from_static("abc"));
        headers.insert(http::header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        headers.insert("x-other", HeaderValue::from_static("dropped"));

        let metadata = incoming_metadata(&headers);
        assert_eq!(metadata.get("request-id").unwrap(), "abc");
        assert_eq!(metadata.get("authorization").unwrap(), "Bearer t");
        assert!(metadata.get("x-other").is_none());
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn test_outgoing_metadata_prefixed() {
        let mut metadata = MetadataMap::new();
        metadata.insert("trace-id", "t-1".parse().unwrap());
        let mut headers = HeaderMap::new();
        outgoing_metadata(metadata, &mut headers);
        assert_eq!(headers.get("grpc-metadata-trace-id").unwrap(), "t-1");
    }
}

//! Forwarding director: rewrites an authenticated request for the upstream
//! and relays the exchange.
//!
//! # Transform Order
//! 1. Scheme and host become the upstream's
//! 2. Path becomes the suffix after the mount prefix (query kept)
//! 3. `Authorization` and credential headers are removed
//! 4. `X-Forwarded-Host` is set from the inbound `Host` if absent
//! 5. `X-Forwarded-Proto` is set if absent
//! 6. The client IP is appended to `X-Forwarded-For`
//!
//! Bodies are streamed in both directions; nothing is buffered.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header,
        request::Parts,
        uri::{Authority, Scheme},
        HeaderName, HeaderValue, Request, Uri, Version,
    },
    response::Response,
};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};

use crate::config::validation::validate_upstream;
use crate::config::{ProxyConfig, ValidationError};
use crate::error::ProxyError;
use crate::security::admission::AdmissionSlot;
use crate::security::headers::{
    append_forwarded_for, client_ip, set_forwarded_host, set_forwarded_proto,
    strip_credentials, strip_hop_by_hop,
};

/// Rewrites requests for, and forwards them to, the single upstream.
#[derive(Debug, Clone)]
pub struct Director {
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
    /// Upstream base path without a trailing slash; empty for the root.
    base_path: String,
    mount_prefix: String,
    credential_header: HeaderName,
    client: Client<HttpsConnector<HttpConnector>, Body>,
    response_timeout: Duration,
}

impl Director {
    pub fn from_config(
        config: &ProxyConfig,
        credential_header: HeaderName,
    ) -> Result<Self, ValidationError> {
        validate_upstream(&config.upstream)?;

        let invalid = |reason: String| ValidationError::InvalidUpstream {
            url: config.upstream.clone(),
            reason,
        };
        let upstream: Uri = config
            .upstream
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;
        let authority = upstream
            .authority()
            .cloned()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let host_header =
            HeaderValue::from_str(authority.as_str()).map_err(|e| invalid(e.to_string()))?;

        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(config.upstream_client.connect_timeout()));
        http.set_nodelay(true);
        http.enforce_http(false);

        let connector = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| invalid(format!("TLS setup failed: {e}")))?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(
                config.upstream_client.pool_idle_timeout_secs,
            ))
            .build(connector);

        Ok(Self {
            scheme: upstream.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority,
            host_header,
            base_path: upstream.path().trim_end_matches('/').to_string(),
            mount_prefix: config.mount_prefix().to_string(),
            credential_header,
            client,
            response_timeout: config.upstream_client.response_timeout(),
        })
    }

    /// The upstream as `scheme://authority`.
    pub fn upstream(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Derive the outbound request. The inbound head is consumed, never edited
    /// in place on behalf of the caller.
    pub fn direct(
        &self,
        head: Parts,
        body: Body,
        remote: SocketAddr,
    ) -> Result<Request<Body>, ProxyError> {
        let inbound_host = head.headers.get(header::HOST).cloned().or_else(|| {
            head.uri
                .authority()
                .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
        });
        let proto = match head.uri.scheme_str() {
            Some("https") => "https",
            _ => "http",
        };

        let uri = self.upstream_uri(&head.uri)?;

        let mut headers = head.headers;
        strip_hop_by_hop(&mut headers);
        strip_credentials(&mut headers, &self.credential_header);
        headers.insert(header::HOST, self.host_header.clone());
        set_forwarded_host(&mut headers, inbound_host);
        set_forwarded_proto(&mut headers, proto);
        append_forwarded_for(&mut headers, client_ip(remote));

        let mut outbound = Request::new(body);
        *outbound.method_mut() = head.method;
        *outbound.uri_mut() = uri;
        *outbound.version_mut() = Version::HTTP_11;
        *outbound.headers_mut() = headers;
        Ok(outbound)
    }

    /// Upstream URI for an inbound URI: upstream scheme and authority, base path
    /// joined with the path suffix below the mount, inbound query string.
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, axum::http::Error> {
        let suffix = mount_suffix(inbound.path(), &self.mount_prefix);

        let mut target = String::with_capacity(self.base_path.len() + suffix.len() + 16);
        target.push_str(&self.base_path);
        target.push_str(suffix);
        if let Some(query) = inbound.query() {
            target.push('?');
            target.push_str(query);
        }

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(target)
            .build()
    }

    /// Send the request upstream and stream the response back verbatim.
    ///
    /// The admission slot moves into the response body and is released when the
    /// body finishes streaming or is dropped.
    pub async fn forward(
        &self,
        request: Request<Body>,
        slot: AdmissionSlot,
    ) -> Result<Response, ProxyError> {
        let response: hyper::Response<Incoming> =
            tokio::time::timeout(self.response_timeout, self.client.request(request))
                .await
                .map_err(|_| ProxyError::UpstreamTimeout(self.response_timeout))??;

        let (parts, body) = response.into_parts();
        let body = body.map_frame(move |frame| {
            let _slot = &slot;
            frame
        });
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Path below `mount`, always starting with `/`.
pub fn mount_suffix<'a>(path: &'a str, mount: &str) -> &'a str {
    let suffix = if mount == "/" {
        path
    } else {
        match path.strip_prefix(mount) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        }
    };

    if suffix.is_empty() {
        "/"
    } else {
        suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::credentials::X_API_KEY;
    use crate::security::headers::{X_FORWARDED_FOR, X_FORWARDED_HOST, X_FORWARDED_PROTO};

    fn director(upstream: &str, mount: &str) -> Director {
        let mut config = ProxyConfig::default();
        config.upstream = upstream.to_string();
        config.mount_path = mount.to_string();
        Director::from_config(&config, X_API_KEY.clone()).unwrap()
    }

    fn inbound(uri: &str) -> (Parts, Body) {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::HOST, "gateway.example:8080")
            .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .header("x-api-key", "correct-horse-battery-staple")
            .header("x-forwarded-for", "10.0.0.1")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap()
            .into_parts()
    }

    #[test]
    fn suffix_after_mount() {
        assert_eq!(mount_suffix("/api/v1/items", "/api"), "/v1/items");
        assert_eq!(mount_suffix("/api", "/api"), "/");
        assert_eq!(mount_suffix("/api/", "/api"), "/");
        assert_eq!(mount_suffix("/v1/items", "/"), "/v1/items");
        assert_eq!(mount_suffix("/apix", "/api"), "/apix");
    }

    #[test]
    fn rewrites_request_for_upstream() {
        let director = director("http://127.0.0.1:3000", "/api");
        let (head, body) = inbound("/api/v1/items?page=2");
        let remote: SocketAddr = "203.0.113.5:4444".parse().unwrap();

        let outbound = director.direct(head, body, remote).unwrap();

        assert_eq!(outbound.method(), "POST");
        assert_eq!(outbound.uri(), "http://127.0.0.1:3000/v1/items?page=2");
        let headers = outbound.headers();
        assert_eq!(headers[header::HOST], "127.0.0.1:3000");
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert!(headers.get("x-api-key").is_none());
        assert_eq!(headers[&X_FORWARDED_HOST], "gateway.example:8080");
        assert_eq!(headers[&X_FORWARDED_PROTO], "http");
        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.1, 203.0.113.5");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn joins_upstream_base_path() {
        let director = director("http://backend.internal:9000/service/", "/");
        let uri: Uri = "/health?verbose".parse().unwrap();
        assert_eq!(
            director.upstream_uri(&uri).unwrap(),
            "http://backend.internal:9000/service/health?verbose"
        );
        assert_eq!(director.upstream(), "http://backend.internal:9000");
    }

    #[test]
    fn custom_credential_header_is_stripped() {
        let mut config = ProxyConfig::default();
        config.upstream = "http://127.0.0.1:3000".to_string();
        let custom = HeaderName::from_static("x-gateway-key");
        let director = Director::from_config(&config, custom).unwrap();

        let (head, body) = Request::builder()
            .uri("/")
            .header("x-gateway-key", "correct-horse-battery-staple")
            .body(Body::empty())
            .unwrap()
            .into_parts();
        let outbound = director
            .direct(head, body, "127.0.0.1:5000".parse().unwrap())
            .unwrap();

        assert!(outbound.headers().get("x-gateway-key").is_none());
        assert_eq!(outbound.headers()[&X_FORWARDED_FOR], "127.0.0.1");
    }

    #[test]
    fn https_upstream_keeps_its_scheme() {
        let director = director("https://api.example.com/v2", "/");
        let uri: Uri = "/items?id=3".parse().unwrap();
        assert_eq!(
            director.upstream_uri(&uri).unwrap(),
            "https://api.example.com/v2/items?id=3"
        );
        assert_eq!(director.upstream(), "https://api.example.com");

        let (head, body) = inbound("/items");
        let outbound = director
            .direct(head, body, "127.0.0.1:5000".parse().unwrap())
            .unwrap();
        assert_eq!(outbound.headers()[header::HOST], "api.example.com");
    }

    #[test]
    fn rejects_invalid_upstream() {
        let mut config = ProxyConfig::default();
        config.upstream = String::new();
        let err = Director::from_config(&config, X_API_KEY.clone()).unwrap_err();
        assert_eq!(err, ValidationError::NoUpstream);
    }
}

//! The fixed request pipeline: admission → authentication → forwarding.
//!
//! Each gate implements [`Stage`]; [`Pipeline::handle`] drives them in order and
//! stops at the first rejection. The stage order lives in exactly one place.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header, request::Parts, HeaderName, HeaderValue, Request},
    response::{IntoResponse, Response},
};

use crate::config::{ProxyConfig, ValidationError};
use crate::error::ProxyError;
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::proxy::director::Director;
use crate::security::admission::{AdmissionController, AdmissionSlot};
use crate::security::credentials::CredentialVerifier;

/// A gate every request passes before it is forwarded.
pub trait Stage: Send + Sync {
    /// What the stage hands on when the request may proceed.
    type Output: Send;

    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Admit the request or reject it with the error that becomes the response.
    fn process(
        &self,
        head: &Parts,
    ) -> impl Future<Output = Result<Self::Output, ProxyError>> + Send;
}

impl Stage for AdmissionController {
    type Output = AdmissionSlot;

    fn name(&self) -> &'static str {
        "admission"
    }

    async fn process(&self, _head: &Parts) -> Result<AdmissionSlot, ProxyError> {
        self.acquire().await
    }
}

impl Stage for CredentialVerifier {
    type Output = ();

    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn process(&self, head: &Parts) -> Result<(), ProxyError> {
        if self.verify(&head.headers) {
            Ok(())
        } else {
            Err(ProxyError::Unauthenticated)
        }
    }
}

/// Admission controller, credential verifier and director, in that order.
#[derive(Debug, Clone)]
pub struct Pipeline {
    admission: AdmissionController,
    verifier: CredentialVerifier,
    director: Director,
    unauthorized_body: bool,
}

impl Pipeline {
    pub fn new(
        admission: AdmissionController,
        verifier: CredentialVerifier,
        director: Director,
    ) -> Self {
        Self {
            admission,
            verifier,
            director,
            unauthorized_body: false,
        }
    }

    /// Build every stage from a validated configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ValidationError> {
        let header_name = &config.authentication.header_name;
        let credential_header = HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|_| ValidationError::InvalidHeaderName(header_name.clone()))?;

        let admission = AdmissionController::from_config(&config.admission)?;
        let verifier =
            CredentialVerifier::from_config(&config.authentication, credential_header.clone());
        let director = Director::from_config(config, credential_header)?;

        Ok(Self::new(admission, verifier, director)
            .with_unauthorized_body(config.authentication.unauthorized_body))
    }

    /// Send a short plain-text body with 401 responses.
    pub fn with_unauthorized_body(mut self, enabled: bool) -> Self {
        self.unauthorized_body = enabled;
        self
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn director(&self) -> &Director {
        &self.director
    }

    /// Run one request through every stage and produce the caller's response.
    pub async fn handle(&self, request: Request<Body>, remote: SocketAddr) -> Response {
        let start = Instant::now();
        let (head, body) = request.into_parts();
        let method = head.method.to_string();
        let request_id = request_id(&head.headers).to_string();

        match self.run(head, body, remote).await {
            Ok(response) => {
                tracing::debug!(
                    request_id = %request_id,
                    status = %response.status(),
                    "Upstream responded"
                );
                metrics::record_request(&method, "forwarded", response.status().as_u16(), start);
                response
            }
            Err(err) => {
                match &err {
                    ProxyError::CapacityExceeded { waited } => tracing::warn!(
                        request_id = %request_id,
                        client = %remote,
                        waited = ?waited,
                        in_flight = self.admission.in_flight(),
                        "Admission queue timed out"
                    ),
                    ProxyError::Unauthenticated => tracing::info!(
                        request_id = %request_id,
                        client = %remote,
                        "Rejected unauthenticated request"
                    ),
                    upstream => tracing::error!(
                        request_id = %request_id,
                        upstream = %self.director.upstream(),
                        error = %upstream,
                        "Upstream error"
                    ),
                }
                metrics::record_rejection(err.kind());
                metrics::record_request(&method, err.kind(), err.status().as_u16(), start);
                self.reject(err)
            }
        }
    }

    async fn run(
        &self,
        head: Parts,
        body: Body,
        remote: SocketAddr,
    ) -> Result<Response, ProxyError> {
        let slot = self.admission.process(&head).await?;
        tracing::trace!(stage = self.admission.name(), "Stage passed");

        self.verifier.process(&head).await?;
        tracing::trace!(stage = self.verifier.name(), "Stage passed");

        let outbound = self.director.direct(head, body, remote)?;
        self.director.forward(outbound, slot).await
    }

    fn reject(&self, err: ProxyError) -> Response {
        let unauthenticated = matches!(err, ProxyError::Unauthenticated);
        let mut response = err.into_response();
        if unauthenticated && self.unauthorized_body {
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            *response.body_mut() = Body::from("Unauthorized");
        }
        response
    }
}

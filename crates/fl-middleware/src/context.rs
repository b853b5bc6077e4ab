// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-request correlation context for the wire boundary.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use fl_error::ErrorContext;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Correlation data captured when a request arrives, available as an Axum
/// extension for the rest of the request's lifetime.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Opaque correlation id, echoed back as `X-Request-Id`.
    pub request_id: Uuid,
    /// HTTP method.
    pub method: String,
    /// Full request URI.
    pub url: String,
    /// Client user-agent, if sent.
    pub user_agent: Option<String>,
    /// Client IP as reported by `x-forwarded-for`, if present.
    pub ip: Option<String>,
    /// All request headers, stringified.
    pub headers: BTreeMap<String, String>,
    /// When the request arrived.
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    fn from_request(req: &Request) -> Self {
        let headers: BTreeMap<String, String> = req
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        Self {
            request_id: Uuid::new_v4(),
            method: req.method().to_string(),
            url: req.uri().to_string(),
            user_agent: headers.get("user-agent").cloned(),
            ip: headers
                .get("x-forwarded-for")
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_owned()),
            headers,
            received_at: Utc::now(),
        }
    }

    /// Convert into the error-model context attached to failures raised
    /// while serving this request.
    pub fn to_error_context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new()
            .with_request_id(self.request_id.to_string())
            .with_method(self.method.clone())
            .with_url(self.url.clone());
        for (name, value) in &self.headers {
            ctx = ctx.with_header(name.clone(), value.clone());
        }
        if let Some(ua) = &self.user_agent {
            ctx = ctx.with_user_agent(ua.clone());
        }
        if let Some(ip) = &self.ip {
            ctx = ctx.with_ip(ip.clone());
        }
        ctx
    }
}

/// Axum middleware that captures a [`RequestContext`] for each request and
/// echoes its id back in the `X-Request-Id` response header.
pub async fn request_context_middleware(mut req: Request, next: Next) -> Response {
    let ctx = RequestContext::from_request(&req);
    let id = ctx.request_id;
    req.extensions_mut().insert(ctx);

    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        resp.headers_mut().insert("x-request-id", value);
    }
    resp
}

/// Axum middleware that logs method, path, status code, and duration for
/// each request using structured fields.
pub async fn request_logger(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let start = Instant::now();

    let resp = next.run(req).await;

    info!(
        http.method = %method,
        http.path = %path,
        http.status = resp.status().as_u16(),
        http.duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    resp
}

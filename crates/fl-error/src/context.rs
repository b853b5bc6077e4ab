// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request-scoped diagnostic context attached to errors at the first
//! handling boundary that has it available.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Diagnostic context captured around a failure.
///
/// Merging is field-wise last-write-wins: a field set on the incoming
/// context replaces the prior value, an unset field keeps it. The timestamp
/// is always refreshed on merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    /// Account identifier of the caller, if authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Session identifier, if a session exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Correlation id assigned at the wire boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Client user-agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Client IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Request URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request headers (redacted upstream where necessary).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Request body snapshot, if captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Route/query parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// When this context was (last) captured.
    pub timestamp: DateTime<Utc>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorContext {
    /// An empty context stamped with the current time.
    pub fn new() -> Self {
        Self {
            user_id: None,
            session_id: None,
            request_id: None,
            user_agent: None,
            ip: None,
            url: None,
            method: None,
            headers: BTreeMap::new(),
            body: None,
            params: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the request URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the client IP.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Set the client user-agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a route/query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Attach a body snapshot.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Merge `incoming` over `self`: set fields win, unset fields keep the
    /// prior value, and the timestamp is refreshed to now.
    pub fn merged_with(mut self, incoming: ErrorContext) -> ErrorContext {
        self.user_id = incoming.user_id.or(self.user_id);
        self.session_id = incoming.session_id.or(self.session_id);
        self.request_id = incoming.request_id.or(self.request_id);
        self.user_agent = incoming.user_agent.or(self.user_agent);
        self.ip = incoming.ip.or(self.ip);
        self.url = incoming.url.or(self.url);
        self.method = incoming.method.or(self.method);
        if !incoming.headers.is_empty() {
            self.headers = incoming.headers;
        }
        self.body = incoming.body.or(self.body);
        if !incoming.params.is_empty() {
            self.params = incoming.params;
        }
        self.timestamp = Utc::now();
        self
    }
}

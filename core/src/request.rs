//! Declarative request descriptors.
//!
//! # Design
//! A `RequestDescriptor` is an immutable value: fields are private and only
//! readable through accessors. Specialised requests either start from
//! `RequestDescriptor::new` and apply `with_*` overrides, or implement
//! `Endpoint`, whose default methods carry the same defaults and which a
//! request type overrides piecemeal.

use std::time::Duration;

use crate::http::HttpMethod;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);
pub const DEFAULT_MULTIPART_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers every request carries unless replaced.
pub fn default_headers() -> Vec<(String, String)> {
    vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("accept".to_string(), "application/json".to_string()),
    ]
}

/// Immutable description of one HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    host: String,
    route: String,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    timeout: Duration,
    multipart_timeout: Duration,
    is_multipart: bool,
    alert_on_error: bool,
}

impl RequestDescriptor {
    pub fn new(host: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            route: route.into(),
            method: HttpMethod::Post,
            headers: default_headers(),
            timeout: DEFAULT_TIMEOUT,
            multipart_timeout: DEFAULT_MULTIPART_TIMEOUT,
            is_multipart: false,
            alert_on_error: true,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set a header, replacing an existing one with the same name
    /// (compared case-insensitively) in place.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(index) => self.headers[index] = (name, value),
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Replace the whole header list.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_multipart_timeout(mut self, timeout: Duration) -> Self {
        self.multipart_timeout = timeout;
        self
    }

    pub fn with_multipart(mut self, is_multipart: bool) -> Self {
        self.is_multipart = is_multipart;
        self
    }

    pub fn with_alert_on_error(mut self, alert_on_error: bool) -> Self {
        self.alert_on_error = alert_on_error;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn multipart_timeout(&self) -> Duration {
        self.multipart_timeout
    }

    pub fn is_multipart(&self) -> bool {
        self.is_multipart
    }

    pub fn alert_on_error(&self) -> bool {
        self.alert_on_error
    }

    /// `host + route`, concatenated verbatim.
    pub fn url(&self) -> String {
        format!("{}{}", self.host, self.route)
    }

    /// Timeout the transport should apply to this request.
    pub fn effective_timeout(&self) -> Duration {
        if self.is_multipart {
            self.multipart_timeout
        } else {
            self.timeout
        }
    }
}

/// A request type that describes itself.
///
/// Only `host` and `route` are required; every other method returns the
/// shared default and may be overridden.
pub trait Endpoint {
    fn host(&self) -> String;

    fn route(&self) -> String;

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn headers(&self) -> Vec<(String, String)> {
        default_headers()
    }

    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    fn multipart_timeout(&self) -> Duration {
        DEFAULT_MULTIPART_TIMEOUT
    }

    fn is_multipart(&self) -> bool {
        false
    }

    fn alert_on_error(&self) -> bool {
        true
    }

    fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor::new(self.host(), self.route())
            .with_method(self.method())
            .with_headers(self.headers())
            .with_timeout(self.timeout())
            .with_multipart_timeout(self.multipart_timeout())
            .with_multipart(self.is_multipart())
            .with_alert_on_error(self.alert_on_error())
    }
}

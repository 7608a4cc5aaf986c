use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use decl_e2e_core::{AssertionError, Matcher, Response, Verb};

use crate::assert::{check, check_header};

/// Failure of a request/assert exchange.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// An expectation did not hold. The response is kept for diagnostics.
    #[error("{error}")]
    Assertion {
        error: AssertionError,
        response: Box<Response>,
    },
}

/// HTTP client bound to the application under test.
///
/// Relative request URLs are resolved against `target`; absolute URLs are
/// used as-is. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct App {
    client: reqwest::Client,
    target: String,
}

impl App {
    /// Create a client for `target` with the given request timeout.
    pub fn new(target: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, target))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, target: &str) -> Self {
        Self {
            client,
            target: target.trim_end_matches('/').to_string(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn url(&self, path: &str) -> String {
        if decl_e2e_core::config::is_absolute_url(path) {
            path.to_string()
        } else if path.starts_with('/') || path.is_empty() {
            format!("{}{}", self.target, path)
        } else {
            format!("{}/{}", self.target, path)
        }
    }

    /// Start a request with the given verb.
    pub fn request(&self, verb: Verb, path: &str) -> ChainableRequest {
        let url = self.url(path);
        debug!(%verb, %url, "building request");
        ChainableRequest {
            builder: self.client.request(to_method(verb), &url),
            invalid_header: None,
            expectations: Vec::new(),
        }
    }

    pub fn get(&self, path: &str) -> ChainableRequest {
        self.request(Verb::Get, path)
    }

    pub fn post(&self, path: &str) -> ChainableRequest {
        self.request(Verb::Post, path)
    }
}

#[derive(Debug)]
enum Expectation {
    Response(Matcher),
    Header(String, Matcher),
}

/// A request under construction plus the expectations registered on it.
///
/// Nothing is sent until [`ChainableRequest::end`] is awaited.
#[derive(Debug)]
pub struct ChainableRequest {
    builder: reqwest::RequestBuilder,
    invalid_header: Option<(String, String)>,
    expectations: Vec<Expectation>,
}

impl ChainableRequest {
    /// Set a request header.
    pub fn set(mut self, name: &str, value: &str) -> Self {
        match (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => self.builder = self.builder.header(name, value),
            (Err(e), _) => {
                self.invalid_header.get_or_insert((name.to_string(), e.to_string()));
            }
            (_, Err(e)) => {
                self.invalid_header.get_or_insert((name.to_string(), e.to_string()));
            }
        }
        self
    }

    /// Send `body` as JSON, or as plain text when it is a JSON string.
    pub fn send<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(serde_json::Value::String(text)) => self.builder = self.builder.body(text),
            _ => self.builder = self.builder.json(body),
        }
        self
    }

    /// Expect the response to satisfy `matcher` (status, body text, body
    /// pattern, JSON body or custom check).
    pub fn expect(mut self, matcher: Matcher) -> Self {
        self.expectations.push(Expectation::Response(matcher));
        self
    }

    /// Expect the header `name` to satisfy `matcher`.
    pub fn expect_header(mut self, name: &str, matcher: Matcher) -> Self {
        self.expectations
            .push(Expectation::Header(name.to_string(), matcher));
        self
    }

    /// Send the request and check every expectation in registration order.
    ///
    /// The first failing expectation is reported together with the response.
    pub async fn end(self) -> Result<Response, ExchangeError> {
        if let Some((name, reason)) = self.invalid_header {
            return Err(ExchangeError::InvalidHeader { name, reason });
        }

        let resp = self.builder.send().await?;
        let status = resp.status().as_u16();
        // Repeated headers (set-cookie, vary) are joined with ", ".
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in resp.headers() {
            let value = value.to_str().unwrap_or("<binary>");
            headers
                .entry(name.as_str().to_string())
                .and_modify(|joined| {
                    joined.push_str(", ");
                    joined.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        let text = resp.text().await?;
        let response = Response::new(status, headers, text);
        debug!(status, expectations = self.expectations.len(), "response received");

        let failed = self.expectations.iter().find_map(|expectation| {
            let result = match expectation {
                Expectation::Response(matcher) => check(matcher, &response),
                Expectation::Header(name, matcher) => check_header(name, matcher, &response),
            };
            result.err()
        });

        match failed {
            Some(error) => Err(ExchangeError::Assertion {
                error,
                response: Box::new(response),
            }),
            None => Ok(response),
        }
    }
}

pub fn to_method(verb: Verb) -> reqwest::Method {
    match verb {
        Verb::Get => reqwest::Method::GET,
        Verb::Post => reqwest::Method::POST,
        Verb::Put => reqwest::Method::PUT,
        Verb::Patch => reqwest::Method::PATCH,
        Verb::Delete => reqwest::Method::DELETE,
        Verb::Head => reqwest::Method::HEAD,
        Verb::Options => reqwest::Method::OPTIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_target_and_path() {
        let app = App::with_client(reqwest::Client::new(), "http://localhost:3000/");
        assert_eq!(app.target(), "http://localhost:3000");
        assert_eq!(app.url("/health"), "http://localhost:3000/health");
        assert_eq!(app.url("health"), "http://localhost:3000/health");
        assert_eq!(app.url("https://elsewhere.test/x"), "https://elsewhere.test/x");
    }

    #[test]
    fn every_verb_maps_to_a_method() {
        for verb in Verb::ALL {
            assert_eq!(to_method(verb).as_str(), verb.to_string());
        }
    }
}

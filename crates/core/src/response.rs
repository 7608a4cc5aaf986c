use std::collections::BTreeMap;

use serde::Serialize;

/// A response captured by the HTTP client.
///
/// Header names are stored lowercased. `body` holds the parsed JSON document
/// when the response declares a JSON content type and parses cleanly,
/// otherwise `null`; the raw text is always kept in `text`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub text: String,
    pub body: serde_json::Value,
}

impl Response {
    pub fn new(status: u16, headers: BTreeMap<String, String>, text: String) -> Self {
        let headers: BTreeMap<String, String> = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        let is_json = headers
            .get("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        let body = if is_json {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::Null)
        } else {
            serde_json::Value::Null
        };

        Self {
            status,
            headers,
            text,
            body,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Result of processing one definition: a single response, or one response
/// per fanned-out `auth` entry in input order.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Single(Response),
    Many(Vec<Response>),
}

impl Outcome {
    /// The single response, or the first one of a fan-out.
    pub fn first(&self) -> Option<&Response> {
        match self {
            Outcome::Single(response) => Some(response),
            Outcome::Many(responses) => responses.first(),
        }
    }

    pub fn responses(&self) -> Vec<&Response> {
        match self {
            Outcome::Single(response) => vec![response],
            Outcome::Many(responses) => responses.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Outcome::Single(_) => 1,
            Outcome::Many(responses) => responses.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

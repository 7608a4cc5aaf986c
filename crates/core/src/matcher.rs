use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Response;

/// Key of the single-entry object that spells a regex matcher in suite files.
pub const REGEX_KEY: &str = "$regex";

type CustomCheck = dyn Fn(&Response) -> Result<(), String> + Send + Sync;

/// An expectation handed to the assertion layer.
///
/// In suite files a number is a status matcher, a string is an exact body
/// text matcher, `{"$regex": "..."}` is a body pattern and any other JSON value
/// is compared against the parsed body.
#[derive(Clone)]
pub enum Matcher {
    Status(u16),
    Text(String),
    Pattern(Regex),
    Json(serde_json::Value),
    Custom(Arc<CustomCheck>),
}

impl Matcher {
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&Response) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(check))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        if let Some(status) = value.as_u64().and_then(|n| u16::try_from(n).ok()) {
            return Ok(Self::Status(status));
        }

        match value {
            serde_json::Value::String(text) => Ok(Self::Text(text)),
            serde_json::Value::Object(ref map) if map.len() == 1 && map.contains_key(REGEX_KEY) => {
                let pattern = map[REGEX_KEY]
                    .as_str()
                    .ok_or_else(|| format!("{REGEX_KEY} must be a string"))?;
                Self::regex(pattern).map_err(|e| format!("invalid {REGEX_KEY} pattern: {e}"))
            }
            other => Ok(Self::Json(other)),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Status(status) => serde_json::Value::from(*status),
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::Pattern(re) => serde_json::json!({ REGEX_KEY: re.as_str() }),
            Self::Json(value) => value.clone(),
            Self::Custom(_) => serde_json::Value::String("<custom>".to_string()),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => f.debug_tuple("Status").field(status).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
            Self::Custom(_) => f.write_str("<custom>"),
            other => write!(f, "{}", other.to_value()),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Status(a), Self::Status(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<u16> for Matcher {
    fn from(status: u16) -> Self {
        Self::Status(status)
    }
}

impl From<&str> for Matcher {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Matcher {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<'de> Deserialize<'de> for Matcher {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

impl Serialize for Matcher {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_is_status() {
        assert_eq!(Matcher::from_value(json!(200)), Ok(Matcher::Status(200)));
    }

    #[test]
    fn out_of_range_number_is_json() {
        assert_eq!(
            Matcher::from_value(json!(70000)),
            Ok(Matcher::Json(json!(70000)))
        );
        assert_eq!(Matcher::from_value(json!(-1)), Ok(Matcher::Json(json!(-1))));
    }

    #[test]
    fn string_is_text_and_regex_object_is_pattern() {
        assert_eq!(
            Matcher::from_value(json!("ok")),
            Ok(Matcher::Text("ok".into()))
        );
        let matcher = Matcher::from_value(json!({"$regex": "^ok"})).expect("regex");
        assert!(matches!(&matcher, Matcher::Pattern(re) if re.as_str() == "^ok"));
        assert_eq!(matcher.to_value(), json!({"$regex": "^ok"}));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(Matcher::from_value(json!({"$regex": "("})).is_err());
        assert!(Matcher::from_value(json!({"$regex": 3})).is_err());
    }

    #[test]
    fn other_values_are_json() {
        let matcher: Matcher = serde_json::from_value(json!({"id": 1})).expect("parse");
        assert_eq!(matcher, Matcher::Json(json!({"id": 1})));
        let matcher: Matcher = serde_json::from_value(json!([1, 2])).expect("parse");
        assert_eq!(matcher, Matcher::Json(json!([1, 2])));
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Matcher::Status(404).to_string(), "404");
        assert_eq!(Matcher::Text("hi".into()).to_string(), "\"hi\"");
        assert_eq!(Matcher::regex("a+").expect("regex").to_string(), "/a+/");
    }
}

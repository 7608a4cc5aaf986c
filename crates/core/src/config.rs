use serde::{Deserialize, Serialize};

use crate::definition::{ErrorHook, ExpectedHeaders, Failure, Headers};
use crate::Matcher;

/// Response field read from the login response when none is configured.
pub const DEFAULT_TOKEN_FIELD: &str = "id";

/// Suite-wide defaults applied to every definition of a run.
///
/// Built once per run and shared read-only between concurrent tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Prefix for every non-absolute definition URL.
    #[serde(alias = "baseUrl", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default request headers, overridden per key by definitions.
    #[serde(skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
    pub expect: ExpectDefaults,
    /// Fallback failure callback for definitions without their own.
    #[serde(skip)]
    pub error: Option<ErrorHook>,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectDefaults {
    #[serde(skip_serializing_if = "ExpectedHeaders::is_empty")]
    pub headers: ExpectedHeaders,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Login endpoint credentials are posted to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Login response field that carries the token.
    pub token_field: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: None,
            token_field: DEFAULT_TOKEN_FIELD.to_string(),
        }
    }
}

impl GlobalConfig {
    /// Apply defaults so that empty values mean "no effect".
    pub fn normalized(mut self) -> Self {
        if self.base_url.as_deref().is_some_and(str::is_empty) {
            self.base_url = None;
        }
        if self.auth.url.as_deref().is_some_and(str::is_empty) {
            self.auth.url = None;
        }
        if self.auth.token_field.trim().is_empty() {
            self.auth.token_field = DEFAULT_TOKEN_FIELD.to_string();
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_expected_header(
        mut self,
        name: impl Into<String>,
        matcher: impl Into<Matcher>,
    ) -> Self {
        self.expect.headers.insert(name.into(), matcher.into());
        self
    }

    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.auth.url = Some(url.into());
        self
    }

    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Failure<'_>) + Send + Sync + 'static,
    {
        self.error = Some(ErrorHook::new(hook));
        self
    }

    /// Prefix `url` with the base URL unless it is already absolute.
    pub fn resolve_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !is_absolute_url(url) => format!("{base}{url}"),
            _ => url.to_string(),
        }
    }
}

pub fn is_absolute_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

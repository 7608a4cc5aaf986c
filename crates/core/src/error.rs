use thiserror::Error;

/// Mismatch between a response and an expectation.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum AssertionError {
    #[error("expected {expected} status, got {actual}")]
    Status { expected: u16, actual: u16 },
    #[error("expected {name:?} header of {expected}, got {actual:?}")]
    Header {
        name: String,
        expected: String,
        actual: Option<String>,
    },
    #[error("expected {expected:?} response body, got {actual:?}")]
    Text { expected: String, actual: String },
    #[error("expected body {actual:?} to match /{pattern}/")]
    Pattern { pattern: String, actual: String },
    #[error("expected {expected} response body, got {actual}")]
    Json {
        expected: serde_json::Value,
        actual: serde_json::Value,
    },
    #[error("{0}")]
    Custom(String),
    #[error("unsupported matcher for header {name:?}: {matcher}")]
    UnsupportedHeaderMatcher { name: String, matcher: String },
}

/// A definition whose shape cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DefinitionError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("definition has both steps and verb/url")]
    ChainWithRequest,
    #[error("chain has no steps")]
    EmptyChain,
}

/// A suite tree that cannot be turned into tests. Fatal for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MalformedSuiteError {
    #[error("invalid test definition: group {group:?} has no tests")]
    MissingTests { group: String },
    #[error("invalid test definition at {path}: {source}")]
    InvalidDefinition {
        path: String,
        #[source]
        source: DefinitionError,
    },
    #[error("invalid suite file: {0}")]
    Parse(String),
}

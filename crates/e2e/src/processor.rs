//! Executes one test definition: auth resolution and fan-out, config merge,
//! request construction, assertions and chained steps.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use decl_e2e_client::{App, ChainableRequest, ExchangeError};
use decl_e2e_core::definition::is_status_key;
use decl_e2e_core::merge::{merge_expect, union_maps};
use decl_e2e_core::{
    AssertionError, Auth, AuthEntry, DefinitionError, Expect, ExpectSpec, ExpectedHeaders,
    Failure, GlobalConfig, Headers, Outcome, Resolvable, Response, Step, TestDefinition,
    is_truthy, merge_definition,
};

use crate::auth::authenticate;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The login endpoint answered with an `error` field; carries its raw value.
    #[error("authentication failed: {0}")]
    Authentication(serde_json::Value),

    #[error(transparent)]
    Assertion(AssertionError),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("credentials given but no login url configured (auth.url)")]
    MissingLoginUrl,

    #[error("login response has no usable {field:?} field")]
    MissingToken { field: String },

    #[error("test task failed: {0}")]
    Join(String),
}

impl From<ExchangeError> for ProcessError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Transport(e) => Self::Transport(e.to_string()),
            ExchangeError::InvalidHeader { name, reason } => Self::InvalidHeader { name, reason },
            ExchangeError::Assertion { error, .. } => Self::Assertion(error),
        }
    }
}

/// Process a definition against `app`.
///
/// Chains run their steps one after another and yield the last step's
/// outcome; everything else runs as a single (possibly fanned-out) request.
/// The input definition is never modified.
pub async fn process(
    app: &App,
    definition: &TestDefinition,
    config: &Arc<GlobalConfig>,
) -> Result<Outcome, ProcessError> {
    match &definition.steps {
        Some(steps) => process_chain(app, definition, steps, config).await,
        None => process_request_definition(app, definition.clone(), config).await,
    }
}

async fn process_chain(
    app: &App,
    parent: &TestDefinition,
    steps: &[Step],
    config: &Arc<GlobalConfig>,
) -> Result<Outcome, ProcessError> {
    if parent.verb.is_some() && parent.url.is_some() {
        return Err(DefinitionError::ChainWithRequest.into());
    }

    let mut previous: Option<Outcome> = None;
    for (index, step) in steps.iter().enumerate() {
        debug!(index, total = steps.len(), "processing step");
        let fragment = step.build(previous.as_ref());
        let mut merged = merge_definition(parent, &fragment);
        merged.steps = None;
        previous = Some(process_request_definition(app, merged, config).await?);
    }

    previous.ok_or(ProcessError::Definition(DefinitionError::EmptyChain))
}

async fn process_request_definition(
    app: &App,
    mut definition: TestDefinition,
    config: &Arc<GlobalConfig>,
) -> Result<Outcome, ProcessError> {
    let auth = match &definition.auth {
        Some(auth) => Some(auth.resolve().await),
        None => None,
    };
    definition.auth = auth.clone().map(Resolvable::Literal);

    match auth {
        None => {
            debug!("no auth defined");
            process_request(app, definition, config)
                .await
                .map(Outcome::Single)
        }
        Some(auth) if auth.is_absent() => {
            debug!("empty auth token, sending unauthenticated");
            process_request(app, definition, config)
                .await
                .map(Outcome::Single)
        }
        Some(Auth::Many(entries)) => fan_out(app, definition, entries, config)
            .await
            .map(Outcome::Many),
        Some(Auth::Single(entry)) => {
            debug!("auth defined for a single user");
            process_authenticated(app, definition, &entry, config)
                .await
                .map(Outcome::Single)
        }
    }
}

/// Run the definition once per auth entry, concurrently. Results keep the
/// input order. On the first failure the remaining runs are detached, not
/// cancelled.
async fn fan_out(
    app: &App,
    definition: TestDefinition,
    entries: Vec<AuthEntry>,
    config: &Arc<GlobalConfig>,
) -> Result<Vec<Response>, ProcessError> {
    debug!(users = entries.len(), "auth defined with multiple users");
    let total = entries.len();
    let mut set = JoinSet::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let app = app.clone();
        let config = Arc::clone(config);
        let mut derived = definition.clone();
        derived.auth = Some(Resolvable::Literal(Auth::Single(entry.clone())));
        set.spawn(async move {
            let result = process_authenticated(&app, derived, &entry, &config).await;
            (index, result)
        });
    }

    let mut responses: Vec<Option<Response>> = vec![None; total];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(response))) => responses[index] = Some(response),
            Ok((index, Err(err))) => {
                debug!(index, error = %err, "fanned-out request failed");
                set.detach_all();
                return Err(err);
            }
            Err(err) => {
                set.detach_all();
                return Err(ProcessError::Join(err.to_string()));
            }
        }
    }

    Ok(responses.into_iter().flatten().collect())
}

async fn process_authenticated(
    app: &App,
    mut definition: TestDefinition,
    entry: &AuthEntry,
    config: &Arc<GlobalConfig>,
) -> Result<Response, ProcessError> {
    let token = authenticate(app, entry, config).await?;

    let headers = definition.headers.get_or_insert_with(Headers::new);
    if headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case("authorization"))
    {
        debug!("definition sets Authorization explicitly, not injecting token");
    } else {
        headers.insert("Authorization".to_string(), token);
    }

    process_request(app, definition, config).await
}

/// Config defaults under the definition's own expectation.
///
/// A bare matcher combined with default header expectations becomes a
/// structured expectation whose body slot holds the matcher.
fn effective_expect(expect: Option<&Expect>, defaults: &ExpectedHeaders) -> Option<Expect> {
    if defaults.is_empty() {
        return expect.cloned();
    }
    match expect {
        Some(Expect::Matcher(matcher)) => Some(Expect::Structured(ExpectSpec {
            headers: Some(defaults.clone()),
            body: Some(matcher.clone().into()),
        })),
        other => {
            let defaults = Expect::Structured(ExpectSpec {
                headers: Some(defaults.clone()),
                body: None,
            });
            merge_expect(Some(&defaults), other)
        }
    }
}

async fn process_request(
    app: &App,
    definition: TestDefinition,
    config: &Arc<GlobalConfig>,
) -> Result<Response, ProcessError> {
    let verb = definition
        .verb
        .ok_or(DefinitionError::MissingField { field: "verb" })?;
    let url = definition
        .url
        .as_ref()
        .ok_or(DefinitionError::MissingField { field: "url" })?
        .resolve()
        .await;
    let url = config.resolve_url(&url);

    let headers =
        union_maps(Some(&config.headers), definition.headers.as_ref()).unwrap_or_default();
    let expect = effective_expect(definition.expect.as_ref(), &config.expect.headers);
    let hook = definition.error.clone().or_else(|| config.error.clone());

    debug!(%verb, %url, "building request");
    let mut request = app.request(verb, &url);

    if headers.is_empty() {
        debug!("no header defined");
    } else {
        let names: Vec<&str> = headers.keys().map(String::as_str).collect();
        debug!(count = names.len(), headers = %names.join(", "), "applying headers");
        for (name, value) in &headers {
            request = request.set(name, value);
        }
    }

    // Falsy literal bodies (false, 0, "", null) are not sent.
    match &definition.body {
        Some(body @ Resolvable::Producer(_)) => {
            debug!("applying body from function");
            request = request.send(&body.resolve().await);
        }
        Some(Resolvable::Literal(body)) if is_truthy(body) => {
            debug!("applying body from object");
            request = request.send(body);
        }
        _ => debug!("no body defined"),
    }

    let request = apply_expectations(request, expect.as_ref()).await;

    match request.end().await {
        Ok(response) => Ok(response),
        Err(ExchangeError::Assertion { error, response }) => {
            debug!(%error, "test failed");
            match &hook {
                Some(hook) => hook.call(&Failure {
                    error: &error,
                    response: &response,
                }),
                None => debug!(
                    "provide an error callback in the definition or global config to access the response"
                ),
            }
            Err(ProcessError::Assertion(error))
        }
        Err(err) => Err(err.into()),
    }
}

async fn apply_expectations(
    mut request: ChainableRequest,
    expect: Option<&Expect>,
) -> ChainableRequest {
    match expect {
        None => {
            debug!("no expectation defined");
            request
        }
        Some(Expect::Matcher(matcher)) => {
            debug!("testing response with provided expect value");
            request.expect(matcher.clone())
        }
        Some(Expect::Structured(spec)) => {
            if let Some(headers) = &spec.headers {
                debug!("testing response headers");
                for (key, matcher) in headers {
                    request = if is_status_key(key) {
                        request.expect(matcher.clone())
                    } else {
                        request.expect_header(key, matcher.clone())
                    };
                }
            }
            if let Some(body) = &spec.body {
                debug!("testing response body");
                request = request.expect(body.resolve().await);
            }
            request
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decl_e2e_core::Matcher;

    fn defaults() -> ExpectedHeaders {
        [("content-type".to_string(), Matcher::regex("json").expect("regex"))].into()
    }

    #[test]
    fn no_defaults_keeps_expectation_untouched() {
        let expect = effective_expect(Some(&Expect::status(200)), &ExpectedHeaders::new());
        assert!(matches!(expect, Some(Expect::Matcher(Matcher::Status(200)))));
        assert!(effective_expect(None, &ExpectedHeaders::new()).is_none());
    }

    #[test]
    fn bare_matcher_keeps_its_assertion_under_defaults() {
        let Some(Expect::Structured(spec)) = effective_expect(Some(&Expect::status(204)), &defaults())
        else {
            panic!("expected structured expectation");
        };
        assert!(spec.headers.is_some_and(|h| h.contains_key("content-type")));
        assert_eq!(
            spec.body.as_ref().and_then(Resolvable::as_literal),
            Some(&Matcher::Status(204))
        );
    }

    #[test]
    fn definition_headers_override_default_expectations() {
        let own = Expect::Structured(ExpectSpec {
            headers: Some([("Content-Type".to_string(), Matcher::Text("text/plain".into()))].into()),
            body: None,
        });
        let Some(Expect::Structured(spec)) = effective_expect(Some(&own), &defaults()) else {
            panic!("expected structured expectation");
        };
        let headers = spec.headers.expect("headers");
        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.get("Content-Type"),
            Some(&Matcher::Text("text/plain".into()))
        );
    }

    #[test]
    fn defaults_apply_without_own_expectation() {
        let Some(Expect::Structured(spec)) = effective_expect(None, &defaults()) else {
            panic!("expected structured expectation");
        };
        assert!(spec.body.is_none());
        assert_eq!(spec.headers.map(|h| h.len()), Some(1));
    }
}

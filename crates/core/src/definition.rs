use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::{AssertionError, DefinitionError};
use crate::value::is_truthy;
use crate::{Matcher, Outcome, Resolvable, Response, Verb};

/// Request headers, name → value.
pub type Headers = BTreeMap<String, String>;

/// Expected response headers, name → matcher.
pub type ExpectedHeaders = BTreeMap<String, Matcher>;

/// Keys of `expect.headers` that assert the top-level status code instead of
/// a header of that name.
pub const STATUS_KEYS: [&str; 2] = ["status", "Status-Code"];

pub fn is_status_key(key: &str) -> bool {
    STATUS_KEYS.contains(&key)
}

/// One HTTP interaction, or a chain of them when `steps` is set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestDefinition {
    pub name: Option<String>,
    pub skip: bool,
    pub verb: Option<Verb>,
    pub url: Option<Resolvable<String>>,
    pub headers: Option<Headers>,
    pub body: Option<Resolvable<serde_json::Value>>,
    pub auth: Option<Resolvable<Auth>>,
    pub expect: Option<Expect>,
    #[serde(skip)]
    pub error: Option<ErrorHook>,
    pub steps: Option<Vec<Step>>,
}

impl TestDefinition {
    pub fn new(verb: Verb, url: impl Into<Resolvable<String>>) -> Self {
        Self {
            verb: Some(verb),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn get(url: impl Into<Resolvable<String>>) -> Self {
        Self::new(Verb::Get, url)
    }

    pub fn post(url: impl Into<Resolvable<String>>) -> Self {
        Self::new(Verb::Post, url)
    }

    pub fn put(url: impl Into<Resolvable<String>>) -> Self {
        Self::new(Verb::Put, url)
    }

    pub fn patch(url: impl Into<Resolvable<String>>) -> Self {
        Self::new(Verb::Patch, url)
    }

    pub fn delete(url: impl Into<Resolvable<String>>) -> Self {
        Self::new(Verb::Delete, url)
    }

    /// A chain definition. Fields set on the returned value are inherited by
    /// every step.
    pub fn chain(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Some(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    /// An empty fragment, used as a step that only overrides some fields.
    pub fn fragment() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn with_verb(mut self, verb: Verb) -> Self {
        self.verb = Some(verb);
        self
    }

    pub fn with_url(mut self, url: impl Into<Resolvable<String>>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Resolvable<serde_json::Value>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn auth(mut self, auth: impl Into<Resolvable<Auth>>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = Some(expect);
        self
    }

    pub fn expect_status(self, status: u16) -> Self {
        self.expect_header(STATUS_KEYS[0], Matcher::Status(status))
    }

    pub fn expect_header(mut self, name: impl Into<String>, matcher: impl Into<Matcher>) -> Self {
        self.structured_expect()
            .headers
            .get_or_insert_with(ExpectedHeaders::new)
            .insert(name.into(), matcher.into());
        self
    }

    pub fn expect_body(mut self, body: impl Into<Resolvable<Matcher>>) -> Self {
        self.structured_expect().body = Some(body.into());
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Failure<'_>) + Send + Sync + 'static,
    {
        self.error = Some(ErrorHook::new(hook));
        self
    }

    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.get_or_insert_with(Vec::new).push(step.into());
        self
    }

    pub fn is_chain(&self) -> bool {
        self.steps.is_some()
    }

    /// Check the chain-xor-request invariant.
    pub fn validate_shape(&self) -> Result<(), DefinitionError> {
        match &self.steps {
            Some(steps) if steps.is_empty() => Err(DefinitionError::EmptyChain),
            Some(_) if self.verb.is_some() && self.url.is_some() => {
                Err(DefinitionError::ChainWithRequest)
            }
            Some(_) => Ok(()),
            None if self.verb.is_none() => Err(DefinitionError::MissingField { field: "verb" }),
            None if self.url.is_none() => Err(DefinitionError::MissingField { field: "url" }),
            None => Ok(()),
        }
    }

    /// Name used in reports: the explicit name, else `VERB url`.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let verb = self.verb.map(|v| v.to_string());
        let url = self.url.as_ref().map(|url| match url.as_literal() {
            Some(url) => url.clone(),
            None => "<dynamic url>".to_string(),
        });
        match (verb, url) {
            (Some(verb), Some(url)) => format!("{verb} {url}"),
            _ if self.is_chain() => "chain".to_string(),
            _ => "unnamed".to_string(),
        }
    }

    fn structured_expect(&mut self) -> &mut ExpectSpec {
        let current = self.expect.take();
        let spec = match current {
            Some(Expect::Structured(spec)) => spec,
            Some(Expect::Matcher(matcher)) => ExpectSpec {
                headers: None,
                body: Some(matcher.into()),
            },
            None => ExpectSpec::default(),
        };
        match self.expect.insert(Expect::Structured(spec)) {
            Expect::Structured(spec) => spec,
            Expect::Matcher(_) => unreachable!("expect was just set to a structured value"),
        }
    }
}

/// Credentials or token for a single user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AuthEntry {
    /// Pre-resolved token, sent as-is in `Authorization`.
    Token(String),
    /// Login request body posted to the configured login URL.
    Credentials(serde_json::Map<String, serde_json::Value>),
}

/// The `auth` field of a definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Auth {
    /// Run the definition once per entry, concurrently.
    Many(Vec<AuthEntry>),
    Single(AuthEntry),
}

impl Auth {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Single(AuthEntry::Token(token.into()))
    }

    /// Credentials from a JSON object; any other JSON value yields an empty
    /// credentials object.
    pub fn credentials(value: serde_json::Value) -> Self {
        Self::Single(AuthEntry::from_value(value))
    }

    pub fn users(entries: impl IntoIterator<Item = AuthEntry>) -> Self {
        Self::Many(entries.into_iter().collect())
    }

    /// An empty token counts as no auth at all.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Single(AuthEntry::Token(token)) if token.is_empty())
    }
}

impl AuthEntry {
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(token) => Self::Token(token),
            serde_json::Value::Object(map) => Self::Credentials(map),
            _ => Self::Credentials(serde_json::Map::new()),
        }
    }
}

impl From<AuthEntry> for Auth {
    fn from(entry: AuthEntry) -> Self {
        Self::Single(entry)
    }
}

/// Structured expectation: header matchers and an optional body matcher.
#[derive(Debug, Clone, Default)]
pub struct ExpectSpec {
    pub headers: Option<ExpectedHeaders>,
    pub body: Option<Resolvable<Matcher>>,
}

/// The `expect` field: a bare matcher, or headers/body expectations.
#[derive(Debug, Clone)]
pub enum Expect {
    Matcher(Matcher),
    Structured(ExpectSpec),
}

impl Expect {
    pub fn status(status: u16) -> Self {
        Self::Matcher(Matcher::Status(status))
    }

    /// An object with a `headers` or `body` key is structured; everything else
    /// is a bare matcher.
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        let serde_json::Value::Object(mut map) = value else {
            return Matcher::from_value(value).map(Self::Matcher);
        };
        if !map.contains_key("headers") && !map.contains_key("body") {
            return Matcher::from_value(serde_json::Value::Object(map)).map(Self::Matcher);
        }

        let headers = match map.remove("headers") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Object(entries)) => Some(
                entries
                    .into_iter()
                    .map(|(name, value)| Matcher::from_value(value).map(|m| (name, m)))
                    .collect::<Result<ExpectedHeaders, String>>()?,
            ),
            Some(other) => return Err(format!("expect.headers must be an object, got {other}")),
        };
        // Falsy bodies (false, 0, "", null) carry no body expectation.
        let body = match map.remove("body") {
            Some(value) if is_truthy(&value) => {
                Some(Resolvable::Literal(Matcher::from_value(value)?))
            }
            _ => None,
        };

        Ok(Self::Structured(ExpectSpec { headers, body }))
    }
}

impl From<Matcher> for Expect {
    fn from(matcher: Matcher) -> Self {
        Self::Matcher(matcher)
    }
}

impl<'de> Deserialize<'de> for Expect {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

/// What an error callback receives when an assertion fails.
#[derive(Debug)]
pub struct Failure<'a> {
    pub error: &'a AssertionError,
    pub response: &'a Response,
}

/// Diagnostic callback invoked on assertion failure.
#[derive(Clone)]
pub struct ErrorHook(Arc<dyn Fn(&Failure<'_>) + Send + Sync>);

impl ErrorHook {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&Failure<'_>) + Send + Sync + 'static,
    {
        Self(Arc::new(hook))
    }

    pub fn call(&self, failure: &Failure<'_>) {
        (self.0)(failure);
    }
}

impl fmt::Debug for ErrorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHook(..)")
    }
}

type StepFn = dyn Fn(Option<&Outcome>) -> TestDefinition + Send + Sync;

/// One step of a chain.
#[derive(Clone)]
pub enum Step {
    Fragment(Box<TestDefinition>),
    /// Built from the previous step's outcome (`None` for the first step).
    Dynamic(Arc<StepFn>),
}

impl Step {
    pub fn dynamic<F>(build: F) -> Self
    where
        F: Fn(Option<&Outcome>) -> TestDefinition + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(build))
    }

    pub fn build(&self, previous: Option<&Outcome>) -> TestDefinition {
        match self {
            Self::Fragment(fragment) => (**fragment).clone(),
            Self::Dynamic(build) => build(previous),
        }
    }
}

impl From<TestDefinition> for Step {
    fn from(fragment: TestDefinition) -> Self {
        Self::Fragment(Box::new(fragment))
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fragment(fragment) => f.debug_tuple("Fragment").field(fragment).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        TestDefinition::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaf_definition_deserializes() {
        let def: TestDefinition = serde_json::from_value(json!({
            "name": "health",
            "verb": "get",
            "url": "/health",
            "headers": {"Accept": "application/json"},
            "expect": {"headers": {"status": 200}, "body": {"ok": true}}
        }))
        .expect("parse definition");

        assert_eq!(def.verb, Some(Verb::Get));
        assert_eq!(def.display_name(), "health");
        assert!(def.validate_shape().is_ok());
        let Some(Expect::Structured(spec)) = &def.expect else {
            panic!("expected structured expect");
        };
        assert_eq!(
            spec.headers.as_ref().and_then(|h| h.get("status")),
            Some(&Matcher::Status(200))
        );
        assert_eq!(
            spec.body.as_ref().and_then(Resolvable::as_literal),
            Some(&Matcher::Json(json!({"ok": true})))
        );
    }

    #[test]
    fn bare_expect_values_are_matchers() {
        let def: TestDefinition =
            serde_json::from_value(json!({"verb": "get", "url": "/", "expect": 204}))
                .expect("parse");
        assert!(matches!(def.expect, Some(Expect::Matcher(Matcher::Status(204)))));

        let def: TestDefinition =
            serde_json::from_value(json!({"verb": "get", "url": "/", "expect": {"id": 3}}))
                .expect("parse");
        assert!(matches!(def.expect, Some(Expect::Matcher(Matcher::Json(_)))));
    }

    #[test]
    fn falsy_expected_body_is_ignored() {
        for body in [json!(0), json!(false), json!(""), json!(null)] {
            let expect = Expect::from_value(json!({"headers": {"status": 200}, "body": body}))
                .expect("parse");
            let Expect::Structured(spec) = expect else {
                panic!("expected structured expect");
            };
            assert!(spec.body.is_none(), "{body} should not be asserted");
        }
    }

    #[test]
    fn auth_shapes_deserialize() {
        let token: Auth = serde_json::from_value(json!("tok123")).expect("token");
        assert_eq!(token, Auth::token("tok123"));

        let creds: Auth =
            serde_json::from_value(json!({"email": "a@x.com", "password": "p"})).expect("creds");
        assert!(matches!(creds, Auth::Single(AuthEntry::Credentials(ref m)) if m["email"] == "a@x.com"));

        let many: Auth =
            serde_json::from_value(json!(["tok", {"email": "b@x.com"}])).expect("many");
        let Auth::Many(entries) = many else {
            panic!("expected fan-out auth");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], AuthEntry::Token("tok".into()));
    }

    #[test]
    fn empty_token_is_absent_auth() {
        assert!(Auth::token("").is_absent());
        assert!(!Auth::token("t").is_absent());
        assert!(!Auth::users(vec![]).is_absent());
    }

    #[test]
    fn shape_validation() {
        assert_eq!(
            TestDefinition::default().validate_shape(),
            Err(DefinitionError::MissingField { field: "verb" })
        );
        assert_eq!(
            TestDefinition::fragment().with_verb(Verb::Get).validate_shape(),
            Err(DefinitionError::MissingField { field: "url" })
        );
        assert_eq!(
            TestDefinition::chain(Vec::new()).validate_shape(),
            Err(DefinitionError::EmptyChain)
        );
        assert_eq!(
            TestDefinition::get("/a")
                .step(TestDefinition::fragment())
                .validate_shape(),
            Err(DefinitionError::ChainWithRequest)
        );
        let chain = TestDefinition::chain([TestDefinition::get("/a").into()]).with_verb(Verb::Get);
        assert!(chain.validate_shape().is_ok());
    }

    #[test]
    fn builder_converts_bare_matcher_into_structured_expect() {
        let def = TestDefinition::get("/x")
            .expect(Expect::status(201))
            .expect_header("content-type", Matcher::regex("json").expect("regex"));
        let Some(Expect::Structured(spec)) = def.expect else {
            panic!("expected structured expect");
        };
        assert_eq!(
            spec.body.as_ref().and_then(Resolvable::as_literal),
            Some(&Matcher::Status(201))
        );
        assert!(spec.headers.is_some_and(|h| h.contains_key("content-type")));
    }

    #[test]
    fn display_name_falls_back_to_request_line() {
        assert_eq!(TestDefinition::post("/users").display_name(), "POST /users");
        let dynamic = TestDefinition::get(Resolvable::from_fn(|| "/x".to_string()));
        assert_eq!(dynamic.display_name(), "GET <dynamic url>");
    }

    #[test]
    fn dynamic_step_receives_previous_outcome() {
        let step = Step::dynamic(|previous| {
            let id = previous
                .and_then(Outcome::first)
                .map(|res| res.body["id"].to_string())
                .unwrap_or_default();
            TestDefinition::fragment().with_url(format!("/items/{id}"))
        });
        let previous = Outcome::Single(Response::new(
            201,
            [("content-type".to_string(), "application/json".to_string())].into(),
            r#"{"id":7}"#.to_string(),
        ));
        let built = step.build(Some(&previous));
        assert_eq!(
            built.url.as_ref().and_then(Resolvable::as_literal).map(String::as_str),
            Some("/items/7")
        );
    }
}

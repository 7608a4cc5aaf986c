//! Turns a suite tree into runnable tests and hands it to a generator.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use decl_e2e_client::App;
use decl_e2e_core::{
    BoxFuture, GlobalConfig, MalformedSuiteError, Outcome, SuiteDefinition, TestDefinition,
};

use crate::processor::{ProcessError, process};

pub(crate) type TestFn = dyn Fn() -> BoxFuture<Result<Outcome, ProcessError>> + Send + Sync;

/// A leaf definition paired with a lazy test thunk.
#[derive(Clone)]
pub struct GeneratedTest {
    pub name: String,
    pub definition: Arc<TestDefinition>,
    test: Arc<TestFn>,
}

impl GeneratedTest {
    pub(crate) fn new(name: String, definition: Arc<TestDefinition>, test: Arc<TestFn>) -> Self {
        Self {
            name,
            definition,
            test,
        }
    }

    /// Start the test. Nothing runs until this is called; every call runs
    /// the definition again from scratch.
    pub fn run(&self) -> BoxFuture<Result<Outcome, ProcessError>> {
        (self.test)()
    }

    pub fn is_skipped(&self) -> bool {
        self.definition.skip
    }
}

impl fmt::Debug for GeneratedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedTest")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// The suite tree with every leaf turned into a [`GeneratedTest`].
#[derive(Debug, Clone)]
pub enum GeneratedSuite {
    Tests(Vec<GeneratedTest>),
    Groups(Vec<(String, GeneratedGroup)>),
}

#[derive(Debug, Clone)]
pub struct GeneratedGroup {
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub tests: GeneratedSuite,
}

impl GeneratedGroup {
    pub fn is_skipped(&self) -> bool {
        self.metadata
            .get("skip")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Turns a generated suite into executed, reported tests.
pub trait SuiteGenerator {
    type Output;

    fn generate(&self, suite: GeneratedSuite) -> impl Future<Output = Self::Output> + Send;
}

/// Normalize `config`, build the test tree and hand it to `generator`.
///
/// Malformed trees are rejected before any request is sent.
pub async fn run<G: SuiteGenerator>(
    app: &App,
    config: GlobalConfig,
    suite: &SuiteDefinition,
    generator: &G,
) -> Result<G::Output, MalformedSuiteError> {
    let config = Arc::new(config.normalized());
    let generated = transform(app, suite, &config)?;
    Ok(generator.generate(generated).await)
}

/// [`run`] with an empty configuration.
pub async fn run_with_defaults<G: SuiteGenerator>(
    app: &App,
    suite: &SuiteDefinition,
    generator: &G,
) -> Result<G::Output, MalformedSuiteError> {
    debug!("running with default config");
    run(app, GlobalConfig::default(), suite, generator).await
}

/// Build the generated tree. Group metadata is carried over unchanged.
pub fn transform(
    app: &App,
    suite: &SuiteDefinition,
    config: &Arc<GlobalConfig>,
) -> Result<GeneratedSuite, MalformedSuiteError> {
    transform_at(app, suite, config, "")
}

fn transform_at(
    app: &App,
    suite: &SuiteDefinition,
    config: &Arc<GlobalConfig>,
    path: &str,
) -> Result<GeneratedSuite, MalformedSuiteError> {
    match suite {
        SuiteDefinition::Tests(tests) => tests
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                build_test(app, definition, config, &format!("{path}[{index}]"))
            })
            .collect::<Result<Vec<_>, MalformedSuiteError>>()
            .map(GeneratedSuite::Tests),
        SuiteDefinition::Groups(groups) => groups
            .iter()
            .map(|(name, group)| {
                let tests = group
                    .tests
                    .as_ref()
                    .ok_or_else(|| MalformedSuiteError::MissingTests {
                        group: name.clone(),
                    })?;
                let path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}/{name}")
                };
                let group = GeneratedGroup {
                    metadata: group.metadata.clone(),
                    tests: transform_at(app, tests, config, &path)?,
                };
                Ok((name.clone(), group))
            })
            .collect::<Result<Vec<_>, MalformedSuiteError>>()
            .map(GeneratedSuite::Groups),
    }
}

fn build_test(
    app: &App,
    definition: &TestDefinition,
    config: &Arc<GlobalConfig>,
    path: &str,
) -> Result<GeneratedTest, MalformedSuiteError> {
    definition
        .validate_shape()
        .map_err(|source| MalformedSuiteError::InvalidDefinition {
            path: path.to_string(),
            source,
        })?;

    let definition = Arc::new(definition.clone());
    let name = definition.display_name();

    let test: Arc<TestFn> = {
        let app = app.clone();
        let definition = Arc::clone(&definition);
        let config = Arc::clone(config);
        let name = name.clone();
        Arc::new(move || -> BoxFuture<Result<Outcome, ProcessError>> {
            let app = app.clone();
            let definition = Arc::clone(&definition);
            let config = Arc::clone(&config);
            let name = name.clone();
            Box::pin(async move {
                debug!(test = %name, "started");
                process(&app, &definition, &config).await
            })
        })
    };

    Ok(GeneratedTest::new(name, definition, test))
}

//! Declarative HTTP end-to-end test definitions.
//!
//! The data model shared by the client, the processor and the CLI: test
//! definitions, suite trees, matchers, global configuration and the merge
//! rules between them.

pub mod config;
pub mod definition;
pub mod error;
pub mod matcher;
pub mod merge;
pub mod response;
pub mod suite;
pub mod value;
pub mod verb;

pub use config::{AuthConfig, ExpectDefaults, GlobalConfig};
pub use definition::{
    Auth, AuthEntry, ErrorHook, Expect, ExpectSpec, ExpectedHeaders, Failure, Headers, Step,
    TestDefinition,
};
pub use error::{AssertionError, DefinitionError, MalformedSuiteError};
pub use matcher::Matcher;
pub use merge::merge_definition;
pub use response::{Outcome, Response};
pub use suite::{Group, SuiteDefinition};
pub use value::{BoxFuture, Resolvable, is_truthy};
pub use verb::Verb;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

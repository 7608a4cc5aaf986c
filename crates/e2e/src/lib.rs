//! Interprets declarative test definitions against an HTTP application.
//!
//! [`processor::process`] runs a single definition; [`orchestrator::run`]
//! validates a whole suite tree and hands the generated tests to a
//! [`orchestrator::SuiteGenerator`] such as [`runner::ConcurrentGenerator`].

pub mod auth;
pub mod orchestrator;
pub mod processor;
pub mod runner;

pub use orchestrator::{
    GeneratedGroup, GeneratedSuite, GeneratedTest, SuiteGenerator, run, run_with_defaults,
    transform,
};
pub use processor::{ProcessError, process};
pub use runner::{ConcurrentGenerator, SuiteReport, TestResult, TestStatus};

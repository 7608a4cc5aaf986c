use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use crate::orchestrator::{GeneratedSuite, GeneratedTest, SuiteGenerator};

/// Separator between group names and the test name in reports.
pub const PATH_SEPARATOR: &str = " › ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of running a single test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub duration: Duration,
    pub error: Option<String>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Aggregated results of a full run, in suite order.
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub results: Vec<TestResult>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, status: TestStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

struct Planned {
    name: String,
    test: Option<GeneratedTest>,
}

/// Built-in generator: runs the tests of each list concurrently and the
/// lists themselves (one per group) in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ConcurrentGenerator {
    filter: Option<String>,
}

impl ConcurrentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only run tests whose qualified name contains `filter`.
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty());
        self
    }

    fn plan(&self, suite: &GeneratedSuite, prefix: &str, skipped: bool, batches: &mut Vec<Vec<Planned>>) {
        match suite {
            GeneratedSuite::Tests(tests) => {
                let batch: Vec<Planned> = tests
                    .iter()
                    .map(|test| (qualify(prefix, &test.name), test))
                    .filter(|(name, _)| self.filter.as_deref().is_none_or(|f| name.contains(f)))
                    .map(|(name, test)| Planned {
                        name,
                        test: (!skipped && !test.is_skipped()).then(|| test.clone()),
                    })
                    .collect();
                if !batch.is_empty() {
                    batches.push(batch);
                }
            }
            GeneratedSuite::Groups(groups) => {
                for (name, group) in groups {
                    let prefix = qualify(prefix, name);
                    self.plan(&group.tests, &prefix, skipped || group.is_skipped(), batches);
                }
            }
        }
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{name}")
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|m| (*m).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic payload>".to_string())
}

fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        format!("test panicked: {}", panic_message(payload.as_ref()))
    } else {
        format!("test task failed: {err}")
    }
}

async fn run_batch(batch: Vec<Planned>) -> Vec<TestResult> {
    let mut slots: Vec<Option<TestResult>> = vec![None; batch.len()];
    let mut names = Vec::with_capacity(batch.len());
    let mut tasks = HashMap::new();
    let mut set = JoinSet::new();

    for (index, planned) in batch.into_iter().enumerate() {
        names.push(planned.name.clone());
        let Some(test) = planned.test else {
            info!(test = %planned.name, "skipped");
            slots[index] = Some(TestResult {
                name: planned.name,
                status: TestStatus::Skipped,
                duration: Duration::ZERO,
                error: None,
            });
            continue;
        };
        let name = planned.name;
        let handle = set.spawn(async move {
            let start = Instant::now();
            let result = test.run().await;
            let duration = start.elapsed();
            let result = match result {
                Ok(_) => {
                    info!(test = %name, ?duration, "passed");
                    TestResult {
                        name,
                        status: TestStatus::Passed,
                        duration,
                        error: None,
                    }
                }
                Err(err) => {
                    warn!(test = %name, error = %err, "failed");
                    TestResult {
                        name,
                        status: TestStatus::Failed,
                        duration,
                        error: Some(err.to_string()),
                    }
                }
            };
            (index, result)
        });
        tasks.insert(handle.id(), index);
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(err) => {
                let Some(&index) = tasks.get(&err.id()) else {
                    continue;
                };
                let error = join_failure(err);
                warn!(test = %names[index], %error, "failed");
                slots[index] = Some(TestResult {
                    name: names[index].clone(),
                    status: TestStatus::Failed,
                    duration: Duration::ZERO,
                    error: Some(error),
                });
            }
        }
    }

    slots
        .into_iter()
        .zip(names)
        .map(|(slot, name)| {
            slot.unwrap_or_else(|| TestResult {
                name,
                status: TestStatus::Failed,
                duration: Duration::ZERO,
                error: Some("test task did not complete".to_string()),
            })
        })
        .collect()
}

impl SuiteGenerator for ConcurrentGenerator {
    type Output = SuiteReport;

    async fn generate(&self, suite: GeneratedSuite) -> SuiteReport {
        let mut batches = Vec::new();
        self.plan(&suite, "", false, &mut batches);

        let mut results = Vec::new();
        for batch in batches {
            results.extend(run_batch(batch).await);
        }
        SuiteReport { results }
    }
}

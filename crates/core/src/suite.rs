use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::MalformedSuiteError;
use crate::TestDefinition;

/// A suite tree: a list of definitions, or named groups each carrying a
/// nested suite under `tests`.
#[derive(Debug, Clone)]
pub enum SuiteDefinition {
    Tests(Vec<TestDefinition>),
    /// Groups in declaration order.
    Groups(Vec<(String, Group)>),
}

/// A named group node. Everything except `tests` is kept as metadata.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub tests: Option<SuiteDefinition>,
}

impl Group {
    pub fn new(tests: SuiteDefinition) -> Self {
        Self {
            metadata: serde_json::Map::new(),
            tests: Some(tests),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Groups honour `"skip": true` in their metadata.
    pub fn is_skipped(&self) -> bool {
        self.metadata
            .get("skip")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

impl SuiteDefinition {
    pub fn tests(tests: impl IntoIterator<Item = TestDefinition>) -> Self {
        Self::Tests(tests.into_iter().collect())
    }

    pub fn groups(groups: impl IntoIterator<Item = (String, Group)>) -> Self {
        Self::Groups(groups.into_iter().collect())
    }

    pub fn from_json_str(input: &str) -> Result<Self, MalformedSuiteError> {
        let value: serde_json::Value =
            serde_json::from_str(input).map_err(|e| MalformedSuiteError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse a suite tree. Groups without `tests` are kept as such; the
    /// orchestrator rejects them before anything runs.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MalformedSuiteError> {
        match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    serde_json::from_value::<TestDefinition>(item).map_err(|e| {
                        MalformedSuiteError::Parse(format!("test #{index}: {e}"))
                    })
                })
                .collect::<Result<Vec<_>, MalformedSuiteError>>()
                .map(Self::Tests),
            serde_json::Value::Object(entries) => entries
                .into_iter()
                .map(|(name, node)| {
                    let group = match node {
                        serde_json::Value::Object(mut metadata) => {
                            let tests = metadata
                                .remove("tests")
                                .filter(|tests| !tests.is_null())
                                .map(Self::from_value)
                                .transpose()?;
                            Group { metadata, tests }
                        }
                        _ => Group::default(),
                    };
                    Ok((name, group))
                })
                .collect::<Result<Vec<_>, MalformedSuiteError>>()
                .map(Self::Groups),
            other => Err(MalformedSuiteError::Parse(format!(
                "suite must be an array or an object, got {other}"
            ))),
        }
    }

    /// Number of leaf definitions in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Tests(tests) => tests.len(),
            Self::Groups(groups) => groups
                .iter()
                .filter_map(|(_, group)| group.tests.as_ref())
                .map(Self::leaf_count)
                .sum(),
        }
    }
}

impl<'de> Deserialize<'de> for SuiteDefinition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

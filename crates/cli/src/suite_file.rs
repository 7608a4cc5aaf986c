use std::path::Path;

use anyhow::{Context, Result};

use decl_e2e_core::SuiteDefinition;

/// Read and parse a JSON suite file.
pub fn load(path: &Path) -> Result<SuiteDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read suite {}", path.display()))?;
    SuiteDefinition::from_json_str(&content)
        .with_context(|| format!("failed to parse suite {}", path.display()))
}

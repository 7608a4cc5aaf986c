use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use decl_e2e_client::App;
use decl_e2e_core::GlobalConfig;

use crate::suite_file;

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the JSON suite file
    pub suite: PathBuf,
}

/// Build the test tree without running it. Returns whether the suite is
/// well-formed.
pub fn run(args: &ValidateArgs) -> Result<bool> {
    let suite = suite_file::load(&args.suite)?;
    // Never contacted: generated tests are not started.
    let app = App::new("http://localhost", std::time::Duration::from_secs(1))?;

    match decl_e2e_runner::transform(&app, &suite, &Arc::new(GlobalConfig::default())) {
        Ok(_) => {
            println!(
                "{}: ok ({} tests)",
                args.suite.display(),
                suite.leaf_count()
            );
            Ok(true)
        }
        Err(e) => {
            eprintln!("{}: {e}", args.suite.display());
            Ok(false)
        }
    }
}

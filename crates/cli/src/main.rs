mod config_cmd;
mod run_cmd;
mod suite_file;
mod validate_cmd;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "decl-e2e",
    version,
    about = "Run declarative HTTP end-to-end suites"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a suite file against an application
    Run(run_cmd::RunArgs),

    /// Check a suite file without sending any request
    Validate(validate_cmd::ValidateArgs),

    /// Show the effective run configuration
    Config(config_cmd::ConfigArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decl_e2e=info,decl_e2e_runner=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run_cmd::run(args).await,
        Commands::Validate(args) => validate_cmd::run(&args),
        Commands::Config(args) => config_cmd::run(&args),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

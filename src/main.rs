mod commands;
mod ui;

use brewsmith::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "brewsmith")]
#[command(author, version, about = "Build and install packages from verified source formulae", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory kegs are installed under (<prefix>/<name>/<version>)
    #[arg(long, global = true, env = "BREWSMITH_PREFIX", value_name = "DIR")]
    prefix: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, verify, build and install a formula
    Install {
        /// Path to the formula recipe (.toml or .json)
        recipe: PathBuf,

        /// Replace an existing installation of the same version
        #[arg(long)]
        force: bool,
    },

    /// Run an installed formula's test command
    Test {
        /// Path to the formula recipe
        recipe: PathBuf,
    },

    /// Download and verify a formula's source archive without building it
    Fetch {
        /// Path to the formula recipe
        recipe: PathBuf,
    },

    /// Show a formula and where it installs
    Info {
        /// Path to the formula recipe
        recipe: PathBuf,
    },

    /// List installed kegs
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    ui::init_colors();

    let mut config = Config::from_env();
    if let Some(prefix) = cli.prefix {
        config.prefix_base = prefix;
    }
    tracing::debug!("Using prefix base {}", config.prefix_base.display());

    let result = match cli.command {
        Commands::Install { recipe, force } => commands::install(config, &recipe, force).await,
        Commands::Test { recipe } => commands::test(config, &recipe, cli.verbose).await,
        Commands::Fetch { recipe } => commands::fetch(config, &recipe).await,
        Commands::Info { recipe } => commands::info(&config, &recipe),
        Commands::List => commands::list(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            commands::report_error(&err);
            ExitCode::FAILURE
        }
    }
}

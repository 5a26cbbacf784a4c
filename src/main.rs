use std::path::PathBuf;

use clap::Parser;
use rds_snapshot_copier::{
    config::{self, CopierConfig, RunOverrides},
    event::InvocationEvent,
    observability::init_tracing,
    replication,
    secrets::build_secret_manager,
};

const DEFAULT_CONFIG_PATH: &str = "rds-snapshot-copier.toml";

/// CLI arguments for the snapshot copier
#[derive(Parser, Debug)]
#[command(version, about = "Cross-region RDS snapshot copier", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Copy the latest snapshots and prune old copies, once (default)
    Run(RunArgs),
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Initialize a new configuration file
    Init {
        /// Path to create the config file (defaults to ./rds-snapshot-copier.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Trigger payload (JSON); `-` reads it from stdin
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Target region, overriding the config file and the payload
    #[arg(long)]
    target_region: Option<String>,

    /// Account owning the source snapshots, overriding the config file and the payload
    #[arg(long)]
    account: Option<String>,

    /// Log planned copies and deletions without issuing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Schema { output }) => {
            #[cfg(feature = "json-schema")]
            run_schema_export(output);
            #[cfg(not(feature = "json-schema"))]
            {
                let _ = output;
                eprintln!("Error: JSON schema export requires the 'json-schema' feature");
                std::process::exit(1);
            }
        }
        Some(Command::Init { output, force }) => {
            run_init(output, force);
        }
        Some(Command::Run(run_args)) => {
            run_copier(&args.config, run_args).await;
        }
        None => {
            run_copier(&args.config, RunArgs::default()).await;
        }
    }
}

/// Load everything a run needs, run it once and exit non-zero on failure.
async fn run_copier(config_path: &str, run_args: RunArgs) {
    let config = match CopierConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&config.observability.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let event = match &run_args.event {
        Some(path) => match InvocationEvent::load(path) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read trigger payload");
                std::process::exit(1);
            }
        },
        None => InvocationEvent::default(),
    };

    let overrides = RunOverrides {
        target_region: run_args.target_region,
        account: run_args.account,
        dry_run: run_args.dry_run,
    };

    // Secrets live next to the copies unless configured otherwise
    let secrets_region = overrides
        .target_region
        .as_deref()
        .or(config.target.region.as_deref())
        .or(event.region.as_deref())
        .unwrap_or(&config.source.region)
        .to_string();
    let secrets =
        match build_secret_manager(&config.secrets, &secrets_region, &config.credentials).await {
            Ok(secrets) => secrets,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize secret manager");
                std::process::exit(1);
            }
        };

    let run_config = match config.resolve(&overrides, &event, secrets.as_deref()).await {
        Ok(run_config) => run_config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid run configuration");
            std::process::exit(1);
        }
    };

    let report = match replication::run_with_rds(&config, &run_config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Invalid run configuration");
            std::process::exit(1);
        }
    };
    match report.into_result() {
        Ok(report) => {
            tracing::info!(
                run_id = %report.run_id,
                copies = report.copies(),
                deletions = report.deletions(),
                "Run succeeded"
            );
        }
        Err(e) => {
            tracing::error!(run_id = %e.report.run_id, error = %e, "Run failed");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
fn run_init(output: Option<String>, force: bool) {
    let output_path = PathBuf::from(output.unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()));

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    // Create parent directories if needed
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, config::DEFAULT_CONFIG_TOML) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("Edit the source region and resources, then run:");
    println!(
        "  rds-snapshot-copier run --config {} --target-region <region> --account <account>",
        output_path.display()
    );
}

/// Export JSON schema for the configuration file to file or stdout
#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<String>) {
    let content = match CopierConfig::json_schema_string() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Failed to serialize config schema: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &content) {
                eprintln!("Failed to write to {}: {}", path, e);
                std::process::exit(1);
            }
            eprintln!("Config JSON schema written to {}", path);
        }
        None => {
            println!("{}", content);
        }
    }
}

use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use eksaudit::cli::{
    self, format_cluster_list, format_region_list, format_scan_summary, Cli, Commands,
};
use eksaudit::config::AuthConfig;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file before reading credential-mode variables
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    let auth = AuthConfig::from_env(args.profile.clone(), args.dev);

    match args.command {
        Commands::Scan(scan_args) => {
            let config = cli::scan_config_from_args(&scan_args, auth);
            match cli::run_scan(config).await {
                Ok(outcome) => {
                    print!("{}", format_scan_summary(&outcome));
                    // Reports that never reached disk make the run fail
                    if !outcome.is_success() {
                        process::exit(1);
                    }
                }
                Err(e) => {
                    error!("Scan failed: {}", e);
                    process::exit(1);
                }
            }
        }
        Commands::Clusters(cluster_args) => {
            match cli::run_clusters(auth, cluster_args.regions).await {
                Ok(by_region) => print!("{}", format_cluster_list(&by_region)),
                Err(e) => {
                    error!("Cluster listing failed: {}", e);
                    process::exit(1);
                }
            }
        }
        Commands::Regions => match cli::run_regions(auth).await {
            Ok(regions) => print!("{}", format_region_list(&regions)),
            Err(e) => {
                error!("Region listing failed: {}", e);
                process::exit(1);
            }
        },
    }
}

//! fieldgate CLI entry point.

mod check;
mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use fieldgate_cache::{FileSessionStore, MemorySessionStore, PermissionService, SessionStore};
use fieldgate_client::{ClientConfig, ConfigError, RestError, RestPermissionApi};
use fieldgate_core::{ApiError, PermissionMap, PermissionNode};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use check::{run_check, CheckMode};
use cli::{Cli, Commands};

const DEFAULT_LOG_FILTER: &str = "fieldgate=info,warn";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] RestError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "fieldgate command failed");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("Failed to init subscriber: {}", e);
    }
}

fn build_service(config: &ClientConfig) -> Result<PermissionService, CliError> {
    let api = RestPermissionApi::new(config)?;
    let store: Arc<dyn SessionStore> = match &config.cache.session_dir {
        Some(dir) => Arc::new(FileSessionStore::new(dir)),
        None => Arc::new(MemorySessionStore::new()),
    };

    debug!(
        base_url = api.base_url(),
        file_store = config.cache.session_dir.is_some(),
        "Building permission service"
    );

    let service = PermissionService::builder(Arc::new(api))
        .with_store(store)
        .with_ttl(config.cache_ttl())
        .build();
    debug!(ttl_ms = service.ttl().as_millis() as u64, "Cache TTL");
    Ok(service)
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    let service = build_service(&config)?;

    match cli.command {
        Commands::Check {
            any,
            all,
            remote,
            codenames,
        } => {
            let mode = CheckMode::from_flags(any, all);
            let outcome = run_check(&service, codenames, mode, remote).await;
            print_results(&outcome.results);
            Ok(ExitCode::from(outcome.exit_status()))
        }
        Commands::Dump => {
            service.load_permissions(false).await?;
            let status = service.status();
            let report = serde_json::json!({
                "status": status.to_string(),
                "serving": status.is_serving(),
                "groups": service.groups(),
                "permissions": service.get_all_permissions(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tree { group_id } => {
            let tree = service.get_permission_tree(group_id).await?;
            info!(
                roots = tree.len(),
                nodes = tree.iter().map(PermissionNode::subtree_len).sum::<usize>(),
                "Fetched permission tree"
            );
            println!("{}", serde_json::to_string_pretty(&tree)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Deps { codename } => {
            let dependencies = service.get_permission_dependencies(&codename).await?;
            println!("{}", serde_json::to_string_pretty(&dependencies)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Grant { group_id, grants } => {
            let count = grants.len();
            service.bulk_update_group_permissions(group_id, grants).await?;
            println!("Updated {} permission(s) for group {}", count, group_id);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Copy {
            from_group_id,
            to_group_id,
        } => {
            service.copy_permissions(from_group_id, to_group_id).await?;
            println!(
                "Copied permissions from group {} to group {}",
                from_group_id, to_group_id
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clear => {
            service.clear_cache();
            println!("Permission cache cleared");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_results(results: &PermissionMap) {
    for (codename, granted) in results {
        let label = if *granted { "granted" } else { "denied" };
        println!("{:<8} {}", label, codename);
    }
}

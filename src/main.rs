//! toolgate - command line entry point.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolgate::config::Config;
use toolgate::quota::{QuotaStore, RateLimiter};
use toolgate::tools::builtin::network::{NETWORK_TOOLSET, UnconfiguredClient, network_toolset};
use toolgate::tools::{CallContext, Dispatcher, ToolRegistry};

#[derive(Parser)]
#[command(
    name = "toolgate",
    about = "Toolset dispatch with persistent rate limiting",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List toolsets and their tools.
    Tools {
        /// Restrict the listing to one toolset.
        #[arg(long)]
        toolset: Option<String>,
    },
    /// Show quota status for one or all rate-limit categories.
    Quota { category: Option<String> },
    /// Dispatch a single tool call and print the result.
    Call {
        toolset: String,
        tool: String,
        /// JSON object with the call arguments.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Caller identity recorded with the call.
        #[arg(long, default_value = "local")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("toolgate=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store = QuotaStore::new(&config.data_dir);
    let limiter = Arc::new(RateLimiter::new(store, config.categories.clone())?);

    // Registration is the only mutable phase; a duplicate tool or a
    // category without limits aborts startup here.
    let mut registry = ToolRegistry::new();
    registry.register(
        NETWORK_TOOLSET,
        network_toolset(Arc::new(UnconfiguredClient), limiter.clone()),
    )?;
    let registry = Arc::new(registry);
    let dispatcher = Dispatcher::new(registry.clone(), limiter.clone())?;

    match cli.command {
        Command::Tools { toolset } => {
            let ids = match &toolset {
                Some(id) => vec![id.as_str()],
                None => registry.list_toolsets(),
            };
            for id in ids {
                let listing = serde_json::json!({
                    "toolset": id,
                    "tools": registry.list_tools(id)?,
                });
                println!("{}", serde_json::to_string_pretty(&listing)?);
            }
        }
        Command::Quota { category } => {
            let statuses = match &category {
                Some(key) => limiter.status(key).into_iter().collect(),
                None => limiter.status_all(),
            };
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        Command::Call {
            toolset,
            tool,
            args,
            user,
        } => {
            let arguments: serde_json::Value = serde_json::from_str(&args)?;
            let ctx = CallContext::new(user);
            let result = dispatcher.execute(&toolset, &tool, arguments, &ctx).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use playdeck_host::{HostPolicy, LoadedPlugin, PluginLoader};

#[derive(Parser)]
#[command(
    name = "playdeck",
    version,
    about = "Playdeck - native plugin host tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); falls back to the
    /// configured `log_level`, then "info"
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and list loadable plugin modules
    List {
        /// Directory to scan instead of the configured plugins dir
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Load one module and print its descriptor and capability table
    Inspect {
        /// Path to the plugin module
        path: PathBuf,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = playdeck_config::ConfigLoader::new()?;
    let config = config_loader.load()?;

    let log_level = effective_log_level(cli.log_level.as_deref(), &config);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    let policy = HostPolicy::with_min_level(config.min_api_level);

    match cli.command {
        Commands::List { dir } => {
            let plugins_dir = dir.unwrap_or_else(|| config_loader.plugins_dir(&config));
            let loader = PluginLoader::with_policy(&plugins_dir, policy);
            let plugins = loader.discover()?;

            if plugins.is_empty() {
                println!("no plugins found in {}", plugins_dir.display());
                return Ok(());
            }

            for plugin in plugins {
                print_plugin(&plugin);
            }
        }
        Commands::Inspect { path, json } => {
            let loader = PluginLoader::with_policy(".", policy);
            let plugin = loader.load(&path)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&inspect_json(&plugin))?);
            } else {
                print_plugin(&plugin);
            }
        }
    }

    Ok(())
}

/// The `--log-level` flag wins; otherwise the configured value, then
/// "info".
fn effective_log_level(flag: Option<&str>, config: &playdeck_config::HostConfig) -> String {
    flag.map(str::to_owned)
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string())
}

fn print_plugin(plugin: &LoadedPlugin) {
    println!(
        "{} {} (api level {}{})",
        plugin.name(),
        plugin.version(),
        plugin.api_level(),
        if plugin.is_reentrant() {
            ", reentrant"
        } else {
            ""
        }
    );
    for (slot, status) in plugin.capabilities() {
        println!("  {slot}: {status}");
    }
}

fn inspect_json(plugin: &LoadedPlugin) -> serde_json::Value {
    let capabilities: serde_json::Map<String, serde_json::Value> = plugin
        .capabilities()
        .map(|(slot, status)| {
            (
                slot.field_name().to_string(),
                serde_json::json!(status),
            )
        })
        .collect();

    serde_json::json!({
        "name": plugin.name(),
        "version": plugin.version(),
        "api_level": plugin.api_level(),
        "reentrant": plugin.is_reentrant(),
        "capabilities": capabilities,
    })
}

//! Configuration view and validation commands: `futurecast config`.

use anyhow::{Context, Result};

use futurecast::app::AppPaths;
use futurecast::config::{
    ENV_REMOTE_TOKEN, ENV_REMOTE_URL, FuturecastToml, env_value, resolve_remote_url,
};

use super::super::ConfigCommands;

pub fn cmd_config(paths: &AppPaths, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &paths.config_file;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Futurecast Configuration");
            println!("========================");
            println!();
            println!("Data directory: {}", paths.data_dir.display());

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                FuturecastToml::load(config_path)?
            } else {
                println!("No futurecast.toml found at {}", config_path.display());
                println!("Using default configuration:");
                FuturecastToml::default()
            };
            println!();

            let content =
                toml::to_string_pretty(&toml).context("Failed to serialize futurecast.toml")?;
            println!("{}", content.trim_end());
            println!();

            // Effective values after environment overrides
            println!("Effective values (with env overrides):");
            let remote = resolve_remote_url(
                None,
                env_value(ENV_REMOTE_URL).as_deref(),
                toml.remote.base_url.as_deref(),
            );
            println!(
                "  remote.base_url = {}",
                remote.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  remote token = {}",
                if env_value(ENV_REMOTE_TOKEN).is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!();

            if !config_path.exists() {
                println!("Run 'futurecast config init' to create a futurecast.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No futurecast.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = FuturecastToml::load(config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!(
                    "futurecast.toml already exists at {}",
                    config_path.display()
                );
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&paths.data_dir).with_context(|| {
                format!("Failed to create directory {}", paths.data_dir.display())
            })?;

            let toml = FuturecastToml::default();
            toml.save(config_path)?;

            println!("Created futurecast.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [generation] tick_interval_ms, smoothing");
            println!("  - [steps.<step>] weight, duration_secs");
            println!("  - [cache] max_size, ttl_days, memory_limit_mb");
            println!("  - [provider] latency_ms");
            println!("  - [remote] base_url, timeout_secs");
            println!();
        }
    }

    Ok(())
}
